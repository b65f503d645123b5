//! Schema command implementation.

use crate::error::{read_json, CliResult};
use orestes_core::{Metamodel, OrmError};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Description of one managed type.
#[derive(Debug, Serialize)]
pub struct TypeSummary {
    /// Type name.
    pub name: String,
    /// `entity` or `embeddable`.
    pub kind: &'static str,
    /// Direct supertype.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supertype: Option<String>,
    /// Attributes including inherited ones, root first.
    pub attributes: Vec<AttributeSummary>,
}

/// Description of one attribute.
#[derive(Debug, Serialize)]
pub struct AttributeSummary {
    /// Attribute name.
    pub name: String,
    /// Type expression, e.g. `Set<String>`.
    #[serde(rename = "type")]
    pub type_expr: String,
    /// Mapping classification.
    pub mapping: String,
    /// Name of the type declaring the attribute.
    pub declared_by: String,
}

/// Runs the schema command.
pub fn run(path: &Path, only: Option<&str>, format: &str, out: &mut impl Write) -> CliResult<()> {
    let metamodel = Metamodel::from_schema(&read_json(path)?)?;
    let summaries = summarize(&metamodel, only)?;
    tracing::debug!(types = summaries.len(), path = %path.display(), "schema loaded");

    match format {
        "json" => {
            writeln!(out, "{}", serde_json::to_string_pretty(&summaries).map_err(OrmError::from)?)?;
        }
        _ => print_text_output(&summaries, out)?,
    }
    Ok(())
}

/// Describes the types of `metamodel`, or only `only`.
pub fn summarize(metamodel: &Metamodel, only: Option<&str>) -> CliResult<Vec<TypeSummary>> {
    let types = match only {
        Some(name) => vec![metamodel
            .managed_type(name)
            .ok_or_else(|| OrmError::unknown_type(name))?],
        None => metamodel.types(),
    };

    types
        .iter()
        .map(|managed_type| -> CliResult<TypeSummary> {
            let mut chain = vec![managed_type.name().to_string()];
            chain.extend(metamodel.supertypes(managed_type.name()));
            let attributes = metamodel
                .attributes(managed_type.name())?
                .into_iter()
                .map(|attribute| {
                    let declared_by = chain
                        .iter()
                        .find(|name| {
                            metamodel
                                .managed_type(name)
                                .is_some_and(|t| t.declared_attribute(attribute.name()).is_some())
                        })
                        .cloned()
                        .unwrap_or_default();
                    AttributeSummary {
                        name: attribute.name().to_string(),
                        type_expr: attribute.type_expr(),
                        mapping: format!("{:?}", attribute.persistent_attribute_type()),
                        declared_by,
                    }
                })
                .collect();
            Ok(TypeSummary {
                name: managed_type.name().to_string(),
                kind: if managed_type.is_embeddable() {
                    "embeddable"
                } else {
                    "entity"
                },
                supertype: managed_type.supertype().map(str::to_string),
                attributes,
            })
        })
        .collect()
}

fn print_text_output(summaries: &[TypeSummary], out: &mut impl Write) -> CliResult<()> {
    for summary in summaries {
        match &summary.supertype {
            Some(supertype) => writeln!(out, "{} {} : {}", summary.kind, summary.name, supertype)?,
            None => writeln!(out, "{} {}", summary.kind, summary.name)?,
        }
        for attribute in &summary.attributes {
            let inherited = if attribute.declared_by == summary.name {
                String::new()
            } else {
                format!("  (from {})", attribute.declared_by)
            };
            writeln!(
                out,
                "  {:<16} {:<24} {}{}",
                attribute.name, attribute.type_expr, attribute.mapping, inherited
            )?;
        }
    }
    Ok(())
}
