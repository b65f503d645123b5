//! Normalize command implementation.
//!
//! Reads an entity document, maps it onto the metamodel and prints the wire
//! form the mapper would send. Unknown keys are dropped, duplicate set
//! elements and map keys collapse, and values are checked against the
//! declared attribute types.

use crate::error::{read_json, CliResult};
use orestes_core::{Config, Entity, Metamodel, OrmError};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs the normalize command.
pub fn run(
    schema: &Path,
    type_name: &str,
    document: &Path,
    strict: bool,
    out: &mut impl Write,
) -> CliResult<()> {
    let metamodel = Arc::new(Metamodel::from_schema(&read_json(schema)?)?);
    let normalized = normalize(&metamodel, type_name, &read_json(document)?, strict)?;
    writeln!(
        out,
        "{}",
        serde_json::to_string_pretty(&normalized).map_err(OrmError::from)?
    )?;
    Ok(())
}

/// Maps `document` through `metamodel` and back to JSON.
pub fn normalize(
    metamodel: &Arc<Metamodel>,
    type_name: &str,
    document: &serde_json::Value,
    strict: bool,
) -> CliResult<serde_json::Value> {
    let config = Config::default().strict_map_records(strict);
    let entity = Entity::from_json_with(metamodel, type_name, document, &config)?;
    debug!(entity = %entity, lifecycle = ?entity.lifecycle(), "document mapped");

    if let Some(object) = document.as_object() {
        let known = metamodel.attributes(type_name)?;
        let dropped: Vec<&String> = object
            .keys()
            .filter(|key| !matches!(key.as_str(), "id" | "version" | "acl"))
            .filter(|key| !known.iter().any(|a| a.name() == key.as_str()))
            .collect();
        if !dropped.is_empty() {
            info!(?dropped, "keys without a declared attribute were dropped");
        }
    }
    Ok(entity.to_json()?)
}
