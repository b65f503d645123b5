//! Schema documents exchanged with the server.
//!
//! A schema is a JSON list of type documents:
//!
//! ```json
//! [{"class": "Person", "superClass": null, "embedded": false,
//!   "fields": [{"name": "tags", "type": "Set<String>"}]}]
//! ```

use super::attribute::{Attribute, AttributeKind};
use super::managed_type::ManagedType;
use super::types::{BasicType, Type};
use crate::error::{OrmError, OrmResult};
use serde::{Deserialize, Serialize};

/// One type document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Type name.
    pub class: String,
    /// Supertype name.
    #[serde(rename = "superClass", default, skip_serializing_if = "Option::is_none")]
    pub super_class: Option<String>,
    /// Whether the type is embeddable.
    #[serde(default)]
    pub embedded: bool,
    /// Declared attributes.
    #[serde(default)]
    pub fields: Vec<FieldDocument>,
}

/// One attribute of a type document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDocument {
    /// Attribute name.
    pub name: String,
    /// Type expression, e.g. `String`, `List<Person>`, `Map<String,Number>`.
    #[serde(rename = "type")]
    pub type_expr: String,
}

impl SchemaDocument {
    /// Describes a managed type.
    #[must_use]
    pub fn from_type(managed_type: &ManagedType) -> Self {
        Self {
            class: managed_type.name().to_string(),
            super_class: managed_type.supertype().map(str::to_string),
            embedded: managed_type.is_embeddable(),
            fields: managed_type
                .declared_attributes()
                .iter()
                .map(|a| FieldDocument {
                    name: a.name().to_string(),
                    type_expr: a.type_expr(),
                })
                .collect(),
        }
    }
}

/// Parses a type expression into an attribute shape.
///
/// Names that are neither basic types nor accepted by `is_embeddable` are
/// taken as entity types.
pub fn parse_type_expr(expr: &str, is_embeddable: impl Fn(&str) -> bool) -> OrmResult<AttributeKind> {
    let expr = expr.trim();
    let element = |name: &str| -> OrmResult<Type> {
        let name = name.trim();
        if name.is_empty() || name.contains(['<', '>', ',']) {
            return Err(OrmError::invalid_schema(format!("invalid element type {name:?}")));
        }
        Ok(match BasicType::from_name(name) {
            Some(basic) => Type::Basic(basic),
            None if is_embeddable(name) => Type::embeddable(name),
            None => Type::entity(name),
        })
    };

    let Some((container, rest)) = expr.split_once('<') else {
        return element(expr).map(AttributeKind::Singular);
    };
    let arguments = rest
        .strip_suffix('>')
        .ok_or_else(|| OrmError::invalid_schema(format!("unterminated type expression {expr:?}")))?;

    match container.trim() {
        "List" => element(arguments).map(AttributeKind::List),
        "Set" => element(arguments).map(AttributeKind::Set),
        "Map" => {
            let (key, value) = arguments.split_once(',').ok_or_else(|| {
                OrmError::invalid_schema(format!("map type needs a key and a value: {expr:?}"))
            })?;
            Ok(AttributeKind::Map {
                key: element(key)?,
                value: element(value)?,
            })
        }
        other => Err(OrmError::invalid_schema(format!("unknown collection type {other:?}"))),
    }
}

/// Turns documents into managed types.
///
/// A name counts as embeddable if some document in the list declares it so,
/// or if `known_embeddable` says so.
pub(crate) fn parse_documents(
    documents: &[SchemaDocument],
    known_embeddable: impl Fn(&str) -> bool,
) -> OrmResult<Vec<ManagedType>> {
    let is_embeddable =
        |name: &str| documents.iter().any(|d| d.embedded && d.class == name) || known_embeddable(name);

    documents
        .iter()
        .map(|document| {
            let mut managed_type = if document.embedded {
                ManagedType::embeddable(&document.class)
            } else {
                ManagedType::entity(&document.class)
            };
            if let Some(super_class) = &document.super_class {
                managed_type = managed_type.with_supertype(super_class);
            }
            for field in &document.fields {
                let kind = parse_type_expr(&field.type_expr, &is_embeddable)?;
                managed_type.add_attribute(Attribute::new(&field.name, kind))?;
            }
            Ok(managed_type)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never(_: &str) -> bool {
        false
    }

    #[test]
    fn parses_type_expressions() {
        assert_eq!(
            parse_type_expr("String", never).unwrap(),
            AttributeKind::Singular(Type::STRING)
        );
        assert_eq!(
            parse_type_expr("Set<String>", never).unwrap(),
            AttributeKind::Set(Type::STRING)
        );
        assert_eq!(
            parse_type_expr("List<Person>", never).unwrap(),
            AttributeKind::List(Type::entity("Person"))
        );
        assert_eq!(
            parse_type_expr("Map<String, Address>", |n| n == "Address").unwrap(),
            AttributeKind::Map {
                key: Type::STRING,
                value: Type::embeddable("Address"),
            }
        );
    }

    #[test]
    fn rejects_malformed_expressions() {
        for expr in ["", "List<String", "Map<String>", "Bag<String>", "List<List<String>>"] {
            let err = parse_type_expr(expr, never).unwrap_err();
            assert!(matches!(err, OrmError::InvalidSchema { .. }), "{expr}");
        }
    }

    #[test]
    fn documents_round_trip() {
        let person = ManagedType::entity("Person")
            .with_supertype("Being")
            .with_attribute(Attribute::map("scores", Type::STRING, Type::NUMBER))
            .unwrap();
        let document = SchemaDocument::from_type(&person);
        assert_eq!(document.fields[0].type_expr, "Map<String,Number>");

        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["superClass"], "Being");
        let parsed: SchemaDocument = serde_json::from_value(json).unwrap();
        let types = parse_documents(&[parsed], never).unwrap();
        assert_eq!(types[0], person);
    }

    #[test]
    fn reserved_field_in_schema_is_rejected() {
        let document = SchemaDocument {
            class: "Person".into(),
            super_class: None,
            embedded: false,
            fields: vec![FieldDocument {
                name: "id".into(),
                type_expr: "String".into(),
            }],
        };
        assert!(matches!(
            parse_documents(&[document], never).unwrap_err(),
            OrmError::ReservedAttribute { .. }
        ));
    }
}
