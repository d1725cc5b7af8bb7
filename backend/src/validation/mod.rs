//! Load-time validation.
//!
//! Two checks live here:
//!
//! - [`validate`] - a mapping script against the schema it populates. Runs
//!   once per loaded mapping; a failure must stop the collector before it
//!   accepts requests.
//! - [`validate_json`] - a JSON document against a JSON Schema (draft 7),
//!   used for schema definition files.
//!
//! # Example
//!
//! ```rust,ignore
//! use clickmap::{validate, MappingScript, Schema};
//!
//! let schema = Schema::load("mappings/clickstream.avsc")?;
//! let script = MappingScript::load("mappings/clickstream-mapping.json")?;
//! validate(&schema, &script)?;
//! ```

use serde_json::Value as JsonValue;

use crate::error::SchemaMappingError;
use crate::schema::Schema;
use crate::transform::dsl::{MappingScript, Statement, ValueKind};

/// Check that `script` can populate every record of `schema`.
///
/// - every non-nullable field has an unconditional top-level `map`
///   (assignments inside `when` blocks do not count)
/// - every `map`, at any depth, targets a field of the schema
/// - every producer can yield a value of its field's type
/// - every assignment default coerces to its field's type
/// - every regex capture group a producer selects exists in its pattern
/// - every `when` condition can yield a value equal to its `equals`
///
/// All problems are collected before returning.
pub fn validate(schema: &Schema, script: &MappingScript) -> Result<(), SchemaMappingError> {
    let mut errors = SchemaMappingError::default();

    let covered = script.covered_fields();
    errors.missing_fields = schema
        .required_fields()
        .filter(|f| !covered.contains(&f.name.as_str()))
        .map(|f| f.name.clone())
        .collect();

    for statement in script.assignments() {
        let Statement::Map { onto, value, default } = statement else {
            continue;
        };
        errors.undefined_groups.extend(
            value
                .undefined_groups()
                .into_iter()
                .map(|problem| format!("field '{}': {}", onto, problem)),
        );
        let Some(field) = schema.field(onto) else {
            if !errors.unknown_fields.contains(onto) {
                errors.unknown_fields.push(onto.clone());
            }
            continue;
        };

        let kind = value.kind();
        if !kind.fits(field.field_type) {
            errors.type_mismatches.push(format!(
                "field '{}': a {} value cannot populate a {} field",
                onto, kind, field.field_type
            ));
        }
        if let Some(default) = default {
            if default.clone().coerce(field.field_type).is_none() {
                errors.invalid_defaults.push(format!(
                    "field '{}': default {} is not a {}",
                    onto, default, field.field_type
                ));
            }
        }
    }

    for (condition, equals) in script.conditions() {
        errors.undefined_groups.extend(
            condition
                .undefined_groups()
                .into_iter()
                .map(|problem| format!("condition: {}", problem)),
        );
        let kind = condition.kind();
        if kind != ValueKind::Any && kind != equals.kind() {
            errors.unsatisfiable_conditions.push(format!(
                "condition yields a {} value and never equals {} ({})",
                kind,
                equals,
                equals.kind()
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a JSON document against a JSON Schema (draft 7).
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with every error otherwise
pub fn validate_json(schema: &JsonValue, data: &JsonValue) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid JSON Schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContextField;
    use crate::schema::{Field, FieldType};
    use crate::transform::dsl::{Group, Pattern, Producer};
    use crate::transform::uri::UriComponent;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(
            "Test",
            vec![
                Field::new("location", FieldType::String),
                Field::new("eventType", FieldType::String),
                Field::nullable("client", FieldType::String),
                Field::nullable("uriQuery", FieldType::StringMultimap),
                Field::nullable("headerList", FieldType::StringList),
            ],
        )
        .unwrap()
    }

    fn location() -> Producer {
        Producer::field(ContextField::Location)
    }

    #[test]
    fn test_complete_mapping_is_valid() {
        let script = MappingScript::new(vec![
            Statement::map("location", location()),
            Statement::map("eventType", Producer::constant("pageView")),
            Statement::map("uriQuery", location().uri(UriComponent::Query)),
        ]);
        assert!(validate(&schema(), &script).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let script = MappingScript::new(vec![Statement::map("location", location())]);
        let err = validate(&schema(), &script).unwrap_err();
        assert_eq!(err.missing_fields, vec!["eventType".to_string()]);
    }

    #[test]
    fn test_conditional_assignment_does_not_cover() {
        let script = MappingScript::new(vec![
            Statement::map("location", location()),
            Statement::when(
                location(),
                "http://www.example.com/",
                vec![Statement::map("eventType", Producer::constant("locationmatch"))],
            ),
        ]);
        let err = validate(&schema(), &script).unwrap_err();
        assert_eq!(err.missing_fields, vec!["eventType".to_string()]);
    }

    #[test]
    fn test_unknown_field_at_any_depth() {
        let script = MappingScript::new(vec![
            Statement::map("location", location()),
            Statement::map("eventType", Producer::constant("pageView")),
            Statement::when(
                Producer::constant(true),
                true,
                vec![
                    Statement::map("nope", Producer::constant("x")),
                    Statement::map("nope", Producer::constant("y")),
                ],
            ),
        ]);
        let err = validate(&schema(), &script).unwrap_err();
        assert_eq!(err.unknown_fields, vec!["nope".to_string()]);
        assert!(err.missing_fields.is_empty());
    }

    #[test]
    fn test_type_mismatches() {
        let script = MappingScript::new(vec![
            Statement::map("location", location().uri(UriComponent::Query)),
            Statement::map("eventType", Producer::constant("pageView")),
            Statement::map("headerList", location().present()),
        ]);
        let err = validate(&schema(), &script).unwrap_err();
        assert_eq!(err.type_mismatches.len(), 2);
        assert!(err.type_mismatches[0].contains("'location'"));
    }

    #[test]
    fn test_invalid_default() {
        let script = MappingScript::new(vec![
            Statement::map("location", location()),
            Statement::map("eventType", Producer::cookie("t")),
            Statement::map("uriQuery", location().uri(UriComponent::Query)).or_default("none"),
        ]);
        let err = validate(&schema(), &script).unwrap_err();
        assert_eq!(err.invalid_defaults.len(), 1);
    }

    fn complete(mut extra: Vec<Statement>) -> MappingScript {
        let mut statements = vec![
            Statement::map("location", location()),
            Statement::map("eventType", Producer::constant("pageView")),
        ];
        statements.append(&mut extra);
        MappingScript::new(statements)
    }

    #[test]
    fn test_undefined_capture_groups() {
        let pattern = Pattern::new(r"/with/(?P<id>[0-9]+)/").unwrap();
        let script = complete(vec![
            Statement::map(
                "client",
                location().regex_group(pattern.clone(), Group::Name("idd".into())),
            ),
            Statement::map("client", location().regex_group(pattern.clone(), Group::Index(2))),
            Statement::when(
                location().regex_group(pattern.clone(), Group::Name("ref".into())),
                "42",
                Vec::new(),
            ),
        ]);
        let err = validate(&schema(), &script).unwrap_err();
        assert_eq!(err.undefined_groups.len(), 3);
        assert!(err.undefined_groups[0].contains("'idd'"));
        assert!(err.undefined_groups[1].contains("group 2"));
        assert!(err.undefined_groups[2].starts_with("condition"));
        assert!(err.missing_fields.is_empty());
    }

    #[test]
    fn test_defined_capture_groups() {
        let pattern = Pattern::new(r"/with/(?P<id>[0-9]+)/([a-z]+)").unwrap();
        let script = complete(vec![
            Statement::map(
                "client",
                location().regex_group(pattern.clone(), Group::Name("id".into())),
            ),
            Statement::map("client", location().regex_group(pattern.clone(), Group::Index(2))),
            Statement::map("client", location().regex_group(pattern, Group::Index(0))),
        ]);
        assert!(validate(&schema(), &script).is_ok());
    }

    #[test]
    fn test_unsatisfiable_condition() {
        let pattern = Pattern::new(r"^/page").unwrap();
        let script = complete(vec![
            Statement::when(location().matches(pattern.clone()), "true", Vec::new()),
            Statement::when(location().present(), true, Vec::new()),
            Statement::when(location(), "http://www.example.com/", Vec::new()),
        ]);
        let err = validate(&schema(), &script).unwrap_err();
        assert_eq!(err.unsatisfiable_conditions.len(), 1);
        assert!(err.unsatisfiable_conditions[0].contains("boolean"));
    }

    #[test]
    fn test_validate_json() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": { "name": { "type": "string" } }
        });
        assert!(validate_json(&schema, &json!({ "name": "test" })).is_ok());
        assert!(validate_json(&schema, &json!({ "age": 42 })).is_err());
    }
}
