//! DSL Executor
//!
//! Runs a mapping script against one request context and produces a record
//! bound to the schema. Holds no state between builds.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::script::{MappingScript, Statement};
use super::value::Value;
use crate::error::{RecordError, RecordResult};
use crate::models::RequestContext;
use crate::schema::Schema;

/// A finished record: every schema field, in schema order.
///
/// Unset nullable fields are `None` and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Option<Value>>,
}

impl Record {
    /// Value of a field, `None` when unset or not in the schema.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).and_then(Option::as_ref)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

/// Build one record.
///
/// Statements run top to bottom and later assignments to a field overwrite
/// earlier ones. After the script, unset fields take their schema default;
/// a non-nullable field still unset fails the record.
///
/// # Arguments
/// * `schema` - Target schema
/// * `script` - Validated mapping script
/// * `ctx` - The request being mapped
pub fn build(schema: &Schema, script: &MappingScript, ctx: &RequestContext) -> RecordResult<Record> {
    let mut slots: Vec<Option<Value>> = vec![None; schema.len()];
    run(schema, &script.statements, ctx, &mut slots)?;

    let mut fields = IndexMap::with_capacity(schema.len());
    for (field, slot) in schema.fields().iter().zip(slots) {
        let value = slot.or_else(|| field.default.clone());
        if value.is_none() && !field.nullable {
            return Err(RecordError::MissingRequiredField(field.name.clone()));
        }
        fields.insert(field.name.clone(), value);
    }

    Ok(Record { fields })
}

fn run(
    schema: &Schema,
    statements: &[Statement],
    ctx: &RequestContext,
    slots: &mut [Option<Value>],
) -> RecordResult<()> {
    for statement in statements {
        match statement {
            Statement::Map { onto, value, default } => {
                let index = schema
                    .index_of(onto)
                    .ok_or_else(|| RecordError::UnknownField(onto.clone()))?;
                let field_type = schema.fields()[index].field_type;

                // A value that does not coerce counts as absent.
                let produced = value
                    .evaluate(ctx)
                    .and_then(|v| v.coerce(field_type))
                    .or_else(|| default.clone().and_then(|d| d.coerce(field_type)));

                if let Some(v) = produced {
                    slots[index] = Some(v);
                }
            }
            Statement::When { condition, equals, apply } => {
                if condition.evaluate(ctx).as_ref() == Some(equals) {
                    run(schema, apply, ctx, slots)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContextField, Envelope};
    use crate::schema::{Field, FieldType};
    use crate::transform::dsl::Producer;

    fn schema() -> Schema {
        Schema::new(
            "Test",
            vec![
                Field::new("location", FieldType::String),
                Field::new("eventType", FieldType::String).with_default(Value::from("pageView")),
                Field::nullable("client", FieldType::String),
                Field::nullable("queryparam", FieldType::String),
                Field::nullable("count", FieldType::Int),
            ],
        )
        .unwrap()
    }

    fn context(location: &str) -> RequestContext {
        let mut envelope = Envelope::new(location);
        envelope.referer = Some("http://www.example.com/".into());
        RequestContext::new(envelope)
    }

    fn location() -> Producer {
        Producer::field(ContextField::Location)
    }

    #[test]
    fn test_build_simple() {
        let script = MappingScript::new(vec![
            Statement::map("location", location()),
            Statement::map("client", Producer::constant("abc")),
        ]);
        let record = build(&schema(), &script, &context("http://www.example.com/")).unwrap();
        assert_eq!(record.get("location"), Some(&Value::from("http://www.example.com/")));
        assert_eq!(record.get("client"), Some(&Value::from("abc")));
        assert_eq!(record.get("queryparam"), None);
        assert_eq!(record.len(), 5);
    }

    #[test]
    fn test_record_keeps_schema_order() {
        let script = MappingScript::new(vec![
            Statement::map("client", Producer::constant("abc")),
            Statement::map("location", location()),
        ]);
        let record = build(&schema(), &script, &context("http://www.example.com/")).unwrap();
        let names: Vec<&str> = record.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["location", "eventType", "client", "queryparam", "count"]);
        assert_eq!(record.to_json()["queryparam"], JsonValue::Null);
    }

    #[test]
    fn test_last_write_wins() {
        let script = MappingScript::new(vec![
            Statement::map("location", location()),
            Statement::map("client", Producer::constant("first")),
            Statement::map("client", Producer::constant("second")),
            Statement::map("client", Producer::cookie("missing")),
        ]);
        let record = build(&schema(), &script, &context("http://www.example.com/")).unwrap();
        assert_eq!(record.get("client"), Some(&Value::from("second")));
    }

    #[test]
    fn test_when_overrides_on_exact_match() {
        let script = MappingScript::new(vec![
            Statement::map("location", location()),
            Statement::map("eventType", Producer::constant("default")),
            Statement::when(
                location(),
                "http://www.example.com/",
                vec![Statement::map("eventType", Producer::constant("locationmatch"))],
            ),
            Statement::when(
                Producer::field(ContextField::Referer),
                "http://www.example.com/",
                vec![Statement::map("client", Producer::constant("referermatch"))],
            ),
            Statement::when(
                location().query_value("q"),
                "x",
                vec![Statement::map("queryparam", Producer::constant("never"))],
            ),
        ]);

        let record = build(&schema(), &script, &context("http://www.example.com/")).unwrap();
        assert_eq!(record.get("eventType"), Some(&Value::from("locationmatch")));
        assert_eq!(record.get("client"), Some(&Value::from("referermatch")));
        assert_eq!(record.get("queryparam"), None);

        let record = build(&schema(), &script, &context("http://www.example.com/other")).unwrap();
        assert_eq!(record.get("eventType"), Some(&Value::from("default")));
    }

    #[test]
    fn test_assignment_default_when_absent() {
        let script = MappingScript::new(vec![
            Statement::map("location", location()),
            Statement::map("queryparam", location().query_value("q")).or_default("not set"),
        ]);
        let record = build(&schema(), &script, &context("http://www.example.com/")).unwrap();
        assert_eq!(record.get("queryparam"), Some(&Value::from("not set")));

        let record = build(&schema(), &script, &context("http://www.example.com/?q=hi")).unwrap();
        assert_eq!(record.get("queryparam"), Some(&Value::from("hi")));
    }

    #[test]
    fn test_coercion_failure_is_absence() {
        let script = MappingScript::new(vec![
            Statement::map("location", location()),
            Statement::map("count", Producer::constant(7i64)),
            Statement::map("count", location().query_value("n")),
        ]);
        let record = build(&schema(), &script, &context("http://www.example.com/?n=42")).unwrap();
        assert_eq!(record.get("count"), Some(&Value::Int(42)));

        let record = build(&schema(), &script, &context("http://www.example.com/?n=many")).unwrap();
        assert_eq!(record.get("count"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_schema_default_fills_unset_required_field() {
        let script = MappingScript::new(vec![
            Statement::map("location", location()),
            Statement::map("eventType", Producer::cookie("type")),
        ]);
        let record = build(&schema(), &script, &context("http://www.example.com/")).unwrap();
        assert_eq!(record.get("eventType"), Some(&Value::from("pageView")));
    }

    #[test]
    fn test_unset_required_field_fails_record() {
        let script = MappingScript::new(vec![Statement::map("location", Producer::cookie("loc"))]);
        let result = build(&schema(), &script, &context("http://www.example.com/"));
        assert_eq!(result, Err(RecordError::MissingRequiredField("location".into())));
    }

    #[test]
    fn test_unknown_field_fails_record() {
        let script = MappingScript::new(vec![Statement::map("nope", location())]);
        let result = build(&schema(), &script, &context("http://www.example.com/"));
        assert_eq!(result, Err(RecordError::UnknownField("nope".into())));
    }
}
