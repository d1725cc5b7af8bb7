//! Schema descriptor: the typed field contract every record must satisfy.
//!
//! Schemas are read from Avro-style record definitions in JSON:
//!
//! ```json
//! {
//!   "type": "record",
//!   "name": "ClickEvent",
//!   "fields": [
//!     { "name": "location", "type": "string" },
//!     { "name": "referer", "type": ["null", "string"], "default": null },
//!     { "name": "uriQuery", "type": ["null", { "type": "map", "values": { "type": "array", "items": "string" } }] }
//!   ]
//! }
//! ```
//!
//! A union of `"null"` and one other type marks the field nullable. The
//! definition is checked against the embedded `schemas/record-schema.json`
//! before its types are resolved.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};
use crate::transform::dsl::Value;
use crate::validation::validate_json;

/// Field types a record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    String,
    Boolean,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    Double,
    /// Array of strings
    StringList,
    /// Map of string to array of strings
    StringMultimap,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Boolean => "boolean",
            FieldType::Int => "int",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::StringList => "array<string>",
            FieldType::StringMultimap => "map<string, array<string>>",
        };
        f.write_str(name)
    }
}

/// A single named, typed field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    /// Used when the mapping leaves the field unset.
    pub default: Option<Value>,
    pub doc: Option<String>,
}

impl Field {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            field_type,
            nullable: false,
            default: None,
            doc: None,
        }
    }

    pub fn nullable(name: &str, field_type: FieldType) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, field_type)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Ordered, immutable set of fields with unique names.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    name: String,
    fields: Vec<Field>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

/// Raw record definition as found in the schema file.
#[derive(Debug, Deserialize)]
struct RecordDefinition {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    fields: Vec<FieldDefinition>,
}

#[derive(Debug, Deserialize)]
struct FieldDefinition {
    name: String,
    #[serde(rename = "type")]
    field_type: JsonValue,
    #[serde(default)]
    default: Option<JsonValue>,
    #[serde(default)]
    doc: Option<String>,
}

impl Schema {
    /// Build a schema from fields, rejecting duplicate names and defaults
    /// that do not fit their field.
    pub fn new(name: &str, fields: Vec<Field>) -> SchemaResult<Self> {
        let mut index = HashMap::with_capacity(fields.len());
        let mut checked = Vec::with_capacity(fields.len());

        for (i, mut field) in fields.into_iter().enumerate() {
            if index.insert(field.name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateField(field.name));
            }
            if let Some(default) = field.default.take() {
                let coerced = default.clone().coerce(field.field_type).ok_or_else(|| {
                    SchemaError::InvalidDefault {
                        field: field.name.clone(),
                        message: format!("{} is not a {}", default, field.field_type),
                    }
                })?;
                field.default = Some(coerced);
            }
            checked.push(field);
        }

        Ok(Self {
            name: name.to_string(),
            fields: checked,
            index,
        })
    }

    /// Parse a schema definition from a JSON string.
    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    /// Parse a schema definition from a JSON value.
    pub fn from_value(value: &JsonValue) -> SchemaResult<Self> {
        validate_definition(value).map_err(SchemaError::Invalid)?;

        let definition: RecordDefinition = serde_json::from_value(value.clone())?;
        let fields = definition
            .fields
            .into_iter()
            .map(resolve_field)
            .collect::<SchemaResult<Vec<_>>>()?;

        let name = match definition.namespace {
            Some(ns) if !ns.is_empty() => format!("{}.{}", ns, definition.name),
            _ => definition.name,
        };
        Self::new(&name, fields)
    }

    /// Load a schema definition file.
    pub fn load(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Fully qualified record name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index_of(name).map(|i| &self.fields[i])
    }

    /// Position of a field in record order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Fields that must hold a value in every record.
    pub fn required_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.nullable)
    }
}

/// Check a raw definition against the embedded record-schema definition.
fn validate_definition(value: &JsonValue) -> Result<(), Vec<String>> {
    let meta: JsonValue = serde_json::from_str(include_str!("../../schemas/record-schema.json"))
        .map_err(|e| vec![format!("Embedded record schema is invalid: {}", e)])?;
    validate_json(&meta, value)
}

fn resolve_field(definition: FieldDefinition) -> SchemaResult<Field> {
    let (field_type, nullable) = resolve_type(&definition.name, &definition.field_type)?;
    let default = definition
        .default
        .map(serde_json::from_value::<Value>)
        .transpose()
        .map_err(|e| SchemaError::InvalidDefault {
            field: definition.name.clone(),
            message: e.to_string(),
        })?;

    Ok(Field {
        name: definition.name,
        field_type,
        nullable,
        default,
        doc: definition.doc,
    })
}

/// Resolve a field type, unwrapping a `["null", T]` union into a nullable `T`.
fn resolve_type(field: &str, ty: &JsonValue) -> SchemaResult<(FieldType, bool)> {
    if let JsonValue::Array(branches) = ty {
        let non_null: Vec<&JsonValue> = branches
            .iter()
            .filter(|b| b.as_str() != Some("null"))
            .collect();
        return match non_null.as_slice() {
            [single] if branches.len() == 2 => Ok((resolve_plain(field, single)?, true)),
            _ => Err(unsupported(field, ty)),
        };
    }
    Ok((resolve_plain(field, ty)?, false))
}

fn resolve_plain(field: &str, ty: &JsonValue) -> SchemaResult<FieldType> {
    match ty {
        JsonValue::String(name) => match name.as_str() {
            "string" => Ok(FieldType::String),
            "boolean" => Ok(FieldType::Boolean),
            "int" => Ok(FieldType::Int),
            "long" => Ok(FieldType::Long),
            "float" | "double" => Ok(FieldType::Double),
            _ => Err(unsupported(field, ty)),
        },
        JsonValue::Object(obj) => match obj.get("type").and_then(|t| t.as_str()) {
            Some("array") if is_string_array(obj.get("items")) => Ok(FieldType::StringList),
            Some("map") => match obj.get("values") {
                Some(JsonValue::Object(values))
                    if values.get("type").and_then(|t| t.as_str()) == Some("array")
                        && is_string_array(values.get("items")) =>
                {
                    Ok(FieldType::StringMultimap)
                }
                _ => Err(unsupported(field, ty)),
            },
            Some(primitive @ ("string" | "boolean" | "int" | "long" | "float" | "double")) => {
                resolve_plain(field, &JsonValue::String(primitive.to_string()))
            }
            _ => Err(unsupported(field, ty)),
        },
        _ => Err(unsupported(field, ty)),
    }
}

fn is_string_array(items: Option<&JsonValue>) -> bool {
    match items {
        Some(JsonValue::String(s)) => s == "string",
        Some(JsonValue::Object(obj)) => obj.get("type").and_then(|t| t.as_str()) == Some("string"),
        _ => false,
    }
}

fn unsupported(field: &str, ty: &JsonValue) -> SchemaError {
    SchemaError::UnsupportedType {
        field: field.to_string(),
        found: ty.to_string(),
    }
}
