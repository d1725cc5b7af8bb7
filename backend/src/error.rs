//! Error types for the clickmap collector.
//!
//! Startup problems and per-record problems are kept apart:
//!
//! - [`SchemaError`] - Schema file loading and resolution errors
//! - [`ScriptError`] - Mapping script loading errors
//! - [`SchemaMappingError`] - Mapping does not satisfy the schema
//! - [`ConfigError`] - Top-level startup error (always fatal)
//! - [`RecordError`] - A single record could not be completed
//! - [`ServerError`] - Listener errors
//!
//! Absence of a value is never an error; producers return `Option`.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors while loading a schema definition file.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Failed to read file.
    #[error("Failed to read schema file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not a JSON document.
    #[error("Schema is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Rejected by the embedded record-schema definition.
    #[error("Schema does not describe a record: {}", .0.join("; "))]
    Invalid(Vec<String>),

    /// A field uses a type the collector cannot populate.
    #[error("Unsupported type for field '{field}': {found}")]
    UnsupportedType { field: String, found: String },

    /// Two fields share a name.
    #[error("Duplicate field: {0}")]
    DuplicateField(String),

    /// A declared default does not fit its field.
    #[error("Invalid default for field '{field}': {message}")]
    InvalidDefault { field: String, message: String },
}

// =============================================================================
// Script Errors
// =============================================================================

/// Errors while loading a mapping script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Failed to read file.
    #[error("Failed to read mapping file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed script, unknown producer, or bad regex pattern.
    #[error("Invalid mapping script: {0}")]
    Parse(#[from] serde_json::Error),

    /// A pattern built in code failed to compile.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

// =============================================================================
// Schema Mapping Errors
// =============================================================================

/// The mapping script does not satisfy the schema.
///
/// Every problem found in one pass is reported, so a broken mapping can be
/// fixed in a single edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaMappingError {
    /// Non-nullable fields without an unconditional top-level assignment.
    pub missing_fields: Vec<String>,
    /// Assignment targets that are not in the schema.
    pub unknown_fields: Vec<String>,
    /// Producers whose value kind can never populate their target field.
    pub type_mismatches: Vec<String>,
    /// Assignment defaults that cannot be coerced to their target field.
    pub invalid_defaults: Vec<String>,
    /// Regex producers selecting a capture group their pattern lacks.
    pub undefined_groups: Vec<String>,
    /// `when` guards whose condition can never equal the expected value.
    pub unsatisfiable_conditions: Vec<String>,
}

impl SchemaMappingError {
    /// True when no problem was recorded.
    pub fn is_empty(&self) -> bool {
        self.missing_fields.is_empty()
            && self.unknown_fields.is_empty()
            && self.type_mismatches.is_empty()
            && self.invalid_defaults.is_empty()
            && self.undefined_groups.is_empty()
            && self.unsatisfiable_conditions.is_empty()
    }

    /// Flat list of human-readable problems.
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.extend(
            self.missing_fields
                .iter()
                .map(|f| format!("required field '{}' is never mapped unconditionally", f)),
        );
        out.extend(
            self.unknown_fields
                .iter()
                .map(|f| format!("field '{}' does not exist in the schema", f)),
        );
        out.extend(self.type_mismatches.iter().cloned());
        out.extend(self.invalid_defaults.iter().cloned());
        out.extend(self.undefined_groups.iter().cloned());
        out.extend(self.unsatisfiable_conditions.iter().cloned());
        out
    }
}

impl fmt::Display for SchemaMappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mapping does not satisfy schema: {}", self.problems().join("; "))
    }
}

impl std::error::Error for SchemaMappingError {}

// =============================================================================
// Configuration Errors (top-level, startup only)
// =============================================================================

/// Fatal startup errors. The collector must not accept requests after one.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Schema error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Mapping script error.
    #[error("Mapping error: {0}")]
    Script(#[from] ScriptError),

    /// Validation failed.
    #[error("{0}")]
    SchemaMapping(#[from] SchemaMappingError),

    /// A required setting was not provided.
    #[error("Missing setting: {0}")]
    MissingSetting(String),

    /// A setting was provided but could not be used.
    #[error("Invalid setting {name}: {message}")]
    InvalidSetting { name: String, message: String },
}

// =============================================================================
// Record Errors (per request)
// =============================================================================

/// A single record could not be completed. Only that record is discarded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    /// A non-nullable field was left unset and the schema has no default for it.
    #[error("Required field '{0}' was not set by the mapping")]
    MissingRequiredField(String),

    /// The script assigns a field the schema does not have.
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP listener errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Startup configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Socket error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for schema loading.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for script loading.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Result type for startup operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for record building.
pub type RecordResult<T> = Result<T, RecordError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let schema_err = SchemaError::DuplicateField("location".into());
        let config_err: ConfigError = schema_err.into();
        assert!(config_err.to_string().contains("location"));

        let mapping_err = SchemaMappingError {
            missing_fields: vec!["ts".into()],
            ..Default::default()
        };
        let config_err: ConfigError = mapping_err.into();
        assert!(matches!(config_err, ConfigError::SchemaMapping(_)));
        assert!(config_err.to_string().contains("'ts'"));
    }

    #[test]
    fn test_mapping_error_lists_every_problem() {
        let err = SchemaMappingError {
            missing_fields: vec!["ts".into()],
            unknown_fields: vec!["nope".into()],
            type_mismatches: vec!["field 'x': bad".into()],
            invalid_defaults: Vec::new(),
            undefined_groups: vec!["field 'pageId': pattern 'a' has no capture group 1".into()],
            unsatisfiable_conditions: Vec::new(),
        };
        assert!(!err.is_empty());
        assert_eq!(err.problems().len(), 4);
        let msg = err.to_string();
        assert!(msg.contains("'ts'"));
        assert!(msg.contains("'nope'"));
        assert!(msg.contains("bad"));
    }

    #[test]
    fn test_record_error_format() {
        let err = RecordError::MissingRequiredField("eventType".into());
        assert!(err.to_string().contains("eventType"));
    }
}
