//! # Clickmap - clickstream request to record mapping
//!
//! Clickmap is the mapping stage of a clickstream collector. Each tracking
//! request becomes one record of a user-supplied schema, following a mapping
//! script that is validated against the schema once at startup.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Request   │────▶│   Context   │────▶│   Mapping   │────▶│   Record    │
//! │ (HTTP GET)  │     │ (immutable) │     │ (DSL tree)  │     │  (schema)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                ▲
//!                          schema + script ──────┘ validated once
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clickmap::{Envelope, RecordMapper, RequestContext};
//!
//! let mapper = RecordMapper::load("clickstream.avsc", "clickstream-mapping.json")?;
//! let ctx = RequestContext::new(Envelope::new("https://example.com/?q=shoes"));
//! let record = mapper.build(&ctx)?;
//! println!("{}", record.to_json());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Request context and envelope
//! - [`schema`] - Schema descriptor
//! - [`transform`] - DSL, URI decomposition, and pipeline
//! - [`validation`] - Mapping and JSON Schema validation
//! - [`config`] - Collector settings
//! - [`api`] - HTTP listener

// Core modules
pub mod error;
pub mod models;
pub mod schema;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Settings
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ConfigResult, RecordError, RecordResult, SchemaError, SchemaMappingError,
    ScriptError, ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{ContextField, Envelope, RequestContext, UserAgent};

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use schema::{Field, FieldType, Schema};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{validate, validate_json};

// =============================================================================
// Re-exports - DSL
// =============================================================================

pub use transform::dsl::{
    build, example_script, producers_description, Group, MappingScript, Operation, Pattern,
    Producer, QueryMap, Record, Statement, Value, ValueKind,
};

// =============================================================================
// Re-exports - URI
// =============================================================================

pub use transform::uri::{parse_query, Uri, UriComponent};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::RecordMapper;

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::{CollectorConfig, Overrides};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, EventResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
