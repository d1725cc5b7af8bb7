//! DSL (Domain Specific Language) for request to record mapping
//!
//! This module provides:
//! - `value`: Values flowing through producers
//! - `producers`: Value producers reading the request context
//! - `operations`: Operations applied by the `transform` producer
//! - `script`: Mapping script definition (statements)
//! - `executor`: Run a script against one request
//!
//! ## Usage Flow
//!
//! ```text
//! schema + script → validation::validate (once) → executor::build (per request) → Record
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use clickmap::dsl::{build, MappingScript, Producer, Statement};
//! use clickmap::models::ContextField;
//! use clickmap::uri::UriComponent;
//!
//! let location = Producer::field(ContextField::Location);
//! let script = MappingScript::new(vec![
//!     Statement::map("location", location.clone()),
//!     Statement::map("uriPath", location.uri(UriComponent::Path)),
//!     Statement::map("campaign", Producer::cookie("campaign")).or_default("not set"),
//! ]);
//!
//! let record = build(&schema, &script, &ctx)?;
//! ```

pub mod executor;
pub mod operations;
pub mod producers;
pub mod script;
pub mod value;

// Re-exports for convenience
pub use executor::{build, Record};
pub use operations::Operation;
pub use producers::{producers_description, Group, Pattern, Producer};
pub use script::{example_script, MappingScript, Statement};
pub use value::{QueryMap, Value, ValueKind};
