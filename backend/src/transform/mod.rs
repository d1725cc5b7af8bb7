//! Transformation module.
//!
//! This module turns request contexts into records:
//! - DSL: Value producers, mapping script and executor
//! - URI: URI and query decomposition
//! - Pipeline: Loaded, validated mapper shared by request handlers

pub mod dsl;
pub mod pipeline;
pub mod uri;

pub use dsl::*;
pub use pipeline::*;
pub use uri::{parse_query, Uri, UriComponent};
