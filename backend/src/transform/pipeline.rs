//! High-level API: load, validate, and build records.
//!
//! [`RecordMapper`] owns the schema and the validated script behind `Arc`s,
//! so one mapper is cloned into every request handler and builds run
//! concurrently without locking.
//!
//! # Example
//!
//! ```rust,ignore
//! use clickmap::pipeline::RecordMapper;
//!
//! let mapper = RecordMapper::load("mappings/clickstream.avsc", "mappings/clickstream-mapping.json")?;
//! let record = mapper.build(&ctx)?;
//! println!("{}", record.to_json());
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::api::logs::{log_error, log_error_indent, log_info, log_success, log_warning};
use crate::error::{ConfigResult, RecordResult};
use crate::models::RequestContext;
use crate::schema::Schema;
use crate::transform::dsl::{build, MappingScript, Record};
use crate::validation::validate;

/// A schema and a mapping script that was validated against it.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    schema: Arc<Schema>,
    script: Arc<MappingScript>,
}

impl RecordMapper {
    /// Validate `script` against `schema`.
    pub fn new(schema: Schema, script: MappingScript) -> ConfigResult<Self> {
        validate(&schema, &script)?;
        Ok(Self {
            schema: Arc::new(schema),
            script: Arc::new(script),
        })
    }

    /// Load both files and validate, logging each step.
    ///
    /// Any error here is fatal: the caller must not serve requests.
    pub fn load(schema_path: impl AsRef<Path>, script_path: impl AsRef<Path>) -> ConfigResult<Self> {
        let schema_path = schema_path.as_ref();
        let script_path = script_path.as_ref();

        log_info(format!("Loading schema {}", schema_path.display()));
        let schema = Schema::load(schema_path).map_err(|e| {
            log_error(e.to_string());
            e
        })?;
        log_success(format!(
            "Schema {}: {} fields, {} required",
            schema.name(),
            schema.len(),
            schema.required_fields().count()
        ));

        log_info(format!("Loading mapping {}", script_path.display()));
        let script = MappingScript::load(script_path).map_err(|e| {
            log_error(e.to_string());
            e
        })?;
        log_success(format!("Mapping: {} statements", script.statements.len()));

        match validate(&schema, &script) {
            Ok(()) => {
                log_success("Mapping covers every required field");
                Ok(Self {
                    schema: Arc::new(schema),
                    script: Arc::new(script),
                })
            }
            Err(errors) => {
                log_error("Mapping does not satisfy schema:");
                for problem in errors.problems() {
                    log_error_indent(problem, 1);
                }
                Err(errors.into())
            }
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn script(&self) -> &MappingScript {
        &self.script
    }

    /// Build the record for one request. A failure is logged and only
    /// discards this record.
    pub fn build(&self, ctx: &RequestContext) -> RecordResult<Record> {
        build(&self.schema, &self.script, ctx).map_err(|e| {
            log_warning(format!(
                "Discarding record for {} (event {}): {}",
                ctx.location(),
                ctx.envelope().event_id,
                e
            ));
            e
        })
    }
}
