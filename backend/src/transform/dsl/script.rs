//! Mapping script definition
//!
//! A script is an ordered list of statements assigning producers to record
//! fields, optionally guarded by `when` blocks. It is loaded once and shared
//! read-only by every record build.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::producers::{Group, Pattern, Producer};
use super::value::Value;
use crate::error::{ScriptError, ScriptResult};
use crate::models::ContextField;
use crate::transform::uri::UriComponent;

/// A complete mapping script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingScript {
    /// Version of the script format
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Statements, executed top to bottom
    pub statements: Vec<Statement>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// One statement of a mapping script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement {
    /// Assign the value of a producer to a record field
    Map {
        onto: String,
        value: Producer,
        /// Written instead when `value` is absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },

    /// Run `apply` only if `condition` yields a value equal to `equals`
    When {
        condition: Producer,
        equals: Value,
        apply: Vec<Statement>,
    },
}

impl Statement {
    pub fn map(onto: &str, value: Producer) -> Self {
        Statement::Map { onto: onto.to_string(), value, default: None }
    }

    pub fn when(condition: Producer, equals: impl Into<Value>, apply: Vec<Statement>) -> Self {
        Statement::When { condition, equals: equals.into(), apply }
    }

    /// Set the value written when the producer is absent (`map` only).
    pub fn or_default(self, value: impl Into<Value>) -> Self {
        match self {
            Statement::Map { onto, value: producer, .. } => Statement::Map {
                onto,
                value: producer,
                default: Some(value.into()),
            },
            when => when,
        }
    }
}

impl MappingScript {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            statements,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Parse a script from JSON string
    pub fn from_json(json: &str) -> ScriptResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a script file
    pub fn load(path: impl AsRef<Path>) -> ScriptResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Fields assigned by unconditional top-level statements
    pub fn covered_fields(&self) -> Vec<&str> {
        self.statements
            .iter()
            .filter_map(|s| match s {
                Statement::Map { onto, .. } => Some(onto.as_str()),
                Statement::When { .. } => None,
            })
            .collect()
    }

    /// Every `map` statement, at any depth, in script order
    pub fn assignments(&self) -> Vec<&Statement> {
        fn walk<'a>(statements: &'a [Statement], out: &mut Vec<&'a Statement>) {
            for statement in statements {
                match statement {
                    Statement::Map { .. } => out.push(statement),
                    Statement::When { apply, .. } => walk(apply, out),
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.statements, &mut out);
        out
    }

    /// Every `when` guard, at any depth, as `(condition, equals)`
    pub fn conditions(&self) -> Vec<(&Producer, &Value)> {
        fn walk<'a>(statements: &'a [Statement], out: &mut Vec<(&'a Producer, &'a Value)>) {
            for statement in statements {
                if let Statement::When { condition, equals, apply } = statement {
                    out.push((condition, equals));
                    walk(apply, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.statements, &mut out);
        out
    }
}

/// Generate an example script for the bundled clickstream schema
pub fn example_script() -> ScriptResult<MappingScript> {
    let location = || Producer::field(ContextField::Location);
    let page = Pattern::new(r"^/path/with/([0-9]+)/([a-z]+)\.html$")?;
    let path = || location().uri(UriComponent::Path);

    let statements = vec![
        Statement::map("firstInSession", Producer::field(ContextField::FirstInSession)),
        Statement::map("timestamp", Producer::field(ContextField::Timestamp)),
        Statement::map("location", location()),
        Statement::map("referer", Producer::field(ContextField::Referer)),
        Statement::map("partyId", Producer::field(ContextField::PartyId)),
        Statement::map("sessionId", Producer::field(ContextField::SessionId)),
        Statement::map("pageViewId", Producer::field(ContextField::PageViewId)),
        Statement::map("eventType", Producer::field(ContextField::EventType))
            .or_default("pageView"),
        Statement::map("userAgentFamily", Producer::field(ContextField::UserAgentFamily)),
        Statement::map("uriHost", location().uri(UriComponent::Host)),
        Statement::map("uriPath", path()),
        Statement::map(
            "campaign",
            location()
                .query_value("utm_campaign")
                .or(location().raw_uri(UriComponent::Fragment).query_value("utm_campaign")),
        )
        .or_default("not set"),
        Statement::map("queryParams", location().uri(UriComponent::Query)),
        Statement::map("languages", Producer::header_list("Accept-Language")),
        Statement::when(
            path().matches(page.clone()),
            true,
            vec![
                Statement::map("pageId", path().regex_group(page.clone(), Group::Index(1))),
                Statement::map("pageName", path().regex_group(page, Group::Index(2))),
            ],
        ),
    ];

    Ok(MappingScript::new(statements).with_description("Example mapping for the clickstream schema"))
}
