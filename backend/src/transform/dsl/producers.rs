//! Value producers: pure expressions over a [`RequestContext`].
//!
//! A producer yields `Some(value)` or `None` (absent). Combinators propagate
//! absence instead of failing, so a `chain` can always fall through to its
//! next link. Producers hold no mutable state; one compiled tree is shared by
//! every request.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::operations::Operation;
use super::value::{Value, ValueKind};
use crate::models::{ContextField, RequestContext};
use crate::transform::uri::{Uri, UriComponent};

/// A regular expression compiled when the script is loaded.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Pattern)
    }

    pub fn regex(&self) -> &Regex {
        &self.0
    }
}

impl TryFrom<String> for Pattern {
    type Error = regex::Error;

    fn try_from(pattern: String) -> Result<Self, Self::Error> {
        Pattern::new(&pattern)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.0.as_str().to_string()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.0.as_str())
    }
}

/// Capture group selector: position (0 is the whole match) or name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Group {
    Index(usize),
    Name(String),
}

impl Default for Group {
    fn default() -> Self {
        Group::Index(0)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Group::Index(i) => write!(f, "{}", i),
            Group::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// All available value producers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Producer {
    /// Always the given value
    Constant { value: Value },

    /// A request attribute
    Field { name: ContextField },

    /// Value of a cookie
    Cookie { name: String },

    /// First value of a header
    Header { name: String },

    /// All values of a repeated header
    HeaderList { name: String },

    /// One component of the URI produced by `source`
    Uri {
        source: Box<Producer>,
        component: UriComponent,
        /// Skip percent-decoding of path, query string and fragment
        #[serde(default)]
        raw: bool,
    },

    /// First value of a query parameter of the URI produced by `source`
    QueryValue { source: Box<Producer>, param: String },

    /// All values of a query parameter of the URI produced by `source`
    QueryValues { source: Box<Producer>, param: String },

    /// A capture group of `pattern` matched against `source`
    Regex {
        source: Box<Producer>,
        pattern: Pattern,
        #[serde(default)]
        group: Group,
    },

    /// Whether `pattern` matches `source`
    Matches { source: Box<Producer>, pattern: Pattern },

    /// Whether `source` yields a value
    Present { source: Box<Producer> },

    /// First present value among `producers`
    Chain { producers: Vec<Producer> },

    /// `source` with `operations` applied in order
    Transform {
        source: Box<Producer>,
        operations: Vec<Operation>,
    },
}

impl Producer {
    // -------------------------------------------------------------------------
    // Leaves
    // -------------------------------------------------------------------------

    pub fn constant(value: impl Into<Value>) -> Self {
        Producer::Constant { value: value.into() }
    }

    pub fn field(name: ContextField) -> Self {
        Producer::Field { name }
    }

    pub fn cookie(name: &str) -> Self {
        Producer::Cookie { name: name.to_string() }
    }

    pub fn header(name: &str) -> Self {
        Producer::Header { name: name.to_string() }
    }

    pub fn header_list(name: &str) -> Self {
        Producer::HeaderList { name: name.to_string() }
    }

    // -------------------------------------------------------------------------
    // Combinators
    // -------------------------------------------------------------------------

    pub fn uri(self, component: UriComponent) -> Self {
        Producer::Uri { source: Box::new(self), component, raw: false }
    }

    pub fn raw_uri(self, component: UriComponent) -> Self {
        Producer::Uri { source: Box::new(self), component, raw: true }
    }

    pub fn query_value(self, param: &str) -> Self {
        Producer::QueryValue { source: Box::new(self), param: param.to_string() }
    }

    pub fn query_values(self, param: &str) -> Self {
        Producer::QueryValues { source: Box::new(self), param: param.to_string() }
    }

    pub fn regex_group(self, pattern: Pattern, group: Group) -> Self {
        Producer::Regex { source: Box::new(self), pattern, group }
    }

    pub fn matches(self, pattern: Pattern) -> Self {
        Producer::Matches { source: Box::new(self), pattern }
    }

    pub fn present(self) -> Self {
        Producer::Present { source: Box::new(self) }
    }

    /// Fall back to `fallback` when `self` is absent.
    pub fn or(self, fallback: Producer) -> Self {
        match self {
            Producer::Chain { mut producers } => {
                producers.push(fallback);
                Producer::Chain { producers }
            }
            first => Producer::Chain { producers: vec![first, fallback] },
        }
    }

    pub fn then(self, op: Operation) -> Self {
        match self {
            Producer::Transform { source, mut operations } => {
                operations.push(op);
                Producer::Transform { source, operations }
            }
            source => Producer::Transform { source: Box::new(source), operations: vec![op] },
        }
    }

    // -------------------------------------------------------------------------
    // Evaluation
    // -------------------------------------------------------------------------

    /// Evaluate against one request.
    pub fn evaluate(&self, ctx: &RequestContext) -> Option<Value> {
        match self {
            Producer::Constant { value } => Some(value.clone()),
            Producer::Field { name } => ctx.field(*name),
            Producer::Cookie { name } => ctx.cookie(name).map(Value::from),
            Producer::Header { name } => ctx.first_header(name).map(Value::from),
            Producer::HeaderList { name } => {
                ctx.header_values(name).map(|values| Value::List(values.to_vec()))
            }
            Producer::Uri { source, component, raw } => {
                component.extract(&parse_uri(source, ctx)?, *raw)
            }
            Producer::QueryValue { source, param } => {
                parse_uri(source, ctx)?.query_value(param).map(Value::String)
            }
            Producer::QueryValues { source, param } => {
                parse_uri(source, ctx)?.query_values(param).map(Value::List)
            }
            Producer::Regex { source, pattern, group } => {
                let text = source.evaluate(ctx)?.to_text()?;
                let caps = pattern.regex().captures(&text)?;
                let found = match group {
                    Group::Index(i) => caps.get(*i),
                    Group::Name(name) => caps.name(name),
                };
                found.map(|m| Value::String(m.as_str().to_string()))
            }
            Producer::Matches { source, pattern } => {
                let text = source.evaluate(ctx)?.to_text()?;
                Some(Value::Bool(pattern.regex().is_match(&text)))
            }
            Producer::Present { source } => Some(Value::Bool(source.evaluate(ctx).is_some())),
            Producer::Chain { producers } => producers.iter().find_map(|p| p.evaluate(ctx)),
            Producer::Transform { source, operations } => operations
                .iter()
                .try_fold(source.evaluate(ctx)?, |value, op| op.apply(value)),
        }
    }

    /// Kind of value this producer yields when present.
    pub fn kind(&self) -> ValueKind {
        match self {
            Producer::Constant { value } => value.kind(),
            Producer::Field { name } => field_kind(*name),
            Producer::Cookie { .. } | Producer::Header { .. } => ValueKind::String,
            Producer::HeaderList { .. } | Producer::QueryValues { .. } => ValueKind::List,
            Producer::Uri { component, .. } => component.kind(),
            Producer::QueryValue { .. } | Producer::Regex { .. } => ValueKind::String,
            Producer::Matches { .. } | Producer::Present { .. } => ValueKind::Bool,
            Producer::Chain { producers } => producers
                .iter()
                .map(Producer::kind)
                .reduce(ValueKind::join)
                .unwrap_or(ValueKind::Any),
            Producer::Transform { source, operations } => operations
                .iter()
                .fold(source.kind(), |kind, op| op.output_kind(kind)),
        }
    }

    /// Capture-group references that their pattern does not define, at any depth.
    pub fn undefined_groups(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_undefined_groups(&mut out);
        out
    }

    fn collect_undefined_groups(&self, out: &mut Vec<String>) {
        match self {
            Producer::Regex { source, pattern, group } => {
                let regex = pattern.regex();
                let defined = match group {
                    Group::Index(i) => *i < regex.captures_len(),
                    Group::Name(name) => regex.capture_names().flatten().any(|n| n == name),
                };
                if !defined {
                    out.push(format!("pattern '{}' has no capture group {}", regex.as_str(), group));
                }
                source.collect_undefined_groups(out);
            }
            Producer::Uri { source, .. }
            | Producer::QueryValue { source, .. }
            | Producer::QueryValues { source, .. }
            | Producer::Matches { source, .. }
            | Producer::Present { source }
            | Producer::Transform { source, .. } => source.collect_undefined_groups(out),
            Producer::Chain { producers } => {
                for producer in producers {
                    producer.collect_undefined_groups(out);
                }
            }
            Producer::Constant { .. }
            | Producer::Field { .. }
            | Producer::Cookie { .. }
            | Producer::Header { .. }
            | Producer::HeaderList { .. } => {}
        }
    }
}

/// Parse the string yielded by `source` as a URI.
fn parse_uri(source: &Producer, ctx: &RequestContext) -> Option<Uri> {
    source.evaluate(ctx)?.as_str().and_then(Uri::parse)
}

fn field_kind(field: ContextField) -> ValueKind {
    match field {
        ContextField::FirstInSession | ContextField::Unreliable | ContextField::Duplicate => {
            ValueKind::Bool
        }
        ContextField::Timestamp
        | ContextField::ClientTimestamp
        | ContextField::ViewportWidth
        | ContextField::ViewportHeight
        | ContextField::ScreenWidth
        | ContextField::ScreenHeight => ValueKind::Int,
        ContextField::PixelRatio => ValueKind::Double,
        _ => ValueKind::String,
    }
}

/// Reference of the mapping DSL, printed by `clickmap producers`
pub fn producers_description() -> String {
    let fields: Vec<&str> = ContextField::ALL.iter().map(ContextField::as_str).collect();
    format!(
        r#"Statements:

| Statement | Description | Parameters |
|-----------|-------------|------------|
| map | Assign a value to a record field | onto: field, value: producer, default: value when absent |
| when | Run statements if a producer equals a value | condition: producer, equals: value, apply: statements |

Producers:

| Producer | Yields | Parameters |
|----------|--------|------------|
| constant | the value | value |
| field | a request attribute | name |
| cookie | cookie value | name |
| header | first header value | name |
| header_list | all header values | name |
| uri | a URI component | source, component, raw |
| query_value | first value of a query parameter | source, param |
| query_values | all values of a query parameter | source, param |
| regex | a capture group | source, pattern, group (index or name, default 0) |
| matches | whether a pattern matches | source, pattern |
| present | whether a producer yields a value | source |
| chain | first present value | producers |
| transform | value after operations | source, operations |

URI components: scheme, host, port, path, query_string, fragment, query

Operations: trim, uppercase, lowercase, replace (pattern, value), split (separator),
join (separator), first, to_boolean (true_values), to_int, to_double,
substring (start, length)

Fields: {}

Example:
{{"type": "map", "onto": "uriPath",
  "value": {{"type": "uri", "component": "path",
            "source": {{"type": "field", "name": "location"}}}}}}"#,
        fields.join(", ")
    )
}
