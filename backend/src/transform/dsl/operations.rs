//! Operations applied by the `transform` producer.
//!
//! Each operation takes a present value and returns a value, or `None` when it
//! cannot apply (an unparseable number, `first` of an empty list). Absence
//! then flows on like any other absent producer result.

use serde::{Deserialize, Serialize};

use super::producers::Pattern;
use super::value::{Value, ValueKind};

/// All available value operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Remove leading and trailing whitespace
    Trim,

    /// Convert to uppercase
    Uppercase,

    /// Convert to lowercase
    Lowercase,

    /// Replace every match of a regex pattern
    Replace {
        pattern: Pattern,
        #[serde(default)]
        value: String,
    },

    /// Split a string into a list
    Split {
        #[serde(default = "default_separator")]
        separator: String,
    },

    /// Join a list into a string
    Join {
        #[serde(default = "default_separator")]
        separator: String,
    },

    /// First element of a list
    First,

    /// Convert to boolean
    ToBoolean {
        #[serde(default = "default_true_values")]
        true_values: Vec<String>,
    },

    /// Parse as integer
    ToInt,

    /// Parse as double
    ToDouble,

    /// Characters from `start`, optionally limited to `length`
    Substring {
        start: usize,
        #[serde(default)]
        length: Option<usize>,
    },
}

fn default_separator() -> String {
    ",".to_string()
}

fn default_true_values() -> Vec<String> {
    vec![
        "true".to_string(),
        "t".to_string(),
        "1".to_string(),
        "yes".to_string(),
    ]
}

impl Operation {
    /// Apply this operation to a value
    pub fn apply(&self, value: Value) -> Option<Value> {
        match self {
            Operation::Trim => Some(map_text(value, |s| s.trim().to_string())),
            Operation::Uppercase => Some(map_text(value, |s| s.to_uppercase())),
            Operation::Lowercase => Some(map_text(value, |s| s.to_lowercase())),
            Operation::Replace { pattern, value: replacement } => Some(map_text(value, |s| {
                pattern.regex().replace_all(s, replacement.as_str()).into_owned()
            })),
            Operation::Split { separator } => Some(match value {
                Value::String(s) => Value::List(
                    s.split(separator.as_str())
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect(),
                ),
                other => other,
            }),
            Operation::Join { separator } => Some(match value {
                Value::List(items) => Value::String(items.join(separator)),
                other => other,
            }),
            Operation::First => match value {
                Value::List(items) => items.into_iter().next().map(Value::String),
                other => Some(other),
            },
            Operation::ToBoolean { true_values } => match value {
                Value::Bool(b) => Some(Value::Bool(b)),
                other => other.to_text().map(|s| {
                    let s = s.trim().to_lowercase();
                    Value::Bool(true_values.iter().any(|tv| tv.to_lowercase() == s))
                }),
            },
            Operation::ToInt => value.to_integer().map(Value::Int),
            Operation::ToDouble => match value {
                Value::Double(d) => Some(Value::Double(d)),
                Value::Int(i) => Some(Value::Double(i as f64)),
                Value::String(s) => s.trim().parse().ok().map(Value::Double),
                _ => None,
            },
            Operation::Substring { start, length } => Some(map_text(value, |s| {
                let rest = s.chars().skip(*start);
                match length {
                    Some(n) => rest.take(*n).collect(),
                    None => rest.collect(),
                }
            })),
        }
    }

    /// Kind produced when applied to a value of kind `input`.
    pub fn output_kind(&self, input: ValueKind) -> ValueKind {
        match self {
            Operation::Split { .. } if input == ValueKind::String => ValueKind::List,
            Operation::Join { .. } | Operation::First if input == ValueKind::List => {
                ValueKind::String
            }
            Operation::ToBoolean { .. } => ValueKind::Bool,
            Operation::ToInt => ValueKind::Int,
            Operation::ToDouble => ValueKind::Double,
            _ => input,
        }
    }
}

/// Apply a text function to a string or to every element of a list.
fn map_text(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        Value::List(items) => Value::List(items.iter().map(|s| f(s)).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim() {
        let op = Operation::Trim;
        assert_eq!(op.apply(Value::from("  hello  ")), Some(Value::from("hello")));
    }

    #[test]
    fn test_join_header_values() {
        let op = Operation::Join { separator: ",".into() };
        let values = Value::List(vec!["first".into(), "second".into(), "last".into()]);
        assert_eq!(op.apply(values), Some(Value::from("first,second,last")));
    }

    #[test]
    fn test_split_then_first() {
        let split = Operation::Split { separator: ",".into() };
        let list = split.apply(Value::from("a, b,,c")).unwrap();
        assert_eq!(list, Value::List(vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(Operation::First.apply(list), Some(Value::from("a")));
        assert_eq!(Operation::First.apply(Value::List(Vec::new())), None);
    }

    #[test]
    fn test_to_int_failure_is_absence() {
        assert_eq!(Operation::ToInt.apply(Value::from("42")), Some(Value::Int(42)));
        assert_eq!(Operation::ToInt.apply(Value::from("about")), None);
        assert_eq!(Operation::ToInt.apply(Value::Double(1e300)), None);
        assert_eq!(Operation::ToInt.apply(Value::Double(-8.0)), Some(Value::Int(-8)));
        assert_eq!(Operation::ToDouble.apply(Value::from("1.25")), Some(Value::Double(1.25)));
    }

    #[test]
    fn test_replace() {
        let op = Operation::Replace {
            pattern: Pattern::new(r"\.html$").unwrap(),
            value: String::new(),
        };
        assert_eq!(op.apply(Value::from("about.html")), Some(Value::from("about")));
    }

    #[test]
    fn test_to_boolean() {
        let op = Operation::ToBoolean { true_values: default_true_values() };
        assert_eq!(op.apply(Value::from("t")), Some(Value::Bool(true)));
        assert_eq!(op.apply(Value::from("f")), Some(Value::Bool(false)));
        assert_eq!(op.apply(Value::Bool(true)), Some(Value::Bool(true)));
    }

    #[test]
    fn test_substring_counts_chars() {
        let op = Operation::Substring { start: 1, length: Some(3) };
        assert_eq!(op.apply(Value::from("héllo")), Some(Value::from("éll")));
    }

    #[test]
    fn test_deserialize_operations() {
        let ops: Vec<Operation> = serde_json::from_str(
            r#"[{"type":"trim"},{"type":"join"},{"type":"replace","pattern":"[-. ]"}]"#,
        )
        .unwrap();
        assert_eq!(ops[1], Operation::Join { separator: ",".into() });
        assert!(matches!(ops[2], Operation::Replace { ref value, .. } if value.is_empty()));
    }

    #[test]
    fn test_output_kind() {
        let split = Operation::Split { separator: ",".into() };
        assert_eq!(split.output_kind(ValueKind::String), ValueKind::List);
        assert_eq!(Operation::First.output_kind(ValueKind::List), ValueKind::String);
        assert_eq!(Operation::Trim.output_kind(ValueKind::List), ValueKind::List);
    }
}
