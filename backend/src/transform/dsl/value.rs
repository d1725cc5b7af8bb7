//! Values flowing through the mapping DSL.
//!
//! A producer yields `Option<Value>`; `None` is absence, never an error.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::FieldType;

/// Query parameters: name → all values, in order of first occurrence.
pub type QueryMap = IndexMap<String, Vec<String>>;

/// A present value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<String>),
    Map(QueryMap),
}

/// The statically known shape of what a producer yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Bool,
    Int,
    Double,
    List,
    Map,
    /// Depends on the data (constants of mixed chains, generic operations).
    Any,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Scalar rendered as text. Lists and maps have no text form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Double(d) => Some(d.to_string()),
            Value::List(_) | Value::Map(_) => None,
        }
    }

    /// Whole number held by an int, an integral double or a numeric string.
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Double(d) => integral(*d),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert to the representation of `target`.
    ///
    /// `None` means the value cannot populate the field; callers treat that
    /// exactly like an absent value.
    pub fn coerce(self, target: FieldType) -> Option<Value> {
        match (target, self) {
            (FieldType::String, Value::List(_) | Value::Map(_)) => None,
            (FieldType::String, v) => v.to_text().map(Value::String),

            (FieldType::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
            (FieldType::Boolean, Value::String(s)) => s.trim().parse().ok().map(Value::Bool),

            (FieldType::Int, v) => v
                .to_integer()
                .filter(|i| i32::try_from(*i).is_ok())
                .map(Value::Int),
            (FieldType::Long, v) => v.to_integer().map(Value::Int),

            (FieldType::Double, Value::Double(d)) => Some(Value::Double(d)),
            (FieldType::Double, Value::Int(i)) => Some(Value::Double(i as f64)),
            (FieldType::Double, Value::String(s)) => s.trim().parse().ok().map(Value::Double),

            (FieldType::StringList, Value::List(l)) => Some(Value::List(l)),
            (FieldType::StringList, Value::String(s)) => Some(Value::List(vec![s])),

            (FieldType::StringMultimap, Value::Map(m)) => Some(Value::Map(m)),

            _ => None,
        }
    }
}

/// `d` as an `i64` when it is a whole number inside the `i64` range.
fn integral(d: f64) -> Option<i64> {
    // 2^63, exactly representable
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (d.is_finite() && d.fract() == 0.0 && (-LIMIT..LIMIT).contains(&d)).then(|| d as i64)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => write!(f, "{}", text),
            None => write!(f, "{}", serde_json::to_string(self).unwrap_or_default()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<Vec<String>> for Value {
    fn from(l: Vec<String>) -> Self {
        Value::List(l)
    }
}

impl ValueKind {
    /// Whether a value of this kind can ever be coerced into `target`.
    pub fn fits(self, target: FieldType) -> bool {
        match self {
            ValueKind::Any => true,
            ValueKind::Map => target == FieldType::StringMultimap,
            ValueKind::List => target == FieldType::StringList,
            ValueKind::String => target != FieldType::StringMultimap,
            ValueKind::Bool => matches!(target, FieldType::Boolean | FieldType::String),
            ValueKind::Int | ValueKind::Double => matches!(
                target,
                FieldType::Int | FieldType::Long | FieldType::Double | FieldType::String
            ),
        }
    }

    /// Common kind of two alternatives.
    pub fn join(self, other: ValueKind) -> ValueKind {
        if self == other {
            self
        } else {
            ValueKind::Any
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Bool => "boolean",
            ValueKind::Int => "int",
            ValueKind::Double => "double",
            ValueKind::List => "list of strings",
            ValueKind::Map => "query map",
            ValueKind::Any => "any",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_strings_coerce() {
        assert_eq!(Value::from("42").coerce(FieldType::Int), Some(Value::Int(42)));
        assert_eq!(Value::from(" 1.5 ").coerce(FieldType::Double), Some(Value::Double(1.5)));
        assert_eq!(Value::Int(2).coerce(FieldType::Double), Some(Value::Double(2.0)));
        assert_eq!(Value::Double(2.0).coerce(FieldType::Int), Some(Value::Int(2)));
    }

    #[test]
    fn test_int_fields_keep_their_width() {
        assert_eq!(Value::from("3000000000").coerce(FieldType::Int), None);
        assert_eq!(Value::Int(i64::from(i32::MIN) - 1).coerce(FieldType::Int), None);
        assert_eq!(
            Value::Int(i64::from(i32::MAX)).coerce(FieldType::Int),
            Some(Value::Int(i64::from(i32::MAX)))
        );
        assert_eq!(
            Value::from("3000000000").coerce(FieldType::Long),
            Some(Value::Int(3_000_000_000))
        );
        assert_eq!(Value::Double(3e9).coerce(FieldType::Int), None);
        assert_eq!(Value::Double(3e9).coerce(FieldType::Long), Some(Value::Int(3_000_000_000)));
    }

    #[test]
    fn test_doubles_outside_long_range_are_absent() {
        assert_eq!(Value::Double(1e300).coerce(FieldType::Long), None);
        assert_eq!(Value::Double(-1e300).coerce(FieldType::Long), None);
        assert_eq!(Value::Double(9_223_372_036_854_775_808.0).coerce(FieldType::Long), None);
        assert_eq!(
            Value::Double(-9_223_372_036_854_775_808.0).coerce(FieldType::Long),
            Some(Value::Int(i64::MIN))
        );
    }

    #[test]
    fn test_failed_coercion_is_absence() {
        assert_eq!(Value::from("forty-two").coerce(FieldType::Int), None);
        assert_eq!(Value::Double(1.5).coerce(FieldType::Int), None);
        assert_eq!(Value::from("yes").coerce(FieldType::Boolean), None);
        assert_eq!(Value::List(vec!["a".into()]).coerce(FieldType::String), None);
        assert_eq!(Value::from("a").coerce(FieldType::StringMultimap), None);
    }

    #[test]
    fn test_string_passes_through() {
        assert_eq!(
            Value::from("multiple words $#%&").coerce(FieldType::String),
            Some(Value::from("multiple words $#%&"))
        );
        assert_eq!(Value::Bool(true).coerce(FieldType::String), Some(Value::from("true")));
        assert_eq!(
            Value::from("only").coerce(FieldType::StringList),
            Some(Value::List(vec!["only".into()]))
        );
    }

    #[test]
    fn test_untagged_constants() {
        let v: Value = serde_json::from_str("42").unwrap();
        assert_eq!(v, Value::Int(42));
        let v: Value = serde_json::from_str("2.5").unwrap();
        assert_eq!(v, Value::Double(2.5));
        let v: Value = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(v, Value::List(vec!["a".into(), "b".into()]));
        let v: Value = serde_json::from_str(r#"{"p":["10","20"]}"#).unwrap();
        assert_eq!(v.kind(), ValueKind::Map);
    }

    #[test]
    fn test_kind_fits() {
        assert!(ValueKind::Map.fits(FieldType::StringMultimap));
        assert!(!ValueKind::Map.fits(FieldType::String));
        assert!(!ValueKind::String.fits(FieldType::StringMultimap));
        assert!(ValueKind::List.fits(FieldType::StringList));
        assert!(!ValueKind::Bool.fits(FieldType::StringList));
        assert_eq!(ValueKind::String.join(ValueKind::Int), ValueKind::Any);
    }
}
