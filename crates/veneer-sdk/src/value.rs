//! Dynamically typed argument and return values
//!
//! Every argument passed to an intercepted method and every result it returns
//! is a `Value`. Heap payloads (strings, lists) are reference-counted so values
//! are cheap to clone into invocation records.

use std::fmt;
use std::sync::Arc;

/// Category of a value as seen by method signatures.
///
/// Parameter types and return types of a [`MethodDescriptor`](crate::MethodDescriptor)
/// are expressed as categories; return-category filters match on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueCategory {
    /// No value (method returns nothing)
    Void,
    /// Boolean
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// String
    Str,
    /// List of values
    List,
    /// Any other reference type
    Object,
}

impl ValueCategory {
    /// Name used in signatures and diagnostics
    pub fn name(self) -> &'static str {
        match self {
            ValueCategory::Void => "void",
            ValueCategory::Bool => "bool",
            ValueCategory::Int => "int",
            ValueCategory::Float => "float",
            ValueCategory::Str => "str",
            ValueCategory::List => "list",
            ValueCategory::Object => "object",
        }
    }
}

impl fmt::Display for ValueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dynamically typed value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent value; also the zero value of void and reference categories
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// Immutable string
    Str(Arc<str>),
    /// Immutable list
    List(Arc<[Value]>),
}

impl Value {
    /// Zero value for a category.
    ///
    /// This is what a delegating proxy returns for an unbound method when it
    /// is configured to answer with defaults, and what raw construction puts
    /// in every field slot.
    pub fn zero(category: ValueCategory) -> Self {
        match category {
            ValueCategory::Bool => Value::Bool(false),
            ValueCategory::Int => Value::Int(0),
            ValueCategory::Float => Value::Float(0.0),
            ValueCategory::Void
            | ValueCategory::Str
            | ValueCategory::List
            | ValueCategory::Object => Value::Null,
        }
    }

    /// Create a string value
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    /// Create a list value
    pub fn list(items: impl Into<Vec<Value>>) -> Self {
        Value::List(Arc::from(items.into()))
    }

    /// Check for null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 (integers are widened)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as list slice
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Category of this value (null reports `Object`)
    pub fn category(&self) -> ValueCategory {
        match self {
            Value::Null => ValueCategory::Object,
            Value::Bool(_) => ValueCategory::Bool,
            Value::Int(_) => ValueCategory::Int,
            Value::Float(_) => ValueCategory::Float,
            Value::Str(_) => ValueCategory::Str,
            Value::List(_) => ValueCategory::List,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
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

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}
