//! Bound parameter values and the rules for comparing them with expected arguments.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone};

/// A value bound to a query or statement parameter, or stored in a row.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Bytes(v) => write!(f, "bytes({})", v.len()),
            Value::Timestamp(v) => write!(f, "timestamp({v})"),
        }
    }
}

macro_rules! impl_from_value {
    ($variant:ident: $($t:ty => $conv:expr),* $(,)?) => {
        $(
            impl From<$t> for Value {
                #[allow(clippy::redundant_closure_call)]
                fn from(v: $t) -> Self {
                    Value::$variant(($conv)(v))
                }
            }
        )*
    };
}

impl_from_value!(Int:
    i8 => i64::from,
    i16 => i64::from,
    i32 => i64::from,
    i64 => |v| v,
    u8 => i64::from,
    u16 => i64::from,
    u32 => i64::from,
);
impl_from_value!(Float: f32 => f64::from, f64 => |v| v);
impl_from_value!(Bool: bool => |v| v);
impl_from_value!(Text: &str => str::to_string, String => |v| v);
impl_from_value!(Bytes: Vec<u8> => |v| v, &[u8] => <[u8]>::to_vec);
impl_from_value!(Timestamp: NaiveDateTime => |v| v);

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(v: DateTime<Tz>) -> Self {
        Value::Timestamp(v.naive_utc())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One slot of an expected argument list.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// The slot is not checked.
    Any,
    /// The actual value must match this one, see [`Arg::matches`].
    Eq(Value),
}

impl Arg {
    /// Returns whether `actual` satisfies this slot.
    ///
    /// Text, integer and bool compare by value. Floats compare bit for bit, so `NaN`
    /// matches `NaN` and `0.0` does not match `-0.0`. Any two timestamps match
    /// regardless of their point in time. Every other pairing, including `NULL` and
    /// bytes, is a non-match.
    pub fn matches(&self, actual: &Value) -> bool {
        let expected = match self {
            Arg::Any => return true,
            Arg::Eq(expected) => expected,
        };
        match (expected, actual) {
            (Value::Text(e), Value::Text(a)) => e == a,
            (Value::Int(e), Value::Int(a)) => e == a,
            (Value::Float(e), Value::Float(a)) => e.to_bits() == a.to_bits(),
            (Value::Bool(e), Value::Bool(a)) => e == a,
            (Value::Timestamp(_), Value::Timestamp(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Any => write!(f, "<any>"),
            Arg::Eq(v) => write!(f, "{v}"),
        }
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Eq(v)
    }
}

macro_rules! impl_from_arg {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Arg {
                fn from(v: $t) -> Self {
                    Arg::Eq(v.into())
                }
            }
        )*
    };
}

impl_from_arg!(
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    bool,
    &str,
    String,
    Vec<u8>,
    &[u8],
    NaiveDateTime,
);

impl<Tz: TimeZone> From<DateTime<Tz>> for Arg {
    fn from(v: DateTime<Tz>) -> Self {
        Arg::Eq(v.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Arg {
    fn from(v: Option<T>) -> Self {
        Arg::Eq(v.into())
    }
}

/// An argument slot that accepts any value.
pub fn any() -> Arg {
    Arg::Any
}

/// Returns the position of the first argument that does not satisfy its slot, or the
/// length of the shorter list when the counts differ. `None` means all arguments match.
pub(crate) fn first_mismatch(expected: &[Arg], actual: &[Value]) -> Option<usize> {
    if let Some(idx) = expected
        .iter()
        .zip(actual)
        .position(|(e, a)| !e.matches(a))
    {
        return Some(idx);
    }
    (expected.len() != actual.len()).then(|| expected.len().min(actual.len()))
}

/// Builds a `Vec<Value>` of bound parameters.
///
/// ```
/// let args = sqlmock::params![1, "pending", 2.5];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    () => { ::std::vec::Vec::<$crate::Value>::new() };
    ($($v:expr),+ $(,)?) => { vec![$($crate::Value::from($v)),+] };
}
