//! The [`Value`] type.
use bytes::Bytes;
use std::{borrow::Cow, fmt};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::ext::FmtExt;

/// A value representable by the protocol.
///
/// The set of variants is closed, [`encode`][Value::encode] and
/// [`decode`][crate::decode::decode] must both handle every variant.
#[derive(Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bytes(Bytes),
    /// `YYYY-MM-DD`
    Date(Date),
    /// `hh:mm:ss`
    Time(Time),
    /// Date and time, UTC when the server omits the offset.
    Timestamp(OffsetDateTime),
}

impl Value {
    /// Returns `true` if value is `NULL`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the value kind name.
    pub const fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
        }
    }

    /// Returns the text content.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the raw bytes of a text or bytes value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Text(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the value as `i64` if it is any integer kind.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int8(v) => Some(v.into()),
            Value::Int16(v) => Some(v.into()),
            Value::Int32(v) => Some(v.into()),
            Value::Int64(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => v.fmt(f),
            Value::Int8(v) => v.fmt(f),
            Value::Int16(v) => v.fmt(f),
            Value::Int32(v) => v.fmt(f),
            Value::Int64(v) => v.fmt(f),
            Value::Float32(v) => v.fmt(f),
            Value::Float64(v) => v.fmt(f),
            Value::Text(v) => v.fmt(f),
            Value::Bytes(v) => v.lossy().fmt(f),
            Value::Date(v) => write!(f, "{v}"),
            Value::Time(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Value {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

from!(<bool>v => Value::Bool(v));
from!(<i8>v => Value::Int8(v));
from!(<i16>v => Value::Int16(v));
from!(<i32>v => Value::Int32(v));
from!(<i64>v => Value::Int64(v));
from!(<u8>v => Value::Int16(v.into()));
from!(<u16>v => Value::Int32(v.into()));
from!(<u32>v => Value::Int64(v.into()));
from!(<f32>v => Value::Float32(v));
from!(<f64>v => Value::Float64(v));
from!(<String>v => Value::Text(v));
from!(<&str>v => Value::Text(v.to_owned()));
from!(<Cow<'_, str>>v => Value::Text(v.into_owned()));
from!(<Bytes>v => Value::Bytes(v));
from!(<Vec<u8>>v => Value::Bytes(v.into()));
from!(<&[u8]>v => Value::Bytes(Bytes::copy_from_slice(v)));
from!(<Date>v => Value::Date(v));
from!(<Time>v => Value::Time(v));
from!(<OffsetDateTime>v => Value::Timestamp(v));
from!(<PrimitiveDateTime>v => Value::Timestamp(v.assume_utc()));
from!(<()>_ => Value::Null);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl TryFrom<u64> for Value {
    type Error = ConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Value::Int64)
            .map_err(|_| ConversionError::OutOfRange { kind: "u64" })
    }
}

impl TryFrom<usize> for Value {
    type Error = ConversionError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Value::Int64)
            .map_err(|_| ConversionError::OutOfRange { kind: "usize" })
    }
}

/// An argument of a statement execution.
///
/// Named arguments substitute `:name` placeholders of a non prepared
/// statement. Prepared statements bind arguments by position.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: Option<Cow<'static, str>>,
    value: Value,
}

impl Param {
    /// Positional argument.
    pub fn new(value: impl Into<Value>) -> Param {
        Param { name: None, value: value.into() }
    }

    /// Named argument.
    pub fn named(name: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Param {
        Param { name: Some(name.into()), value: value.into() }
    }

    /// Returns the argument name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the argument value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// An error when converting value between host and wire representation.
#[derive(Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// Column type name has no decoder.
    UnsupportedType(String),
    /// Wire text does not parse as the declared type.
    InvalidText { type_name: &'static str, text: String },
    /// Host value has no wire representation.
    UnsupportedValue { kind: &'static str, reason: &'static str },
    /// Host integer does not fit any protocol integer.
    OutOfRange { kind: &'static str },
    /// Positional argument given to a statement that binds by name.
    Unbound { ordinal: usize },
    /// Error attributed to a column of a tuple.
    Column { index: usize, type_name: String, source: Box<ConversionError> },
}

impl ConversionError {
    pub(crate) fn at_column(self, index: usize, type_name: &str) -> Self {
        Self::Column { index, type_name: type_name.to_owned(), source: Box::new(self) }
    }
}

impl std::error::Error for ConversionError { }

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedType(name) => write!(f, "type not supported: {name}"),
            Self::InvalidText { type_name, text } => {
                write!(f, "invalid {type_name} value: {text:?}")
            },
            Self::UnsupportedValue { kind, reason } => {
                write!(f, "unsupported {kind} value: {reason}")
            },
            Self::OutOfRange { kind } => write!(f, "{kind} value out of range"),
            Self::Unbound { ordinal } => write!(
                f,
                "positional argument {ordinal} requires a prepared statement, use a named argument"
            ),
            Self::Column { index, type_name, source } => {
                write!(f, "column {index} ({type_name}): {source}")
            },
        }
    }
}

impl fmt::Debug for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
