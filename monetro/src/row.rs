//! Typed row access.
//!
//! - [`Row`]
//! - [`Column`]
//! - [`FromRow`]
//! - [`Decode`]
//!
//! - [`Index`]
//! - [`DecodeError`]
use bytes::Bytes;
use std::{borrow::Cow, fmt, sync::Arc};
use time::{Date, OffsetDateTime, Time};

use crate::{common::unit_error, result::ColumnDescriptor, value::Value};

/// One decoded tuple with its schema.
#[derive(Clone)]
pub struct Row {
    columns: Arc<[ColumnDescriptor]>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Arc<[ColumnDescriptor]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Returns `true` if row contains no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Returns the raw value at `idx`.
    pub fn get<I: Index>(&self, idx: I) -> Option<&Value> {
        let nth = idx.position(&self.columns).ok()?;
        self.values.get(nth)
    }

    /// Try get and decode column.
    pub fn try_get<I: Index, R: Decode>(&self, idx: I) -> Result<R, DecodeError> {
        let nth = idx.position(&self.columns)?;
        let value = self.values.get(nth).cloned().ok_or(DecodeError::IndexOutOfBounds(nth))?;
        R::decode(Column { columns: self.columns.clone(), index: nth, value })
    }

    /// Try decode type using [`FromRow`] implementation.
    pub fn decode<D: FromRow>(self) -> Result<D, DecodeError> {
        D::from_row(self)
    }
}

impl IntoIterator for Row {
    type Item = Column;

    type IntoIter = IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { columns: self.columns, values: self.values.into_iter().enumerate() }
    }
}

/// [`IntoIterator`] implementation from [`Row`].
pub struct IntoIter {
    columns: Arc<[ColumnDescriptor]>,
    values: std::iter::Enumerate<std::vec::IntoIter<Value>>,
}

impl IntoIter {
    /// Same as [`Iterator::next`] but returns [`Result`] instead.
    pub fn try_next(&mut self) -> Result<Column, DecodeError> {
        let index = self.columns.len() - self.values.len();
        self.next().ok_or(DecodeError::IndexOutOfBounds(index))
    }
}

impl Iterator for IntoIter {
    type Item = Column;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, value) = self.values.next()?;
        Some(Column { columns: self.columns.clone(), index, value })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_map();
        for (col, value) in self.columns.iter().zip(&self.values) {
            dbg.entry(&col.name(), value);
        }
        dbg.finish()
    }
}

/// One value of a [`Row`] with its column.
#[derive(Clone)]
pub struct Column {
    columns: Arc<[ColumnDescriptor]>,
    index: usize,
    value: Value,
}

impl Column {
    /// Returns column position.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Returns column name.
    pub fn name(&self) -> &str {
        self.columns[self.index].name()
    }

    /// Returns column type name.
    pub fn type_name(&self) -> &str {
        self.columns[self.index].type_name()
    }

    /// Return `true` if value is NULL.
    pub const fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// Try decode type using [`Decode`] implementation.
    pub fn decode<D: Decode>(self) -> Result<D, DecodeError> {
        D::decode(self)
    }

    fn mismatch<T>(&self, expected: &'static str) -> Result<T, DecodeError> {
        match self.value {
            Value::Null => Err(DecodeError::Null),
            _ => Err(DecodeError::TypeMismatch { expected, found: self.value.kind() }),
        }
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name())
            .field("type", &self.type_name())
            .field("value", &self.value)
            .finish()
    }
}

/// Result of a statement that returns no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowResult {
    pub rows_affected: u64,
    /// Generated key of the last inserted row, `-1` when the server has none.
    pub last_insert_id: i64,
}

// ===== Traits =====

/// Type that can be constructed from a row.
pub trait FromRow: Sized {
    /// Construct self from row.
    fn from_row(row: Row) -> Result<Self, DecodeError>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self, DecodeError> {
        Ok(row)
    }
}

impl FromRow for () {
    fn from_row(_: Row) -> Result<Self, DecodeError> {
        Ok(())
    }
}

impl FromRow for Vec<Value> {
    fn from_row(row: Row) -> Result<Self, DecodeError> {
        Ok(row.values)
    }
}

macro_rules! from_row_tuple {
    ($($t:ident $i:literal),*) => {
        impl<$($t),*> FromRow for ($($t),*,)
        where
            $($t: Decode),*
        {
            fn from_row(row: Row) -> Result<Self, DecodeError> {
                Ok((
                    $(row.try_get::<usize, $t>($i)?),*,
                ))
            }
        }
    };
}

from_row_tuple!(T0 0);
from_row_tuple!(T0 0, T1 1);
from_row_tuple!(T0 0, T1 1, T2 2);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4, T5 5);

/// A type that can be constructed from [`Column`].
pub trait Decode: Sized {
    /// Try decode self from column.
    fn decode(column: Column) -> Result<Self, DecodeError>;
}

impl Decode for Column {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        Ok(column)
    }
}

impl Decode for Value {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        Ok(column.value)
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(column: Column) -> Result<Self, DecodeError> {
        match column.is_null() {
            true => Ok(None),
            false => column.decode().map(Some),
        }
    }
}

impl Decode for () {
    fn decode(_: Column) -> Result<Self, DecodeError> {
        Ok(())
    }
}

/// Decode by matching value variants, integers accept narrower kinds.
macro_rules! decode {
    ($ty:ty, $expected:literal, $($variant:ident($v:ident) => $body:expr),*) => {
        impl Decode for $ty {
            fn decode(col: Column) -> Result<Self, DecodeError> {
                match col.value {
                    $(Value::$variant($v) => Ok($body),)*
                    _ => col.mismatch($expected),
                }
            }
        }
    };
}

decode!(bool, "bool", Bool(v) => v);
decode!(i8, "int8", Int8(v) => v);
decode!(i16, "int16", Int8(v) => v.into(), Int16(v) => v);
decode!(i32, "int32", Int8(v) => v.into(), Int16(v) => v.into(), Int32(v) => v);
decode!(
    i64, "int64",
    Int8(v) => v.into(), Int16(v) => v.into(), Int32(v) => v.into(), Int64(v) => v
);
decode!(f32, "float32", Float32(v) => v);
decode!(f64, "float64", Float32(v) => v.into(), Float64(v) => v);
decode!(String, "text", Text(v) => v);
decode!(Bytes, "bytes", Text(v) => Bytes::from(v), Bytes(v) => v);
decode!(Vec<u8>, "bytes", Text(v) => v.into_bytes(), Bytes(v) => v.to_vec());
decode!(Date, "date", Date(v) => v, Timestamp(v) => v.date());
decode!(Time, "time", Time(v) => v, Timestamp(v) => v.time());
decode!(OffsetDateTime, "timestamp", Timestamp(v) => v);

/// Type that can be used for indexing column.
pub trait Index: Sized + sealed::Sealed {
    /// Returns the position of the column.
    fn position(self, columns: &[ColumnDescriptor]) -> Result<usize, DecodeError>;
}

impl Index for usize {
    fn position(self, columns: &[ColumnDescriptor]) -> Result<usize, DecodeError> {
        match self < columns.len() {
            true => Ok(self),
            false => Err(DecodeError::IndexOutOfBounds(self)),
        }
    }
}

impl Index for &str {
    fn position(self, columns: &[ColumnDescriptor]) -> Result<usize, DecodeError> {
        columns
            .iter()
            .position(|col| col.name() == self)
            .ok_or_else(|| DecodeError::ColumnNotFound(String::from(self).into()))
    }
}

mod sealed {
    pub trait Sealed { }
    impl Sealed for usize { }
    impl Sealed for &str { }
}

unit_error! {
    /// An error when try to [`fetch_one`][crate::query::Query::fetch_one] and not returns any row.
    pub struct RowNotFound("row not found");
}

/// An error when decoding row value.
pub enum DecodeError {
    /// Column requested not found.
    ColumnNotFound(Cow<'static, str>),
    /// Index requested is out of bounds.
    IndexOutOfBounds(usize),
    /// Value kind cannot be decoded into the requested type.
    TypeMismatch { expected: &'static str, found: &'static str },
    /// Value is null.
    Null,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode value, ")?;
        match self {
            Self::ColumnNotFound(name) => write!(f, "column not found: {name:?}"),
            Self::IndexOutOfBounds(u) => write!(f, "index out of bounds: {u:?}"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            },
            Self::Null => write!(f, "unexpected NULL value"),
        }
    }
}

impl std::error::Error for DecodeError { }

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
