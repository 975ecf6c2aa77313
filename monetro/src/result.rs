//! Reply parsing.
//!
//! A [`ResultDescriptor`] accumulates one reply: metadata, the column schema
//! and the buffered page of decoded tuples.
use std::sync::Arc;

use crate::{
    Result,
    common::{span, verbose},
    decode::decode,
    mapi::{Line, MonetType, ProtocolError, ServerError, TUPLE_SEPARATOR},
    value::{ConversionError, Value},
};

/// Counters of the last reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultMetadata {
    /// Prepared statement handle, `-1` until a prepare acknowledgement.
    pub exec_id: i64,
    /// Server side result handle, `-1` until a table header.
    pub query_id: i64,
    pub last_row_id: i64,
    /// Total rows of a table result, or affected rows of an update.
    pub row_count: i64,
    pub offset: i64,
    pub column_count: usize,
}

impl Default for ResultMetadata {
    fn default() -> Self {
        Self { exec_id: -1, query_id: -1, last_row_id: 0, row_count: 0, offset: 0, column_count: 0 }
    }
}

/// Schema of one result column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDescriptor {
    name: String,
    type_name: String,
    display_size: i64,
    internal_size: i64,
    precision: i64,
    scale: i64,
    nullable_known: bool,
}

impl ColumnDescriptor {
    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Protocol type name, lower case.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Resolved type, [`None`] for a type without decoder.
    pub fn monet_type(&self) -> Option<MonetType> {
        MonetType::from_name(&self.type_name)
    }

    pub fn display_size(&self) -> i64 {
        self.display_size
    }

    pub fn internal_size(&self) -> i64 {
        self.internal_size
    }

    /// Decimal precision, zero for other types.
    pub fn precision(&self) -> i64 {
        self.precision
    }

    /// Decimal scale, zero for other types.
    pub fn scale(&self) -> i64 {
        self.scale
    }

    /// The server never reports nullability.
    pub fn nullable_known(&self) -> bool {
        self.nullable_known
    }
}

/// Kind of the last parsed reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Nothing but a prompt.
    Empty,
    Table,
    Update,
    Prepare,
    Schema,
    Transaction,
}

/// Column arrays filled by column headers.
#[derive(Debug, Clone, Default)]
struct Staging {
    names: Vec<String>,
    types: Vec<String>,
    display_sizes: Vec<i64>,
    internal_sizes: Vec<i64>,
    precisions: Vec<i64>,
    scales: Vec<i64>,
}

impl Staging {
    fn allocate(len: usize) -> Staging {
        Staging {
            names: vec![String::new(); len],
            types: vec![String::new(); len],
            display_sizes: vec![0; len],
            internal_sizes: vec![0; len],
            precisions: vec![0; len],
            scales: vec![0; len],
        }
    }

    fn build(&self) -> Arc<[ColumnDescriptor]> {
        (0..self.names.len())
            .map(|i| ColumnDescriptor {
                name: self.names[i].clone(),
                type_name: self.types[i].clone(),
                display_size: self.display_sizes[i],
                internal_size: self.internal_sizes[i],
                precision: self.precisions[i],
                scale: self.scales[i],
                nullable_known: false,
            })
            .collect()
    }
}

/// One parsed reply.
#[derive(Debug, Clone)]
pub struct ResultDescriptor {
    metadata: ResultMetadata,
    columns: Arc<[ColumnDescriptor]>,
    types: Vec<Option<MonetType>>,
    rows: Vec<Vec<Value>>,
    kind: ResultKind,
    staging: Staging,
}

impl Default for ResultDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultDescriptor {
    pub fn new() -> ResultDescriptor {
        Self {
            metadata: ResultMetadata::default(),
            columns: Arc::new([]),
            types: Vec::new(),
            rows: Vec::new(),
            kind: ResultKind::Empty,
            staging: Staging::default(),
        }
    }

    pub fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    pub fn columns(&self) -> &Arc<[ColumnDescriptor]> {
        &self.columns
    }

    /// Buffered rows of the current page.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn take_rows(&mut self) -> Vec<Vec<Value>> {
        std::mem::take(&mut self.rows)
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    pub(crate) fn set_exec_id(&mut self, exec_id: i64) {
        self.metadata.exec_id = exec_id;
    }

    /// Return to the empty state, keeping the prepared statement handle.
    pub fn reset(&mut self) {
        let exec_id = self.metadata.exec_id;
        *self = Self::new();
        self.metadata.exec_id = exec_id;
    }

    /// Parse a complete reply.
    ///
    /// Parsing stops at the first prompt, error or prepare acknowledgement,
    /// a server error line is returned as [`ServerError`].
    pub fn store(&mut self, reply: &str) -> Result<()> {
        span!("store");

        for line in reply.split('\n') {
            match Line::classify(line)? {
                Line::Info(info) => {
                    verbose!(info, "server info");
                },
                Line::PrepareAck { exec_id } => {
                    self.metadata.exec_id = exec_id;
                    self.kind = ResultKind::Prepare;
                    return Ok(());
                },
                Line::TableHeader { query_id, row_count, column_count } => {
                    self.metadata.query_id = query_id;
                    self.metadata.row_count = row_count;
                    self.metadata.column_count = column_count;
                    self.metadata.offset = 0;
                    self.rows.clear();
                    self.staging = Staging::allocate(column_count);
                    self.rebuild();
                    self.kind = ResultKind::Table;
                },
                Line::Tuple(inner) => self.push_tuple(inner)?,
                Line::Block => self.rows.clear(),
                Line::SchemaAck => {
                    self.reset_schema();
                    self.kind = ResultKind::Schema;
                },
                Line::TransactionAck => {
                    self.reset_schema();
                    self.kind = ResultKind::Transaction;
                },
                Line::UpdateAck { row_count, last_row_id } => {
                    self.metadata.row_count = row_count;
                    self.metadata.last_row_id = last_row_id;
                    self.kind = ResultKind::Update;
                },
                Line::ColumnHeader { values, tag } => {
                    self.merge_header(line, values, tag)?;
                },
                Line::Prompt => return Ok(()),
                Line::Error(text) => return Err(ServerError::new(text).into()),
            }
        }

        Err(ProtocolError::UnknownTerminalState.into())
    }

    /// Parse a reply of a page request, the schema is kept.
    pub fn store_page(&mut self, reply: &str) -> Result<()> {
        span!("store_page");

        for line in reply.split('\n') {
            match Line::classify(line)? {
                Line::Info(info) => {
                    verbose!(info, "server info");
                },
                Line::Block | Line::TableHeader { .. } => self.rows.clear(),
                Line::Tuple(inner) => self.push_tuple(inner)?,
                Line::Prompt => return Ok(()),
                Line::Error(text) => return Err(ServerError::new(text).into()),
                _ => return Err(ProtocolError::UnexpectedLine(line.to_owned()).into()),
            }
        }

        Err(ProtocolError::UnknownTerminalState.into())
    }

    fn reset_schema(&mut self) {
        self.metadata.offset = 0;
        self.metadata.last_row_id = 0;
        self.metadata.row_count = 0;
        self.rows.clear();
        self.columns = Arc::new([]);
        self.types.clear();
    }

    fn rebuild(&mut self) {
        self.columns = self.staging.build();
        self.types = self.staging.types.iter().map(|t| MonetType::from_name(t)).collect();
    }

    fn merge_header(&mut self, line: &str, values: &str, tag: &str) -> Result<()> {
        let values: Vec<&str> = values.split(',').map(str::trim).collect();
        let expected = self.metadata.column_count;

        if values.len() != expected {
            return Err(ProtocolError::ColumnCount {
                tag: tag.to_owned(),
                expected,
                found: values.len(),
            }.into());
        }

        let staging = &mut self.staging;

        match tag {
            "name" => staging.names = values.iter().map(|&v| v.to_owned()).collect(),
            "type" => staging.types = values.iter().map(|&v| v.to_owned()).collect(),
            "length" => {
                for (i, value) in values.iter().enumerate() {
                    staging.display_sizes[i] = sizes(line, value)?.0;
                }
            },
            "typesizes" => {
                for (i, value) in values.iter().enumerate() {
                    let (size, scale) = sizes(line, value)?;
                    staging.internal_sizes[i] = size;
                    if staging.types[i] == "decimal" {
                        staging.precisions[i] = size;
                        staging.scales[i] = scale;
                    }
                }
            },
            _ => {
                verbose!(tag, "column header ignored");
                return Ok(());
            },
        }

        self.rebuild();
        self.metadata.offset = 0;
        self.metadata.last_row_id = 0;
        Ok(())
    }

    fn push_tuple(&mut self, inner: &str) -> Result<()> {
        let fields: Vec<&str> = inner.split(TUPLE_SEPARATOR).collect();

        if fields.len() != self.columns.len() {
            return Err(ProtocolError::RowLength {
                expected: self.columns.len(),
                found: fields.len(),
            }.into());
        }

        let mut row = Vec::with_capacity(fields.len());
        for (i, field) in fields.into_iter().enumerate() {
            let type_name = self.columns[i].type_name();
            let value = match self.types[i] {
                Some(ty) => decode(field, ty),
                None => Err(ConversionError::UnsupportedType(type_name.to_owned())),
            };
            row.push(value.map_err(|e| e.at_column(i, type_name))?);
        }

        self.rows.push(row);
        Ok(())
    }
}

/// Parse `"16 0"` into size and scale, missing scale is zero.
fn sizes(line: &str, value: &str) -> Result<(i64, i64), ProtocolError> {
    let mut parts = value.split_whitespace().map(str::parse::<i64>);
    match (parts.next(), parts.next()) {
        (Some(Ok(size)), None) => Ok((size, 0)),
        (Some(Ok(size)), Some(Ok(scale))) => Ok((size, scale)),
        _ => Err(ProtocolError::malformed(line, "invalid column size")),
    }
}
