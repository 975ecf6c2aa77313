//! MAPI reply vocabulary.
//!
//! A reply is a sequence of newline terminated lines, each line is classified
//! by its leading marker into a [`Line`].
//!
//! <https://www.monetdb.org/documentation/dev-guide/client-server-protocol/>
use std::{borrow::Cow, fmt, str::FromStr};

mod types;

pub use types::{MonetType, ScanType};

pub(crate) const MSG_INFO: u8 = b'#';
pub(crate) const MSG_ERROR: u8 = b'!';
pub(crate) const MSG_QUERY: u8 = b'&';
pub(crate) const MSG_HEADER: u8 = b'%';
pub(crate) const MSG_TUPLE: u8 = b'[';
pub(crate) const MSG_PROMPT: u8 = b'\x01';

pub(crate) const Q_TABLE: u8 = b'1';
pub(crate) const Q_UPDATE: u8 = b'2';
pub(crate) const Q_SCHEMA: u8 = b'3';
pub(crate) const Q_TRANS: u8 = b'4';
pub(crate) const Q_PREPARE: u8 = b'5';
pub(crate) const Q_BLOCK: u8 = b'6';

/// Separator between fields of a tuple line.
pub(crate) const TUPLE_SEPARATOR: &str = ",\t";

/// One classified line of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// `# text`
    Info(&'a str),
    /// `&5 exec_id ...`
    PrepareAck { exec_id: i64 },
    /// `&1 query_id row_count column_count ...`
    TableHeader { query_id: i64, row_count: i64, column_count: usize },
    /// `[ value,\tvalue\t]`, holds the text between the brackets.
    Tuple(&'a str),
    /// `&6 ...`
    Block,
    /// `&3 ...`
    SchemaAck,
    /// `&2 row_count last_row_id ...`
    UpdateAck { row_count: i64, last_row_id: i64 },
    /// `&4 ...`
    TransactionAck,
    /// `% value, value # tag`
    ColumnHeader { values: &'a str, tag: &'a str },
    /// blank line or the block prompt
    Prompt,
    /// `!text`
    Error(&'a str),
}

impl<'a> Line<'a> {
    /// Classify one line of a reply.
    pub fn classify(line: &'a str) -> Result<Line<'a>, ProtocolError> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.trim().is_empty() {
            return Ok(Line::Prompt);
        }

        let bytes = line.as_bytes();

        match bytes[0] {
            MSG_PROMPT => Ok(Line::Prompt),
            MSG_INFO => Ok(Line::Info(line[1..].trim())),
            MSG_ERROR => Ok(Line::Error(&line[1..])),
            MSG_TUPLE => {
                let Some(inner) = line.trim_end().strip_suffix(']') else {
                    return Err(ProtocolError::malformed(line, "tuple is not closed"));
                };
                Ok(Line::Tuple(&inner[1..]))
            },
            MSG_HEADER => {
                let Some((values, tag)) = line[1..].rsplit_once('#') else {
                    return Err(ProtocolError::malformed(line, "column header without tag"));
                };
                Ok(Line::ColumnHeader { values: values.trim(), tag: tag.trim() })
            },
            MSG_QUERY => Self::classify_query(line),
            _ => Err(ProtocolError::UnexpectedLine(line.to_owned())),
        }
    }

    fn classify_query(line: &'a str) -> Result<Line<'a>, ProtocolError> {
        let Some(&kind) = line.as_bytes().get(1) else {
            return Err(ProtocolError::malformed(line, "missing response kind"));
        };
        let rest = line.get(2..).unwrap_or_default();
        let mut fields = Fields { line, iter: rest.split_whitespace() };

        match kind {
            Q_TABLE => Ok(Line::TableHeader {
                query_id: fields.next("query id")?,
                row_count: fields.next("row count")?,
                column_count: fields.next("column count")?,
            }),
            Q_UPDATE => Ok(Line::UpdateAck {
                row_count: fields.next("row count")?,
                last_row_id: fields.next("last row id")?,
            }),
            Q_SCHEMA => Ok(Line::SchemaAck),
            Q_TRANS => Ok(Line::TransactionAck),
            Q_PREPARE => Ok(Line::PrepareAck { exec_id: fields.next("exec id")? }),
            Q_BLOCK => Ok(Line::Block),
            _ => Err(ProtocolError::UnexpectedLine(line.to_owned())),
        }
    }
}

struct Fields<'a, I> {
    line: &'a str,
    iter: I,
}

impl<'a, I: Iterator<Item = &'a str>> Fields<'a, I> {
    fn next<T: FromStr>(&mut self, what: &'static str) -> Result<T, ProtocolError> {
        self.iter
            .next()
            .and_then(|e| e.parse().ok())
            .ok_or_else(|| ProtocolError::malformed(self.line, what))
    }
}

/// Server replied with something this client cannot follow.
pub enum ProtocolError {
    /// Line with an unknown leading marker.
    UnexpectedLine(String),
    /// Line with a known marker but invalid content.
    Malformed { line: String, reason: Cow<'static, str> },
    /// Tuple field count does not match the column count.
    RowLength { expected: usize, found: usize },
    /// Column header value count does not match the column count.
    ColumnCount { tag: String, expected: usize, found: usize },
    /// Reply ended without prompt, error, or prepare acknowledgement.
    UnknownTerminalState,
}

impl ProtocolError {
    pub(crate) fn malformed(line: &str, reason: impl Into<Cow<'static, str>>) -> Self {
        Self::Malformed { line: line.to_owned(), reason: reason.into() }
    }
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("protocol error, ")?;
        match self {
            Self::UnexpectedLine(line) => write!(f, "unexpected line: {line:?}"),
            Self::Malformed { line, reason } => write!(f, "malformed line ({reason}): {line:?}"),
            Self::RowLength { expected, found } => {
                write!(f, "length of row ({found}) doesn't match header ({expected})")
            },
            Self::ColumnCount { tag, expected, found } => write!(
                f,
                "column header `{tag}` has {found} values, expected {expected}"
            ),
            Self::UnknownTerminalState => f.write_str("reply ended in an unknown state"),
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Error line returned by the server.
///
/// The text after the `!` marker is kept verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerError {
    message: String,
}

impl ServerError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    /// Returns the raw server text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the leading SQLSTATE, if the server sent one.
    ///
    /// e.g. `42000` for `42000!syntax error, unexpected IDENT`
    pub fn code(&self) -> Option<&str> {
        let (code, _) = self.message.split_once('!')?;
        match code.len() == 5 && code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            true => Some(code),
            false => None,
        }
    }
}

impl std::error::Error for ServerError { }

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "database error: {}", self.message)
    }
}

impl fmt::Debug for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classify_query_lines() {
        assert_eq!(
            Line::classify("&1 2 1 1 1 0 201 169 7").unwrap(),
            Line::TableHeader { query_id: 2, row_count: 1, column_count: 1 }
        );
        assert_eq!(
            Line::classify("&2 1 -1").unwrap(),
            Line::UpdateAck { row_count: 1, last_row_id: -1 }
        );
        assert_eq!(Line::classify("&5 7 1 6 1").unwrap(), Line::PrepareAck { exec_id: 7 });
        assert_eq!(Line::classify("&3 128 127").unwrap(), Line::SchemaAck);
        assert_eq!(Line::classify("&4 t").unwrap(), Line::TransactionAck);
        assert_eq!(Line::classify("&6 2 1 100 100").unwrap(), Line::Block);
    }

    #[test]
    fn classify_other_lines() {
        assert_eq!(Line::classify("").unwrap(), Line::Prompt);
        assert_eq!(Line::classify("\t\t").unwrap(), Line::Prompt);
        assert_eq!(Line::classify("\x01\x02").unwrap(), Line::Prompt);
        assert_eq!(Line::classify("# info").unwrap(), Line::Info("info"));
        assert_eq!(Line::classify("!42000!oops").unwrap(), Line::Error("42000!oops"));
        assert_eq!(
            Line::classify("[ \"name1\"\t]").unwrap(),
            Line::Tuple(" \"name1\"\t")
        );
        assert_eq!(
            Line::classify("% name,\tvalue # name").unwrap(),
            Line::ColumnHeader { values: "name,\tvalue", tag: "name" }
        );
    }

    #[test]
    fn classify_errors() {
        assert!(matches!(Line::classify("^redirect"), Err(ProtocolError::UnexpectedLine(_))));
        assert!(matches!(Line::classify("&9 1"), Err(ProtocolError::UnexpectedLine(_))));
        assert!(matches!(Line::classify("&1 x 1 1"), Err(ProtocolError::Malformed { .. })));
        assert!(matches!(Line::classify("&2 1"), Err(ProtocolError::Malformed { .. })));
        assert!(matches!(Line::classify("[ 1,\t2"), Err(ProtocolError::Malformed { .. })));
        assert!(matches!(Line::classify("% name"), Err(ProtocolError::Malformed { .. })));
    }

    #[test]
    fn server_error_code() {
        let err = ServerError::new("42000!syntax error");
        assert_eq!(err.code(), Some("42000"));
        assert_eq!(err.message(), "42000!syntax error");
        assert_eq!(ServerError::new("plain failure").code(), None);
    }
}
