//! `monetro` error types.
use std::{backtrace::Backtrace, borrow::Cow, fmt, io, time::Duration};

use crate::{
    connection::ParseError,
    mapi::{ProtocolError, ServerError},
    row::{DecodeError, RowNotFound},
    transaction::IsolationLevel,
    value::ConversionError,
};

/// A specialized [`Result`] type for `monetro` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `monetro` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Prefix the error message with `context`.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Returns `true` if the request was abandoned by a token or a deadline.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled(_))
    }
}

/// All possible error kind from `monetro` library.
pub enum ErrorKind {
    Config(ParseError),
    Connection(ConnectionError),
    Io(io::Error),
    Protocol(ProtocolError),
    Database(ServerError),
    Conversion(ConversionError),
    Decode(DecodeError),
    Cancelled(Cancelled),
    UnsupportedIsolation(IsolationLevel),
    RowNotFound(RowNotFound),
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ParseError>e => ErrorKind::Config(e));
from!(<ConnectionError>e => ErrorKind::Connection(e));
from!(<io::Error>e => ErrorKind::Io(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<ServerError>e => ErrorKind::Database(e));
from!(<ConversionError>e => ErrorKind::Conversion(e));
from!(<DecodeError>e => ErrorKind::Decode(e));
from!(<Cancelled>e => ErrorKind::Cancelled(e));
from!(<RowNotFound>e => ErrorKind::RowNotFound(e));

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => e.fmt(f),
            Self::Connection(e) => e.fmt(f),
            Self::Io(e) => e.fmt(f),
            Self::Protocol(e) => e.fmt(f),
            Self::Database(e) => e.fmt(f),
            Self::Conversion(e) => e.fmt(f),
            Self::Decode(e) => e.fmt(f),
            Self::Cancelled(e) => e.fmt(f),
            Self::UnsupportedIsolation(level) => {
                write!(f, "isolation level {level:?} is not supported")
            },
            Self::RowNotFound(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Transport is not available.
pub enum ConnectionError {
    /// Connection was closed by [`Connection::close`][crate::Connection::close].
    Closed,
    /// Transport reported that the server cannot be reached.
    Unavailable(Cow<'static, str>),
    /// Request task ended without a reply.
    TaskAborted,
}

impl std::error::Error for ConnectionError { }

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("connection closed"),
            Self::Unavailable(reason) => write!(f, "connection unavailable: {reason}"),
            Self::TaskAborted => f.write_str("request task aborted before replying"),
        }
    }
}

impl fmt::Debug for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Request abandoned before the reply arrived.
///
/// The server may still complete the request.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Cancelled {
    /// Cancellation token fired.
    Token,
    /// Deadline elapsed.
    Deadline(Duration),
}

impl std::error::Error for Cancelled { }

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token => f.write_str("request cancelled"),
            Self::Deadline(d) => write!(f, "request timed out after {d:?}"),
        }
    }
}

impl fmt::Debug for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
