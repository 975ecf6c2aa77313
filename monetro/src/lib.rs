//! MonetDB Driver
//!
//! Client engine for the MAPI text protocol: reply parsing, value
//! conversion, statement execution and paginated row cursors, over any
//! [`Transport`].
//!
//! # Examples
//!
//! ```no_run
//! use monetro::{Connection, Transport};
//!
//! # async fn app<T: Transport>() -> monetro::Result<()> {
//! let conn = Connection::<T>::connect_env().await?;
//!
//! let res = monetro::query::<_, (i32, String)>("SELECT 420, :name", &conn)
//!     .bind_named("name", "Foo")
//!     .fetch_one()
//!     .await?;
//!
//! assert_eq!(res.0, 420);
//! assert_eq!(res.1.as_str(), "Foo");
//!
//! let mut rows = conn.query("SELECT * FROM sys.tables", &[]).await?;
//!
//! while let Some(row) = rows.next().await {
//!     println!("{:?}", row?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Prepared statement:
//!
//! ```no_run
//! use monetro::{Connection, Param, Transport};
//!
//! # async fn app<T: Transport>(conn: Connection<T>) -> monetro::Result<()> {
//! let mut stmt = conn.prepare("INSERT INTO foo(id) VALUES (?)").await?;
//!
//! for i in 0..14 {
//!     stmt.execute(&[Param::new(i)]).await?;
//! }
//!
//! stmt.close().await?;
//! # Ok(())
//! # }
//! ```

mod common;
mod ext;

// Protocol
pub mod mapi;
mod result;

// Encoding
mod value;
pub mod encode;
pub mod decode;

// Component
pub mod statement;
pub mod row;
pub mod rows;

// Operation
pub mod transport;
mod cancel;
pub mod executor;
pub mod query;
pub mod transaction;

// Connection
pub mod connection;

pub mod error;


pub use value::{Value, Param, ConversionError};
pub use result::{ColumnDescriptor, ResultDescriptor, ResultKind, ResultMetadata};
pub use row::{Row, FromRow, Decode, DecodeError, RowResult};
pub use rows::{Rows, ColumnType};
pub use statement::Statement;

pub use transport::Transport;
pub use executor::Executor;
pub use transaction::{Transaction, IsolationLevel};
pub use connection::{Connection, Config};
#[doc(inline)]
pub use query::{query, query_row};
pub use error::{Error, ErrorKind, Result};

#[cfg(feature = "macros")]
pub use monetro_macros::{FromRow, Decode};
