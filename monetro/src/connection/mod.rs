//! The [`Connection`] type.
use std::sync::Arc;
use time::UtcOffset;
use tokio::sync::Mutex;

use crate::{
    Result,
    cancel::{self, Cancel, Shared},
    common::verbose,
    result::ResultDescriptor,
    row::RowResult,
    rows::Rows,
    statement::Statement,
    transaction::{IsolationLevel, Transaction},
    transport::{Request, Transport},
    value::Param,
};

mod config;

pub use config::{Config, DEFAULT_REPLY_SIZE, ParseError};

/// A single MonetDB session.
///
/// Cloning is cheap, clones share the same transport and requests are
/// served one at a time.
pub struct Connection<T: Transport> {
    io: Shared<T>,
    config: Arc<Config>,
}

impl<T: Transport> Clone for Connection<T> {
    fn clone(&self) -> Self {
        Self { io: self.io.clone(), config: self.config.clone() }
    }
}

impl<T: Transport> Connection<T> {
    /// Connect using the given [`Config`].
    pub async fn connect(config: Config) -> Result<Self> {
        verbose!(host = %config.host, port = config.port, "connect");
        let io = T::connect(&config).await?;
        Self::connect_with(io, config).await
    }

    /// Connect using configuration from [`Config::from_env`].
    pub async fn connect_env() -> Result<Self> {
        Self::connect(Config::from_env()).await
    }

    /// Setup a session over an already authenticated transport.
    ///
    /// Enables the column size header and applies the configured time zone.
    pub async fn connect_with(mut io: T, config: Config) -> Result<Self> {
        io.set_size_header(true).await?;
        let conn = Self::from_transport(io, config);
        if let Some(offset) = conn.config.time_zone {
            conn.set_time_zone(offset).await?;
        }
        Ok(conn)
    }

    /// Wrap a transport without any session setup.
    pub fn from_transport(io: T, config: Config) -> Self {
        Self { io: Arc::new(Mutex::new(Some(io))), config: Arc::new(config) }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancellation applied when the caller gives none.
    pub(crate) fn default_cancel(&self) -> Cancel {
        Cancel::new(self.config.statement_timeout)
    }

    pub(crate) async fn request(&self, request: Request, cancel: Cancel) -> Result<String> {
        cancel::request(self.io.clone(), request, cancel).await
    }

    /// Execute command text and parse the reply.
    pub(crate) async fn run(&self, command: String, cancel: Cancel) -> Result<ResultDescriptor> {
        let reply = self.request(Request::Execute(command), cancel).await?;
        let mut result = ResultDescriptor::new();
        result.store(&reply)?;
        Ok(result)
    }

    /// Create a prepared statement, sending `PREPARE` immediately.
    pub async fn prepare(&self, sql: impl Into<String>) -> Result<Statement<T>> {
        let mut stmt = Statement::new(self.clone(), sql.into(), true);
        stmt.prepare().await?;
        Ok(stmt)
    }

    /// Create a statement executed as literal text.
    pub fn statement(&self, sql: impl Into<String>) -> Statement<T> {
        Statement::new(self.clone(), sql.into(), false)
    }

    /// Execute a statement that returns no rows.
    pub async fn execute(&self, sql: &str, params: &[Param]) -> Result<RowResult> {
        self.statement(sql).execute(params).await
    }

    /// Execute a statement and return a cursor over its rows.
    pub async fn query(&self, sql: &str, params: &[Param]) -> Result<Rows<T>> {
        self.statement(sql).query(params).await
    }

    /// Start a transaction with default isolation.
    pub async fn begin(&self) -> Result<Transaction<T>> {
        self.begin_with(false, IsolationLevel::Default).await
    }

    /// Start a transaction.
    pub async fn begin_with(&self, read_only: bool, isolation: IsolationLevel) -> Result<Transaction<T>> {
        Transaction::begin(self.clone(), read_only, isolation).await
    }

    /// Set the session time zone.
    pub async fn set_time_zone(&self, offset: UtcOffset) -> Result<()> {
        self.run(time_zone_command(offset), self.default_cancel()).await?;
        Ok(())
    }

    /// Disconnect the transport.
    ///
    /// Waits for the request in flight, later requests fail with
    /// [`ConnectionError::Closed`][crate::error::ConnectionError::Closed].
    pub async fn close(&self) -> Result<()> {
        let io = self.io.lock().await.take();
        match io {
            Some(mut io) => {
                verbose!("disconnect");
                io.disconnect().await
            },
            None => Ok(()),
        }
    }

    /// Returns `true` after [`close`][Connection::close].
    pub async fn is_closed(&self) -> bool {
        self.io.lock().await.is_none()
    }
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.dbname)
            .finish_non_exhaustive()
    }
}

fn time_zone_command(offset: UtcOffset) -> String {
    let seconds = offset.whole_seconds();
    let sign = if seconds < 0 { '-' } else { '+' };
    let seconds = seconds.unsigned_abs();
    format!(
        "SET TIME ZONE INTERVAL '{sign}{:02}:{:02}' HOUR TO MINUTE",
        seconds / 3600,
        seconds % 3600 / 60,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ErrorKind, error::ConnectionError, transport::Scripted};

    #[test]
    fn time_zone_text() {
        let offset = |h, m| UtcOffset::from_hms(h, m, 0).unwrap();
        assert_eq!(time_zone_command(offset(2, 0)), "SET TIME ZONE INTERVAL '+02:00' HOUR TO MINUTE");
        assert_eq!(time_zone_command(offset(-3, -30)), "SET TIME ZONE INTERVAL '-03:30' HOUR TO MINUTE");
        assert_eq!(time_zone_command(offset(0, -30)), "SET TIME ZONE INTERVAL '-00:30' HOUR TO MINUTE");
        assert_eq!(time_zone_command(UtcOffset::UTC), "SET TIME ZONE INTERVAL '+00:00' HOUR TO MINUTE");
    }

    #[tokio::test]
    async fn connect_with_setup() {
        let mut io = Scripted::new();
        io.reply("&3 0 0\n");
        let commands = io.commands();

        let config = Config::default().with_time_zone(UtcOffset::from_hms(5, 30, 0).unwrap());
        Connection::connect_with(io, config).await.unwrap();

        assert_eq!(
            commands.take(),
            ["Xsizeheader 1", "SET TIME ZONE INTERVAL '+05:30' HOUR TO MINUTE"]
        );
    }

    #[tokio::test]
    async fn close_then_request() {
        let conn = Connection::from_transport(Scripted::new(), Config::default());
        conn.close().await.unwrap();
        assert!(conn.is_closed().await);
        conn.close().await.unwrap();

        let err = conn.execute("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Connection(ConnectionError::Closed)));
    }

    #[tokio::test]
    async fn statement_timeout_applies() {
        let mut io = Scripted::new();
        let _hold = io.reply_held("&2 1 -1\n");
        let config = Config::default().with_statement_timeout(std::time::Duration::from_millis(20));
        let conn = Connection::from_transport(io, config);

        let err = conn.execute("DELETE FROM t", &[]).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
