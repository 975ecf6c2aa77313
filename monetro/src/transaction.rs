//! The [`Transaction`] type.
use crate::{
    Error, ErrorKind, Result,
    common::verbose,
    connection::Connection,
    row::RowResult,
    rows::Rows,
    statement::Statement,
    transport::Transport,
    value::Param,
};

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    /// Server default.
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    /// Not supported by MonetDB.
    Snapshot,
    /// Not supported by MonetDB.
    Linearizable,
}

/// The statement starting a transaction.
///
/// ```
/// use monetro::{IsolationLevel, transaction::begin_command};
///
/// assert_eq!(begin_command(false, IsolationLevel::Default).unwrap(), "START TRANSACTION");
/// assert_eq!(begin_command(true, IsolationLevel::Default).unwrap(), "START TRANSACTION READ ONLY");
/// assert!(begin_command(false, IsolationLevel::Snapshot).is_err());
/// ```
pub fn begin_command(read_only: bool, isolation: IsolationLevel) -> Result<&'static str> {
    if read_only {
        return Ok("START TRANSACTION READ ONLY");
    }
    Ok(match isolation {
        IsolationLevel::Default => "START TRANSACTION",
        IsolationLevel::ReadUncommitted => "START TRANSACTION ISOLATION LEVEL READ UNCOMMITTED",
        IsolationLevel::ReadCommitted => "START TRANSACTION ISOLATION LEVEL READ COMMITTED",
        IsolationLevel::RepeatableRead => "START TRANSACTION ISOLATION LEVEL REPEATABLE READ",
        IsolationLevel::Serializable => "START TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        level @ (IsolationLevel::Snapshot | IsolationLevel::Linearizable) => {
            return Err(Error::from(ErrorKind::UnsupportedIsolation(level)))
        },
    })
}

/// An RAII implementation of transaction scope.
///
/// To begin a transaction, use [`Connection::begin`] or
/// [`Connection::begin_with`].
///
/// If neither [`commit`][Transaction::commit] nor
/// [`rollback`][Transaction::rollback] succeeded, dropping the transaction
/// sends `ROLLBACK` from a background task.
///
/// # Example
///
/// ```no_run
/// # async fn test<T: monetro::Transport>(conn: monetro::Connection<T>) -> monetro::Result<()> {
/// let mut tx = conn.begin().await?;
///
/// tx.execute("INSERT INTO post(name) VALUES ('foo')", &[]).await?;
///
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```
pub struct Transaction<T: Transport> {
    conn: Connection<T>,
    finished: bool,
}

impl<T: Transport> Transaction<T> {
    pub(crate) async fn begin(conn: Connection<T>, read_only: bool, isolation: IsolationLevel) -> Result<Self> {
        let command = begin_command(read_only, isolation)?;
        verbose!(command, "begin");
        conn.run(command.into(), conn.default_cancel()).await?;
        Ok(Self { conn, finished: false })
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &Connection<T> {
        &self.conn
    }

    /// Returns `true` until commit or rollback succeeded.
    pub fn is_active(&self) -> bool {
        !self.finished
    }

    /// Commit transaction.
    ///
    /// On failure the transaction stays active and is rolled back on drop.
    pub async fn commit(&mut self) -> Result<()> {
        self.finish("COMMIT").await
    }

    /// Rollback transaction.
    pub async fn rollback(&mut self) -> Result<()> {
        self.finish("ROLLBACK").await
    }

    async fn finish(&mut self, command: &'static str) -> Result<()> {
        verbose!(command, "finish");
        self.conn.run(command.into(), self.conn.default_cancel()).await?;
        self.finished = true;
        Ok(())
    }

    /// See [`Connection::prepare`].
    pub async fn prepare(&self, sql: impl Into<String>) -> Result<Statement<T>> {
        self.conn.prepare(sql).await
    }

    /// See [`Connection::statement`].
    pub fn statement(&self, sql: impl Into<String>) -> Statement<T> {
        self.conn.statement(sql)
    }

    /// See [`Connection::execute`].
    pub async fn execute(&self, sql: &str, params: &[Param]) -> Result<RowResult> {
        self.conn.execute(sql, params).await
    }

    /// See [`Connection::query`].
    pub async fn query(&self, sql: &str, params: &[Param]) -> Result<Rows<T>> {
        self.conn.query(sql, params).await
    }
}

impl<T: Transport> Drop for Transaction<T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            #[cfg(feature = "log")]
            log::error!("transaction dropped outside runtime, rollback skipped");
            return;
        };

        verbose!("rollback on drop");
        let conn = self.conn.clone();
        handle.spawn(async move {
            if let Err(_err) = conn.run("ROLLBACK".into(), conn.default_cancel()).await {
                #[cfg(feature = "log")]
                log::error!("rollback error: {_err}");
            }
        });
    }
}

impl<T: Transport> std::fmt::Debug for Transaction<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("conn", &self.conn)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{connection::Config, transport::Scripted};

    fn connection(io: Scripted) -> Connection<Scripted> {
        Connection::from_transport(io, Config::default())
    }

    #[test]
    fn isolation_text() {
        let levels = [
            (IsolationLevel::ReadUncommitted, "START TRANSACTION ISOLATION LEVEL READ UNCOMMITTED"),
            (IsolationLevel::ReadCommitted, "START TRANSACTION ISOLATION LEVEL READ COMMITTED"),
            (IsolationLevel::RepeatableRead, "START TRANSACTION ISOLATION LEVEL REPEATABLE READ"),
            (IsolationLevel::Serializable, "START TRANSACTION ISOLATION LEVEL SERIALIZABLE"),
        ];
        for (level, text) in levels {
            assert_eq!(begin_command(false, level).unwrap(), text);
        }
        assert_eq!(
            begin_command(true, IsolationLevel::Serializable).unwrap(),
            "START TRANSACTION READ ONLY"
        );
    }

    #[tokio::test]
    async fn unsupported_level_sends_nothing() {
        let io = Scripted::new();
        let commands = io.commands();
        let conn = connection(io);

        for level in [IsolationLevel::Snapshot, IsolationLevel::Linearizable] {
            let err = conn.begin_with(false, level).await.unwrap_err();
            assert!(matches!(err.kind(), ErrorKind::UnsupportedIsolation(l) if *l == level));
        }
        assert!(commands.is_empty());
    }

    #[tokio::test]
    async fn commit() {
        let mut io = Scripted::new();
        io.reply("&4 t\n").reply("&2 1 -1\n").reply("&4 f\n");
        let commands = io.commands();
        let conn = connection(io);

        let mut tx = conn.begin().await.unwrap();
        assert!(tx.is_active());
        tx.execute("INSERT INTO t VALUES (1)", &[]).await.unwrap();
        tx.commit().await.unwrap();
        assert!(!tx.is_active());
        drop(tx);

        assert_eq!(
            commands.take(),
            ["START TRANSACTION", "INSERT INTO t VALUES (1)", "COMMIT"]
        );
    }

    #[tokio::test]
    async fn failed_commit_stays_active() {
        let mut io = Scripted::new();
        io.reply("&4 t\n").reply("!40000!COMMIT: transaction is aborted\n");
        let conn = connection(io);

        let mut tx = conn.begin().await.unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Database(_)));
        assert!(tx.is_active());
        drop(tx);
    }

    #[tokio::test]
    async fn drop_rolls_back() {
        let mut io = Scripted::new();
        io.reply("&4 t\n").reply("&4 f\n").reply("&3 0 0\n");
        let commands = io.commands();
        let conn = connection(io);

        let tx = conn.begin_with(true, IsolationLevel::Default).await.unwrap();
        drop(tx);

        while commands.len() < 2 {
            tokio::task::yield_now().await;
        }
        conn.execute("SELECT 1", &[]).await.unwrap();
        assert_eq!(
            commands.take(),
            ["START TRANSACTION READ ONLY", "ROLLBACK", "SELECT 1"]
        );
    }
}
