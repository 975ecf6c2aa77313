//! Query API types.
use std::{borrow::Cow, marker::PhantomData, pin::Pin, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{
    Result,
    executor::Executor,
    row::{FromRow, Row, RowNotFound, RowResult},
    rows::Rows,
    statement::Statement,
    value::{Param, Value},
};

/// Entrypoint of the query API.
///
/// ```no_run
/// # async fn test<T: monetro::Transport>(conn: monetro::Connection<T>) -> monetro::Result<()> {
/// let names: Vec<(i32, String)> = monetro::query("SELECT id, name FROM post WHERE id > :id", &conn)
///     .bind_named("id", 4)
///     .fetch_all()
///     .await?;
///
/// monetro::query::<_, ()>("DELETE FROM post WHERE id = ?", &conn)
///     .prepared()
///     .bind(4)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub fn query<'q, E, R>(sql: &'q str, exe: E) -> Query<'q, E, R> {
    Query {
        sql,
        exe,
        params: Vec::new(),
        prepared: false,
        timeout: None,
        token: None,
        _p: PhantomData,
    }
}

/// Same as [`query`] with [`Row`] as the output.
pub fn query_row<'q, E>(sql: &'q str, exe: E) -> Query<'q, E, Row> {
    query(sql, exe)
}

/// The query API.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Query<'q, E, R> {
    sql: &'q str,
    exe: E,
    params: Vec<Param>,
    prepared: bool,
    timeout: Option<Duration>,
    token: Option<CancellationToken>,
    _p: PhantomData<fn() -> R>,
}

impl<'q, E, R> Query<'q, E, R> {
    /// Bind positional parameter.
    ///
    /// Positional parameters requires [`prepared`][Query::prepared].
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(Param::new(value));
        self
    }

    /// Bind parameter substituting `:name` placeholder.
    pub fn bind_named(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        self.params.push(Param::named(name, value));
        self
    }

    /// Execute through `PREPARE`, the handle is released afterwards.
    pub fn prepared(mut self) -> Self {
        self.prepared = true;
        self
    }

    /// Abandon each request after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abandon each request when `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }
}

impl<'q, E: Executor, R> Query<'q, E, R> {
    fn into_parts(self) -> (Statement<E::Transport>, Vec<Param>) {
        let conn = self.exe.connection();
        let mut stmt = match self.prepared {
            true => Statement::new(conn, self.sql.to_owned(), true),
            false => conn.statement(self.sql),
        };
        if let Some(timeout) = self.timeout {
            stmt.timeout(timeout);
        }
        if let Some(token) = self.token {
            stmt.cancel_on(token);
        }
        (stmt, self.params)
    }

    /// Execute statement and return number of rows affected.
    pub fn execute(self) -> impl Future<Output = Result<RowResult>> + Send {
        let (mut stmt, params) = self.into_parts();
        async move {
            let result = stmt.execute(&params).await;
            let closed = stmt.close().await;
            let result = result?;
            closed?;
            Ok(result)
        }
    }

    /// Returns a cursor over the result rows.
    ///
    /// Rows are fetched page by page as the cursor advances.
    pub fn fetch(self) -> impl Future<Output = Result<Rows<E::Transport>>> + Send {
        let (mut stmt, params) = self.into_parts();
        async move {
            let rows = stmt.query(&params).await;
            let closed = stmt.close().await;
            let rows = rows?;
            closed?;
            Ok(rows)
        }
    }
}

impl<'q, E, R> Query<'q, E, R>
where
    E: Executor,
    R: FromRow + Send,
{
    /// Fetch all rows into [`Vec`].
    pub fn fetch_all(self) -> impl Future<Output = Result<Vec<R>>> + Send {
        let rows = self.fetch();
        async move {
            let mut rows = rows.await?;
            let mut output = Vec::with_capacity(usize::try_from(rows.row_count()).unwrap_or_default());
            while let Some(row) = rows.next_as().await {
                output.push(row?);
            }
            Ok(output)
        }
    }

    /// Fetch one row.
    ///
    /// Returns [`RowNotFound`] error when the result is empty.
    pub fn fetch_one(self) -> impl Future<Output = Result<R>> + Send {
        let row = self.fetch_optional();
        async move {
            match row.await? {
                Some(row) => Ok(row),
                None => Err(RowNotFound.into()),
            }
        }
    }

    /// Optionally fetch one row.
    pub fn fetch_optional(self) -> impl Future<Output = Result<Option<R>>> + Send {
        let rows = self.fetch();
        async move { rows.await?.next_as().await.transpose() }
    }
}

impl<'q, E, R> IntoFuture for Query<'q, E, R>
where
    E: Executor + 'q,
    R: 'q,
{
    type Output = Result<RowResult>;

    type IntoFuture = Pin<Box<dyn Future<Output = Result<RowResult>> + Send + 'q>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

impl<E, R> std::fmt::Debug for Query<'_, E, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("sql", &self.sql)
            .field("params", &self.params)
            .field("prepared", &self.prepared)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ErrorKind, connection::{Config, Connection}, transport::Scripted};

    const TABLE: &str = "\
&1 0 2 2 2
% sys.t,\tsys.t # table_name
% id,\tname # name
% int,\tvarchar # type
% 1,\t4 # length
[ 1,\t\"deer\"\t]
[ 2,\tNULL\t]
";

    fn connection(io: Scripted) -> Connection<Scripted> {
        Connection::from_transport(io, Config::default())
    }

    #[tokio::test]
    async fn fetch_all_decodes() {
        let mut io = Scripted::new();
        io.reply(TABLE);
        let conn = connection(io);

        let rows: Vec<(i32, Option<String>)> = query("SELECT id, name FROM t", &conn)
            .fetch_all()
            .await
            .unwrap();
        assert_eq!(rows, [(1, Some("deer".to_owned())), (2, None)]);
    }

    #[tokio::test]
    async fn fetch_one_and_optional() {
        let mut io = Scripted::new();
        io.reply(TABLE).reply("&1 1 0 2 0\n% id,\tname # name\n% int,\tvarchar # type\n");
        let conn = connection(io);

        let (id, _): (i64, Option<String>) = query("SELECT id, name FROM t", &conn)
            .fetch_one()
            .await
            .unwrap();
        assert_eq!(id, 1);

        let err = query_row("SELECT id, name FROM t WHERE false", &conn)
            .fetch_one()
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RowNotFound(_)));
    }

    #[tokio::test]
    async fn prepared_releases_handle() {
        let mut io = Scripted::new();
        io.reply("&5 9 1 6 1\n").reply("&2 1 -1\n").reply("&3 0 0\n");
        let commands = io.commands();
        let conn = connection(io);

        let res = query::<_, ()>("DELETE FROM t WHERE id = ?", &conn)
            .prepared()
            .bind(5)
            .await
            .unwrap();
        assert_eq!(res.rows_affected, 1);
        assert_eq!(
            commands.take(),
            ["PREPARE DELETE FROM t WHERE id = ?", "EXEC 9 (5)", "DEALLOCATE 9"]
        );
    }

    #[tokio::test]
    async fn failed_exec_releases_handle() {
        let mut io = Scripted::new();
        io.reply("&5 9 1 6 1\n").reply("!22000!conversion failed\n").reply("&3 0 0\n");
        let commands = io.commands();
        let conn = connection(io);

        let err = query::<_, ()>("DELETE FROM t WHERE id = ?", &conn)
            .prepared()
            .bind("x")
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Database(_)));
        assert_eq!(
            commands.take(),
            ["PREPARE DELETE FROM t WHERE id = ?", "EXEC 9 ('x')", "DEALLOCATE 9"]
        );

        let mut io = Scripted::new();
        io.reply("&5 4 1 6 1\n").reply("!42000!no such table\n").reply("&3 0 0\n");
        let commands = io.commands();
        let conn = connection(io);

        let err = query_row("SELECT * FROM t WHERE id = ?", &conn)
            .prepared()
            .bind(1)
            .fetch_all()
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Database(_)));
        assert_eq!(
            commands.take(),
            ["PREPARE SELECT * FROM t WHERE id = ?", "EXEC 4 (1)", "DEALLOCATE 4"]
        );
    }

    #[tokio::test]
    async fn named_binding() {
        let mut io = Scripted::new();
        io.reply("&2 2 -1\n");
        let commands = io.commands();
        let conn = connection(io);

        query::<_, ()>("UPDATE t SET name = :name", &conn)
            .bind_named("name", "it's")
            .execute()
            .await
            .unwrap();
        assert_eq!(commands.take(), [r"UPDATE t SET name = 'it\'s'"]);
    }

    #[tokio::test]
    async fn cancelled_token() {
        let io = Scripted::new();
        let commands = io.commands();
        let conn = connection(io);

        let token = CancellationToken::new();
        token.cancel();
        let err = query::<_, ()>("SELECT 1", &conn).cancel_on(token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(commands.is_empty());
    }
}
