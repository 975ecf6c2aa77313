//! The [`Statement`] type.
//!
//! A prepared statement sends `PREPARE` once and caches the returned handle,
//! later executions send `EXEC <id> (<args>)`. A plain statement sends its
//! text, with `:name` placeholders substituted by named arguments.
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{
    Result,
    cancel::Cancel,
    common::verbose,
    connection::Connection,
    mapi::ProtocolError,
    result::{ResultDescriptor, ResultKind},
    row::RowResult,
    rows::Rows,
    transport::{Request, Transport},
    value::{ConversionError, Param},
};

/// A statement bound to a [`Connection`].
pub struct Statement<T: Transport> {
    conn: Connection<T>,
    sql: String,
    prepared: bool,
    result: ResultDescriptor,
    cancel: Cancel,
}

impl<T: Transport> Statement<T> {
    pub(crate) fn new(conn: Connection<T>, sql: String, prepared: bool) -> Self {
        let cancel = conn.default_cancel();
        Self { conn, sql, prepared, result: ResultDescriptor::new(), cancel }
    }

    /// Returns the statement text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns `true` if statement executes through `PREPARE`.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Returns the server handle, if prepared.
    pub fn exec_id(&self) -> Option<i64> {
        match self.result.metadata().exec_id {
            -1 => None,
            id => Some(id),
        }
    }

    /// Abandon each request after `timeout`.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.cancel.timeout = Some(timeout);
        self
    }

    /// Abandon each request when `token` is cancelled.
    pub fn cancel_on(&mut self, token: CancellationToken) -> &mut Self {
        self.cancel.token = Some(token);
        self
    }

    pub(crate) fn set_cancel(&mut self, cancel: Cancel) {
        self.cancel = cancel;
    }

    /// Send `PREPARE` if no handle is cached yet.
    ///
    /// On failure the statement stays unprepared and can be retried.
    pub async fn prepare(&mut self) -> Result<()> {
        self.prepared = true;

        if self.exec_id().is_some() {
            return Ok(());
        }

        verbose!(sql = %self.sql, "prepare");
        let command = prepare_command(&self.sql);
        let reply = self.conn.request(Request::Execute(command), self.cancel.clone()).await?;

        let mut result = ResultDescriptor::new();
        result.store(&reply)?;

        if result.kind() != ResultKind::Prepare {
            return Err(ProtocolError::malformed(
                reply.lines().next().unwrap_or_default(),
                "missing prepare acknowledgement",
            ).into());
        }

        verbose!(exec_id = result.metadata().exec_id, "prepared");
        self.result.set_exec_id(result.metadata().exec_id);
        Ok(())
    }

    async fn run(&mut self, params: &[Param]) -> Result<()> {
        let command = match self.prepared {
            true => {
                self.prepare().await?;
                exec_command(self.result.metadata().exec_id, params)?
            },
            false => named_command(&self.sql, params)?,
        };

        let reply = self.conn.request(Request::Execute(command), self.cancel.clone()).await?;
        self.result.reset();
        self.result.store(&reply)
    }

    /// Execute statement and return number of rows affected.
    pub async fn execute(&mut self, params: &[Param]) -> Result<RowResult> {
        verbose!(sql = %self.sql, "execute");
        self.run(params).await?;

        let metadata = self.result.metadata();
        let rows_affected = u64::try_from(metadata.row_count).unwrap_or_default();

        Ok(match self.result.kind() {
            ResultKind::Update => RowResult { rows_affected, last_insert_id: metadata.last_row_id },
            ResultKind::Table => RowResult { rows_affected, last_insert_id: -1 },
            _ => RowResult { rows_affected: 0, last_insert_id: -1 },
        })
    }

    /// Execute statement and return a cursor over its rows.
    ///
    /// A statement that produces no table returns an empty cursor.
    pub async fn query(&mut self, params: &[Param]) -> Result<Rows<T>> {
        verbose!(sql = %self.sql, "query");
        self.run(params).await?;
        Ok(Rows::new(self.conn.clone(), self.cancel.clone(), &mut self.result))
    }

    /// Release the server side handle with `DEALLOCATE`.
    ///
    /// Statement without handle closes without any request.
    pub async fn close(self) -> Result<()> {
        let Some(exec_id) = self.exec_id() else {
            return Ok(());
        };
        let command = format!("DEALLOCATE {}", itoa::Buffer::new().format(exec_id));
        self.conn.run(command, self.cancel).await?;
        Ok(())
    }
}

impl<T: Transport> std::fmt::Debug for Statement<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("prepared", &self.prepared)
            .field("exec_id", &self.exec_id())
            .finish()
    }
}

/// `PREPARE <sql>`
pub fn prepare_command(sql: &str) -> String {
    format!("PREPARE {sql}")
}

/// `EXEC <exec_id> (<arg>, <arg>)`
///
/// ```
/// use monetro::{Param, statement::exec_command};
///
/// assert_eq!(exec_command(1, &[]).unwrap(), "EXEC 1 ()");
/// assert_eq!(
///     exec_command(3, &[Param::new(7), Param::new("x")]).unwrap(),
///     "EXEC 3 (7, 'x')"
/// );
/// ```
pub fn exec_command(exec_id: i64, params: &[Param]) -> Result<String, ConversionError> {
    let mut command = String::from("EXEC ");
    command.push_str(itoa::Buffer::new().format(exec_id));
    command.push_str(" (");
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            command.push_str(", ");
        }
        param.value().encode_into(&mut command)?;
    }
    command.push(')');
    Ok(command)
}

/// Substitute `:name` placeholders with named arguments.
///
/// Quoted literals, quoted identifiers and `::` casts are copied unchanged,
/// a placeholder without argument is left for the server to report.
///
/// ```
/// use monetro::{Param, statement::named_command};
///
/// let sql = named_command(
///     "SELECT ':id', id::int FROM t WHERE id = :id",
///     &[Param::named("id", 4)],
/// ).unwrap();
/// assert_eq!(sql, "SELECT ':id', id::int FROM t WHERE id = 4");
/// ```
pub fn named_command(sql: &str, params: &[Param]) -> Result<String, ConversionError> {
    if let Some(ordinal) = params.iter().position(|p| p.name().is_none()) {
        return Err(ConversionError::Unbound { ordinal: ordinal + 1 });
    }

    if params.is_empty() {
        return Ok(sql.to_owned());
    }

    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        match ch {
            '\'' | '"' => {
                out.push(ch);
                while let Some((_, c)) = chars.next() {
                    out.push(c);
                    if c == '\\' {
                        if let Some((_, escaped)) = chars.next() {
                            out.push(escaped);
                        }
                    } else if c == ch {
                        break;
                    }
                }
            },
            ':' => match chars.peek() {
                Some(&(_, ':')) => {
                    out.push_str("::");
                    chars.next();
                },
                Some(&(_, c)) if c.is_ascii_alphabetic() || c == '_' => {
                    let start = i + 1;
                    let mut end = start;
                    while let Some(&(j, c)) = chars.peek() {
                        if !(c.is_ascii_alphanumeric() || c == '_') {
                            break;
                        }
                        end = j + c.len_utf8();
                        chars.next();
                    }
                    let name = &sql[start..end];
                    match params.iter().find(|p| p.name() == Some(name)) {
                        Some(param) => param.value().encode_into(&mut out)?,
                        None => {
                            out.push(':');
                            out.push_str(name);
                        },
                    }
                },
                _ => out.push(':'),
            },
            _ => out.push(ch),
        }
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ErrorKind, Value, connection::Config, transport::Scripted};

    #[test]
    fn exec_text() {
        assert_eq!(exec_command(1, &[]).unwrap(), "EXEC 1 ()");
        assert_eq!(
            exec_command(12, &[Param::new(1), Param::new("it's"), Param::new(Value::Null)]).unwrap(),
            r"EXEC 12 (1, 'it\'s', NULL)"
        );
        assert!(exec_command(1, &[Param::new(f64::NAN)]).is_err());
    }

    #[test]
    fn named_substitution() {
        let params = [Param::named("name", "deer"), Param::named("n", 2)];
        assert_eq!(
            named_command("SELECT * FROM t WHERE name = :name AND n > :n", &params).unwrap(),
            "SELECT * FROM t WHERE name = 'deer' AND n > 2"
        );
        assert_eq!(
            named_command("SELECT ':name', \":n\", 'a\\':n', x::int, :missing", &params).unwrap(),
            "SELECT ':name', \":n\", 'a\\':n', x::int, :missing"
        );
        assert_eq!(named_command("SELECT :nam", &params).unwrap(), "SELECT :nam");
        assert_eq!(named_command("SELECT 1", &[]).unwrap(), "SELECT 1");
    }

    #[test]
    fn unnamed_argument_is_unbound() {
        let err = named_command("SELECT ?", &[Param::named("a", 1), Param::new(2)]).unwrap_err();
        assert_eq!(err, ConversionError::Unbound { ordinal: 2 });
    }

    fn connection(io: Scripted) -> Connection<Scripted> {
        Connection::from_transport(io, Config::default())
    }

    #[tokio::test]
    async fn prepare_then_exec() {
        let mut io = Scripted::new();
        io.reply("&5 4 1 6 1\n")
            .reply("&2 1 10\n")
            .reply("&2 1 11\n")
            .reply("&3 0 0\n");
        let commands = io.commands();
        let conn = connection(io);

        let mut stmt = conn.prepare("INSERT INTO t VALUES (?)").await.unwrap();
        assert_eq!(stmt.exec_id(), Some(4));

        let res = stmt.execute(&[Param::new(1)]).await.unwrap();
        assert_eq!(res, RowResult { rows_affected: 1, last_insert_id: 10 });
        stmt.execute(&[Param::new(2)]).await.unwrap();
        stmt.close().await.unwrap();

        assert_eq!(
            commands.take(),
            [
                "PREPARE INSERT INTO t VALUES (?)",
                "EXEC 4 (1)",
                "EXEC 4 (2)",
                "DEALLOCATE 4",
            ]
        );
    }

    #[tokio::test]
    async fn failed_prepare_can_retry() {
        let mut io = Scripted::new();
        io.reply("!42000!syntax error\n").reply("&5 1 0 0 0\n").reply("&2 0 -1\n");
        let commands = io.commands();
        let conn = connection(io);

        let mut stmt = conn.statement("DELETE FROM t");
        let err = stmt.prepare().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Database(_)));
        assert_eq!(stmt.exec_id(), None);

        stmt.execute(&[]).await.unwrap();
        assert_eq!(stmt.exec_id(), Some(1));
        assert_eq!(commands.take(), ["PREPARE DELETE FROM t", "PREPARE DELETE FROM t", "EXEC 1 ()"]);
    }

    #[tokio::test]
    async fn plain_statement_is_literal() {
        let mut io = Scripted::new();
        io.reply("&2 3 -1\n");
        let commands = io.commands();
        let conn = connection(io);

        let res = conn
            .execute("UPDATE t SET a = :a", &[Param::named("a", true)])
            .await
            .unwrap();
        assert_eq!(res.rows_affected, 3);
        assert_eq!(commands.take(), ["UPDATE t SET a = true"]);
    }

    #[tokio::test]
    async fn unprepared_close_sends_nothing() {
        let io = Scripted::new();
        let commands = io.commands();
        connection(io).statement("SELECT 1").close().await.unwrap();
        assert!(commands.is_empty());
    }
}
