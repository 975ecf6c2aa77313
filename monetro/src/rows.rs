//! The [`Rows`] cursor.
use futures_core::Stream;
use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll, ready},
};

use crate::{
    Result,
    cancel::Cancel,
    common::verbose,
    connection::Connection,
    mapi::{MonetType, ProtocolError, ScanType},
    result::{ColumnDescriptor, ResultDescriptor, ResultKind},
    row::{FromRow, Row},
    transport::{Request, Transport},
    value::Value,
};

type Reply = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

enum Phase {
    Idle,
    Fetching { offset: i64, reply: Reply },
}

/// Lazy cursor over a table result.
///
/// Rows beyond the first page are requested from the server on demand,
/// `reply_size` rows at a time.
pub struct Rows<T: Transport> {
    conn: Connection<T>,
    cancel: Cancel,
    reply_size: i64,
    query_id: i64,
    row_count: i64,
    row_index: i64,
    offset: i64,
    page_len: i64,
    page: std::vec::IntoIter<Vec<Value>>,
    result: ResultDescriptor,
    phase: Phase,
}

impl<T: Transport> Rows<T> {
    /// Seed cursor from the first reply, taking its buffered rows.
    pub(crate) fn new(conn: Connection<T>, cancel: Cancel, result: &mut ResultDescriptor) -> Self {
        let reply_size = i64::try_from(conn.config().reply_size()).unwrap_or(i64::MAX);
        let rows = result.take_rows();
        let (query_id, row_count) = match result.kind() {
            ResultKind::Table => (result.metadata().query_id, result.metadata().row_count.max(0)),
            _ => (-1, 0),
        };

        Self {
            conn,
            cancel,
            reply_size,
            query_id,
            row_count,
            row_index: 0,
            offset: result.metadata().offset,
            page_len: rows.len() as i64,
            page: rows.into_iter(),
            result: result.clone(),
            phase: Phase::Idle,
        }
    }

    /// Server side result handle, `-1` for a statement without table.
    pub fn query_id(&self) -> i64 {
        self.query_id
    }

    /// Total rows of the result.
    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    /// Rows already returned.
    pub fn row_index(&self) -> i64 {
        self.row_index
    }

    /// Returns `true` once every row has been returned.
    pub fn is_done(&self) -> bool {
        self.row_index >= self.row_count
    }

    /// Column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.result.columns().iter().map(ColumnDescriptor::name).collect()
    }

    /// Column metadata.
    pub fn columns(&self) -> Vec<ColumnType<'_>> {
        self.result.columns().iter().map(ColumnType).collect()
    }

    /// Column metadata at `index`.
    pub fn column(&self, index: usize) -> Option<ColumnType<'_>> {
        self.result.columns().get(index).map(ColumnType)
    }

    /// Fetch the next row.
    pub async fn next(&mut self) -> Option<Result<Row>> {
        std::future::poll_fn(|cx| self.poll_row(cx)).await
    }

    /// Fetch and decode the next row.
    pub async fn next_as<R: FromRow>(&mut self) -> Option<Result<R>> {
        let row = self.next().await?;
        Some(row.and_then(|row| R::from_row(row).map_err(Into::into)))
    }

    /// Poll the next row.
    pub fn poll_row(&mut self, cx: &mut Context) -> Poll<Option<Result<Row>>> {
        loop {
            if let Phase::Fetching { offset, reply } = &mut self.phase {
                let offset = *offset;
                let reply = ready!(reply.as_mut().poll(cx));
                self.phase = Phase::Idle;
                if let Err(err) = reply.and_then(|reply| self.load_page(offset, &reply)) {
                    return Poll::Ready(Some(Err(err)));
                }
            }

            if self.row_index >= self.row_count {
                return Poll::Ready(None);
            }

            if let Some(values) = self.page.next() {
                self.row_index += 1;
                return Poll::Ready(Some(Ok(Row::new(self.result.columns().clone(), values))));
            }

            let offset = self.offset + self.page_len;
            let count = self.row_count.min(self.row_index + self.reply_size) - offset;
            verbose!(query_id = self.query_id, offset, count, "fetch page");

            let conn = self.conn.clone();
            let cancel = self.cancel.clone();
            let request = Request::FetchMore { query_id: self.query_id, offset, count };
            let reply = Box::pin(async move { conn.request(request, cancel).await });
            self.phase = Phase::Fetching { offset, reply };
        }
    }

    fn load_page(&mut self, offset: i64, reply: &str) -> Result<()> {
        self.result.store_page(reply)?;
        let rows = self.result.take_rows();
        if rows.is_empty() {
            return Err(ProtocolError::malformed(
                reply.lines().next().unwrap_or_default(),
                "empty page while rows remain",
            ).into());
        }
        self.offset = offset;
        self.page_len = rows.len() as i64;
        self.page = rows.into_iter();
        Ok(())
    }
}

impl<T: Transport> Stream for Rows<T> {
    type Item = Result<Row>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_row(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.row_count - self.row_index).unwrap_or_default();
        (remaining, Some(remaining))
    }
}

impl<T: Transport> fmt::Debug for Rows<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("query_id", &self.query_id)
            .field("row_count", &self.row_count)
            .field("row_index", &self.row_index)
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

/// Metadata view of one result column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnType<'a>(&'a ColumnDescriptor);

impl<'a> ColumnType<'a> {
    pub fn name(&self) -> &'a str {
        self.0.name()
    }

    /// Type name in upper case, e.g. `VARCHAR`.
    pub fn database_type_name(&self) -> String {
        self.0.type_name().to_uppercase()
    }

    /// Length of variable length types.
    ///
    /// `char` and `varchar` report their internal size, `blob` and `clob`
    /// are unbounded.
    pub fn length(&self) -> Option<i64> {
        match self.0.monet_type()? {
            MonetType::Char | MonetType::Varchar => Some(self.0.internal_size()),
            MonetType::Blob | MonetType::Clob => Some(i64::MAX),
            _ => None,
        }
    }

    /// Nullability is not reported by the server.
    pub fn nullable(&self) -> Option<bool> {
        None
    }

    /// Precision and scale of `decimal` columns.
    pub fn precision_scale(&self) -> Option<(i64, i64)> {
        match self.0.monet_type()? {
            MonetType::Decimal => Some((self.0.precision(), self.0.scale())),
            _ => None,
        }
    }

    /// Value kind produced by this column, [`ScanType::Null`] for unknown types.
    pub fn scan_type(&self) -> ScanType {
        self.0.monet_type().map_or(ScanType::Null, MonetType::scan_type)
    }

    pub fn descriptor(&self) -> &'a ColumnDescriptor {
        self.0
    }
}

impl<'a> From<&'a ColumnDescriptor> for ColumnType<'a> {
    fn from(value: &'a ColumnDescriptor) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ErrorKind, connection::Config, transport::Scripted};

    const HEADER: &str = "&1 7 5 2 2
% id,\tname # name
% int,\tvarchar # type
% 2,\t5 # length
% 32 0,\t16 0 # typesizes
";

    fn connection(io: Scripted) -> Connection<Scripted> {
        Connection::from_transport(io, Config::default().with_reply_size(2))
    }

    #[tokio::test]
    async fn paginates() {
        let mut io = Scripted::new();
        io.reply(format!("{HEADER}[ 1,\t\"a\"\t]\n[ 2,\t\"b\"\t]\n"))
            .reply("&6 7 2 2 2\n[ 3,\t\"c\"\t]\n[ 4,\t\"d\"\t]\n")
            .reply("&6 7 2 1 4\n[ 5,\t\"e\"\t]\n");
        let commands = io.commands();
        let conn = connection(io);

        let mut rows = conn.query("SELECT id, name FROM t", &[]).await.unwrap();
        assert_eq!((rows.query_id(), rows.row_count()), (7, 5));

        let mut ids = vec![];
        while let Some(row) = rows.next_as::<(i32, String)>().await {
            ids.push(row.unwrap().0);
        }
        assert_eq!(ids, [1, 2, 3, 4, 5]);
        assert!(rows.next().await.is_none());
        assert!(rows.next().await.is_none());

        assert_eq!(
            commands.take(),
            ["SELECT id, name FROM t", "Xexport 7 2 2", "Xexport 7 4 1"]
        );
    }

    #[tokio::test]
    async fn fetches_one_page_exactly_once() {
        let page_size = 100;
        let mut first = String::from("&1 3 150 1 100\n% n # name\n% int # type\n");
        for i in 0..page_size {
            first.push_str(&format!("[ {i}\t]\n"));
        }
        let mut second = String::from("&6 3 1 50 100\n");
        for i in page_size..150 {
            second.push_str(&format!("[ {i}\t]\n"));
        }

        let mut io = Scripted::new();
        io.reply(first).reply(second);
        let commands = io.commands();
        let conn = Connection::from_transport(io, Config::default());

        let mut rows = conn.query("SELECT n FROM t", &[]).await.unwrap();
        let mut n = 0;
        while let Some(row) = rows.next().await {
            assert_eq!(row.unwrap().try_get::<_, i32>(0).unwrap(), n);
            n += 1;
        }
        assert_eq!(n, 150);
        assert_eq!(commands.take(), ["SELECT n FROM t", "Xexport 3 100 50"]);
    }

    #[tokio::test]
    async fn empty_page_is_malformed() {
        let mut io = Scripted::new();
        io.reply(format!("{HEADER}[ 1,\t\"a\"\t]\n[ 2,\t\"b\"\t]\n")).reply("&6 7 2 0 2\n");
        let conn = connection(io);

        let mut rows = conn.query("SELECT id, name FROM t", &[]).await.unwrap();
        rows.next().await.unwrap().unwrap();
        rows.next().await.unwrap().unwrap();
        let err = rows.next().await.unwrap().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(ProtocolError::Malformed { .. })));
    }

    #[tokio::test]
    async fn non_table_is_empty() {
        let mut io = Scripted::new();
        io.reply("&2 1 -1\n");
        let conn = connection(io);

        let mut rows = conn.query("DELETE FROM t", &[]).await.unwrap();
        assert_eq!(rows.query_id(), -1);
        assert!(rows.is_done());
        assert!(rows.next().await.is_none());
    }

    #[tokio::test]
    async fn column_metadata() {
        let mut io = Scripted::new();
        io.reply(
            "&1 1 0 4 0
% name,\tbody,\tprice,\tgeo # name
% varchar,\tclob,\tdecimal,\tgeometry # type
% 5,\t0,\t10,\t0 # length
% 16 0,\t0 0,\t10 2,\t0 0 # typesizes
",
        );
        let conn = connection(io);
        let rows = conn.query("SELECT * FROM t", &[]).await.unwrap();

        assert_eq!(rows.column_names(), ["name", "body", "price", "geo"]);

        let name = rows.column(0).unwrap();
        assert_eq!(name.database_type_name(), "VARCHAR");
        assert_eq!(name.length(), Some(16));
        assert_eq!(name.nullable(), None);
        assert_eq!(name.precision_scale(), None);
        assert_eq!(name.scan_type(), ScanType::Text);

        assert_eq!(rows.column(1).unwrap().length(), Some(i64::MAX));

        let price = rows.column(2).unwrap();
        assert_eq!(price.precision_scale(), Some((10, 2)));
        assert_eq!(price.scan_type(), ScanType::Float64);
        assert_eq!(price.length(), None);

        assert_eq!(rows.column(3).unwrap().scan_type(), ScanType::Null);
        assert!(rows.column(4).is_none());
        assert_eq!(rows.columns().len(), 4);
    }
}
