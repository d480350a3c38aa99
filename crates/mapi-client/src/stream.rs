//! Streaming query results.
//!
//! A [`ResultStream`] walks the response to one command line by line. The
//! response is a sequence of result sets, each made of optional `&` and `%`
//! header lines followed by `[` tuple lines, and ends with a `.` line:
//!
//! ```text
//! AwaitingFirstLine -> ScanningHeader -> EmittingRows -> ScanningHeader ... -> Done
//! ```
//!
//! Nothing is buffered beyond the current line, so arbitrarily large results
//! are processed in constant memory.

use std::sync::Arc;

use mapi_protocol::{
    ColumnInfo, LineType, PROMPT_LINE, QueryKind, ResultHeader, parse_tuple_line,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::row::{Column, Row};

/// Description of one result set in a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    header: ResultHeader,
    columns: Arc<[Column]>,
}

impl ResultSet {
    /// The `&` header of the set, or a zeroed header if none was sent.
    #[must_use]
    pub fn header(&self) -> &ResultHeader {
        &self.header
    }

    /// Kind of response.
    #[must_use]
    pub fn kind(&self) -> QueryKind {
        self.header.kind
    }

    /// Server-side result set identifier.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.header.id
    }

    /// Total number of tuples in the result.
    #[must_use]
    pub fn tuple_count(&self) -> i64 {
        self.header.tuple_count
    }

    /// Number of columns announced by the header.
    #[must_use]
    pub fn column_count(&self) -> i64 {
        self.header.column_count
    }

    /// Number of rows contained in this response.
    #[must_use]
    pub fn row_count(&self) -> i64 {
        self.header.row_count
    }

    /// Number of records affected.
    #[must_use]
    pub fn records_affected(&self) -> i64 {
        self.header.records_affected
    }

    /// Columns described by the `%` metadata lines.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    AwaitingFirstLine,
    ScanningHeader,
    EmittingRows,
    Done,
}

/// Forward-only cursor over the response to one command.
///
/// The cursor mutably borrows its client. Dropping it early is fine: the
/// unread part of the response is discarded before the next command.
///
/// # Example
///
/// ```rust,ignore
/// let mut results = client.execute("SELECT id, name FROM users").await?;
///
/// while let Some(set) = results.next_result_set().await? {
///     println!("{} columns", set.columns().len());
///     while let Some(row) = results.next_row().await? {
///         println!("{:?}", row.get(0));
///     }
/// }
/// ```
pub struct ResultStream<'a, T = TcpStream>
where
    T: AsyncRead + AsyncWrite,
{
    connection: &'a mut Connection<T>,
    state: CursorState,
    line: String,
    current: Option<ResultSet>,
}

impl<'a, T> ResultStream<'a, T>
where
    T: AsyncRead + AsyncWrite,
{
    pub(crate) fn new(connection: &'a mut Connection<T>) -> Self {
        Self {
            connection,
            state: CursorState::AwaitingFirstLine,
            line: String::new(),
            current: None,
        }
    }

    /// Advance to the next result set.
    ///
    /// Unread rows of the current set are skipped. The first call always
    /// yields a set, even for a response with no header at all; `None`
    /// means the response is finished.
    pub async fn next_result_set(&mut self) -> Result<Option<ResultSet>> {
        let first = match self.state {
            CursorState::Done => return Ok(None),
            CursorState::AwaitingFirstLine => {
                self.line = self.read_line().await?;
                true
            }
            CursorState::EmittingRows => {
                while self.next_row().await?.is_some() {}
                false
            }
            CursorState::ScanningHeader => false,
        };

        if !first && self.line == PROMPT_LINE {
            self.finish();
            return Ok(None);
        }

        let mut header = ResultHeader::default();
        let mut metadata = Vec::new();

        while self.line != PROMPT_LINE && !self.line.starts_with('[') {
            match LineType::from_line(&self.line) {
                LineType::ResultHeader => match ResultHeader::parse(&self.line) {
                    Ok(parsed) => header = parsed,
                    Err(e) => return Err(self.abort(e.into()).await),
                },
                LineType::Header => metadata.push(std::mem::take(&mut self.line)),
                LineType::Error => {
                    let message = self.line[1..].to_string();
                    return Err(self.abort(Error::Server { message }).await);
                }
                _ => {}
            }
            self.line = self.read_line().await?;
        }

        let columns: Arc<[Column]> = match ColumnInfo::from_metadata(&metadata) {
            Ok(infos) => infos.into_iter().map(Column::from).collect(),
            Err(e) => return Err(self.abort(e.into()).await),
        };

        tracing::trace!(
            kind = ?header.kind,
            id = header.id,
            columns = columns.len(),
            "result set"
        );

        let set = ResultSet { header, columns };
        self.current = Some(set.clone());
        self.state = CursorState::EmittingRows;
        Ok(Some(set))
    }

    /// Fetch the next row of the current result set.
    ///
    /// Returns `None` once the rows of the set are exhausted, and keeps
    /// returning `None` until [`next_result_set`](Self::next_result_set) is
    /// called.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.state != CursorState::EmittingRows {
            return Ok(None);
        }

        if !self.line.starts_with('[') {
            self.state = CursorState::ScanningHeader;
            return Ok(None);
        }

        let values = parse_tuple_line(&self.line);
        self.line = self.read_line().await?;

        let columns = self
            .current
            .as_ref()
            .map(|set| Arc::clone(&set.columns))
            .unwrap_or_else(|| Arc::from(Vec::new()));
        Ok(Some(Row::new(columns, values)))
    }

    /// Collect the remaining rows of the current result set.
    pub async fn collect_rows(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Read and discard everything left in the response.
    pub async fn drain(&mut self) -> Result<()> {
        while self.next_result_set().await?.is_some() {}
        Ok(())
    }

    /// Columns of the current result set.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        match &self.current {
            Some(set) => &set.columns,
            None => &[],
        }
    }

    /// Header of the current result set.
    #[must_use]
    pub fn header(&self) -> Option<&ResultHeader> {
        self.current.as_ref().map(ResultSet::header)
    }

    /// Whether the whole response has been read.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == CursorState::Done
    }

    async fn read_line(&mut self) -> Result<String> {
        match self.connection.read_line().await {
            Ok(line) => Ok(line),
            Err(e) => {
                self.state = CursorState::Done;
                Err(e)
            }
        }
    }

    fn finish(&mut self) {
        self.state = CursorState::Done;
        self.current = None;
        self.connection.finish_response();
    }

    /// Stop reading, discard the rest of the response and hand back `err`.
    async fn abort(&mut self, err: Error) -> Error {
        self.state = CursorState::Done;
        self.current = None;
        match self.connection.discard_pending().await {
            Ok(()) => err,
            Err(discard) => {
                tracing::debug!(error = %discard, "failed to discard response after error");
                err
            }
        }
    }
}

impl<T> std::fmt::Debug for ResultStream<'_, T>
where
    T: AsyncRead + AsyncWrite,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("state", &self.state)
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mapi_codec::MapiStream;
    use tokio::io::DuplexStream;

    use super::*;

    /// A connection whose peer has already sent `reply` as one message.
    async fn connection_with_reply(
        reply: &str,
    ) -> (Connection<DuplexStream>, MapiStream<DuplexStream>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let mut server = MapiStream::new(server);
        server.write_bytes(reply.as_bytes()).await.unwrap();
        server.flush_message().await.unwrap();

        let mut connection = Connection::new(MapiStream::new(client));
        connection.send_command("SELECT 1").await.unwrap();
        (connection, server)
    }

    #[tokio::test]
    async fn test_single_result_set() {
        let reply = "&1 7 3 2 5\n%a,b#table_name\n%x,y#name\n[1, 2]\n[3, 4]\n";
        let (mut connection, _server) = connection_with_reply(reply).await;
        let mut stream = ResultStream::new(&mut connection);

        let set = stream.next_result_set().await.unwrap().unwrap();
        assert_eq!(set.kind(), QueryKind::Table);
        assert_eq!(set.id(), 7);
        assert_eq!(set.tuple_count(), 3);
        assert_eq!(set.column_count(), 2);
        assert_eq!(set.row_count(), 5);
        assert_eq!(set.records_affected(), 0);

        let names: Vec<_> = set.columns().iter().map(|c| c.name.as_str()).collect();
        let tables: Vec<_> = set.columns().iter().map(|c| c.table_name.as_str()).collect();
        assert_eq!(names, ["x", "y"]);
        assert_eq!(tables, ["a", "b"]);

        let first = stream.next_row().await.unwrap().unwrap();
        assert_eq!(first.get(0), Some("1"));
        assert_eq!(first.get(1), Some("2"));
        let second = stream.next_row().await.unwrap().unwrap();
        assert_eq!(second.get_by_name("y"), Some("4"));
        assert!(stream.next_row().await.unwrap().is_none());
        assert!(stream.next_row().await.unwrap().is_none());

        assert!(stream.next_result_set().await.unwrap().is_none());
        assert!(stream.is_finished());
        drop(stream);
        assert!(!connection.is_broken());
    }

    #[tokio::test]
    async fn test_null_fields() {
        let reply = "&1 0 1 2 1\n%t,t#table_name\n%a,b#name\n[NULL,\t\"NULL\"]\n";
        let (mut connection, _server) = connection_with_reply(reply).await;
        let mut stream = ResultStream::new(&mut connection);

        stream.next_result_set().await.unwrap().unwrap();
        let row = stream.next_row().await.unwrap().unwrap();
        assert!(row.is_null(0));
        assert_eq!(row.get(1), Some("\"NULL\""));
    }

    #[tokio::test]
    async fn test_empty_response_yields_one_set() {
        let (mut connection, _server) = connection_with_reply("").await;
        let mut stream = ResultStream::new(&mut connection);

        let set = stream.next_result_set().await.unwrap().unwrap();
        assert_eq!(set.kind(), QueryKind::Unknown);
        assert!(set.columns().is_empty());
        assert!(stream.next_row().await.unwrap().is_none());
        assert!(stream.next_result_set().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_header_is_zeroed() {
        let (mut connection, _server) = connection_with_reply("&2 5 -1\n").await;
        let mut stream = ResultStream::new(&mut connection);

        let set = stream.next_result_set().await.unwrap().unwrap();
        assert_eq!(set.kind(), QueryKind::Update);
        assert_eq!(set.records_affected(), 0);
        assert_eq!(set.id(), 0);
        assert!(stream.next_result_set().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_multiple_result_sets() {
        let reply = "&1 1 1 1 1\n%t#table_name\n%a#name\n[1]\n\
                     &1 2 2 1 2\n%u#table_name\n%b#name\n[2]\n[3]\n";
        let (mut connection, _server) = connection_with_reply(reply).await;
        let mut stream = ResultStream::new(&mut connection);

        let first = stream.next_result_set().await.unwrap().unwrap();
        assert_eq!(first.columns()[0].name, "a");
        // Rows of the first set are skipped.
        let second = stream.next_result_set().await.unwrap().unwrap();
        assert_eq!(second.id(), 2);
        assert_eq!(stream.columns()[0].name, "b");
        assert_eq!(stream.collect_rows().await.unwrap().len(), 2);
        assert!(stream.next_result_set().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_in_header() {
        let reply = "&1 0 1 1 1\n!42000!syntax error, unexpected IDENT\n%t#table_name\n";
        let (mut connection, _server) = connection_with_reply(reply).await;
        let mut stream = ResultStream::new(&mut connection);

        let err = stream.next_result_set().await.unwrap_err();
        assert_eq!(
            err.server_message(),
            Some("42000!syntax error, unexpected IDENT")
        );
        assert!(stream.is_finished());
        assert!(stream.next_result_set().await.unwrap().is_none());
        drop(stream);
        assert!(!connection.is_broken());
    }

    #[tokio::test]
    async fn test_unexpected_eof() {
        let (client, server) = tokio::io::duplex(1024);
        let mut connection = Connection::new(MapiStream::new(client));
        connection.send_command("SELECT 1").await.unwrap();
        drop(server);

        let mut stream = ResultStream::new(&mut connection);
        let err = stream.next_result_set().await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedEof | Error::Codec(_)));
        drop(stream);
        assert!(connection.is_broken());
    }

    #[tokio::test]
    async fn test_dropped_cursor_is_drained_before_next_command() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let mut server = MapiStream::new(server);
        let mut connection = Connection::new(MapiStream::new(client));

        server
            .write_bytes(b"&1 0 2 1 2\n%t#table_name\n%a#name\n[1]\n[2]\n")
            .await
            .unwrap();
        server.flush_message().await.unwrap();
        server
            .write_bytes(b"&1 1 1 1 1\n%t#table_name\n%b#name\n[9]\n")
            .await
            .unwrap();
        server.flush_message().await.unwrap();

        connection.send_command("SELECT a FROM t").await.unwrap();
        {
            let mut stream = ResultStream::new(&mut connection);
            stream.next_result_set().await.unwrap();
            stream.next_row().await.unwrap();
        }

        connection.send_command("SELECT b FROM t").await.unwrap();
        let mut stream = ResultStream::new(&mut connection);
        let set = stream.next_result_set().await.unwrap().unwrap();
        assert_eq!(set.columns()[0].name, "b");
        assert_eq!(stream.next_row().await.unwrap().unwrap().get(0), Some("9"));

        assert_eq!(server.read_line().await.unwrap().unwrap(), "sSELECT a FROM t;");
    }

    /// Serve `replies` in order, each one only after a command arrives.
    fn serve_on_demand(
        mut server: MapiStream<DuplexStream>,
        replies: &'static [&'static str],
    ) -> tokio::task::JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut commands = Vec::new();
            for reply in replies {
                commands.push(server.read_line().await.unwrap().unwrap());
                assert_eq!(server.read_line().await.unwrap().unwrap(), ".");
                server.write_bytes(reply.as_bytes()).await.unwrap();
                server.flush_message().await.unwrap();
            }
            commands
        })
    }

    #[tokio::test]
    async fn test_fully_read_cursor_then_next_command() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let server = serve_on_demand(
            MapiStream::new(server),
            &[
                "&1 0 2 1 2\n%t#table_name\n%a#name\n[1]\n[2]\n",
                "&1 1 1 1 1\n%t#table_name\n%b#name\n[9]\n",
            ],
        );
        let mut connection = Connection::new(MapiStream::new(client));

        connection.send_command("SELECT a FROM t").await.unwrap();
        {
            let mut stream = ResultStream::new(&mut connection);
            stream.next_result_set().await.unwrap().unwrap();
            assert_eq!(stream.collect_rows().await.unwrap().len(), 2);
        }

        let sent = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            connection.send_command("SELECT b FROM t"),
        )
        .await;
        assert!(matches!(sent, Ok(Ok(()))));

        let mut stream = ResultStream::new(&mut connection);
        let set = stream.next_result_set().await.unwrap().unwrap();
        assert_eq!(set.columns()[0].name, "b");
        assert_eq!(stream.next_row().await.unwrap().unwrap().get(0), Some("9"));
        drop(stream);

        assert_eq!(
            server.await.unwrap(),
            ["sSELECT a FROM t;", "sSELECT b FROM t;"]
        );
        assert!(!connection.is_broken());
    }

    #[tokio::test]
    async fn test_empty_response_then_next_command() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let server = serve_on_demand(MapiStream::new(server), &["", "&2 3 -1\n"]);
        let mut connection = Connection::new(MapiStream::new(client));

        connection.send_command("SET TIME ZONE LOCAL").await.unwrap();
        {
            let mut stream = ResultStream::new(&mut connection);
            let set = stream.next_result_set().await.unwrap().unwrap();
            assert_eq!(set.kind(), QueryKind::Unknown);
        }

        let sent = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            connection.send_command("DELETE FROM t"),
        )
        .await;
        assert!(matches!(sent, Ok(Ok(()))));

        let mut stream = ResultStream::new(&mut connection);
        let set = stream.next_result_set().await.unwrap().unwrap();
        assert_eq!(set.kind(), QueryKind::Update);
        drop(stream);

        assert_eq!(server.await.unwrap().len(), 2);
    }
}
