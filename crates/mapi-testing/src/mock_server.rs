//! Mock MAPI server for unit testing.
//!
//! This module provides a mock MonetDB server that can be used for testing
//! clients without a real database instance.
//!
//! ## Features
//!
//! - Sends a configurable challenge and greeting (warnings, redirects, errors)
//! - Configurable responses for SQL queries
//! - Records every handshake response and query it receives
//! - Support for multiple concurrent connections
//!
//! ## Example
//!
//! ```rust,ignore
//! use mapi_testing::mock_server::{MockMapiServer, MockResponse};
//!
//! #[tokio::test]
//! async fn test_query() {
//!     let server = MockMapiServer::builder()
//!         .with_response("SELECT 1", MockResponse::scalar("1"))
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let port = server.port();
//!     // Connect your client to 127.0.0.1:port...
//! }
//! ```

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::net::SocketAddr;
use std::sync::Arc;

use mapi_codec::{CodecError, MapiStream};
use mapi_protocol::{NULL_LITERAL, PROMPT_LINE};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, broadcast};

/// Challenge sent when none is configured: protocol 9, SHA512 password hash.
pub const DEFAULT_CHALLENGE: &str = "wvFg8XJEk:mserver:9:RIPEMD160,SHA256,SHA1,MD5:LIT:SHA512:";

/// Error type for mock server operations.
#[derive(Debug, Error)]
pub enum MockServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error on the client connection.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Server already stopped.
    #[error("Server already stopped")]
    Stopped,
}

/// Result type for mock server operations.
pub type Result<T> = std::result::Result<T, MockServerError>;

/// A scripted reply to one query.
#[derive(Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// Text sent verbatim as the reply message.
    Raw(String),
    /// A `&1` table result.
    Rows {
        /// Column descriptions.
        columns: Vec<MockColumn>,
        /// Field values, `None` for NULL.
        rows: Vec<Vec<Option<String>>>,
    },
    /// A `&2` update count.
    Affected(i64),
    /// A `&4` transaction state change; `true` when auto-commit is on.
    Transaction(bool),
    /// A `!` error line.
    Error(String),
    /// An empty reply, which the client sees as just the prompt.
    Empty,
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(text) => f.debug_tuple("Raw").field(&text.len()).finish(),
            Self::Rows { columns, rows } => f
                .debug_struct("Rows")
                .field("columns", &columns.len())
                .field("rows", &rows.len())
                .finish(),
            Self::Affected(n) => f.debug_tuple("Affected").field(n).finish(),
            Self::Transaction(auto_commit) => {
                f.debug_tuple("Transaction").field(auto_commit).finish()
            }
            Self::Error(message) => f.debug_tuple("Error").field(message).finish(),
            Self::Empty => write!(f, "Empty"),
        }
    }
}

impl MockResponse {
    /// Create a raw text response.
    pub fn raw(text: impl Into<String>) -> Self {
        Self::Raw(text.into())
    }

    /// Create a single-value result in a column named `value`.
    pub fn scalar(value: impl Into<String>) -> Self {
        Self::Rows {
            columns: vec![MockColumn::varchar("value")],
            rows: vec![vec![Some(value.into())]],
        }
    }

    /// Create a table result.
    pub fn rows(columns: Vec<MockColumn>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self::Rows { columns, rows }
    }

    /// Create an update count response.
    pub fn affected(count: i64) -> Self {
        Self::Affected(count)
    }

    /// Create an error response; `message` is sent after the `!`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Create an empty response.
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Render the response as the text of one MAPI message.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Raw(text) => text.clone(),
            Self::Rows { columns, rows } => render_table(columns, rows),
            Self::Affected(n) => format!("&2 {n} -1\n"),
            Self::Transaction(auto_commit) => {
                format!("&4 {}\n", if *auto_commit { 't' } else { 'f' })
            }
            Self::Error(message) => format!("!{message}\n"),
            Self::Empty => String::new(),
        }
    }
}

fn render_table(columns: &[MockColumn], rows: &[Vec<Option<String>>]) -> String {
    let mut out = format!("&1 0 {} {} {}\n", rows.len(), columns.len(), rows.len());

    let metadata: [(&str, fn(&MockColumn) -> String); 4] = [
        ("table_name", |c| c.table_name.clone()),
        ("name", |c| c.name.clone()),
        ("type", |c| c.type_name.clone()),
        ("length", |c| c.length.to_string()),
    ];
    for (key, value) in metadata {
        let values: Vec<String> = columns.iter().map(value).collect();
        let _ = writeln!(out, "% {} # {key}", values.join(",\t"));
    }

    for row in rows {
        let fields: Vec<&str> = row.iter().map(|v| v.as_deref().unwrap_or(NULL_LITERAL)).collect();
        let _ = writeln!(out, "[ {}\t]", fields.join(",\t"));
    }

    out
}

/// Column description for mock table results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockColumn {
    /// Column name.
    pub name: String,
    /// SQL type name.
    pub type_name: String,
    /// Owning table name.
    pub table_name: String,
    /// Declared length.
    pub length: i32,
}

impl MockColumn {
    /// Create a column of the given type.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            table_name: "sys.mock".to_string(),
            length: 0,
        }
    }

    /// Create an `int` column.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, "int").with_length(10)
    }

    /// Create a `bigint` column.
    pub fn bigint(name: impl Into<String>) -> Self {
        Self::new(name, "bigint").with_length(19)
    }

    /// Create a `varchar` column.
    pub fn varchar(name: impl Into<String>) -> Self {
        Self::new(name, "varchar")
    }

    /// Set the table name.
    #[must_use]
    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = table.into();
        self
    }

    /// Set the declared length.
    #[must_use]
    pub fn with_length(mut self, length: i32) -> Self {
        self.length = length;
        self
    }
}

/// Configuration for the mock MAPI server.
#[derive(Debug, Default)]
pub struct MockServerConfig {
    /// Challenge line sent on connect.
    challenge: String,
    /// Lines sent after the client's handshake response.
    greeting: Vec<String>,
    /// Pre-configured responses for specific SQL queries.
    responses: HashMap<String, MockResponse>,
    /// Default response for unmatched queries.
    default_response: Option<MockResponse>,
}

/// Builder for `MockMapiServer`.
pub struct MockServerBuilder {
    config: MockServerConfig,
}

impl MockServerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: MockServerConfig {
                challenge: DEFAULT_CHALLENGE.to_string(),
                greeting: Vec::new(),
                responses: HashMap::new(),
                default_response: Some(MockResponse::empty()),
            },
        }
    }

    /// Set the challenge line, without its trailing newline.
    pub fn with_challenge(mut self, challenge: impl Into<String>) -> Self {
        self.config.challenge = challenge.into();
        self
    }

    /// Append a raw greeting line such as `#warning` or `!error`.
    pub fn with_greeting_line(mut self, line: impl Into<String>) -> Self {
        self.config.greeting.push(line.into());
        self
    }

    /// Append a `#` warning line to the greeting.
    pub fn with_warning(self, warning: impl AsRef<str>) -> Self {
        let line = format!("#{}", warning.as_ref());
        self.with_greeting_line(line)
    }

    /// Append a `^` redirect line to the greeting.
    pub fn with_redirect(self, target: impl AsRef<str>) -> Self {
        let line = format!("^{}", target.as_ref());
        self.with_greeting_line(line)
    }

    /// Add a response for a specific SQL query.
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.config.responses.insert(sql.into(), response);
        self
    }

    /// Set the default response for unmatched queries.
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.config.default_response = Some(response);
        self
    }

    /// Build and start the mock server.
    pub async fn build(self) -> Result<MockMapiServer> {
        MockMapiServer::start(self.config).await
    }
}

impl Default for MockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// What the server saw from its clients.
#[derive(Debug, Default)]
struct Recorded {
    responses: Vec<String>,
    queries: Vec<String>,
    connections: usize,
}

/// A mock MAPI server for testing.
///
/// Every accepted connection gets the challenge, one handshake response is
/// read, the greeting is sent, and then each query message is answered from
/// the configured responses.
pub struct MockMapiServer {
    /// Server address.
    addr: SocketAddr,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockMapiServer {
    /// Create a new builder for the mock server.
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::new()
    }

    /// Start the mock server on an available port.
    pub async fn start(config: MockServerConfig) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let config = Arc::new(config);
        let recorded = Arc::new(Mutex::new(Recorded::default()));

        let server = Self {
            addr,
            shutdown_tx: shutdown_tx.clone(),
            recorded: recorded.clone(),
        };

        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _peer_addr)) => {
                                let config = config.clone();
                                let recorded = recorded.clone();
                                tokio::spawn(async move {
                                    recorded.lock().await.connections += 1;
                                    if let Err(e) =
                                        handle_connection(stream, &config, &recorded).await
                                    {
                                        tracing::debug!("Connection error: {}", e);
                                    }
                                });
                            }
                            Err(e) => {
                                tracing::error!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Ok(server)
    }

    /// Get the server's listening address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the host string for connection configuration.
    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    /// Get the port number.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// A `mapi:monetdb://` URL pointing at this server.
    pub fn url(&self, database: &str) -> String {
        format!("mapi:monetdb://{}:{}/{database}", self.host(), self.port())
    }

    /// Number of connections accepted so far.
    pub async fn connection_count(&self) -> usize {
        self.recorded.lock().await.connections
    }

    /// Handshake response lines received, in arrival order.
    pub async fn received_responses(&self) -> Vec<String> {
        self.recorded.lock().await.responses.clone()
    }

    /// SQL text of the queries received, in arrival order.
    pub async fn received_queries(&self) -> Vec<String> {
        self.recorded.lock().await.queries.clone()
    }

    /// Stop the server.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for MockMapiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle a single client connection.
async fn handle_connection(
    stream: TcpStream,
    config: &MockServerConfig,
    recorded: &Mutex<Recorded>,
) -> Result<()> {
    let mut stream = MapiStream::new(stream);

    // Step 1: challenge
    stream.write_line(&config.challenge).await?;
    stream.flush_message().await?;

    // Step 2: handshake response
    let Some(response) = read_message(&mut stream).await? else {
        return Ok(());
    };
    recorded.lock().await.responses.push(response);

    // Step 3: greeting; an empty final block reads as just the prompt
    for line in &config.greeting {
        stream.write_line(line).await?;
    }
    stream.flush_message().await?;

    // Step 4: queries
    while let Some(message) = read_message(&mut stream).await? {
        let sql = decode_query(&message)?;
        tracing::trace!(sql = %sql, "mock query");
        let response = find_response(&sql, config);
        recorded.lock().await.queries.push(sql);

        stream.write_bytes(response.render().as_bytes()).await?;
        stream.flush_message().await?;
    }

    stream.close().await?;
    Ok(())
}

/// Read one message, joining its lines. `None` once the client hangs up.
async fn read_message<T>(stream: &mut MapiStream<T>) -> Result<Option<String>>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite,
{
    let mut lines = Vec::new();
    loop {
        match stream.read_line().await? {
            Some(line) if line == PROMPT_LINE => return Ok(Some(lines.join("\n"))),
            Some(line) => lines.push(line),
            None if lines.is_empty() => return Ok(None),
            None => return Err(CodecError::ConnectionClosed.into()),
        }
    }
}

/// Strip the `s` language prefix and the `;` terminator from a query message.
fn decode_query(message: &str) -> Result<String> {
    let body = message
        .strip_prefix('s')
        .ok_or_else(|| MockServerError::Protocol(format!("not an SQL query: {message:?}")))?;
    Ok(body.strip_suffix(';').unwrap_or(body).to_string())
}

/// Find the response for a query.
fn find_response(sql: &str, config: &MockServerConfig) -> MockResponse {
    if let Some(response) = config.responses.get(sql) {
        return response.clone();
    }

    // Case-insensitive match with collapsed whitespace
    let normalized = normalize(sql);
    for (key, response) in &config.responses {
        if normalize(key) == normalized {
            return response.clone();
        }
    }

    config
        .default_response
        .clone()
        .unwrap_or(MockResponse::Empty)
}

fn normalize(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
