//! MonetDB client implementation.

use std::marker::PhantomData;

use mapi_auth::{ProtocolVersion, ResponseParams};
use mapi_codec::MapiStream;
use mapi_protocol::{Challenge, LineType, PROMPT_LINE};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::catalog::Catalog;
use crate::config::{Config, DEFAULT_PORT};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::state::{ConnectionState, Disconnected, InTransaction, Ready};
use crate::stream::ResultStream;
use crate::transaction::{self, IsolationLevel};

/// MonetDB client with type-state connection management.
///
/// The generic parameter `S` represents the current connection state,
/// ensuring at compile time that certain operations are only available
/// in appropriate states.
pub struct Client<S: ConnectionState> {
    config: Config,
    connection: Connection,
    /// `#` lines the server sent during the handshake.
    warnings: Vec<String>,
    _state: PhantomData<S>,
}

/// Outcome of one handshake attempt.
enum Handshake {
    Established(Client<Ready>),
    Redirect(String),
}

impl Client<Disconnected> {
    /// Connect to MonetDB.
    ///
    /// This opens the socket, answers the server challenge and follows
    /// redirects until a server accepts the credentials.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let client = Client::connect(config).await?;
    /// ```
    pub async fn connect(config: Config) -> Result<Client<Ready>> {
        let max_redirects = config.redirect.max_redirects;
        let mut redirects = 0u8;
        let mut current_config = config;

        loop {
            match Self::try_connect(&current_config).await? {
                Handshake::Established(client) => return Ok(client),
                Handshake::Redirect(url) => {
                    redirects = count_redirect(redirects, max_redirects)?;

                    let (host, port, database) = parse_redirect(&url)?;
                    tracing::info!(
                        host = %host,
                        port = port,
                        database = %database,
                        attempt = redirects,
                        max_redirects = max_redirects,
                        "following server redirect"
                    );
                    current_config = current_config.redirected(host, port, database);
                }
            }
        }
    }

    async fn try_connect(config: &Config) -> Result<Handshake> {
        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            "connecting to MonetDB"
        );

        let addr = format!("{}:{}", config.host, config.port);

        tracing::debug!("establishing TCP connection to {}", addr);
        let tcp_stream = timeout(config.timeouts.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::ConnectTimeout)??;
        tcp_stream.set_nodelay(true)?;

        let mut stream = MapiStream::new(tcp_stream);
        stream.set_read_timeout(Some(config.timeouts.read_timeout));
        let mut connection = Connection::new(stream);

        // The challenge is followed by a prompt, read before validating.
        let challenge_line = connection.read_line().await?;
        connection.read_line().await?;

        let challenge = Challenge::parse(&challenge_line)?;
        let version = ProtocolVersion::from_number(challenge.version())?;
        tracing::debug!(
            version = version.number(),
            server_type = challenge.server_type(),
            "received challenge"
        );

        let mut params = ResponseParams::new(config.credentials.clone(), config.database.clone())
            .with_language(config.language.clone());
        if let Some(hash) = &config.hash {
            params = params.with_hash(hash.clone());
        }
        let response = version.build_response(&params, challenge.tokens().as_slice())?;
        connection.send_message(&format!("{response}\n")).await?;

        let mut warnings = Vec::new();
        let mut redirects = Vec::new();

        loop {
            let line = match connection.read_line_opt().await? {
                Some(line) if !line.is_empty() => line,
                _ => return Err(Error::ConnectionLost),
            };

            if line == PROMPT_LINE {
                break;
            }

            match LineType::from_line(&line) {
                LineType::Error => {
                    return Err(Error::Server {
                        message: line[1..].to_string(),
                    });
                }
                LineType::Info => {
                    tracing::warn!(warning = &line[1..], "server warning");
                    warnings.push(line[1..].to_string());
                }
                LineType::Redirect => redirects.push(line[1..].to_string()),
                _ => {}
            }
        }

        if config.redirect.follow_redirects {
            if let Some(url) = redirects.into_iter().next() {
                if let Err(e) = connection.close().await {
                    tracing::debug!(error = %e, "error closing redirected connection");
                }
                return Ok(Handshake::Redirect(url));
            }
        }

        tracing::info!(host = %config.host, port = config.port, "connection established");

        Ok(Handshake::Established(Client {
            config: config.clone(),
            connection,
            warnings,
            _state: PhantomData,
        }))
    }
}

impl<S: ConnectionState> Client<S> {
    /// Run a command and return a cursor over its response.
    ///
    /// Any response an earlier cursor left unread is discarded first.
    pub async fn execute(&mut self, sql: &str) -> Result<ResultStream<'_>> {
        tracing::debug!(sql = sql, "executing command");
        self.connection.send_command(sql).await?;
        Ok(ResultStream::new(&mut self.connection))
    }

    /// Run a command and read its whole response.
    ///
    /// Returns the records affected, summed over all result sets.
    pub async fn execute_non_query(&mut self, sql: &str) -> Result<i64> {
        let mut stream = self.execute(sql).await?;
        let mut affected = 0;
        while let Some(set) = stream.next_result_set().await? {
            affected += set.records_affected();
        }
        Ok(affected)
    }

    /// Run a query and collect the rows of its first result set.
    pub async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        let mut stream = self.execute(sql).await?;
        let rows = match stream.next_result_set().await? {
            Some(_) => stream.collect_rows().await?,
            None => Vec::new(),
        };
        stream.drain().await?;
        Ok(rows)
    }

    /// Run a query and return the first field of its first row.
    pub async fn query_scalar(&mut self, sql: &str) -> Result<Option<String>> {
        let mut stream = self.execute(sql).await?;
        let mut value = None;
        if stream.next_result_set().await?.is_some() {
            if let Some(row) = stream.next_row().await? {
                value = row.get(0).map(str::to_string);
            }
        }
        stream.drain().await?;
        Ok(value)
    }

    /// Best-effort catalog queries.
    pub fn catalog(&mut self) -> Catalog<'_, S> {
        Catalog::new(self)
    }

    /// Warnings the server sent while the connection was established.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Whether a framing or I/O failure made this connection unusable.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.connection.is_broken()
    }

    /// Get the current database name.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// Get the server host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Get the server port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// The configuration this client connected with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Close the connection gracefully.
    pub async fn close(mut self) -> Result<()> {
        tracing::debug!("closing connection");
        self.connection.close().await
    }

    async fn run(&mut self, sql: &str) -> Result<()> {
        self.execute(sql).await?.drain().await
    }

    fn into_state<T: ConnectionState>(self) -> Client<T> {
        Client {
            config: self.config,
            connection: self.connection,
            warnings: self.warnings,
            _state: PhantomData,
        }
    }
}

impl Client<Ready> {
    /// Begin a transaction.
    ///
    /// This transitions the client from `Ready` to `InTransaction` state.
    pub async fn begin_transaction(mut self) -> Result<Client<InTransaction>> {
        tracing::debug!("beginning transaction");
        self.run(transaction::BEGIN).await?;
        Ok(self.into_state())
    }

    /// Begin a transaction with a specific isolation level.
    ///
    /// MonetDB only provides [`IsolationLevel::Serializable`]; any other
    /// level fails before anything is sent.
    pub async fn begin_transaction_with_isolation(
        self,
        isolation_level: IsolationLevel,
    ) -> Result<Client<InTransaction>> {
        tracing::debug!(
            isolation_level = %isolation_level.name(),
            "beginning transaction with isolation level"
        );
        isolation_level.ensure_supported()?;
        self.begin_transaction().await
    }
}

impl Client<InTransaction> {
    /// Commit the transaction.
    ///
    /// This transitions the client back to `Ready` state.
    pub async fn commit(mut self) -> Result<Client<Ready>> {
        tracing::debug!("committing transaction");
        self.run(transaction::COMMIT).await?;
        Ok(self.into_state())
    }

    /// Rollback the transaction.
    ///
    /// This transitions the client back to `Ready` state.
    pub async fn rollback(mut self) -> Result<Client<Ready>> {
        tracing::debug!("rolling back transaction");
        self.run(transaction::ROLLBACK).await?;
        Ok(self.into_state())
    }
}

impl<S: ConnectionState> std::fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .field("broken", &self.connection.is_broken())
            .finish()
    }
}

/// Count one more redirect, failing once `max` have been followed.
fn count_redirect(followed: u8, max: u8) -> Result<u8> {
    match followed.checked_add(1) {
        Some(next) if next <= max => Ok(next),
        _ => Err(Error::TooManyRedirects { max }),
    }
}

/// Split a redirect target into host, port and database.
///
/// Accepts `mapi:monetdb://host[:port]/database`; the `mapi:` prefix is
/// optional and the port defaults to 50000.
fn parse_redirect(target: &str) -> Result<(String, u16, String)> {
    let trimmed = target.trim();
    let without_prefix = trimmed.strip_prefix("mapi:").unwrap_or(trimmed);

    let url = url::Url::parse(without_prefix)
        .map_err(|e| Error::InvalidRedirect(format!("{trimmed}: {e}")))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::InvalidRedirect(format!("{trimmed}: missing host")))?
        .to_string();
    let port = url.port().unwrap_or(DEFAULT_PORT);
    let database = url.path().trim_start_matches('/').to_string();

    Ok((host, port, database))
}
