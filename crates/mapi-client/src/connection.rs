//! Line-level access to an authenticated MAPI stream.

use mapi_codec::MapiStream;
use mapi_protocol::PROMPT_LINE;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::{Error, Result};

/// A MAPI stream plus the bookkeeping shared by the client and its cursors.
///
/// `pending` is set while a response has been requested but not read to its
/// terminating `.` line. `broken` is set after any framing or I/O failure.
pub(crate) struct Connection<T = TcpStream>
where
    T: AsyncRead + AsyncWrite,
{
    stream: MapiStream<T>,
    pending: bool,
    broken: bool,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite,
{
    pub(crate) fn new(stream: MapiStream<T>) -> Self {
        Self {
            stream,
            pending: false,
            broken: false,
        }
    }

    /// Read a line that must exist: end of stream is an error here.
    pub(crate) async fn read_line(&mut self) -> Result<String> {
        match self.stream.read_line().await {
            Ok(Some(line)) => {
                self.note_line(&line);
                Ok(line)
            }
            Ok(None) => {
                self.broken = true;
                Err(Error::UnexpectedEof)
            }
            Err(e) => {
                self.broken = true;
                Err(e.into())
            }
        }
    }

    /// Read a line, mapping end of stream to `None`.
    pub(crate) async fn read_line_opt(&mut self) -> Result<Option<String>> {
        let line = self.stream.read_line().await.map_err(|e| {
            self.broken = true;
            Error::from(e)
        })?;
        if let Some(line) = &line {
            self.note_line(line);
        }
        Ok(line)
    }

    /// The prompt that closes the current message ends the response.
    fn note_line(&mut self, line: &str) {
        if line == PROMPT_LINE
            && self.stream.is_message_complete()
            && !self.stream.has_buffered_input()
        {
            self.pending = false;
        }
    }

    /// Send one complete message.
    pub(crate) async fn send_message(&mut self, text: &str) -> Result<()> {
        let result = async {
            self.stream.write_bytes(text.as_bytes()).await?;
            self.stream.flush_message().await
        }
        .await;

        result.map_err(|e| {
            self.broken = true;
            Error::from(e)
        })
    }

    /// Send a query command and expect a response.
    ///
    /// Any response left unread by an earlier cursor is discarded first.
    pub(crate) async fn send_command(&mut self, sql: &str) -> Result<()> {
        self.discard_pending().await?;
        self.send_message(&format!("s{sql};\n")).await?;
        self.pending = true;
        Ok(())
    }

    /// Drop the rest of the response currently being read.
    pub(crate) async fn discard_pending(&mut self) -> Result<()> {
        if !self.pending {
            return Ok(());
        }

        tracing::debug!("discarding unread response");
        self.stream.skip_message().await.map_err(|e| {
            self.broken = true;
            Error::from(e)
        })?;
        self.pending = false;
        Ok(())
    }

    /// The response was read up to its terminating line.
    pub(crate) fn finish_response(&mut self) {
        self.pending = false;
    }

    pub(crate) fn is_broken(&self) -> bool {
        self.broken
    }

    pub(crate) async fn close(&mut self) -> Result<()> {
        self.stream.close().await.map_err(Error::from)
    }
}
