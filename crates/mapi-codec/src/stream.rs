//! Duplex logical stream over a block framed transport.
//!
//! The transport is split into read and write halves. Writes are buffered into
//! a block of at most 32767 bytes; a full block is sent as a non-final block
//! and [`MapiStream::flush_message`] sends whatever is buffered as the final
//! block of the message, even when nothing is buffered. Reads reassemble
//! blocks and terminate every message with a `.` line.
//!
//! `MapiStream` has no notion of position: it implements
//! `AsyncRead` and `AsyncWrite` but not `AsyncSeek`.

use std::future::{Future, poll_fn};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use bytes::BytesMut;
use futures_core::Stream;
use futures_util::{Sink, SinkExt};
use mapi_protocol::MAX_BLOCK_SIZE;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf, ReadHalf, WriteHalf};
use tokio::time::Sleep;

use crate::block_codec::Block;
use crate::error::CodecError;
use crate::framed::{BlockReader, BlockWriter};
use crate::message::MessageBuffer;

/// A MAPI connection stream with split I/O.
pub struct MapiStream<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Read half wrapped in a block reader.
    reader: BlockReader<ReadHalf<T>>,
    /// Write half wrapped in a block writer.
    writer: BlockWriter<WriteHalf<T>>,
    /// Reassembled inbound bytes.
    inbound: MessageBuffer,
    /// Outbound bytes not yet sent as a block.
    outbound: BytesMut,
    /// The final block was handed to the writer but not yet flushed.
    final_queued: bool,
    read_timeout: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl<T> MapiStream<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Create a new stream from a transport.
    ///
    /// The transport is immediately split into read and write halves.
    pub fn new(transport: T) -> Self {
        let (read_half, write_half) = tokio::io::split(transport);

        Self {
            reader: BlockReader::new(read_half),
            writer: BlockWriter::new(write_half),
            inbound: MessageBuffer::new(),
            outbound: BytesMut::with_capacity(MAX_BLOCK_SIZE),
            final_queued: false,
            read_timeout: None,
            deadline: None,
        }
    }

    /// Set the maximum time to wait for each inbound block.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
        self.deadline = None;
    }

    /// The configured per-block read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Whether the final block of the most recent inbound message was read.
    #[must_use]
    pub fn is_message_complete(&self) -> bool {
        self.inbound.is_complete()
    }

    /// Whether reassembled bytes are waiting to be read.
    #[must_use]
    pub fn has_buffered_input(&self) -> bool {
        !self.inbound.is_empty()
    }

    /// Number of outbound bytes waiting for the next block.
    #[must_use]
    pub fn buffered_output(&self) -> usize {
        self.outbound.len()
    }

    fn poll_next_block(&mut self, cx: &mut Context<'_>) -> Poll<Result<Option<Block>, CodecError>> {
        match Pin::new(&mut self.reader).poll_next(cx) {
            Poll::Ready(item) => {
                self.deadline = None;
                Poll::Ready(item.transpose())
            }
            Poll::Pending => {
                if let Some(timeout) = self.read_timeout {
                    let deadline = self
                        .deadline
                        .get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
                    if deadline.as_mut().poll(cx).is_ready() {
                        self.deadline = None;
                        return Poll::Ready(Err(CodecError::Timeout(timeout)));
                    }
                }
                Poll::Pending
            }
        }
    }

    /// Read one more block into the message buffer.
    ///
    /// Resolves to `false` on a clean end of stream between messages.
    fn poll_fill(&mut self, cx: &mut Context<'_>) -> Poll<Result<bool, CodecError>> {
        match ready!(self.poll_next_block(cx))? {
            Some(block) => {
                self.inbound.push(block);
                Poll::Ready(Ok(true))
            }
            None if self.inbound.is_complete() => Poll::Ready(Ok(false)),
            None => Poll::Ready(Err(CodecError::ConnectionClosed)),
        }
    }

    /// Send the outbound buffer as a non-final block if it is full.
    fn poll_emit_full(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), CodecError>> {
        if self.outbound.len() < MAX_BLOCK_SIZE {
            return Poll::Ready(Ok(()));
        }

        ready!(Pin::new(&mut self.writer).poll_ready(cx))?;
        let payload = self.outbound.split().freeze();
        Pin::new(&mut self.writer).start_send(Block::new(payload, false))?;
        Poll::Ready(Ok(()))
    }

    fn poll_buffer(
        &mut self,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<Result<usize, CodecError>> {
        ready!(self.poll_emit_full(cx))?;

        let room = MAX_BLOCK_SIZE - self.outbound.len();
        let n = room.min(data.len());
        self.outbound.extend_from_slice(&data[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush_message(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), CodecError>> {
        if !self.final_queued {
            ready!(self.poll_emit_full(cx))?;
            ready!(Pin::new(&mut self.writer).poll_ready(cx))?;
            let payload = self.outbound.split().freeze();
            Pin::new(&mut self.writer).start_send(Block::new(payload, true))?;
            self.final_queued = true;
        }

        let result = ready!(Pin::new(&mut self.writer).poll_flush(cx));
        self.final_queued = false;
        Poll::Ready(result)
    }

    /// Read the next line, without its trailing newline.
    ///
    /// Returns `None` when the transport ends cleanly between messages. An end
    /// of stream inside a message is [`CodecError::ConnectionClosed`].
    pub async fn read_line(&mut self) -> Result<Option<String>, CodecError> {
        loop {
            if let Some(line) = self.inbound.next_line() {
                tracing::trace!(line = %line, "read line");
                return Ok(Some(line));
            }

            if !poll_fn(|cx| self.poll_fill(cx)).await? {
                self.inbound.clear();
                return Ok(None);
            }
        }
    }

    /// Discard the rest of the current inbound message.
    ///
    /// If nothing of the next message has been read yet, that whole message
    /// is awaited and discarded.
    pub async fn skip_message(&mut self) -> Result<(), CodecError> {
        let started = !self.inbound.is_empty() || !self.inbound.is_complete();
        self.inbound.clear();

        if started && self.inbound.is_complete() {
            return Ok(());
        }

        let mut skipped = 0usize;
        loop {
            match poll_fn(|cx| self.poll_next_block(cx)).await? {
                Some(block) => {
                    skipped += block.len();
                    let last = block.last;
                    self.inbound.push(block);
                    self.inbound.clear();
                    if last {
                        tracing::debug!(bytes = skipped, "skipped unread message");
                        return Ok(());
                    }
                }
                None => return Err(CodecError::ConnectionClosed),
            }
        }
    }

    /// Buffer bytes for the current outbound message.
    ///
    /// Full blocks are sent as they fill up; nothing marks the message as
    /// finished until [`flush_message`](Self::flush_message).
    pub async fn write_bytes(&mut self, mut data: &[u8]) -> Result<(), CodecError> {
        while !data.is_empty() {
            let n = poll_fn(|cx| self.poll_buffer(cx, data)).await?;
            data = &data[n..];
        }
        Ok(())
    }

    /// Buffer a line followed by `\n`.
    pub async fn write_line(&mut self, line: &str) -> Result<(), CodecError> {
        self.write_bytes(line.as_bytes()).await?;
        self.write_bytes(b"\n").await
    }

    /// Send the buffered bytes as the final block of the message.
    pub async fn flush_message(&mut self) -> Result<(), CodecError> {
        poll_fn(|cx| self.poll_flush_message(cx)).await
    }

    /// Flush pending blocks and shut down the write half.
    pub async fn close(&mut self) -> Result<(), CodecError> {
        self.writer.close().await
    }
}

impl<T> MapiStream<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Reunite the halves and return the transport.
    ///
    /// Buffered bytes in either direction are dropped.
    pub fn into_inner(self) -> T {
        self.reader.into_inner().unsplit(self.writer.into_inner())
    }
}

impl<T> AsyncRead for MapiStream<T>
where
    T: AsyncRead + AsyncWrite,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        while this.inbound.is_empty() {
            match ready!(this.poll_fill(cx)) {
                Ok(true) => {}
                Ok(false) => return Poll::Ready(Ok(())),
                Err(e) => return Poll::Ready(Err(e.into())),
            }
        }

        let chunk = this.inbound.take(buf.remaining());
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

impl<T> AsyncWrite for MapiStream<T>
where
    T: AsyncRead + AsyncWrite,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.get_mut().poll_buffer(cx, buf).map_err(Into::into)
    }

    /// Ends the current message: the buffer goes out as the final block.
    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().poll_flush_message(cx).map_err(Into::into)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().writer)
            .poll_close(cx)
            .map_err(Into::into)
    }
}

impl<T> std::fmt::Debug for MapiStream<T>
where
    T: AsyncRead + AsyncWrite,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapiStream")
            .field("buffered_input", &self.inbound.len())
            .field("message_complete", &self.inbound.is_complete())
            .field("buffered_output", &self.outbound.len())
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    fn pair() -> (MapiStream<DuplexStream>, MapiStream<DuplexStream>) {
        let (a, b) = tokio::io::duplex(256 * 1024);
        (MapiStream::new(a), MapiStream::new(b))
    }

    #[tokio::test]
    async fn test_lines_roundtrip() {
        let (mut client, mut server) = pair();

        client.write_line("sSELECT 1;").await.unwrap();
        client.write_bytes(b"no newline").await.unwrap();
        client.flush_message().await.unwrap();

        assert_eq!(server.read_line().await.unwrap().unwrap(), "sSELECT 1;");
        assert_eq!(server.read_line().await.unwrap().unwrap(), "no newline");
        assert_eq!(server.read_line().await.unwrap().unwrap(), ".");
        assert!(server.is_message_complete());
    }

    #[tokio::test]
    async fn test_exact_block_boundary() {
        let (a, b) = tokio::io::duplex(256 * 1024);
        let mut client = MapiStream::new(a);
        let mut raw = BlockReader::new(b);

        client.write_bytes(&vec![b'x'; MAX_BLOCK_SIZE]).await.unwrap();
        client.flush_message().await.unwrap();

        let first = raw.next().await.unwrap().unwrap();
        assert_eq!(first.len(), MAX_BLOCK_SIZE);
        assert!(!first.last);

        let second = raw.next().await.unwrap().unwrap();
        assert!(second.is_empty());
        assert!(second.last);
    }

    #[tokio::test]
    async fn test_large_message_is_split() {
        let (a, b) = tokio::io::duplex(256 * 1024);
        let mut client = MapiStream::new(a);
        let mut raw = BlockReader::new(b);

        client.write_bytes(&vec![b'y'; 70_000]).await.unwrap();
        client.flush_message().await.unwrap();

        let sizes: Vec<(usize, bool)> = vec![
            raw.next().await.unwrap().unwrap(),
            raw.next().await.unwrap().unwrap(),
            raw.next().await.unwrap().unwrap(),
        ]
        .into_iter()
        .map(|b| (b.len(), b.last))
        .collect();

        assert_eq!(
            sizes,
            vec![(MAX_BLOCK_SIZE, false), (MAX_BLOCK_SIZE, false), (4466, true)]
        );
    }

    #[tokio::test]
    async fn test_empty_flush_sends_empty_final_block() {
        let (mut client, mut server) = pair();

        client.flush_message().await.unwrap();

        assert_eq!(server.read_line().await.unwrap().unwrap(), ".");
    }

    #[tokio::test]
    async fn test_partial_transport_reads() {
        let (mut raw, b) = tokio::io::duplex(1);
        let mut server = MapiStream::new(b);

        let writer = tokio::spawn(async move {
            // length 6, last: "&4 t\n" plus one more byte
            let bytes = [0x0D, 0x00, b'&', b'4', b' ', b't', b'\n', b'#'];
            for byte in bytes {
                raw.write_all(&[byte]).await.unwrap();
            }
            raw
        });

        assert_eq!(server.read_line().await.unwrap().unwrap(), "&4 t");
        assert_eq!(server.read_line().await.unwrap().unwrap(), "#");
        assert_eq!(server.read_line().await.unwrap().unwrap(), ".");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_eof_inside_message() {
        let (mut raw, b) = tokio::io::duplex(1024);
        let mut server = MapiStream::new(b);

        raw.write_all(&[0x06, 0x00, b'a', b'b', b'c']).await.unwrap();
        drop(raw);

        let err = server.read_line().await.unwrap_err();
        assert!(matches!(err, CodecError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_truncated_header() {
        let (mut raw, b) = tokio::io::duplex(1024);
        let mut server = MapiStream::new(b);

        raw.write_all(&[0x07]).await.unwrap();
        drop(raw);

        let err = server.read_line().await.unwrap_err();
        assert!(matches!(err, CodecError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_clean_eof_between_messages() {
        let (a, b) = tokio::io::duplex(1024);
        let mut server = MapiStream::new(b);
        drop(a);

        assert!(server.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_skip_message() {
        let (mut client, mut server) = pair();

        client.write_bytes(b"[ 1 ]\n[ 2 ]\n").await.unwrap();
        client.flush_message().await.unwrap();
        client.write_line("&4 f").await.unwrap();
        client.flush_message().await.unwrap();

        assert_eq!(server.read_line().await.unwrap().unwrap(), "[ 1 ]");
        server.skip_message().await.unwrap();
        assert_eq!(server.read_line().await.unwrap().unwrap(), "&4 f");
    }

    #[tokio::test]
    async fn test_skip_unstarted_message() {
        let (mut client, mut server) = pair();

        client.write_line("&2 1 -1").await.unwrap();
        client.flush_message().await.unwrap();
        client.write_line("&4 t").await.unwrap();
        client.flush_message().await.unwrap();

        server.skip_message().await.unwrap();
        assert_eq!(server.read_line().await.unwrap().unwrap(), "&4 t");
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let (_client, b) = tokio::io::duplex(1024);
        let mut server = MapiStream::new(b);
        server.set_read_timeout(Some(Duration::from_millis(20)));

        let err = server.read_line().await.unwrap_err();
        assert!(matches!(err, CodecError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_async_read_write_traits() {
        let (mut client, mut server) = pair();

        client.write_all(b"abc").await.unwrap();
        client.flush().await.unwrap();
        client.shutdown().await.unwrap();

        let mut out = Vec::new();
        server.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abc\n.\n");
    }

    #[tokio::test]
    async fn test_into_inner() {
        let (a, _b) = tokio::io::duplex(16);
        let stream = MapiStream::new(a);
        let _transport: DuplexStream = stream.into_inner();
    }
}
