//! Framed block halves for async I/O.
//!
//! - `BlockReader<T>` - Read-only stream of decoded blocks
//! - `BlockWriter<T>` - Write-only sink of blocks
//!
//! `MapiStream` splits its transport and drives one of each.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::BytesMut;
use futures_core::Stream;
use futures_util::Sink;
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::block_codec::{Block, BlockCodec};
use crate::error::CodecError;

pin_project! {
    /// A read-only block stream over the read half of a transport.
    pub struct BlockReader<T> {
        #[pin]
        inner: FramedRead<T, BlockCodec>,
    }
}

impl<T> BlockReader<T>
where
    T: AsyncRead,
{
    /// Create a new block reader over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            inner: FramedRead::new(transport, BlockCodec::new()),
        }
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Get a reference to the read buffer.
    pub fn read_buffer(&self) -> &BytesMut {
        self.inner.read_buffer()
    }

    /// Consume the reader and return the underlying transport.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T> Stream for BlockReader<T>
where
    T: AsyncRead + Unpin,
{
    type Item = Result<Block, CodecError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

impl<T> std::fmt::Debug for BlockReader<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockReader")
            .field("transport", self.inner.get_ref())
            .field("buffered", &self.inner.read_buffer().len())
            .finish()
    }
}

pin_project! {
    /// A write-only block sink over the write half of a transport.
    pub struct BlockWriter<T> {
        #[pin]
        inner: FramedWrite<T, BlockCodec>,
    }
}

impl<T> BlockWriter<T>
where
    T: AsyncWrite,
{
    /// Create a new block writer over the given transport.
    pub fn new(transport: T) -> Self {
        Self {
            inner: FramedWrite::new(transport, BlockCodec::new()),
        }
    }

    /// Get a reference to the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.inner.get_ref()
    }

    /// Consume the writer and return the underlying transport.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T> Sink<Block> for BlockWriter<T>
where
    T: AsyncWrite + Unpin,
{
    type Error = CodecError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Block) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}

impl<T> std::fmt::Debug for BlockWriter<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockWriter")
            .field("transport", self.inner.get_ref())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};

    #[tokio::test]
    async fn test_blocks_across_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut writer = BlockWriter::new(client);
        let mut reader = BlockReader::new(server);

        writer.send(Block::new(&b"hello "[..], false)).await.unwrap();
        writer.send(Block::new(&b"world"[..], true)).await.unwrap();

        let first = reader.next().await.unwrap().unwrap();
        assert!(!first.last);
        assert_eq!(&first.payload[..], b"hello ");

        let second = reader.next().await.unwrap().unwrap();
        assert!(second.last);
        assert_eq!(&second.payload[..], b"world");
    }

    #[tokio::test]
    async fn test_reader_ends_cleanly() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);

        let mut reader = BlockReader::new(server);
        assert!(reader.next().await.is_none());
    }
}
