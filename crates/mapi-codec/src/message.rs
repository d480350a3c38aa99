//! Logical message reassembly.
//!
//! Blocks of one logical message are appended to a single buffer. When the
//! last block arrives the buffer is terminated with the prompt line, so line
//! based readers always see a `.` line at the end of every message.

use bytes::{Bytes, BytesMut};
use mapi_protocol::MAX_BLOCK_SIZE;

use crate::block_codec::Block;

const PROMPT_SUFFIX: &[u8] = b".\n";

/// Buffer that reassembles blocks into a logical byte stream.
#[derive(Debug)]
pub struct MessageBuffer {
    buffer: BytesMut,
    complete: bool,
    blocks: usize,
    last_byte: Option<u8>,
}

impl MessageBuffer {
    /// Create an empty buffer. No message is in progress.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(MAX_BLOCK_SIZE + 3),
            complete: true,
            blocks: 0,
            last_byte: None,
        }
    }

    /// Append a decoded block.
    pub fn push(&mut self, block: Block) {
        if self.complete {
            self.blocks = 0;
            self.last_byte = None;
        }
        self.blocks += 1;
        if let Some(&byte) = block.payload.last() {
            self.last_byte = Some(byte);
        }
        self.buffer.extend_from_slice(&block.payload);
        self.complete = block.last;

        if block.last {
            // The newline check covers the whole message, since the final
            // block may be empty.
            if self.last_byte.is_some_and(|b| b != b'\n') {
                self.buffer.extend_from_slice(b"\n");
            }
            self.buffer.extend_from_slice(PROMPT_SUFFIX);

            tracing::trace!(blocks = self.blocks, "logical message complete");
        }
    }

    /// Whether the final block of the current message has been received.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether all received bytes have been read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Take up to `max` unread bytes.
    pub fn take(&mut self, max: usize) -> Bytes {
        let n = max.min(self.buffer.len());
        self.buffer.split_to(n).freeze()
    }

    /// Take the next complete line, without its trailing newline.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line = self.buffer.split_to(pos + 1);
        Some(String::from_utf8_lossy(&line[..pos]).into_owned())
    }

    /// Drop all unread bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn drain_lines(buffer: &mut MessageBuffer) -> Vec<String> {
        std::iter::from_fn(|| buffer.next_line()).collect()
    }

    #[test]
    fn test_single_block_message() {
        let mut buffer = MessageBuffer::new();
        buffer.push(Block::new(&b"&1 0 1 1 1\n[ 1\t]\n"[..], true));

        assert!(buffer.is_complete());
        assert_eq!(drain_lines(&mut buffer), vec!["&1 0 1 1 1", "[ 1\t]", "."]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_newline_appended_when_missing() {
        let mut buffer = MessageBuffer::new();
        buffer.push(Block::new(&b"salt:mserver:9:SHA1:LIT:SHA512:"[..], true));

        assert_eq!(
            drain_lines(&mut buffer),
            vec!["salt:mserver:9:SHA1:LIT:SHA512:", "."]
        );
    }

    #[test]
    fn test_empty_final_block() {
        let mut buffer = MessageBuffer::new();
        buffer.push(Block::new(Bytes::new(), true));

        assert_eq!(drain_lines(&mut buffer), vec!["."]);
    }

    #[test]
    fn test_empty_final_block_after_unterminated_data() {
        let mut buffer = MessageBuffer::new();
        buffer.push(Block::new(&b"aaa"[..], false));
        buffer.push(Block::new(Bytes::new(), true));

        assert_eq!(drain_lines(&mut buffer), vec!["aaa", "."]);
    }

    #[test]
    fn test_empty_final_block_after_terminated_data() {
        let mut buffer = MessageBuffer::new();
        buffer.push(Block::new(&b"aaa\n"[..], false));
        buffer.push(Block::new(Bytes::new(), true));
        assert_eq!(drain_lines(&mut buffer), vec!["aaa", "."]);

        // A new message does not inherit the previous last byte.
        buffer.push(Block::new(Bytes::new(), true));
        assert_eq!(drain_lines(&mut buffer), vec!["."]);
    }

    #[test]
    fn test_line_spanning_blocks() {
        let mut buffer = MessageBuffer::new();
        buffer.push(Block::new(&b"[ 1,\t"[..], false));
        assert!(!buffer.is_complete());
        assert_eq!(buffer.next_line(), None);

        buffer.push(Block::new(&b"2\t]\n"[..], true));
        assert_eq!(drain_lines(&mut buffer), vec!["[ 1,\t2\t]", "."]);
    }

    #[test]
    fn test_take_partial() {
        let mut buffer = MessageBuffer::new();
        buffer.push(Block::new(&b"abc\n"[..], true));

        assert_eq!(&buffer.take(2)[..], b"ab");
        assert_eq!(&buffer.take(100)[..], b"c\n.\n");
        assert!(buffer.take(10).is_empty());
    }
}
