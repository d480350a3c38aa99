//! Line sigils of the MAPI response stream.

/// The line the block reader appends after the last block of every message.
pub const PROMPT_LINE: &str = ".";

/// Kind of a response line, identified by its first character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineType {
    /// `!` server error.
    Error,
    /// `%` column metadata.
    Header,
    /// `&` result set header.
    ResultHeader,
    /// `[` tuple (row) data.
    Tuple,
    /// `.` end of message / prompt.
    Prompt,
    /// `^` redirect.
    Redirect,
    /// `#` informational message.
    Info,
    /// `,` continuation prompt.
    More,
    /// Any other line, including the empty line.
    Unknown,
}

impl LineType {
    /// Classify a line by its leading sigil.
    #[must_use]
    pub fn from_line(line: &str) -> Self {
        match line.as_bytes().first() {
            Some(b'!') => Self::Error,
            Some(b'%') => Self::Header,
            Some(b'&') => Self::ResultHeader,
            Some(b'[') => Self::Tuple,
            Some(b'.') => Self::Prompt,
            Some(b'^') => Self::Redirect,
            Some(b'#') => Self::Info,
            Some(b',') => Self::More,
            _ => Self::Unknown,
        }
    }

    /// The sigil byte of this line type.
    #[must_use]
    pub const fn sigil(self) -> Option<u8> {
        match self {
            Self::Error => Some(b'!'),
            Self::Header => Some(b'%'),
            Self::ResultHeader => Some(b'&'),
            Self::Tuple => Some(b'['),
            Self::Prompt => Some(b'.'),
            Self::Redirect => Some(b'^'),
            Self::Info => Some(b'#'),
            Self::More => Some(b','),
            Self::Unknown => None,
        }
    }
}
