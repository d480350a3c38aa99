//! Server challenge parsing.
//!
//! The first line a MonetDB server sends is a colon separated challenge:
//!
//! ```text
//! salt:serverType:protocolVersion:hashAlgorithms[:byteOrder[:passwordHashAlgorithm]]
//! ```

use crate::error::ProtocolError;

/// A challenge with this many tokens or fewer is rejected outright.
pub const MIN_CHALLENGE_TOKENS: usize = 5;

/// A parsed server challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    raw: String,
    tokens: Vec<String>,
    version: u32,
}

impl Challenge {
    /// Parse a challenge line.
    ///
    /// Fails when the line carries fewer than five tokens or when the
    /// protocol version token is not a number. Whether the version is
    /// actually supported is decided by the authentication layer.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let tokens: Vec<String> = line.split(':').map(str::to_owned).collect();

        if tokens.len() < MIN_CHALLENGE_TOKENS {
            return Err(ProtocolError::TooFewTokens(line.to_owned()));
        }

        let version = tokens[2]
            .trim()
            .parse::<u32>()
            .map_err(|_| ProtocolError::UnknownProtocol(tokens[2].clone()))?;

        Ok(Self {
            raw: line.to_owned(),
            tokens,
            version,
        })
    }

    /// The challenge line as received.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// All colon separated tokens.
    #[must_use]
    pub fn tokens(&self) -> Vec<&str> {
        self.tokens.iter().map(String::as_str).collect()
    }

    /// The numeric protocol version (token 2).
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The salt (token 0).
    #[must_use]
    pub fn salt(&self) -> &str {
        &self.tokens[0]
    }

    /// The server type (token 1), `monetdb` or `merovingian`.
    #[must_use]
    pub fn server_type(&self) -> &str {
        &self.tokens[1]
    }

    /// Comma separated hash algorithms the server accepts (token 3).
    #[must_use]
    pub fn hashes(&self) -> &str {
        &self.tokens[3]
    }

    /// Server byte order (token 4).
    #[must_use]
    pub fn byte_order(&self) -> &str {
        &self.tokens[4]
    }

    /// Algorithm used to pre-hash the password (token 5), if present.
    #[must_use]
    pub fn password_hash(&self) -> Option<&str> {
        self.tokens.get(5).map(String::as_str)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_v9_challenge() {
        let challenge =
            Challenge::parse("Yh7t8dvd:mserver:9:RIPEMD160,SHA256,SHA1,MD5:LIT:SHA512:").unwrap();

        assert_eq!(challenge.salt(), "Yh7t8dvd");
        assert_eq!(challenge.server_type(), "mserver");
        assert_eq!(challenge.version(), 9);
        assert_eq!(challenge.hashes(), "RIPEMD160,SHA256,SHA1,MD5");
        assert_eq!(challenge.byte_order(), "LIT");
        assert_eq!(challenge.password_hash(), Some("SHA512"));
        assert_eq!(challenge.tokens().len(), 7);
    }

    #[test]
    fn test_parse_v8_challenge() {
        let challenge = Challenge::parse("abc:merovingian:8:plain:LIT").unwrap();
        assert_eq!(challenge.version(), 8);
        assert_eq!(challenge.password_hash(), None);
    }

    #[test]
    fn test_too_few_tokens() {
        let err = Challenge::parse("abc:monetdb:9:SHA1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Server challenge unusable! Challenge contains too few tokens: abc:monetdb:9:SHA1"
        );
    }

    #[test]
    fn test_unknown_protocol() {
        let err = Challenge::parse("abc:monetdb:nine:SHA1:LIT").unwrap_err();
        assert_eq!(err, ProtocolError::UnknownProtocol("nine".into()));
        assert_eq!(err.to_string(), "Unknown Mapi protocol nine");
    }
}
