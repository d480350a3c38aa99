//! Protocol version strategies for answering a challenge.

use std::borrow::Cow;

use crate::credentials::{Credentials, MEROVINGIAN};
use crate::error::AuthError;
use crate::hash::{HashAlgorithm, V8_PREFERENCE, V9_PREFERENCE};

/// Language used when none is requested.
pub const DEFAULT_LANGUAGE: &str = "sql";

/// Language that talks to the monitor itself and skips merovingian masking.
pub const CONTROL_LANGUAGE: &str = "control";

/// Everything the client contributes to a challenge response.
#[derive(Debug, Clone)]
pub struct ResponseParams {
    /// User credentials.
    pub credentials: Credentials,
    /// Query language, normally `sql`.
    pub language: Cow<'static, str>,
    /// Database name.
    pub database: String,
    /// Comma separated list of algorithms that replaces the server's list.
    pub hash: Option<String>,
}

impl ResponseParams {
    /// Parameters for an SQL session on `database`.
    pub fn new(credentials: Credentials, database: impl Into<String>) -> Self {
        Self {
            credentials,
            language: Cow::Borrowed(DEFAULT_LANGUAGE),
            database: database.into(),
            hash: None,
        }
    }

    /// Use a different query language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<Cow<'static, str>>) -> Self {
        self.language = language.into();
        self
    }

    /// Restrict negotiation to the given algorithms.
    #[must_use]
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Whether the server is a merovingian monitor that gets fixed credentials.
    fn is_masked(&self, server_type: &str) -> bool {
        let masked = server_type == MEROVINGIAN && self.language != CONTROL_LANGUAGE;
        if masked {
            tracing::debug!("server is a merovingian monitor, masking credentials");
        }
        masked
    }

    /// The override list if set, otherwise what the server offered.
    fn candidates<'a>(&'a self, offered: &'a str) -> &'a str {
        self.hash.as_deref().unwrap_or(offered)
    }
}

/// A challenge/response protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ProtocolVersion {
    /// Single hashing, uppercase hex, `plain` allowed.
    V8,
    /// Password pre-hashed by a server chosen algorithm.
    V9,
}

impl ProtocolVersion {
    /// Look up the strategy for the version number in a challenge.
    pub fn from_number(number: u32) -> Result<Self, AuthError> {
        match number {
            8 => Ok(Self::V8),
            9 => Ok(Self::V9),
            other => Err(AuthError::UnsupportedVersion(other)),
        }
    }

    /// The version number.
    #[must_use]
    pub const fn number(self) -> u32 {
        match self {
            Self::V8 => 8,
            Self::V9 => 9,
        }
    }

    /// Challenge tokens required by this version.
    #[must_use]
    pub const fn minimum_tokens(self) -> usize {
        match self {
            Self::V8 => 5,
            Self::V9 => 6,
        }
    }

    /// Build the response line for a challenge split on `:`.
    ///
    /// Token layout: salt, server type, version, hashes, byte order and,
    /// from version 9 on, the password pre-hash algorithm.
    pub fn build_response<S: AsRef<str>>(
        self,
        params: &ResponseParams,
        tokens: &[S],
    ) -> Result<String, AuthError> {
        let minimum = self.minimum_tokens();
        if tokens.len() < minimum {
            return Err(AuthError::TooFewTokens {
                minimum,
                actual: tokens.len(),
            });
        }

        let salt = tokens[0].as_ref();
        let server_type = tokens[1].as_ref();
        let offered = tokens[3].as_ref();

        match self {
            Self::V8 => v8_response(params, salt, server_type, offered),
            Self::V9 => v9_response(params, salt, server_type, offered, tokens[5].as_ref()),
        }
    }
}

fn v8_response(
    params: &ResponseParams,
    salt: &str,
    server_type: &str,
    offered: &str,
) -> Result<String, AuthError> {
    let credentials = if params.is_masked(server_type) {
        Credentials::merovingian()
    } else {
        params.credentials.clone()
    };
    let candidates = params.candidates(offered);
    let algorithm = HashAlgorithm::negotiate(V8_PREFERENCE, candidates)
        .ok_or_else(|| AuthError::NoSupportedHashes(candidates.to_string()))?;

    let salted = format!("{}{salt}", credentials.password());
    let pwhash = match algorithm.digest(&[salted.as_bytes()]) {
        Some(digest) => format!("{}{}", algorithm.tag(), hex::encode_upper(digest)),
        None => format!("{}{salted}", algorithm.tag()),
    };

    tracing::debug!(%algorithm, "answering v8 challenge");
    Ok(format!(
        "LIT:{}:{pwhash}:{}:{}:",
        credentials.username(),
        params.language,
        params.database
    ))
}

fn v9_response(
    params: &ResponseParams,
    salt: &str,
    server_type: &str,
    offered: &str,
    prehash_name: &str,
) -> Result<String, AuthError> {
    let prehash = HashAlgorithm::from_name(prehash_name)
        .filter(|alg| *alg != HashAlgorithm::Plain)
        .ok_or_else(|| AuthError::UnsupportedHash(prehash_name.to_string()))?;

    let hashed_password = prehash
        .digest(&[params.credentials.password().as_bytes()])
        .map(hex::encode)
        .ok_or_else(|| AuthError::UnsupportedHash(prehash_name.to_string()))?;
    // Masking replaces the already pre-hashed password with the literal.
    let credentials = if params.is_masked(server_type) {
        Credentials::merovingian()
    } else {
        Credentials::new(params.credentials.username().to_string(), hashed_password)
    };

    let candidates = params.candidates(offered);
    let algorithm = HashAlgorithm::negotiate(V9_PREFERENCE, candidates)
        .ok_or_else(|| AuthError::NoSupportedHashes(candidates.to_string()))?;
    let digest = algorithm
        .digest(&[credentials.password().as_bytes(), salt.as_bytes()])
        .map(hex::encode)
        .ok_or_else(|| AuthError::UnsupportedHash(algorithm.name().to_string()))?;

    tracing::debug!(%prehash, %algorithm, "answering v9 challenge");
    Ok(format!(
        "{}:{}:{}{digest}:{}:{}:",
        native_byte_order(),
        credentials.username(),
        algorithm.tag(),
        params.language,
        params.database
    ))
}

/// Byte order marker of the running platform.
#[must_use]
pub const fn native_byte_order() -> &'static str {
    if cfg!(target_endian = "little") {
        "LIT"
    } else {
        "BIG"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn params() -> ResponseParams {
        ResponseParams::new(Credentials::new("monetdb", "monetdb"), "demo")
    }

    #[test]
    fn test_from_number() {
        assert_eq!(ProtocolVersion::from_number(8).unwrap(), ProtocolVersion::V8);
        assert_eq!(ProtocolVersion::from_number(9).unwrap(), ProtocolVersion::V9);
        assert_eq!(
            ProtocolVersion::from_number(10),
            Err(AuthError::UnsupportedVersion(10))
        );
    }

    #[test]
    fn test_v8_merovingian_masking() {
        let tokens = ["abc", "merovingian", "8", "plain", "LIT", ""];
        let response = ProtocolVersion::V8
            .build_response(&params(), &tokens)
            .unwrap();
        assert_eq!(response, "LIT:merovingian:{plain}merovingianabc:sql:demo:");
    }

    #[test]
    fn test_v8_control_language_is_not_masked() {
        let tokens = ["abc", "merovingian", "8", "plain", "LIT"];
        let params = params().with_language("control");
        let response = ProtocolVersion::V8.build_response(&params, &tokens).unwrap();
        assert_eq!(response, "LIT:monetdb:{plain}monetdbabc:control:demo:");
    }

    #[test]
    fn test_v8_sha1_uppercase_hex() {
        let tokens = ["salt", "monetdb", "8", "MD5,SHA1", "BIG"];
        let response = ProtocolVersion::V8.build_response(&params(), &tokens).unwrap();

        let expected = hex::encode_upper(
            HashAlgorithm::Sha1
                .digest(&[b"monetdbsalt".as_slice()])
                .unwrap(),
        );
        assert_eq!(response, format!("LIT:monetdb:{{SHA1}}{expected}:sql:demo:"));
    }

    #[test]
    fn test_v8_override_replaces_server_list() {
        let tokens = ["salt", "monetdb", "8", "SHA1,MD5", "LIT"];
        let params = params().with_hash("plain");
        let response = ProtocolVersion::V8.build_response(&params, &tokens).unwrap();
        assert_eq!(response, "LIT:monetdb:{plain}monetdbsalt:sql:demo:");
    }

    #[test]
    fn test_v8_no_supported_hashes() {
        let tokens = ["salt", "monetdb", "8", "RIPEMD160,CRYPT", "LIT"];
        let err = ProtocolVersion::V8
            .build_response(&params(), &tokens)
            .unwrap_err();
        assert_eq!(err, AuthError::NoSupportedHashes("RIPEMD160,CRYPT".into()));
        assert!(err.to_string().contains("RIPEMD160,CRYPT"));
    }

    #[test]
    fn test_too_few_tokens() {
        let err = ProtocolVersion::V9
            .build_response(&params(), &["a", "b", "9", "SHA512", "LIT"])
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::TooFewTokens {
                minimum: 6,
                actual: 5
            }
        );
        assert!(err.to_string().contains('6'));
    }

    #[test]
    fn test_v9_double_hash() {
        let tokens = ["salt", "mserver", "9", "SHA512,SHA256", "LIT", "SHA512"];
        let response = ProtocolVersion::V9.build_response(&params(), &tokens).unwrap();

        let prehash = hex::encode(
            HashAlgorithm::Sha512
                .digest(&[b"monetdb".as_slice()])
                .unwrap(),
        );
        let outer = hex::encode(
            HashAlgorithm::Sha512
                .digest(&[prehash.as_bytes(), b"salt".as_slice()])
                .unwrap(),
        );
        assert_eq!(
            response,
            format!("{}:monetdb:{{SHA512}}{outer}:sql:demo:", native_byte_order())
        );
        assert!(!response.contains(":monetdb:{SHA512}monetdb"));
    }

    #[test]
    fn test_v9_tie_break_ignores_server_order() {
        let tokens = ["salt", "mserver", "9", "MD5,SHA1,SHA256", "LIT", "sha256"];
        let response = ProtocolVersion::V9.build_response(&params(), &tokens).unwrap();
        assert!(response.contains(":{SHA256}"));
    }

    #[test]
    fn test_v9_password_changes_response() {
        let tokens = ["salt", "mserver", "9", "SHA256", "LIT", "SHA256"];
        let a = ProtocolVersion::V9.build_response(&params(), &tokens).unwrap();
        let other = ResponseParams::new(Credentials::new("monetdb", "other"), "demo");
        let b = ProtocolVersion::V9.build_response(&other, &tokens).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_v9_rejects_plain_only() {
        let tokens = ["salt", "mserver", "9", "plain", "LIT", "SHA512"];
        let err = ProtocolVersion::V9
            .build_response(&params(), &tokens)
            .unwrap_err();
        assert_eq!(err, AuthError::NoSupportedHashes("plain".into()));
    }

    #[test]
    fn test_v9_unknown_prehash() {
        let tokens = ["salt", "mserver", "9", "SHA512", "LIT", "WHIRLPOOL"];
        let err = ProtocolVersion::V9
            .build_response(&params(), &tokens)
            .unwrap_err();
        assert_eq!(err, AuthError::UnsupportedHash("WHIRLPOOL".into()));
    }

    #[test]
    fn test_v9_merovingian_masks_after_prehash() {
        let tokens = ["salt", "merovingian", "9", "SHA1", "LIT", "SHA512"];
        let response = ProtocolVersion::V9.build_response(&params(), &tokens).unwrap();

        let outer = hex::encode(
            HashAlgorithm::Sha1
                .digest(&[b"merovingian".as_slice(), b"salt".as_slice()])
                .unwrap(),
        );
        assert!(response.ends_with(&format!(":merovingian:{{SHA1}}{outer}:sql:demo:")));
    }

    proptest! {
        #[test]
        fn v9_response_is_deterministic(
            password in "[a-zA-Z0-9]{0,24}",
            salt in "[a-zA-Z0-9]{1,16}",
        ) {
            let params = ResponseParams::new(Credentials::new("user", password), "db");
            let tokens = [salt.as_str(), "mserver", "9", "SHA512,SHA1", "LIT", "SHA512"];
            let a = ProtocolVersion::V9.build_response(&params, &tokens).unwrap();
            let b = ProtocolVersion::V9.build_response(&params, &tokens).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
