//! Hash algorithms used to protect the password on the wire.

use std::fmt;

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

/// Algorithm preference for protocol version 8.
pub const V8_PREFERENCE: &[HashAlgorithm] =
    &[HashAlgorithm::Sha1, HashAlgorithm::Md5, HashAlgorithm::Plain];

/// Algorithm preference for protocol version 9. There is no plain fallback.
pub const V9_PREFERENCE: &[HashAlgorithm] = &[
    HashAlgorithm::Sha512,
    HashAlgorithm::Sha384,
    HashAlgorithm::Sha256,
    HashAlgorithm::Sha1,
    HashAlgorithm::Md5,
];

/// A password hashing scheme known to MonetDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// Password sent in clear, followed by the salt.
    Plain,
    /// MD5
    Md5,
    /// SHA-1
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl HashAlgorithm {
    /// Look up an algorithm by the name the server uses (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        [
            Self::Plain,
            Self::Md5,
            Self::Sha1,
            Self::Sha224,
            Self::Sha256,
            Self::Sha384,
            Self::Sha512,
        ]
        .into_iter()
        .find(|alg| alg.name().eq_ignore_ascii_case(name))
    }

    /// The name used in challenges and responses.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA1",
            Self::Sha224 => "SHA224",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
        }
    }

    /// The `{NAME}` prefix of a hashed password.
    #[must_use]
    pub fn tag(self) -> String {
        format!("{{{}}}", self.name())
    }

    /// Digest the chunks as one continuous input.
    ///
    /// Returns `None` for [`HashAlgorithm::Plain`], which has no digest.
    #[must_use]
    pub fn digest(self, chunks: &[&[u8]]) -> Option<Vec<u8>> {
        match self {
            Self::Plain => None,
            Self::Md5 => Some(digest_chunks::<Md5>(chunks)),
            Self::Sha1 => Some(digest_chunks::<Sha1>(chunks)),
            Self::Sha224 => Some(digest_chunks::<Sha224>(chunks)),
            Self::Sha256 => Some(digest_chunks::<Sha256>(chunks)),
            Self::Sha384 => Some(digest_chunks::<Sha384>(chunks)),
            Self::Sha512 => Some(digest_chunks::<Sha512>(chunks)),
        }
    }

    /// Pick the first algorithm of `preference` that appears in `offered`.
    ///
    /// `offered` is a comma separated list; empty entries are ignored. The
    /// order of `offered` never matters.
    #[must_use]
    pub fn negotiate(preference: &[Self], offered: &str) -> Option<Self> {
        let offered: Vec<&str> = offered
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();

        preference.iter().copied().find(|alg| {
            offered
                .iter()
                .any(|name| name.eq_ignore_ascii_case(alg.name()))
        })
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn digest_chunks<D: Digest>(chunks: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize().to_vec()
}
