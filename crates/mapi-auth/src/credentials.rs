//! Credential types for authentication.

use std::borrow::Cow;

/// Fixed identity expected by the merovingian monitor process.
pub const MEROVINGIAN: &str = "merovingian";

/// Username and password used to answer a challenge.
///
/// Credentials are designed to minimize copying of sensitive data.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: Cow<'static, str>,
    password: Cow<'static, str>,
}

impl Credentials {
    /// Create credentials from a username and password.
    pub fn new(
        username: impl Into<Cow<'static, str>>,
        password: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The credentials a merovingian proxy accepts.
    #[must_use]
    pub fn merovingian() -> Self {
        Self::new(MEROVINGIAN, MEROVINGIAN)
    }

    /// The username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose sensitive data in debug output
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
