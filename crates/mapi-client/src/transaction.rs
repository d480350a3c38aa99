//! Transaction support.

use crate::error::Error;

/// Transaction isolation level.
///
/// MonetDB runs every transaction with serializable isolation; the other
/// levels exist so callers can state their intent and get a clear error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Read uncommitted (dirty reads allowed).
    ReadUncommitted,

    /// Read committed.
    ReadCommitted,

    /// Repeatable read.
    RepeatableRead,

    /// Serializable, the only level MonetDB provides.
    #[default]
    Serializable,

    /// Snapshot isolation.
    Snapshot,
}

impl IsolationLevel {
    /// Get the isolation level name as used in SQL.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
            Self::Snapshot => "SNAPSHOT",
        }
    }

    /// Fail unless the server can honour this level.
    pub(crate) fn ensure_supported(self) -> Result<(), Error> {
        if self == Self::Serializable {
            Ok(())
        } else {
            Err(Error::Config(
                "Only Serializable isolation level is supported".into(),
            ))
        }
    }
}

/// SQL that starts a transaction.
pub(crate) const BEGIN: &str = "START TRANSACTION";

/// SQL that commits a transaction.
pub(crate) const COMMIT: &str = "COMMIT";

/// SQL that rolls a transaction back.
pub(crate) const ROLLBACK: &str = "ROLLBACK";
