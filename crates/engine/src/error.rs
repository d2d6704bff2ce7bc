//! The module contains the error the engine can throw.
//!
//! User-facing kinds:
//!
//! - [`InvalidAmount`] for cents outside the safe range or non-positive totals.
//! - [`InvalidFormat`] for malformed decimal strings.
//! - [`InvalidPercent`] for percent splits that cannot be honored exactly.
//! - [`InvalidInput`] for everything else a request got wrong.
//! - [`UnknownMember`] for references to members outside the group.
//! - [`VersionConflict`] when a guarded expense write loses the race.
//!
//! [`UnbalancedLedger`] is different: it marks a broken invariant upstream
//! (for example a corrupted persisted row), never a caller mistake.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidFormat`]: EngineError::InvalidFormat
//!  [`InvalidPercent`]: EngineError::InvalidPercent
//!  [`InvalidInput`]: EngineError::InvalidInput
//!  [`UnknownMember`]: EngineError::UnknownMember
//!  [`VersionConflict`]: EngineError::VersionConflict
//!  [`UnbalancedLedger`]: EngineError::UnbalancedLedger
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Invalid percent: {0}")]
    InvalidPercent(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unknown member: {0}")]
    UnknownMember(String),
    #[error("Version conflict: {0}")]
    VersionConflict(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Unbalanced ledger: {0}")]
    UnbalancedLedger(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidFormat(a), Self::InvalidFormat(b)) => a == b,
            (Self::InvalidPercent(a), Self::InvalidPercent(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::UnknownMember(a), Self::UnknownMember(b)) => a == b,
            (Self::VersionConflict(a), Self::VersionConflict(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::UnbalancedLedger(a), Self::UnbalancedLedger(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
