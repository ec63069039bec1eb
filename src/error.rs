//! Error types for flagperm

use thiserror::Error;

use crate::flag::Flag;
use crate::holder::HolderKey;

/// Which grammar a rejected string was checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Flag,
    StrictFlag,
    ObjectId,
    DiscordId,
}

impl Grammar {
    fn label(self) -> &'static str {
        match self {
            Grammar::Flag => "Invalid permission flag",
            Grammar::StrictFlag => "Invalid strict permission flag",
            Grammar::ObjectId => "Invalid objectId",
            Grammar::DiscordId => "Invalid discordId",
        }
    }
}

impl std::fmt::Display for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The main error type for flagperm operations
#[derive(Debug, Clone, Error)]
pub enum PermError {
    /// Input does not match the flag, strict flag or id grammar
    #[error("{kind} \"{value}\"")]
    Grammar { kind: Grammar, value: String },

    /// Structurally invalid request, raised before any state is touched
    #[error("{0}")]
    Check(String),

    /// The holder repository has no record of the holder
    #[error("Holder not found: {0}")]
    NotFound(HolderKey),

    /// At least one required flag did not pass a complete evaluation
    #[error("Missing permissions: {}", join_flags(.failed))]
    Permission { failed: Vec<Flag> },

    /// Persistence layer failure, propagated untouched
    #[error("Store error: {0}")]
    Store(String),
}

impl PermError {
    pub(crate) fn grammar(kind: Grammar, value: &str) -> Self {
        PermError::Grammar { kind, value: value.to_string() }
    }

    /// Flags that failed, when this is a permission error
    pub fn failed(&self) -> &[Flag] {
        match self {
            PermError::Permission { failed } => failed,
            _ => &[],
        }
    }
}

fn join_flags(flags: &[Flag]) -> String {
    flags.iter().map(Flag::as_str).collect::<Vec<_>>().join(", ")
}

/// Result type alias for flagperm operations
pub type Result<T> = std::result::Result<T, PermError>;

/// Convert any store-layer error to PermError
pub fn err<E: std::error::Error>(e: E) -> PermError {
    PermError::Store(e.to_string())
}
