//! Failures at and behind the server boundary.
//!
//! Transport failures are transient and anonymous; move failures are
//! per-ticket, classified, and held in the ledger until the user dismisses
//! them.

use std::fmt;

use tacks_core::TicketId;

/// Failure talking to the board server.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never completed (connection failure, timeout, 5xx).
    #[error("request failed: {0}")]
    Request(String),
    /// The server answered with a body the client cannot interpret.
    #[error("malformed server response: {0}")]
    Malformed(String),
}

/// Why a move did not stick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The server rejected the move because the submitted change stamp no
    /// longer matched; somebody else edited the ticket first.
    StaleBase,
    /// The server rejected the move on its validation rules.
    Validation,
    /// The request itself failed; nothing was persisted.
    Transport,
    /// Rejected locally: the target is not among the ticket's permitted
    /// workflow transitions. Never reaches the network.
    NotAllowed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StaleBase => "stale base",
            Self::Validation => "validation",
            Self::Transport => "transport",
            Self::NotAllowed => "not allowed",
        })
    }
}

/// One ticket's move failure, as surfaced to the user.
#[derive(Debug, Clone, thiserror::Error)]
#[error("move of {ticket} failed ({kind}): {}", .messages.join("; "))]
pub struct MoveError {
    pub ticket: TicketId,
    pub kind: FailureKind,
    /// Server-provided messages, verbatim; empty for local rejections with
    /// a self-explanatory kind.
    pub messages: Vec<String>,
}
