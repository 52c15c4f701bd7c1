//! # Ledger Access
//!
//! [`LedgerClient`] is the seam between this crate and the network. Every
//! read and every submission goes through it, so the rest of the client can
//! run unchanged against a real cluster ([`HttpLedger`]) or an in-process
//! one ([`MemoryLedger`]).
//!
//! ## Architecture
//!
//! ```text
//! mod.rs:    LedgerClient trait, Commitment, AccountInfo, LedgerError
//! types.rs:  JSON-RPC 2.0 envelopes and response payloads
//! http.rs:   HttpLedger: reqwest JSON-RPC client with confirmation polling
//! memory.rs: MemoryLedger: deterministic in-process ledger for tests
//! builtins.rs: system, token and associated-token programs for MemoryLedger
//! retry.rs:  RetryPolicy and the transient-failure retry loop
//! ```
//!
//! Errors coming back from the network are surfaced as-is. Deciding what is
//! worth retrying is [`LedgerError::is_transient`]'s job; nothing else
//! second-guesses a rejection.

mod builtins;
pub mod http;
pub mod memory;
pub mod retry;
pub mod types;

pub use http::HttpLedger;
pub use memory::{InstructionError, InvocationContext, MemoryLedger, ProgramProcessor};
pub use retry::{with_retry, RetryPolicy};

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{Address, Blockhash, Signature};
use crate::transaction::{Message, Transaction};

// ---------------------------------------------------------------------------
// Commitment
// ---------------------------------------------------------------------------

/// How settled a state must be before a read reflects it or a submission
/// counts as done. Stronger levels trade latency for certainty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Voted on by a supermajority of the cluster.
    #[default]
    Confirmed,
    /// Rooted; will not be rolled back.
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }

    /// Whether a reported status of `level` satisfies this commitment.
    pub fn is_reached_by(&self, level: Commitment) -> bool {
        match self {
            Self::Confirmed => true,
            Self::Finalized => level == Self::Finalized,
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Commitment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "finalized" => Ok(Self::Finalized),
            other => Err(format!(
                "unknown commitment {:?} (expected confirmed or finalized)",
                other
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// An account as stored on the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountInfo {
    pub lamports: u64,
    /// Program that owns (may write) this account.
    pub owner: Address,
    pub data: Vec<u8>,
    pub executable: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures reported by, or while talking to, the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The request never got a usable answer (connection, TLS, HTTP status).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The transaction was executed or simulated and failed.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// A required signer's slot was empty or its signature was invalid.
    #[error("missing or invalid signature for {0}")]
    MissingSignature(Address),

    /// The transaction's blockhash is unknown or expired.
    #[error("blockhash not found")]
    BlockhashNotFound,

    /// These exact signed bytes were executed before. Their outcome is
    /// available through [`LedgerClient::get_signature_status`].
    #[error("transaction already processed")]
    AlreadyProcessed,

    /// An instruction tried to create an account that already exists.
    #[error("account {0} already exists")]
    AccountAlreadyExists(Address),

    /// The node's reply did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Submitted, but the requested commitment was not observed in time.
    /// The transaction may still land.
    #[error("transaction {signature} not confirmed within {timeout_ms} ms")]
    ConfirmationTimeout { signature: Signature, timeout_ms: u64 },
}

/// JSON-RPC code for "node is behind / unhealthy".
pub const RPC_NODE_UNHEALTHY: i64 = -32005;

/// HTTP-level rate limiting, surfaced as an RPC code by some providers.
pub const RPC_RATE_LIMITED: i64 = 429;

impl LedgerError {
    /// Whether repeating the same request could plausibly succeed.
    ///
    /// Rejections, signature problems and "already exists" are final. A
    /// stale blockhash is transient only for callers that re-sign with a
    /// fresh one.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::BlockhashNotFound => true,
            Self::Rpc { code, .. } => *code == RPC_NODE_UNHEALTHY || *code == RPC_RATE_LIMITED,
            Self::Rejected(_)
            | Self::AlreadyProcessed
            | Self::MissingSignature(_)
            | Self::AccountAlreadyExists(_)
            | Self::InvalidResponse(_)
            | Self::ConfirmationTimeout { .. } => false,
        }
    }
}

/// What the ledger recorded for a submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Executed successfully, not yet at the requested commitment.
    Processed,
    /// Executed successfully and settled to the requested commitment.
    Confirmed,
    /// Executed and failed. The fee was charged all the same.
    Failed(LedgerError),
}

// ---------------------------------------------------------------------------
// LedgerClient
// ---------------------------------------------------------------------------

/// The network operations this client needs.
///
/// Implementations must be `Send + Sync`; callers hold them behind an `Arc`
/// and await each call in turn.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Lamport balance of `address`. Missing accounts have a balance of 0.
    async fn get_balance(
        &self,
        address: &Address,
        commitment: Commitment,
    ) -> Result<u64, LedgerError>;

    /// Full account contents, or `None` if no account lives at `address`.
    async fn get_account(
        &self,
        address: &Address,
        commitment: Commitment,
    ) -> Result<Option<AccountInfo>, LedgerError>;

    async fn get_latest_blockhash(&self, commitment: Commitment)
        -> Result<Blockhash, LedgerError>;

    /// Exact fee the network would charge for `message`, or `None` when the
    /// message's blockhash is no longer valid.
    async fn get_fee_for_message(
        &self,
        message: &Message,
        commitment: Commitment,
    ) -> Result<Option<u64>, LedgerError>;

    /// Lamports an account of `data_len` bytes must hold to be rent exempt.
    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, LedgerError>;

    /// Submits `tx` and waits until `commitment` is reached.
    async fn send_and_confirm_transaction(
        &self,
        tx: &Transaction,
        commitment: Commitment,
    ) -> Result<Signature, LedgerError>;

    /// What became of the transaction signed with `signature`, searched
    /// through the ledger's full history. `None` means it never executed.
    async fn get_signature_status(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> Result<Option<TransactionStatus>, LedgerError>;
}
