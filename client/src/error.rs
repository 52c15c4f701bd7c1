//! # Client Errors
//!
//! [`ClientError`] is what every high-level operation returns. Each module
//! keeps its own error enum; this one composes them so callers can match on
//! the failure class without string inspection.
//!
//! Local failures (derivation, amount parsing, the curve flag, message
//! size) are raised before anything is sent. Network failures arrive in
//! [`ClientError::Network`] exactly as the ledger reported them.

use thiserror::Error;

use crate::crypto::{Address, KeyError};
use crate::idl::IdlError;
use crate::pda::DerivationError;
use crate::program::token::AmountError;
use crate::rpc::LedgerError;
use crate::transaction::TransactionError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// No off-curve bump exists, or the seeds are malformed.
    #[error("address derivation failed: {0}")]
    Derivation(#[from] DerivationError),

    /// The network failed while looking up or creating an asset account.
    #[error("could not resolve token account of {owner} for mint {mint}: {source}")]
    AccountResolution {
        owner: Address,
        mint: Address,
        #[source]
        source: LedgerError,
    },

    /// The fee quoted for the transfer would consume the whole balance.
    #[error("balance of {balance} lamports cannot cover a fee of {fee}")]
    InsufficientBalanceForFee { balance: u64, fee: u64 },

    /// The ledger could not price the message, usually because its
    /// blockhash expired between fetching and quoting.
    #[error("the ledger returned no fee for the message")]
    FeeUnavailable,

    /// The owner is a program-derived address but the caller did not opt
    /// in to off-curve owners.
    #[error("owner {owner} is off-curve; pass allow_owner_off_curve to resolve its account")]
    InvalidOwnerCurveFlag { owner: Address },

    #[error(transparent)]
    Network(#[from] LedgerError),

    #[error("transaction build failed: {0}")]
    Transaction(#[from] TransactionError),

    #[error("program interface error: {0}")]
    Interface(#[from] IdlError),

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    /// The address does not hold an initialized mint.
    #[error("{0} is not a token mint")]
    InvalidMint(Address),

    #[error(transparent)]
    Key(#[from] KeyError),
}

impl ClientError {
    /// The ledger's error, if this failure came from the network.
    pub fn ledger_error(&self) -> Option<&LedgerError> {
        match self {
            Self::Network(err) | Self::AccountResolution { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
