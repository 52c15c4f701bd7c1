//! Errors raised while compiling, signing or checking a transaction.
//!
//! All of them are local: a transaction that fails here never reaches the
//! network.

use thiserror::Error;

use crate::crypto::Address;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// No fee payer was set on the builder.
    #[error("transaction has no fee payer")]
    MissingFeePayer,

    /// No recent blockhash was set on the builder.
    #[error("transaction has no recent blockhash")]
    MissingBlockhash,

    #[error("transaction has no instructions")]
    NoInstructions,

    /// More distinct accounts than a one-byte index can address.
    #[error("message references {count} accounts (max {max})")]
    TooManyAccounts { count: usize, max: usize },

    /// The header counts signers in one byte.
    #[error("message requires {count} signatures (max {max})")]
    TooManySigners { count: usize, max: usize },

    /// A list or byte string too long for its compact-u16 length prefix.
    #[error("{what} has {len} entries (max {max})")]
    LengthOverflow {
        what: &'static str,
        len: usize,
        max: usize,
    },

    /// The serialized transaction does not fit in a single packet.
    #[error("transaction is {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    /// A keypair was offered for signing that the message does not require.
    #[error("keypair {0} is not a required signer of this message")]
    UnexpectedSigner(Address),

    #[error("instruction index {index} out of range (have {len})")]
    InstructionIndexOutOfRange { index: usize, len: usize },

    /// A present signature does not verify against its signer.
    #[error("signature for {signer} does not verify")]
    InvalidSignature { signer: Address },
}
