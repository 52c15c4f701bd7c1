//! # Transaction Module
//!
//! Construction, signing and wire encoding of ledger transactions.
//!
//! ## Architecture
//!
//! ```text
//! instruction.rs: AccountMeta / Instruction, the uncompiled form
//! message.rs:     account table compilation and the signed byte format
//! builder.rs:     TransactionBuilder and the signed Transaction value
//! signing.rs:     multi-signer signing and signature verification
//! error.rs:       TransactionError
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: collect instructions, a fee payer and a recent blockhash
//!    with [`TransactionBuilder`].
//! 2. **Quote** (optional): [`TransactionBuilder::compile_message`] yields
//!    the exact message the network will charge for.
//! 3. **Sign**: [`TransactionBuilder::build`] compiles and signs in one step.
//! 4. **Submit**: hand the [`Transaction`] to a
//!    [`LedgerClient`](crate::rpc::LedgerClient).
//!
//! A signed transaction is never mutated. To change it, amend the builder
//! and build again.

pub mod builder;
pub mod error;
pub mod instruction;
pub mod message;
pub mod signing;

pub use builder::{Transaction, TransactionBuilder};
pub use error::TransactionError;
pub use instruction::{AccountMeta, Instruction};
pub use message::{CompiledInstruction, Message, MessageHeader};
pub use signing::{sign_transaction, verify_signatures};
