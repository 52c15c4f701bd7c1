//! # Cryptographic Primitives
//!
//! Everything the client signs or hashes flows through here:
//!
//! - **Ed25519** keypairs and signatures (ed25519-dalek).
//! - **Curve membership** checks that separate ordinary addresses from
//!   program-derived ones (curve25519-dalek).
//! - **SHA-256** for address derivation and instruction discriminators.
//!
//! Thin, type-safe wrappers around audited implementations. Nothing here
//! is clever on purpose.

pub mod hash;
pub mod keys;

pub use hash::{hashv, sha256, sighash, Blockhash};
pub use keys::{Address, KeyError, Keypair, ParseError, Signature};
