// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vault Client: Core Library
//!
//! A client for a custody vault program on an account-based ledger. It
//! derives the vault's program addresses, builds and signs transactions,
//! prices them exactly, and drives the vault's lifecycle: initialize,
//! deposit, withdraw, for native coin, fungible tokens and NFTs.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519 keys and signatures, SHA-256, curve checks.
//! - **pda**: Program-derived address search and the named derivations.
//! - **transaction**: Instructions, message compilation, signing.
//! - **program**: Builders and account layouts for native programs.
//! - **idl**: Instruction encoding from Anchor interface files.
//! - **rpc**: The ledger seam: JSON-RPC over HTTP and an in-memory ledger.
//! - **connection**: Commitment and retry policy applied to a ledger.
//! - **resolver**: Get-or-create for associated token accounts.
//! - **transfer**: Fee-exact sweeps and plain native transfers.
//! - **spl**: Mint creation, minting and token transfers.
//! - **vault**: The custody vault client.
//! - **config**: Protocol constants and client configuration.
//!
//! ## Example
//!
//! ```no_run
//! # async fn run() -> vault_client::error::Result<()> {
//! use vault_client::config::{ClientConfig, LAMPORTS_PER_SOL};
//! use vault_client::connection::Connection;
//! use vault_client::crypto::Keypair;
//! use vault_client::vault::VaultClient;
//!
//! let config = ClientConfig::devnet();
//! let owner = Keypair::read_from_file("wallet.json")?;
//! let vault = VaultClient::new(Connection::from_config(&config)?, config.vault_program_id)?;
//!
//! let state = Keypair::generate();
//! let init = vault.initialize(&owner, &state).await?;
//! vault.deposit(&owner, &init.addresses.vault_state, LAMPORTS_PER_SOL / 10).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Philosophy
//!
//! 1. Derivation and encoding are pure and run before anything is sent.
//! 2. The network is the authority. Its rejections reach the caller unedited.
//! 3. Keypairs are passed to every call; nothing holds a wallet globally.

pub mod config;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod idl;
pub mod pda;
pub mod program;
pub mod resolver;
pub mod rpc;
pub mod spl;
pub mod transaction;
pub mod transfer;
pub mod vault;
