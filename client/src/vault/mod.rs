//! # Custody Vault
//!
//! A vault is identified by its **state account**, a plain keypair created
//! at initialization. Everything else is derived from it:
//!
//! ```text
//! vault_state ──["auth", state]──► vault_auth ──["vault", auth]──► vault
//!                                      │
//!                                      └── owner of the vault's token accounts
//! ```
//!
//! `vault_auth` and `vault` are program-derived, so only the vault program
//! can move what they hold. The client never stores them; each operation
//! re-derives them from the state address.
//!
//! ## Operations
//!
//! | Call            | Moves                                   |
//! |-----------------|-----------------------------------------|
//! | `initialize`    | creates the state account               |
//! | `deposit`       | lamports, owner → vault                 |
//! | `withdraw`      | lamports, vault → owner                 |
//! | `deposit_spl`   | fungible tokens, owner → vault_auth ATA |
//! | `withdraw_spl`  | fungible tokens, vault_auth ATA → owner |
//! | `deposit_nft`   | one NFT, owner → vault_auth ATA         |
//!
//! Authorization is the program's business. Calling `deposit` on a vault
//! that was never initialized, or `withdraw` as someone other than the
//! owner, is rejected by the network and reported as-is.

pub mod addresses;
pub mod client;

pub use addresses::{NftAddresses, VaultAddresses};
pub use client::{TokenVaultReceipt, VaultClient, VaultInitialization};
