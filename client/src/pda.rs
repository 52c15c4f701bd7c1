//! # Program-Derived Addresses
//!
//! A program-derived address (PDA) is computed from an ordered list of seeds
//! and a program id:
//!
//! ```text
//! candidate = sha256(seed_0 ‖ seed_1 ‖ … ‖ [bump] ‖ program_id ‖ "ProgramDerivedAddress")
//! ```
//!
//! The bump is searched from 255 downwards and the first candidate that does
//! **not** decompress to an Ed25519 point wins. Being off-curve means no
//! private key exists for the address, so only the owning program can
//! "sign" for it (by re-supplying the seeds at runtime).
//!
//! Seed order is part of the contract: `["auth", state]` and
//! `["state", auth]` are different addresses.
//!
//! Everything in this module is pure. Same inputs, same outputs, every time.

use thiserror::Error;

use crate::config::{
    ASSOCIATED_TOKEN_PROGRAM_ID, MAX_SEEDS, MAX_SEED_LEN, PDA_MARKER, TOKEN_METADATA_PROGRAM_ID,
    TOKEN_PROGRAM_ID,
};
use crate::crypto::{hashv, Address};

/// Seed prefix of the vault authority PDA.
pub const VAULT_AUTH_SEED: &[u8] = b"auth";

/// Seed prefix of the native-coin vault PDA.
pub const VAULT_SEED: &[u8] = b"vault";

/// Seed prefix shared by token-metadata accounts.
pub const METADATA_SEED: &[u8] = b"metadata";

/// Suffix distinguishing the master edition from the metadata account.
pub const EDITION_SEED: &[u8] = b"edition";

/// Errors from address derivation. All are detected locally, before any
/// network round trip.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error("seed {index} is {len} bytes (max {max})", max = MAX_SEED_LEN)]
    MaxSeedLengthExceeded { index: usize, len: usize },

    #[error("{count} seeds supplied (max {max} including the bump)", max = MAX_SEEDS)]
    TooManySeeds { count: usize },

    #[error("derived address lies on the ed25519 curve")]
    InvalidSeeds,

    #[error("no bump in 0..=255 yields an off-curve address for program {program_id}")]
    NoValidBumpFound { program_id: Address },
}

fn check_seeds(seeds: &[&[u8]], reserved: usize) -> Result<(), DerivationError> {
    if seeds.len() + reserved > MAX_SEEDS {
        return Err(DerivationError::TooManySeeds {
            count: seeds.len() + reserved,
        });
    }
    if let Some((index, seed)) = seeds
        .iter()
        .enumerate()
        .find(|(_, s)| s.len() > MAX_SEED_LEN)
    {
        return Err(DerivationError::MaxSeedLengthExceeded {
            index,
            len: seed.len(),
        });
    }
    Ok(())
}

fn hash_candidate(seeds: &[&[u8]], bump: Option<u8>, program_id: &Address) -> Address {
    let bump_seed = bump.map(|b| [b]);
    let mut parts: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 3);
    parts.extend_from_slice(seeds);
    if let Some(ref b) = bump_seed {
        parts.push(b);
    }
    parts.push(program_id.as_ref());
    parts.push(PDA_MARKER);
    Address::new_from_array(hashv(&parts))
}

/// Single-shot derivation: hashes `seeds` (bump already included by the
/// caller) and fails if the result happens to be on-curve.
pub fn create_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<Address, DerivationError> {
    check_seeds(seeds, 0)?;
    let candidate = hash_candidate(seeds, None, program_id);
    if candidate.is_on_curve() {
        return Err(DerivationError::InvalidSeeds);
    }
    Ok(candidate)
}

/// Finds the canonical PDA and its bump for `seeds` under `program_id`.
///
/// Tries bumps 255, 254, …, 0 and returns the first off-curve candidate.
/// Roughly half of all candidates are off-curve, so this almost always
/// succeeds on the first or second try.
///
/// # Example
///
/// ```
/// use vault_client::pda::find_program_address;
/// use vault_client::crypto::Address;
///
/// let program = Address::new_random();
/// let (pda, bump) = find_program_address(&[b"vault"], &program).unwrap();
/// assert!(!pda.is_on_curve());
/// assert_eq!(find_program_address(&[b"vault"], &program).unwrap(), (pda, bump));
/// ```
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<(Address, u8), DerivationError> {
    check_seeds(seeds, 1)?;
    for bump in (0..=u8::MAX).rev() {
        let candidate = hash_candidate(seeds, Some(bump), program_id);
        if !candidate.is_on_curve() {
            tracing::trace!(%program_id, bump, address = %candidate, "derived program address");
            return Ok((candidate, bump));
        }
    }
    Err(DerivationError::NoValidBumpFound {
        program_id: *program_id,
    })
}

// ---------------------------------------------------------------------------
// Named derivations
// ---------------------------------------------------------------------------

/// `["auth", vault_state]`: signer-less owner of everything the vault holds.
pub fn vault_authority(
    vault_state: &Address,
    program_id: &Address,
) -> Result<(Address, u8), DerivationError> {
    find_program_address(&[VAULT_AUTH_SEED, vault_state.as_ref()], program_id)
}

/// `["vault", vault_authority]`: the account holding the vault's lamports.
pub fn vault_holding(
    vault_authority: &Address,
    program_id: &Address,
) -> Result<(Address, u8), DerivationError> {
    find_program_address(&[VAULT_SEED, vault_authority.as_ref()], program_id)
}

/// The canonical token account of `owner` for `mint`:
/// `[owner, token_program, mint]` under the associated-token program.
///
/// Works for any owner, on- or off-curve. Whether an off-curve owner is
/// *allowed* is the resolver's call, not the deriver's.
pub fn associated_token_address(
    owner: &Address,
    mint: &Address,
) -> Result<Address, DerivationError> {
    find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _)| address)
}

/// `["metadata", metadata_program, mint]` under the metadata program.
pub fn metadata_address(mint: &Address) -> Result<Address, DerivationError> {
    find_program_address(
        &[
            METADATA_SEED,
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .map(|(address, _)| address)
}

/// `["metadata", metadata_program, mint, "edition"]` under the metadata program.
pub fn master_edition_address(mint: &Address) -> Result<Address, DerivationError> {
    find_program_address(
        &[
            METADATA_SEED,
            TOKEN_METADATA_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            EDITION_SEED,
        ],
        &TOKEN_METADATA_PROGRAM_ID,
    )
    .map(|(address, _)| address)
}
