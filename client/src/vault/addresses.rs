//! Addresses a vault operation touches, re-derived from the vault state on
//! every call. Nothing here is cached between operations.

use crate::crypto::Address;
use crate::pda::{
    associated_token_address, master_edition_address, metadata_address, vault_authority,
    vault_holding, DerivationError,
};

/// The program-derived accounts of one vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultAddresses {
    pub program_id: Address,
    pub vault_state: Address,
    /// `["auth", vault_state]`. Owns the vault's token accounts.
    pub vault_auth: Address,
    pub vault_auth_bump: u8,
    /// `["vault", vault_auth]`. Holds the vault's lamports.
    pub vault: Address,
    pub vault_bump: u8,
}

impl VaultAddresses {
    pub fn derive(vault_state: &Address, program_id: &Address) -> Result<Self, DerivationError> {
        let (vault_auth, vault_auth_bump) = vault_authority(vault_state, program_id)?;
        let (vault, vault_bump) = vault_holding(&vault_auth, program_id)?;
        tracing::debug!(
            %vault_state,
            %vault_auth,
            vault_auth_bump,
            %vault,
            vault_bump,
            "derived vault addresses"
        );
        Ok(Self {
            program_id: *program_id,
            vault_state: *vault_state,
            vault_auth,
            vault_auth_bump,
            vault,
            vault_bump,
        })
    }

    /// The vault authority's associated account for `mint`.
    pub fn vault_token_account(&self, mint: &Address) -> Result<Address, DerivationError> {
        associated_token_address(&self.vault_auth, mint)
    }
}

/// Metadata accounts of an NFT mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NftAddresses {
    pub mint: Address,
    pub metadata: Address,
    pub master_edition: Address,
}

impl NftAddresses {
    pub fn derive(mint: &Address) -> Result<Self, DerivationError> {
        Ok(Self {
            mint: *mint,
            metadata: metadata_address(mint)?,
            master_edition: master_edition_address(mint)?,
        })
    }
}
