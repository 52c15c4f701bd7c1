//! [`VaultClient`]: the custody vault's instructions, encoded from the
//! program interface and submitted through a [`Connection`].

use crate::config::{
    ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_METADATA_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use crate::connection::Connection;
use crate::crypto::{Address, Keypair, Signature};
use crate::error::Result;
use crate::idl::{ArgValue, ProgramInterface};
use crate::resolver::{AssetAccount, AssetAccountResolver};
use crate::transaction::{Instruction, TransactionBuilder};

use super::addresses::{NftAddresses, VaultAddresses};

/// Result of [`VaultClient::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultInitialization {
    pub signature: Signature,
    pub addresses: VaultAddresses,
}

/// Token accounts on both sides of an SPL or NFT vault operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenVaultReceipt {
    pub signature: Signature,
    pub owner_account: AssetAccount,
    pub vault_account: AssetAccount,
}

/// Client for one deployed vault program.
///
/// Holds no per-vault state. Every call names its vault by the state
/// address and takes the owner's keypair explicitly.
#[derive(Debug, Clone)]
pub struct VaultClient {
    connection: Connection,
    interface: ProgramInterface,
}

impl VaultClient {
    /// A client for the vault program at `program_id`, using the bundled
    /// interface description.
    pub fn new(connection: Connection, program_id: Address) -> Result<Self> {
        Ok(Self::with_interface(
            connection,
            ProgramInterface::vault(program_id)?,
        ))
    }

    pub fn with_interface(connection: Connection, interface: ProgramInterface) -> Self {
        Self {
            connection,
            interface,
        }
    }

    pub fn program_id(&self) -> &Address {
        self.interface.program_id()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn addresses(&self, vault_state: &Address) -> Result<VaultAddresses> {
        Ok(VaultAddresses::derive(vault_state, self.program_id())?)
    }

    /// Creates a vault. `vault_state` must be a fresh keypair; it co-signs
    /// with the owner and becomes the vault's identity.
    pub async fn initialize(
        &self,
        owner: &Keypair,
        vault_state: &Keypair,
    ) -> Result<VaultInitialization> {
        let addresses = self.addresses(&vault_state.address())?;
        let ix = self.interface.instruction(
            "initialize",
            &[
                ("owner", owner.address()),
                ("vaultState", addresses.vault_state),
                ("vaultAuth", addresses.vault_auth),
                ("vault", addresses.vault),
                ("systemProgram", SYSTEM_PROGRAM_ID),
            ],
            &[],
        )?;
        let signature = self.submit(owner, ix, &[vault_state]).await?;
        tracing::info!(
            vault_state = %addresses.vault_state,
            vault = %addresses.vault,
            %signature,
            "vault initialized"
        );
        Ok(VaultInitialization {
            signature,
            addresses,
        })
    }

    /// Moves `lamports` from the owner into the vault.
    pub async fn deposit(
        &self,
        owner: &Keypair,
        vault_state: &Address,
        lamports: u64,
    ) -> Result<Signature> {
        self.native("deposit", owner, vault_state, lamports).await
    }

    /// Moves `lamports` from the vault back to the owner.
    pub async fn withdraw(
        &self,
        owner: &Keypair,
        vault_state: &Address,
        lamports: u64,
    ) -> Result<Signature> {
        self.native("withdraw", owner, vault_state, lamports).await
    }

    /// Moves `amount` base units of `mint` from the owner's token account
    /// into the vault authority's.
    pub async fn deposit_spl(
        &self,
        owner: &Keypair,
        vault_state: &Address,
        mint: &Address,
        amount: u64,
    ) -> Result<TokenVaultReceipt> {
        self.fungible("deposit_spl", owner, vault_state, mint, amount)
            .await
    }

    /// Moves `amount` base units of `mint` out of the vault to the owner.
    pub async fn withdraw_spl(
        &self,
        owner: &Keypair,
        vault_state: &Address,
        mint: &Address,
        amount: u64,
    ) -> Result<TokenVaultReceipt> {
        self.fungible("withdraw_spl", owner, vault_state, mint, amount)
            .await
    }

    /// Deposits the NFT `mint` (a supply-one token with metadata and a
    /// master edition) into the vault.
    pub async fn deposit_nft(
        &self,
        owner: &Keypair,
        vault_state: &Address,
        mint: &Address,
    ) -> Result<TokenVaultReceipt> {
        let addresses = self.addresses(vault_state)?;
        let nft = NftAddresses::derive(mint)?;
        let (owner_account, vault_account) = self.token_accounts(owner, &addresses, mint).await?;

        let ix = self.interface.instruction(
            "deposit_nft",
            &[
                ("owner", owner.address()),
                ("ownerAta", owner_account.address),
                ("vaultState", addresses.vault_state),
                ("vaultAuth", addresses.vault_auth),
                ("vaultAta", vault_account.address),
                ("tokenMint", *mint),
                ("nftMetadata", nft.metadata),
                ("nftMasterEdition", nft.master_edition),
                ("metadataProgram", TOKEN_METADATA_PROGRAM_ID),
                ("tokenProgram", TOKEN_PROGRAM_ID),
                ("associatedTokenProgram", ASSOCIATED_TOKEN_PROGRAM_ID),
                ("systemProgram", SYSTEM_PROGRAM_ID),
            ],
            &[],
        )?;
        let signature = self.submit(owner, ix, &[]).await?;
        tracing::info!(%vault_state, %mint, %signature, "nft deposited");
        Ok(TokenVaultReceipt {
            signature,
            owner_account,
            vault_account,
        })
    }

    async fn native(
        &self,
        instruction: &str,
        owner: &Keypair,
        vault_state: &Address,
        lamports: u64,
    ) -> Result<Signature> {
        let addresses = self.addresses(vault_state)?;
        let ix = self.interface.instruction(
            instruction,
            &[
                ("owner", owner.address()),
                ("vaultState", addresses.vault_state),
                ("vaultAuth", addresses.vault_auth),
                ("vault", addresses.vault),
                ("systemProgram", SYSTEM_PROGRAM_ID),
            ],
            &[ArgValue::U64(lamports)],
        )?;
        let signature = self.submit(owner, ix, &[]).await?;
        tracing::info!(instruction, %vault_state, lamports, %signature, "vault call confirmed");
        Ok(signature)
    }

    async fn fungible(
        &self,
        instruction: &str,
        owner: &Keypair,
        vault_state: &Address,
        mint: &Address,
        amount: u64,
    ) -> Result<TokenVaultReceipt> {
        let addresses = self.addresses(vault_state)?;
        let (owner_account, vault_account) = self.token_accounts(owner, &addresses, mint).await?;

        let ix = self.interface.instruction(
            instruction,
            &[
                ("owner", owner.address()),
                ("ownerAta", owner_account.address),
                ("vaultState", addresses.vault_state),
                ("vaultAuth", addresses.vault_auth),
                ("vaultAta", vault_account.address),
                ("tokenMint", *mint),
                ("tokenProgram", TOKEN_PROGRAM_ID),
                ("associatedTokenProgram", ASSOCIATED_TOKEN_PROGRAM_ID),
                ("systemProgram", SYSTEM_PROGRAM_ID),
            ],
            &[ArgValue::U64(amount)],
        )?;
        let signature = self.submit(owner, ix, &[]).await?;
        tracing::info!(instruction, %vault_state, %mint, amount, %signature, "vault call confirmed");
        Ok(TokenVaultReceipt {
            signature,
            owner_account,
            vault_account,
        })
    }

    /// The owner's and the vault authority's accounts for `mint`, created
    /// on demand at the owner's expense.
    async fn token_accounts(
        &self,
        owner: &Keypair,
        addresses: &VaultAddresses,
        mint: &Address,
    ) -> Result<(AssetAccount, AssetAccount)> {
        let resolver = AssetAccountResolver::new(self.connection.clone());
        let owner_account = resolver
            .resolve(&owner.address(), mint, owner, false)
            .await?;
        let vault_account = resolver
            .resolve(&addresses.vault_auth, mint, owner, true)
            .await?;
        Ok((owner_account, vault_account))
    }

    async fn submit(
        &self,
        owner: &Keypair,
        ix: Instruction,
        co_signers: &[&Keypair],
    ) -> Result<Signature> {
        let builder = TransactionBuilder::new()
            .fee_payer(owner.address())
            .instruction(ix);
        let mut signers = Vec::with_capacity(co_signers.len() + 1);
        signers.push(owner);
        signers.extend_from_slice(co_signers);
        self.connection.send(&builder, &signers).await
    }
}
