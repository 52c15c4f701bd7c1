//! End-to-end tests for the vault client.
//!
//! Every test runs the real client stack (derivation, interface encoding,
//! message compilation, signing, submission) against a [`MemoryLedger`]
//! with a vault program deployed at the default program id. The program
//! below enforces what the deployed one does: the state account must be
//! initialized, the caller must be its owner, and the vault's PDAs must
//! match their seeds.

use std::sync::Arc;

use vault_client::config::{DEFAULT_VAULT_PROGRAM_ID, LAMPORTS_PER_SOL, SIGNATURE_FEE_LAMPORTS};
use vault_client::connection::Connection;
use vault_client::crypto::{sighash, Address, Keypair};
use vault_client::error::ClientError;
use vault_client::idl::{to_snake_case, IdlInstruction, ProgramInterface};
use vault_client::pda::{
    create_program_address, metadata_address, vault_authority, vault_holding, VAULT_AUTH_SEED,
    VAULT_SEED,
};
use vault_client::program::{system, token};
use vault_client::resolver::AssetAccountResolver;
use vault_client::rpc::{
    InstructionError, InvocationContext, LedgerError, MemoryLedger, ProgramProcessor,
};
use vault_client::transaction::TransactionBuilder;
use vault_client::vault::{VaultAddresses, VaultClient};
use vault_client::{spl, transfer};

// ---------------------------------------------------------------------------
// Vault program
// ---------------------------------------------------------------------------

/// discriminator, owner, auth bump, vault bump
const STATE_LEN: usize = 8 + 32 + 1 + 1;

const CONSTRAINT_HAS_ONE: u32 = 2001;
const CONSTRAINT_SEEDS: u32 = 2006;
const ACCOUNT_NOT_INITIALIZED: u32 = 3012;

const INSTRUCTIONS: [&str; 6] = [
    "initialize",
    "deposit",
    "withdraw",
    "deposit_spl",
    "withdraw_spl",
    "deposit_nft",
];

struct VaultProgram {
    interface: ProgramInterface,
}

struct VaultState {
    owner: Address,
    auth_bump: u8,
    vault_bump: u8,
}

impl VaultProgram {
    fn new() -> Self {
        Self {
            interface: ProgramInterface::vault(DEFAULT_VAULT_PROGRAM_ID).unwrap(),
        }
    }

    fn state_discriminator() -> [u8; 8] {
        sighash("account", "VaultState")
    }

    fn load_state(
        ctx: &InvocationContext<'_>,
        address: &Address,
    ) -> Result<VaultState, InstructionError> {
        let not_initialized = InstructionError::Custom(ACCOUNT_NOT_INITIALIZED);
        let account = ctx.get(address).ok_or(not_initialized.clone())?;
        if account.owner != *ctx.program_id()
            || account.data.len() != STATE_LEN
            || account.data[..8] != Self::state_discriminator()
        {
            return Err(not_initialized);
        }
        Ok(VaultState {
            owner: Address::try_from(&account.data[8..40]).unwrap(),
            auth_bump: account.data[40],
            vault_bump: account.data[41],
        })
    }
}

fn account(
    ctx: &InvocationContext<'_>,
    def: &IdlInstruction,
    name: &str,
) -> Result<Address, InstructionError> {
    let index = def
        .accounts
        .iter()
        .position(|a| a.name == name)
        .ok_or(InstructionError::NotEnoughAccountKeys)?;
    ctx.account_address(index)
}

fn require(condition: bool, code: u32) -> Result<(), InstructionError> {
    if condition {
        Ok(())
    } else {
        Err(InstructionError::Custom(code))
    }
}

fn mint_decimals(ctx: &InvocationContext<'_>, mint: &Address) -> Result<u8, InstructionError> {
    ctx.get(mint)
        .and_then(|a| token::Mint::unpack(&a.data))
        .map(|m| m.decimals)
        .ok_or(InstructionError::InvalidAccountData(*mint))
}

impl ProgramProcessor for VaultProgram {
    fn process(&self, ctx: &mut InvocationContext<'_>) -> Result<(), InstructionError> {
        let data = ctx.data().to_vec();
        if data.len() < 8 {
            return Err(InstructionError::InvalidInstructionData);
        }
        let def = INSTRUCTIONS
            .iter()
            .filter_map(|name| self.interface.instruction_def(name))
            .find(|def| self.interface.discriminator(&def.name)[..] == data[..8])
            .cloned()
            .ok_or(InstructionError::InvalidInstructionData)?;
        let amount = data
            .get(8..16)
            .map(|b| u64::from_le_bytes(b.try_into().unwrap()));
        let program_id = *ctx.program_id();
        let instruction = to_snake_case(&def.name);

        let owner = account(ctx, &def, "owner")?;
        let state = account(ctx, &def, "vaultState")?;
        let auth = account(ctx, &def, "vaultAuth")?;
        ctx.require_signer(&owner)?;

        if instruction == "initialize" {
            let (expected_auth, auth_bump) = vault_authority(&state, &program_id)
                .map_err(|_| InstructionError::InvalidSeeds)?;
            let (expected_vault, vault_bump) = vault_holding(&expected_auth, &program_id)
                .map_err(|_| InstructionError::InvalidSeeds)?;
            require(auth == expected_auth, CONSTRAINT_SEEDS)?;
            require(account(ctx, &def, "vault")? == expected_vault, CONSTRAINT_SEEDS)?;

            let rent = ctx.rent_exempt_minimum(STATE_LEN);
            ctx.invoke(
                &system::create_account(&owner, &state, rent, STATE_LEN as u64, &program_id),
                &[],
            )?;
            let mut body = Self::state_discriminator().to_vec();
            body.extend_from_slice(owner.as_bytes());
            body.extend_from_slice(&[auth_bump, vault_bump]);
            return ctx.set_data(&state, body);
        }

        let vault_state = Self::load_state(ctx, &state)?;
        require(vault_state.owner == owner, CONSTRAINT_HAS_ONE)?;
        let auth_seeds: [&[u8]; 3] = [VAULT_AUTH_SEED, state.as_ref(), &[vault_state.auth_bump]];
        require(
            create_program_address(&auth_seeds, &program_id).ok() == Some(auth),
            CONSTRAINT_SEEDS,
        )?;

        match instruction.as_str() {
            "deposit" | "withdraw" => {
                let vault = account(ctx, &def, "vault")?;
                let vault_seeds: [&[u8]; 3] = [VAULT_SEED, auth.as_ref(), &[vault_state.vault_bump]];
                require(
                    create_program_address(&vault_seeds, &program_id).ok() == Some(vault),
                    CONSTRAINT_SEEDS,
                )?;
                let lamports = amount.ok_or(InstructionError::InvalidInstructionData)?;
                if instruction == "deposit" {
                    ctx.invoke(&system::transfer(&owner, &vault, lamports), &[])
                } else {
                    ctx.invoke(&system::transfer(&vault, &owner, lamports), &[&vault_seeds[..]])
                }
            }
            kind => {
                let owner_ata = account(ctx, &def, "ownerAta")?;
                let vault_ata = account(ctx, &def, "vaultAta")?;
                let mint = account(ctx, &def, "tokenMint")?;
                let decimals = mint_decimals(ctx, &mint)?;
                match kind {
                    "deposit_nft" => {
                        require(
                            account(ctx, &def, "nftMetadata")? == metadata_address(&mint).unwrap(),
                            CONSTRAINT_SEEDS,
                        )?;
                        let ix = token::transfer_checked(
                            &owner_ata, &mint, &vault_ata, &owner, 1, decimals,
                        );
                        ctx.invoke(&ix, &[])
                    }
                    "deposit_spl" => {
                        let amount = amount.ok_or(InstructionError::InvalidInstructionData)?;
                        let ix = token::transfer_checked(
                            &owner_ata, &mint, &vault_ata, &owner, amount, decimals,
                        );
                        ctx.invoke(&ix, &[])
                    }
                    _ => {
                        let amount = amount.ok_or(InstructionError::InvalidInstructionData)?;
                        let ix = token::transfer_checked(
                            &vault_ata, &mint, &owner_ata, &auth, amount, decimals,
                        );
                        ctx.invoke(&ix, &[&auth_seeds[..]])
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn setup() -> (Arc<MemoryLedger>, VaultClient, Keypair) {
    let ledger =
        Arc::new(MemoryLedger::new().with_program(DEFAULT_VAULT_PROGRAM_ID, VaultProgram::new()));
    let connection = Connection::new(ledger.clone());
    let vault = VaultClient::new(connection, DEFAULT_VAULT_PROGRAM_ID).unwrap();
    let owner = Keypair::generate();
    ledger.airdrop(&owner.address(), 10 * LAMPORTS_PER_SOL);
    (ledger, vault, owner)
}

async fn initialized(vault: &VaultClient, owner: &Keypair) -> VaultAddresses {
    let state = Keypair::generate();
    vault.initialize(owner, &state).await.unwrap().addresses
}

/// A mint with `owner` as authority and `supply` tokens in the owner's
/// associated account.
async fn funded_mint(vault: &VaultClient, owner: &Keypair, decimals: u8, supply: u64) -> Address {
    let mint = Keypair::generate();
    let conn = vault.connection();
    spl::create_mint(conn, owner, &mint, &owner.address(), None, decimals)
        .await
        .unwrap();
    spl::mint_to(conn, owner, &mint.address(), owner, &owner.address(), supply)
        .await
        .unwrap();
    mint.address()
}

fn assert_rejected_with(err: ClientError, code: u32) {
    match err {
        ClientError::Network(LedgerError::Rejected(msg)) => {
            assert!(msg.contains(&format!("{code:#x}")), "unexpected rejection: {msg}")
        }
        other => panic!("expected a rejection with {code:#x}, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Native vault
// ---------------------------------------------------------------------------

#[tokio::test]
async fn initialize_then_deposit_one_lamport() {
    let (ledger, vault, owner) = setup();
    let state = Keypair::generate();

    let init = vault.initialize(&owner, &state).await.unwrap();
    assert_eq!(
        init.addresses,
        VaultAddresses::derive(&state.address(), &DEFAULT_VAULT_PROGRAM_ID).unwrap()
    );
    let state_account = ledger.account(&state.address()).unwrap();
    assert_eq!(state_account.owner, DEFAULT_VAULT_PROGRAM_ID);
    assert_eq!(&state_account.data[8..40], owner.address().as_bytes());

    let before = ledger.lamports(&init.addresses.vault);
    vault
        .deposit(&owner, &state.address(), 1)
        .await
        .unwrap();
    assert_eq!(ledger.lamports(&init.addresses.vault), before + 1);
}

#[tokio::test]
async fn deposit_into_uninitialized_vault_is_rejected() {
    let (ledger, vault, owner) = setup();
    let balance = ledger.lamports(&owner.address());

    let err = vault
        .deposit(&owner, &Address::new_random(), 1_000)
        .await
        .unwrap_err();
    assert_rejected_with(err, ACCOUNT_NOT_INITIALIZED);
    // The fee is spent even though the instruction failed.
    assert_eq!(
        ledger.lamports(&owner.address()),
        balance - SIGNATURE_FEE_LAMPORTS
    );
}

#[tokio::test]
async fn deposit_whose_reply_is_lost_lands_once() {
    let (ledger, vault, owner) = setup();
    let addresses = initialized(&vault, &owner).await;
    let landed = ledger.landed_transactions();
    let before = ledger.lamports(&addresses.vault);

    ledger.lose_replies([LedgerError::Timeout]);
    vault
        .deposit(&owner, &addresses.vault_state, 1_000)
        .await
        .unwrap();

    assert_eq!(ledger.landed_transactions(), landed + 1);
    assert_eq!(ledger.lamports(&addresses.vault), before + 1_000);
}

#[tokio::test]
async fn deposit_whose_reply_is_lost_past_expiry_lands_once() {
    let (ledger, vault, owner) = setup();
    let addresses = initialized(&vault, &owner).await;
    let landed = ledger.landed_transactions();
    let before = ledger.lamports(&addresses.vault);
    let balance = ledger.lamports(&owner.address());

    ledger.lose_reply_then_expire(LedgerError::Transport("connection reset".into()));
    vault
        .deposit(&owner, &addresses.vault_state, 1_000)
        .await
        .unwrap();

    assert_eq!(ledger.landed_transactions(), landed + 1);
    assert_eq!(ledger.lamports(&addresses.vault), before + 1_000);
    assert_eq!(
        ledger.lamports(&owner.address()),
        balance - 1_000 - SIGNATURE_FEE_LAMPORTS
    );
}

#[tokio::test]
async fn withdraw_returns_lamports_to_owner() {
    let (ledger, vault, owner) = setup();
    let addresses = initialized(&vault, &owner).await;
    vault
        .deposit(&owner, &addresses.vault_state, LAMPORTS_PER_SOL)
        .await
        .unwrap();

    let before = ledger.lamports(&owner.address());
    vault
        .withdraw(&owner, &addresses.vault_state, LAMPORTS_PER_SOL / 4)
        .await
        .unwrap();

    assert_eq!(
        ledger.lamports(&addresses.vault),
        LAMPORTS_PER_SOL - LAMPORTS_PER_SOL / 4
    );
    assert_eq!(
        ledger.lamports(&owner.address()),
        before + LAMPORTS_PER_SOL / 4 - SIGNATURE_FEE_LAMPORTS
    );
}

#[tokio::test]
async fn only_the_owner_can_withdraw() {
    let (ledger, vault, owner) = setup();
    let addresses = initialized(&vault, &owner).await;
    vault
        .deposit(&owner, &addresses.vault_state, 1_000_000)
        .await
        .unwrap();

    let intruder = Keypair::generate();
    ledger.airdrop(&intruder.address(), LAMPORTS_PER_SOL);
    let err = vault
        .withdraw(&intruder, &addresses.vault_state, 1_000_000)
        .await
        .unwrap_err();
    assert_rejected_with(err, CONSTRAINT_HAS_ONE);
    assert_eq!(ledger.lamports(&addresses.vault), 1_000_000);
}

#[tokio::test]
async fn initialize_without_the_state_signature_is_refused() {
    let (ledger, vault, owner) = setup();
    let state = Keypair::generate();
    let addresses = vault.addresses(&state.address()).unwrap();
    let ix = ProgramInterface::vault(DEFAULT_VAULT_PROGRAM_ID)
        .unwrap()
        .instruction(
            "initialize",
            &[
                ("owner", owner.address()),
                ("vaultState", addresses.vault_state),
                ("vaultAuth", addresses.vault_auth),
                ("vault", addresses.vault),
                ("systemProgram", vault_client::config::SYSTEM_PROGRAM_ID),
            ],
            &[],
        )
        .unwrap();
    let builder = TransactionBuilder::new()
        .fee_payer(owner.address())
        .instruction(ix);

    let err = vault
        .connection()
        .send(&builder, &[&owner])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Network(LedgerError::MissingSignature(key)) if key == state.address()
    ));
    assert_eq!(ledger.landed_transactions(), 0);
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[tokio::test]
async fn spl_deposit_and_withdraw() {
    let (ledger, vault, owner) = setup();
    let addresses = initialized(&vault, &owner).await;
    let mint = funded_mint(&vault, &owner, 6, 1_000_000).await;

    let first = vault
        .deposit_spl(&owner, &addresses.vault_state, &mint, 250_000)
        .await
        .unwrap();
    assert!(first.vault_account.created);
    assert!(!first.owner_account.created);
    assert_eq!(first.vault_account.owner, addresses.vault_auth);
    assert_eq!(
        first.vault_account.address,
        addresses.vault_token_account(&mint).unwrap()
    );

    let second = vault
        .deposit_spl(&owner, &addresses.vault_state, &mint, 50_000)
        .await
        .unwrap();
    assert!(!second.vault_account.created);
    assert_eq!(second.vault_account.address, first.vault_account.address);

    vault
        .withdraw_spl(&owner, &addresses.vault_state, &mint, 100_000)
        .await
        .unwrap();
    assert_eq!(ledger.token_amount(&first.vault_account.address), Some(200_000));
    assert_eq!(ledger.token_amount(&first.owner_account.address), Some(800_000));
}

#[tokio::test]
async fn spl_withdraw_beyond_vault_balance_fails() {
    let (ledger, vault, owner) = setup();
    let addresses = initialized(&vault, &owner).await;
    let mint = funded_mint(&vault, &owner, 2, 500).await;
    let receipt = vault
        .deposit_spl(&owner, &addresses.vault_state, &mint, 100)
        .await
        .unwrap();

    let err = vault
        .withdraw_spl(&owner, &addresses.vault_state, &mint, 101)
        .await
        .unwrap_err();
    assert_rejected_with(err, 1);
    assert_eq!(ledger.token_amount(&receipt.vault_account.address), Some(100));
}

#[tokio::test]
async fn nft_deposit_moves_the_single_token() {
    let (ledger, vault, owner) = setup();
    let addresses = initialized(&vault, &owner).await;
    let mint = funded_mint(&vault, &owner, 0, 1).await;

    let receipt = vault
        .deposit_nft(&owner, &addresses.vault_state, &mint)
        .await
        .unwrap();
    assert_eq!(ledger.token_amount(&receipt.vault_account.address), Some(1));
    assert_eq!(ledger.token_amount(&receipt.owner_account.address), Some(0));
}

#[tokio::test]
async fn resolving_twice_returns_the_same_account() {
    let (ledger, vault, owner) = setup();
    let mint = funded_mint(&vault, &owner, 6, 0).await;
    let resolver = AssetAccountResolver::new(vault.connection().clone());
    let holder = Keypair::generate().address();

    let first = resolver.resolve(&holder, &mint, &owner, false).await.unwrap();
    let landed = ledger.landed_transactions();
    let second = resolver.resolve(&holder, &mint, &owner, false).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.address, second.address);
    assert_eq!(ledger.landed_transactions(), landed);
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_empties_the_sender() {
    let (ledger, vault, owner) = setup();
    let recipient = Address::new_random();
    let balance = ledger.lamports(&owner.address());

    let receipt = transfer::sweep(vault.connection(), &owner, &recipient)
        .await
        .unwrap();

    assert_eq!(receipt.fee, SIGNATURE_FEE_LAMPORTS);
    assert_eq!(receipt.amount, balance - SIGNATURE_FEE_LAMPORTS);
    assert_eq!(ledger.lamports(&owner.address()), 0);
    assert_eq!(ledger.lamports(&recipient), receipt.amount);
}
