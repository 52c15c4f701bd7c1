//! Native programs executed by [`MemoryLedger`](super::MemoryLedger).
//!
//! Each one implements just the instructions this client emits, with the
//! same account order and the same refusals the deployed programs have.
//! Token-program failures use the token program's error codes.

use super::memory::{InstructionError, InvocationContext, ProgramProcessor};
use crate::config::{ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::crypto::Address;
use crate::pda::find_program_address;
use crate::program::system::{self, SystemInstruction};
use crate::program::token::{
    self, AccountState, Mint, TokenAccount, TokenInstruction, ATA_CREATE, ATA_CREATE_IDEMPOTENT,
};

// Token program error codes.
const TOKEN_INSUFFICIENT_FUNDS: u32 = 1;
const TOKEN_MINT_MISMATCH: u32 = 3;
const TOKEN_OWNER_MISMATCH: u32 = 4;
const TOKEN_ALREADY_IN_USE: u32 = 6;
const TOKEN_UNINITIALIZED_STATE: u32 = 9;
const TOKEN_ACCOUNT_FROZEN: u32 = 17;
const TOKEN_MINT_DECIMALS_MISMATCH: u32 = 18;

// ---------------------------------------------------------------------------
// System program
// ---------------------------------------------------------------------------

pub struct SystemProcessor;

impl ProgramProcessor for SystemProcessor {
    fn process(&self, ctx: &mut InvocationContext<'_>) -> Result<(), InstructionError> {
        let ix = SystemInstruction::unpack(ctx.data()).ok_or(InstructionError::InvalidInstructionData)?;
        match ix {
            SystemInstruction::Transfer { lamports } => {
                let from = ctx.account_address(0)?;
                let to = ctx.account_address(1)?;
                ctx.require_signer(&from)?;
                if ctx.get(&from).is_some_and(|a| !a.data.is_empty()) {
                    return Err(InstructionError::InvalidAccountData(from));
                }
                ctx.debit(&from, lamports)?;
                ctx.credit(&to, lamports)
            }
            SystemInstruction::CreateAccount {
                lamports,
                space,
                owner,
            } => {
                let from = ctx.account_address(0)?;
                let new_account = ctx.account_address(1)?;
                ctx.require_signer(&from)?;
                ctx.require_signer(&new_account)?;
                if ctx
                    .get(&new_account)
                    .is_some_and(|a| a.lamports > 0 || !a.data.is_empty())
                {
                    return Err(InstructionError::AccountAlreadyInUse(new_account));
                }
                let space =
                    usize::try_from(space).map_err(|_| InstructionError::InvalidInstructionData)?;
                ctx.debit(&from, lamports)?;
                ctx.credit(&new_account, lamports)?;
                ctx.allocate_and_assign(&new_account, space, &owner)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Token program
// ---------------------------------------------------------------------------

pub struct TokenProcessor;

fn load_mint(ctx: &InvocationContext<'_>, address: &Address) -> Result<Mint, InstructionError> {
    let account = ctx
        .get(address)
        .ok_or(InstructionError::InvalidAccountData(*address))?;
    if account.owner != TOKEN_PROGRAM_ID {
        return Err(InstructionError::IncorrectProgramId(*address));
    }
    match Mint::unpack(&account.data) {
        Some(mint) if mint.is_initialized => Ok(mint),
        Some(_) => Err(InstructionError::Custom(TOKEN_UNINITIALIZED_STATE)),
        None => Err(InstructionError::InvalidAccountData(*address)),
    }
}

fn load_token_account(
    ctx: &InvocationContext<'_>,
    address: &Address,
) -> Result<TokenAccount, InstructionError> {
    let account = ctx
        .get(address)
        .ok_or(InstructionError::InvalidAccountData(*address))?;
    if account.owner != TOKEN_PROGRAM_ID {
        return Err(InstructionError::IncorrectProgramId(*address));
    }
    let state = TokenAccount::unpack(&account.data)
        .ok_or(InstructionError::InvalidAccountData(*address))?;
    match state.state {
        AccountState::Initialized => Ok(state),
        AccountState::Uninitialized => Err(InstructionError::Custom(TOKEN_UNINITIALIZED_STATE)),
        AccountState::Frozen => Err(InstructionError::Custom(TOKEN_ACCOUNT_FROZEN)),
    }
}

/// An account the token program owns, sized for `len`, not yet initialized.
fn require_blank(
    ctx: &InvocationContext<'_>,
    address: &Address,
    len: usize,
) -> Result<(), InstructionError> {
    let account = ctx
        .get(address)
        .ok_or(InstructionError::InvalidAccountData(*address))?;
    if account.owner != TOKEN_PROGRAM_ID {
        return Err(InstructionError::IncorrectProgramId(*address));
    }
    if account.data.len() != len {
        return Err(InstructionError::InvalidAccountData(*address));
    }
    if account.data.iter().any(|b| *b != 0) {
        return Err(InstructionError::Custom(TOKEN_ALREADY_IN_USE));
    }
    Ok(())
}

impl ProgramProcessor for TokenProcessor {
    fn process(&self, ctx: &mut InvocationContext<'_>) -> Result<(), InstructionError> {
        let ix = TokenInstruction::unpack(ctx.data()).ok_or(InstructionError::InvalidInstructionData)?;
        match ix {
            TokenInstruction::InitializeMint2 {
                decimals,
                mint_authority,
                freeze_authority,
            } => {
                let mint = ctx.account_address(0)?;
                require_blank(ctx, &mint, Mint::LEN)?;
                let state = Mint {
                    mint_authority: Some(mint_authority),
                    supply: 0,
                    decimals,
                    is_initialized: true,
                    freeze_authority,
                };
                ctx.set_data(&mint, state.pack())
            }
            TokenInstruction::InitializeAccount3 { owner } => {
                let account = ctx.account_address(0)?;
                let mint = ctx.account_address(1)?;
                require_blank(ctx, &account, TokenAccount::LEN)?;
                load_mint(ctx, &mint)?;
                let state = TokenAccount {
                    mint,
                    owner,
                    amount: 0,
                    state: AccountState::Initialized,
                };
                ctx.set_data(&account, state.pack())
            }
            TokenInstruction::MintTo { amount } => {
                let mint_key = ctx.account_address(0)?;
                let dest_key = ctx.account_address(1)?;
                let authority = ctx.account_address(2)?;

                let mut mint = load_mint(ctx, &mint_key)?;
                let mut dest = load_token_account(ctx, &dest_key)?;
                if dest.mint != mint_key {
                    return Err(InstructionError::Custom(TOKEN_MINT_MISMATCH));
                }
                if mint.mint_authority != Some(authority) {
                    return Err(InstructionError::Custom(TOKEN_OWNER_MISMATCH));
                }
                ctx.require_signer(&authority)?;

                mint.supply = mint
                    .supply
                    .checked_add(amount)
                    .ok_or(InstructionError::ArithmeticOverflow)?;
                dest.amount = dest
                    .amount
                    .checked_add(amount)
                    .ok_or(InstructionError::ArithmeticOverflow)?;
                ctx.set_data(&mint_key, mint.pack())?;
                ctx.set_data(&dest_key, dest.pack())
            }
            TokenInstruction::TransferChecked { amount, decimals } => {
                let source_key = ctx.account_address(0)?;
                let mint_key = ctx.account_address(1)?;
                let dest_key = ctx.account_address(2)?;
                let authority = ctx.account_address(3)?;

                let mint = load_mint(ctx, &mint_key)?;
                let mut source = load_token_account(ctx, &source_key)?;
                let mut dest = load_token_account(ctx, &dest_key)?;
                if source.mint != mint_key || dest.mint != mint_key {
                    return Err(InstructionError::Custom(TOKEN_MINT_MISMATCH));
                }
                if decimals != mint.decimals {
                    return Err(InstructionError::Custom(TOKEN_MINT_DECIMALS_MISMATCH));
                }
                if source.owner != authority {
                    return Err(InstructionError::Custom(TOKEN_OWNER_MISMATCH));
                }
                ctx.require_signer(&authority)?;
                if source.amount < amount {
                    return Err(InstructionError::Custom(TOKEN_INSUFFICIENT_FUNDS));
                }
                if source_key == dest_key {
                    return Ok(());
                }

                source.amount -= amount;
                dest.amount = dest
                    .amount
                    .checked_add(amount)
                    .ok_or(InstructionError::ArithmeticOverflow)?;
                ctx.set_data(&source_key, source.pack())?;
                ctx.set_data(&dest_key, dest.pack())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Associated-token program
// ---------------------------------------------------------------------------

pub struct AssociatedTokenProcessor;

impl ProgramProcessor for AssociatedTokenProcessor {
    fn process(&self, ctx: &mut InvocationContext<'_>) -> Result<(), InstructionError> {
        let idempotent = match ctx.data() {
            [] | [ATA_CREATE] => false,
            [ATA_CREATE_IDEMPOTENT] => true,
            _ => return Err(InstructionError::InvalidInstructionData),
        };
        let payer = ctx.account_address(0)?;
        let ata = ctx.account_address(1)?;
        let owner = ctx.account_address(2)?;
        let mint = ctx.account_address(3)?;

        let (expected, bump) = find_program_address(
            &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
            &ASSOCIATED_TOKEN_PROGRAM_ID,
        )
        .map_err(|_| InstructionError::InvalidSeeds)?;
        if expected != ata {
            return Err(InstructionError::InvalidSeeds);
        }

        if ctx.get(&ata).is_some() {
            if idempotent {
                let existing = load_token_account(ctx, &ata)?;
                if existing.owner == owner && existing.mint == mint {
                    return Ok(());
                }
            }
            return Err(InstructionError::AccountAlreadyInUse(ata));
        }

        load_mint(ctx, &mint)?;
        let rent = ctx.rent_exempt_minimum(TokenAccount::LEN);
        let bump_seed = [bump];
        let seeds: &[&[u8]] = &[
            owner.as_ref(),
            TOKEN_PROGRAM_ID.as_ref(),
            mint.as_ref(),
            &bump_seed,
        ];
        ctx.invoke(
            &system::create_account(&payer, &ata, rent, TokenAccount::LEN as u64, &TOKEN_PROGRAM_ID),
            &[seeds],
        )?;
        ctx.invoke(&token::initialize_account3(&ata, &mint, &owner), &[])
    }
}
