//! # Token & Associated-Token Programs
//!
//! Instruction builders for the fungible-token program and the
//! associated-token-account program, the packed layouts of mint and token
//! accounts, and conversion between UI amounts ("0.5") and base units.
//!
//! ## Account Layouts
//!
//! ```text
//! Mint (82 bytes)
//!   0..36   mint_authority    COption<Address>  (u32 tag ‖ 32 bytes)
//!   36..44  supply            u64
//!   44      decimals          u8
//!   45      is_initialized    bool
//!   46..82  freeze_authority  COption<Address>
//!
//! Token account (165 bytes)
//!   0..32    mint             Address
//!   32..64   owner            Address
//!   64..72   amount           u64
//!   72..108  delegate         COption<Address>
//!   108      state            u8 (0 uninit, 1 initialized, 2 frozen)
//!   109..121 is_native        COption<u64>
//!   121..129 delegated_amount u64
//!   129..165 close_authority  COption<Address>
//! ```

use thiserror::Error;

use crate::config::{
    ASSOCIATED_TOKEN_PROGRAM_ID, MINT_ACCOUNT_LEN, SYSTEM_PROGRAM_ID, TOKEN_ACCOUNT_LEN,
    TOKEN_PROGRAM_ID,
};
use crate::crypto::Address;
use crate::transaction::{AccountMeta, Instruction};

// ---------------------------------------------------------------------------
// Token program instructions
// ---------------------------------------------------------------------------

const MINT_TO_TAG: u8 = 7;
const TRANSFER_CHECKED_TAG: u8 = 12;
const INITIALIZE_ACCOUNT3_TAG: u8 = 18;
const INITIALIZE_MINT2_TAG: u8 = 20;

/// The token-program instructions this client emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenInstruction {
    InitializeMint2 {
        decimals: u8,
        mint_authority: Address,
        freeze_authority: Option<Address>,
    },
    MintTo {
        amount: u64,
    },
    TransferChecked {
        amount: u64,
        decimals: u8,
    },
    InitializeAccount3 {
        owner: Address,
    },
}

impl TokenInstruction {
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(67);
        match self {
            Self::InitializeMint2 {
                decimals,
                mint_authority,
                freeze_authority,
            } => {
                buf.push(INITIALIZE_MINT2_TAG);
                buf.push(*decimals);
                buf.extend_from_slice(mint_authority.as_bytes());
                match freeze_authority {
                    Some(key) => {
                        buf.push(1);
                        buf.extend_from_slice(key.as_bytes());
                    }
                    None => buf.push(0),
                }
            }
            Self::MintTo { amount } => {
                buf.push(MINT_TO_TAG);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::TransferChecked { amount, decimals } => {
                buf.push(TRANSFER_CHECKED_TAG);
                buf.extend_from_slice(&amount.to_le_bytes());
                buf.push(*decimals);
            }
            Self::InitializeAccount3 { owner } => {
                buf.push(INITIALIZE_ACCOUNT3_TAG);
                buf.extend_from_slice(owner.as_bytes());
            }
        }
        buf
    }

    pub fn unpack(data: &[u8]) -> Option<Self> {
        let (&tag, rest) = data.split_first()?;
        let amount = || -> Option<u64> { Some(u64::from_le_bytes(rest.get(..8)?.try_into().ok()?)) };
        match tag {
            INITIALIZE_MINT2_TAG => {
                let decimals = *rest.first()?;
                let mint_authority = Address::try_from(rest.get(1..33)?).ok()?;
                let freeze_authority = match rest.get(33)? {
                    0 => None,
                    1 => Some(Address::try_from(rest.get(34..66)?).ok()?),
                    _ => return None,
                };
                Some(Self::InitializeMint2 {
                    decimals,
                    mint_authority,
                    freeze_authority,
                })
            }
            MINT_TO_TAG => Some(Self::MintTo { amount: amount()? }),
            TRANSFER_CHECKED_TAG => Some(Self::TransferChecked {
                amount: amount()?,
                decimals: *rest.get(8)?,
            }),
            INITIALIZE_ACCOUNT3_TAG => Some(Self::InitializeAccount3 {
                owner: Address::try_from(rest.get(..32)?).ok()?,
            }),
            _ => None,
        }
    }
}

/// Initializes a freshly allocated mint account. No rent sysvar needed.
pub fn initialize_mint2(
    mint: &Address,
    mint_authority: &Address,
    freeze_authority: Option<&Address>,
    decimals: u8,
) -> Instruction {
    Instruction::new(
        TOKEN_PROGRAM_ID,
        vec![AccountMeta::new(*mint, false)],
        TokenInstruction::InitializeMint2 {
            decimals,
            mint_authority: *mint_authority,
            freeze_authority: freeze_authority.copied(),
        }
        .pack(),
    )
}

/// Mints `amount` base units into `destination`. `authority` signs.
pub fn mint_to(
    mint: &Address,
    destination: &Address,
    authority: &Address,
    amount: u64,
) -> Instruction {
    Instruction::new(
        TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::new(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        TokenInstruction::MintTo { amount }.pack(),
    )
}

/// Transfers `amount` base units, asserting the mint's `decimals` so a
/// wrong-precision amount fails on-chain instead of moving the wrong value.
pub fn transfer_checked(
    source: &Address,
    mint: &Address,
    destination: &Address,
    authority: &Address,
    amount: u64,
    decimals: u8,
) -> Instruction {
    Instruction::new(
        TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::new(*source, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*authority, true),
        ],
        TokenInstruction::TransferChecked { amount, decimals }.pack(),
    )
}

/// Initializes an allocated token account for `(mint, owner)`.
pub fn initialize_account3(account: &Address, mint: &Address, owner: &Address) -> Instruction {
    Instruction::new(
        TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::new(*account, false),
            AccountMeta::new_readonly(*mint, false),
        ],
        TokenInstruction::InitializeAccount3 { owner: *owner }.pack(),
    )
}

// ---------------------------------------------------------------------------
// Associated-token program
// ---------------------------------------------------------------------------

/// Data byte of the strict create instruction. Fails if the account exists.
pub const ATA_CREATE: u8 = 0;

/// Data byte of the idempotent create instruction.
pub const ATA_CREATE_IDEMPOTENT: u8 = 1;

/// Creates the associated token account `ata` for `(owner, mint)`, funded by
/// `payer`. The caller supplies `ata`, already derived.
pub fn create_associated_token_account(
    payer: &Address,
    ata: &Address,
    owner: &Address,
    mint: &Address,
) -> Instruction {
    Instruction::new(
        ASSOCIATED_TOKEN_PROGRAM_ID,
        vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(*ata, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
        ],
        vec![ATA_CREATE],
    )
}

// ---------------------------------------------------------------------------
// Account state
// ---------------------------------------------------------------------------

fn read_u64(data: &[u8], at: usize) -> Option<u64> {
    Some(u64::from_le_bytes(data.get(at..at + 8)?.try_into().ok()?))
}

fn read_address(data: &[u8], at: usize) -> Option<Address> {
    Address::try_from(data.get(at..at + 32)?).ok()
}

fn read_coption_address(data: &[u8], at: usize) -> Option<Option<Address>> {
    match u32::from_le_bytes(data.get(at..at + 4)?.try_into().ok()?) {
        0 => Some(None),
        1 => Some(Some(read_address(data, at + 4)?)),
        _ => None,
    }
}

fn write_coption_address(buf: &mut Vec<u8>, value: Option<&Address>) {
    match value {
        Some(key) => {
            buf.extend_from_slice(&1u32.to_le_bytes());
            buf.extend_from_slice(key.as_bytes());
        }
        None => buf.extend_from_slice(&[0u8; 36]),
    }
}

/// A fungible-token mint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mint {
    pub mint_authority: Option<Address>,
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
    pub freeze_authority: Option<Address>,
}

impl Mint {
    pub const LEN: usize = MINT_ACCOUNT_LEN;

    pub fn unpack(data: &[u8]) -> Option<Self> {
        if data.len() != Self::LEN {
            return None;
        }
        Some(Self {
            mint_authority: read_coption_address(data, 0)?,
            supply: read_u64(data, 36)?,
            decimals: data[44],
            is_initialized: match data[45] {
                0 => false,
                1 => true,
                _ => return None,
            },
            freeze_authority: read_coption_address(data, 46)?,
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::LEN);
        write_coption_address(&mut buf, self.mint_authority.as_ref());
        buf.extend_from_slice(&self.supply.to_le_bytes());
        buf.push(self.decimals);
        buf.push(u8::from(self.is_initialized));
        write_coption_address(&mut buf, self.freeze_authority.as_ref());
        buf
    }
}

/// Lifecycle state of a token account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccountState {
    #[default]
    Uninitialized,
    Initialized,
    Frozen,
}

/// A holding of one mint by one owner. Native-wrapped and delegated
/// balances are not modelled; those fields pack as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenAccount {
    pub mint: Address,
    pub owner: Address,
    pub amount: u64,
    pub state: AccountState,
}

impl TokenAccount {
    pub const LEN: usize = TOKEN_ACCOUNT_LEN;

    pub fn unpack(data: &[u8]) -> Option<Self> {
        if data.len() != Self::LEN {
            return None;
        }
        Some(Self {
            mint: read_address(data, 0)?,
            owner: read_address(data, 32)?,
            amount: read_u64(data, 64)?,
            state: match data[108] {
                0 => AccountState::Uninitialized,
                1 => AccountState::Initialized,
                2 => AccountState::Frozen,
                _ => return None,
            },
        })
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];
        buf[0..32].copy_from_slice(self.mint.as_bytes());
        buf[32..64].copy_from_slice(self.owner.as_bytes());
        buf[64..72].copy_from_slice(&self.amount.to_le_bytes());
        buf[108] = match self.state {
            AccountState::Uninitialized => 0,
            AccountState::Initialized => 1,
            AccountState::Frozen => 2,
        };
        buf
    }
}

// ---------------------------------------------------------------------------
// UI amounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid character in amount {0:?}")]
    InvalidDigit(String),

    #[error("amount {amount:?} has more than {decimals} decimal places")]
    TooPrecise { amount: String, decimals: u8 },

    #[error("amount {0:?} does not fit in u64 base units")]
    Overflow(String),
}

/// Converts a decimal string such as `"0.5"` into base units for a mint with
/// `decimals` places. Pure integer arithmetic; no floating point.
///
/// ```
/// use vault_client::program::token::parse_ui_amount;
///
/// assert_eq!(parse_ui_amount("0.5", 6).unwrap(), 500_000);
/// assert_eq!(parse_ui_amount("12", 2).unwrap(), 1_200);
/// ```
pub fn parse_ui_amount(text: &str, decimals: u8) -> Result<u64, AmountError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AmountError::Empty);
    }
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::InvalidDigit(text.to_string()));
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return Err(AmountError::InvalidDigit(text.to_string()));
    }

    let frac = frac.trim_end_matches('0');
    if frac.len() > usize::from(decimals) {
        return Err(AmountError::TooPrecise {
            amount: text.to_string(),
            decimals,
        });
    }

    let overflow = || AmountError::Overflow(text.to_string());
    let scale = 10u64.checked_pow(u32::from(decimals)).ok_or_else(overflow)?;
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let frac_units: u64 = if frac.is_empty() {
        0
    } else {
        let pad = 10u64
            .checked_pow(u32::from(decimals) - frac.len() as u32)
            .ok_or_else(overflow)?;
        frac.parse::<u64>()
            .map_err(|_| overflow())?
            .checked_mul(pad)
            .ok_or_else(overflow)?
    };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(overflow)
}

/// Renders base units as a decimal string, trimming trailing zeros.
pub fn format_ui_amount(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let digits = format!("{:0>width$}", amount, width = usize::from(decimals) + 1);
    let (whole, frac) = digits.split_at(digits.len() - usize::from(decimals));
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, frac)
    }
}
