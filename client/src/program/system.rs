//! System program instructions.
//!
//! Data is a little-endian `u32` tag followed by fixed-width fields, the
//! same hand-packed layout the ledger's own bincode encoding produces for
//! these variants.

use crate::config::SYSTEM_PROGRAM_ID;
use crate::crypto::Address;
use crate::transaction::{AccountMeta, Instruction};

const CREATE_ACCOUNT_TAG: u32 = 0;
const TRANSFER_TAG: u32 = 2;

/// Decoded system instruction data. Only the variants this client emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemInstruction {
    CreateAccount {
        lamports: u64,
        space: u64,
        owner: Address,
    },
    Transfer {
        lamports: u64,
    },
}

impl SystemInstruction {
    pub fn pack(&self) -> Vec<u8> {
        match self {
            Self::CreateAccount {
                lamports,
                space,
                owner,
            } => {
                let mut buf = Vec::with_capacity(52);
                buf.extend_from_slice(&CREATE_ACCOUNT_TAG.to_le_bytes());
                buf.extend_from_slice(&lamports.to_le_bytes());
                buf.extend_from_slice(&space.to_le_bytes());
                buf.extend_from_slice(owner.as_bytes());
                buf
            }
            Self::Transfer { lamports } => {
                let mut buf = Vec::with_capacity(12);
                buf.extend_from_slice(&TRANSFER_TAG.to_le_bytes());
                buf.extend_from_slice(&lamports.to_le_bytes());
                buf
            }
        }
    }

    /// Returns `None` for unknown tags or truncated data.
    pub fn unpack(data: &[u8]) -> Option<Self> {
        let tag = u32::from_le_bytes(data.get(..4)?.try_into().ok()?);
        let u64_at = |at: usize| -> Option<u64> {
            Some(u64::from_le_bytes(data.get(at..at + 8)?.try_into().ok()?))
        };
        match tag {
            CREATE_ACCOUNT_TAG => Some(Self::CreateAccount {
                lamports: u64_at(4)?,
                space: u64_at(12)?,
                owner: Address::try_from(data.get(20..52)?).ok()?,
            }),
            TRANSFER_TAG => Some(Self::Transfer {
                lamports: u64_at(4)?,
            }),
            _ => None,
        }
    }
}

/// Moves `lamports` from `from` (signer) to `to`.
pub fn transfer(from: &Address, to: &Address, lamports: u64) -> Instruction {
    Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
        SystemInstruction::Transfer { lamports }.pack(),
    )
}

/// Funds and allocates `new_account`, assigning it to `owner`. Both
/// `from` and `new_account` must sign.
pub fn create_account(
    from: &Address,
    new_account: &Address,
    lamports: u64,
    space: u64,
    owner: &Address,
) -> Instruction {
    Instruction::new(
        SYSTEM_PROGRAM_ID,
        vec![
            AccountMeta::new(*from, true),
            AccountMeta::new(*new_account, true),
        ],
        SystemInstruction::CreateAccount {
            lamports,
            space,
            owner: *owner,
        }
        .pack(),
    )
}
