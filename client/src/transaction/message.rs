//! # Compiled Messages
//!
//! A [`Message`] is what actually gets signed. Compiling a list of
//! [`Instruction`]s deduplicates every account they touch, merges the
//! signer/writable flags of repeated references, and orders the keys so that
//! the three-byte header can describe the permissions of the whole table:
//!
//! ```text
//! [ fee payer | signer+writable | signer+readonly | writable | readonly ]
//!   \_______________ num_required_signatures ____/
//! ```
//!
//! Instructions then refer to accounts by one-byte index into that table.
//!
//! ## Wire Format
//!
//! ```text
//! header(3) ‖ compact_u16(n) ‖ key[0..n](32 each) ‖ blockhash(32)
//!           ‖ compact_u16(m) ‖ instruction[0..m]
//! instruction = program_index(1) ‖ compact_u16(k) ‖ index[0..k]
//!             ‖ compact_u16(len) ‖ data
//! ```

use crate::config::MAX_ACCOUNTS_PER_MESSAGE;
use crate::crypto::{Address, Blockhash};

use super::error::TransactionError;
use super::instruction::{AccountMeta, Instruction};

/// Largest length a compact-u16 prefix can carry.
pub const MAX_COMPACT_U16: usize = u16::MAX as usize;

/// Appends `len` in the ledger's variable-length "compact-u16" encoding:
/// seven bits per byte, high bit set on every byte but the last.
///
/// `len` must not exceed [`MAX_COMPACT_U16`]. [`Message::compile`] rejects
/// messages that would break this.
pub fn encode_compact_u16(buf: &mut Vec<u8>, len: usize) {
    debug_assert!(len <= MAX_COMPACT_U16, "compact-u16 overflow: {len}");
    let mut rem = len;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            buf.push(byte);
            return;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

fn check_length(what: &'static str, len: usize) -> Result<(), TransactionError> {
    if len > MAX_COMPACT_U16 {
        return Err(TransactionError::LengthOverflow {
            what,
            len,
            max: MAX_COMPACT_U16,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

/// An instruction whose addresses have been replaced by table indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Address>,
    pub recent_blockhash: Blockhash,
    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Clone, Copy)]
struct KeyEntry {
    address: Address,
    is_signer: bool,
    is_writable: bool,
}

impl KeyEntry {
    fn rank(&self) -> u8 {
        match (self.is_signer, self.is_writable) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        }
    }
}

fn upsert(keys: &mut Vec<KeyEntry>, address: Address, is_signer: bool, is_writable: bool) {
    match keys.iter_mut().find(|k| k.address == address) {
        Some(entry) => {
            entry.is_signer |= is_signer;
            entry.is_writable |= is_writable;
        }
        None => keys.push(KeyEntry {
            address,
            is_signer,
            is_writable,
        }),
    }
}

impl Message {
    /// Compiles `instructions` into a message paid for by `fee_payer`.
    ///
    /// The fee payer is always key 0, signer and writable. Program ids are
    /// added as read-only non-signers unless an instruction also lists them
    /// as an account with stronger flags.
    pub fn compile(
        instructions: &[Instruction],
        fee_payer: &Address,
        recent_blockhash: Blockhash,
    ) -> Result<Self, TransactionError> {
        if instructions.is_empty() {
            return Err(TransactionError::NoInstructions);
        }
        check_length("instruction list", instructions.len())?;
        for ix in instructions {
            check_length("instruction account list", ix.accounts.len())?;
            check_length("instruction data", ix.data.len())?;
        }

        let mut keys = vec![KeyEntry {
            address: *fee_payer,
            is_signer: true,
            is_writable: true,
        }];
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(&mut keys, meta.address, meta.is_signer, meta.is_writable);
            }
            upsert(&mut keys, ix.program_id, false, false);
        }

        if keys.len() > MAX_ACCOUNTS_PER_MESSAGE {
            return Err(TransactionError::TooManyAccounts {
                count: keys.len(),
                max: MAX_ACCOUNTS_PER_MESSAGE,
            });
        }

        // Stable: the fee payer stays in front of the other signer+writable keys.
        keys.sort_by_key(KeyEntry::rank);

        let count = |pred: fn(&KeyEntry) -> bool| {
            let n = keys.iter().filter(|k| pred(k)).count();
            u8::try_from(n).map_err(|_| TransactionError::TooManySigners {
                count: n,
                max: usize::from(u8::MAX),
            })
        };
        let header = MessageHeader {
            num_required_signatures: count(|k| k.is_signer)?,
            num_readonly_signed_accounts: count(|k| k.is_signer && !k.is_writable)?,
            num_readonly_unsigned_accounts: count(|k| !k.is_signer && !k.is_writable)?,
        };

        let account_keys: Vec<Address> = keys.iter().map(|k| k.address).collect();
        let index_of = |address: &Address| -> u8 {
            // Every address was inserted above and the table fits in a u8.
            account_keys
                .iter()
                .position(|k| k == address)
                .unwrap_or_default() as u8
        };

        let compiled = instructions
            .iter()
            .map(|ix| CompiledInstruction {
                program_id_index: index_of(&ix.program_id),
                accounts: ix.accounts.iter().map(|m| index_of(&m.address)).collect(),
                data: ix.data.clone(),
            })
            .collect();

        tracing::debug!(
            accounts = account_keys.len(),
            signers = header.num_required_signatures,
            instructions = instructions.len(),
            "compiled message"
        );

        Ok(Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// The account paying fees. Always the first key.
    pub fn fee_payer(&self) -> Option<&Address> {
        self.account_keys.first()
    }

    /// Keys whose signatures the message requires, in signature-slot order.
    pub fn signer_keys(&self) -> &[Address] {
        let n = usize::from(self.header.num_required_signatures).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < usize::from(self.header.num_required_signatures)
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let signed = usize::from(self.header.num_required_signatures);
        if index >= self.account_keys.len() {
            return false;
        }
        if index < signed {
            index < signed - usize::from(self.header.num_readonly_signed_accounts)
        } else {
            let unsigned = self.account_keys.len() - signed;
            index - signed < unsigned - usize::from(self.header.num_readonly_unsigned_accounts)
        }
    }

    /// Expands compiled instructions back into address form, with the
    /// flags the header grants each account.
    pub fn decompile(&self) -> Vec<Instruction> {
        let key = |i: u8| {
            self.account_keys
                .get(usize::from(i))
                .copied()
                .unwrap_or_default()
        };
        self.instructions
            .iter()
            .map(|ci| Instruction {
                program_id: key(ci.program_id_index),
                accounts: ci
                    .accounts
                    .iter()
                    .map(|&i| AccountMeta {
                        address: key(i),
                        is_signer: self.is_signer(usize::from(i)),
                        is_writable: self.is_writable(usize::from(i)),
                    })
                    .collect(),
                data: ci.data.clone(),
            })
            .collect()
    }

    /// The exact bytes signers sign and the network charges for.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(3 + 1 + self.account_keys.len() * 32 + 32 + 64);
        buf.push(self.header.num_required_signatures);
        buf.push(self.header.num_readonly_signed_accounts);
        buf.push(self.header.num_readonly_unsigned_accounts);

        encode_compact_u16(&mut buf, self.account_keys.len());
        for key in &self.account_keys {
            buf.extend_from_slice(key.as_bytes());
        }

        buf.extend_from_slice(self.recent_blockhash.as_bytes());

        encode_compact_u16(&mut buf, self.instructions.len());
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            encode_compact_u16(&mut buf, ix.accounts.len());
            buf.extend_from_slice(&ix.accounts);
            encode_compact_u16(&mut buf, ix.data.len());
            buf.extend_from_slice(&ix.data);
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SYSTEM_PROGRAM_ID;

    fn compact(len: usize) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_compact_u16(&mut buf, len);
        buf
    }

    #[test]
    fn compact_u16_encoding() {
        assert_eq!(compact(0), vec![0x00]);
        assert_eq!(compact(0x7f), vec![0x7f]);
        assert_eq!(compact(0x80), vec![0x80, 0x01]);
        assert_eq!(compact(0x3fff), vec![0xff, 0x7f]);
        assert_eq!(compact(0x4000), vec![0x80, 0x80, 0x01]);
        assert_eq!(compact(0xffff), vec![0xff, 0xff, 0x03]);
    }

    fn transfer_ix(from: Address, to: Address) -> Instruction {
        Instruction::new(
            SYSTEM_PROGRAM_ID,
            vec![AccountMeta::new(from, true), AccountMeta::new(to, false)],
            vec![2, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0],
        )
    }

    #[test]
    fn simple_transfer_layout() {
        let from = Address::new_random();
        let to = Address::new_random();
        let hash = Blockhash::default().next();
        let msg = Message::compile(&[transfer_ix(from, to)], &from, hash).unwrap();

        assert_eq!(msg.account_keys, vec![from, to, SYSTEM_PROGRAM_ID]);
        assert_eq!(
            msg.header,
            MessageHeader {
                num_required_signatures: 1,
                num_readonly_signed_accounts: 0,
                num_readonly_unsigned_accounts: 1,
            }
        );

        let bytes = msg.serialize();
        assert_eq!(&bytes[..4], &[1, 0, 1, 3]);
        assert_eq!(&bytes[4..36], from.as_bytes());
        assert_eq!(&bytes[100..132], hash.as_bytes());
        // one instruction: program 2, accounts [0, 1], 12 data bytes
        assert_eq!(&bytes[132..138], &[1, 2, 2, 0, 1, 12]);
        assert_eq!(bytes.len(), 138 + 12);
    }

    #[test]
    fn fee_payer_is_first_even_if_referenced_later() {
        let payer = Address::new_random();
        let other_signer = Address::new_random();
        let to = Address::new_random();
        let msg = Message::compile(&[transfer_ix(other_signer, to)], &payer, Blockhash::default())
            .unwrap();
        assert_eq!(msg.fee_payer(), Some(&payer));
        assert_eq!(msg.signer_keys(), &[payer, other_signer]);
    }

    #[test]
    fn duplicate_references_merge_flags() {
        let payer = Address::new_random();
        let shared = Address::new_random();
        let program = Address::new_random();
        let a = Instruction::new(program, vec![AccountMeta::new_readonly(shared, false)], vec![]);
        let b = Instruction::new(program, vec![AccountMeta::new(shared, false)], vec![]);
        let msg = Message::compile(&[a, b], &payer, Blockhash::default()).unwrap();

        assert_eq!(msg.account_keys.len(), 3);
        let idx = msg.account_keys.iter().position(|k| *k == shared).unwrap();
        assert!(msg.is_writable(idx));
        assert!(!msg.is_signer(idx));
        assert_eq!(msg.instructions[0].accounts, msg.instructions[1].accounts);
    }

    #[test]
    fn readonly_signer_ordering() {
        let payer = Address::new_random();
        let ro_signer = Address::new_random();
        let w_signer = Address::new_random();
        let program = Address::new_random();
        let ix = Instruction::new(
            program,
            vec![
                AccountMeta::new_readonly(ro_signer, true),
                AccountMeta::new(w_signer, true),
            ],
            vec![],
        );
        let msg = Message::compile(&[ix], &payer, Blockhash::default()).unwrap();
        assert_eq!(msg.account_keys, vec![payer, w_signer, ro_signer, program]);
        assert_eq!(msg.header.num_required_signatures, 3);
        assert_eq!(msg.header.num_readonly_signed_accounts, 1);
        assert!(msg.is_writable(1));
        assert!(!msg.is_writable(2));
        assert!(!msg.is_writable(3));
    }

    #[test]
    fn decompile_restores_instructions() {
        let from = Address::new_random();
        let to = Address::new_random();
        let ix = transfer_ix(from, to);
        let msg = Message::compile(std::slice::from_ref(&ix), &from, Blockhash::default()).unwrap();
        assert_eq!(msg.decompile(), vec![ix]);
    }

    #[test]
    fn empty_instruction_list_is_rejected() {
        let payer = Address::new_random();
        assert_eq!(
            Message::compile(&[], &payer, Blockhash::default()),
            Err(TransactionError::NoInstructions)
        );
    }

    #[test]
    fn too_many_accounts_is_rejected() {
        let payer = Address::new_random();
        let program = Address::new_random();
        let accounts = (0..MAX_ACCOUNTS_PER_MESSAGE)
            .map(|_| AccountMeta::new_readonly(Address::new_random(), false))
            .collect();
        let ix = Instruction::new(program, accounts, vec![]);
        assert!(matches!(
            Message::compile(&[ix], &payer, Blockhash::default()),
            Err(TransactionError::TooManyAccounts { .. })
        ));
    }

    #[test]
    fn signer_count_must_fit_the_header() {
        let payer = Address::new_random();
        let program = Address::new_random();
        // 256 keys in total, every one of them a signer.
        let mut accounts: Vec<AccountMeta> = (0..MAX_ACCOUNTS_PER_MESSAGE - 2)
            .map(|_| AccountMeta::new(Address::new_random(), true))
            .collect();
        accounts.push(AccountMeta::new_readonly(program, true));
        let ix = Instruction::new(program, accounts, vec![]);
        assert_eq!(
            Message::compile(&[ix], &payer, Blockhash::default()),
            Err(TransactionError::TooManySigners { count: 256, max: 255 })
        );
    }

    #[test]
    fn oversized_data_is_rejected_before_encoding() {
        let payer = Address::new_random();
        let ix = Instruction::new(SYSTEM_PROGRAM_ID, vec![], vec![0; MAX_COMPACT_U16 + 1]);
        assert!(matches!(
            Message::compile(&[ix], &payer, Blockhash::default()),
            Err(TransactionError::LengthOverflow { what: "instruction data", .. })
        ));

        let fits = Instruction::new(SYSTEM_PROGRAM_ID, vec![], vec![0; MAX_COMPACT_U16]);
        assert!(Message::compile(&[fits], &payer, Blockhash::default()).is_ok());
    }
}
