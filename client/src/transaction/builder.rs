//! Transaction construction via the builder pattern.
//!
//! A [`TransactionBuilder`] is a plain value: fee payer, instructions and a
//! recent blockhash. Nothing is compiled until [`TransactionBuilder::build`]
//! (or [`TransactionBuilder::compile_message`] for fee quotes), so a builder
//! can be inspected, copied and amended freely.
//!
//! Amendment is by reconstruction. [`TransactionBuilder::with_instruction_replaced`]
//! returns a *new* builder and leaves the original untouched, which is how
//! the fee-exact transfer swaps its provisional instruction for the
//! corrected one.

use serde::{Deserialize, Serialize};

use super::error::TransactionError;
use super::instruction::Instruction;
use super::message::{encode_compact_u16, Message};
use super::signing::sign_transaction;
use crate::config::PACKET_DATA_SIZE;
use crate::crypto::{Address, Blockhash, Keypair, Signature};

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A compiled message plus one signature slot per required signer.
///
/// Slots are filled in signer order. An unfilled slot holds the all-zero
/// signature; submitting such a transaction is rejected by the network with
/// a missing-signature error naming the absent signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    /// Wraps `message` with empty signature slots.
    pub fn new_unsigned(message: Message) -> Self {
        let slots = usize::from(message.header.num_required_signatures);
        Self {
            signatures: vec![Signature::default(); slots],
            message,
        }
    }

    /// The transaction id: its first (fee payer) signature.
    pub fn signature(&self) -> Option<&Signature> {
        self.signatures.first().filter(|s| !s.is_empty())
    }

    pub fn is_fully_signed(&self) -> bool {
        self.signatures.iter().all(|s| !s.is_empty())
    }

    /// Required signers whose slot is still empty.
    pub fn missing_signers(&self) -> Vec<Address> {
        self.message
            .signer_keys()
            .iter()
            .zip(&self.signatures)
            .filter(|(_, sig)| sig.is_empty())
            .map(|(key, _)| *key)
            .collect()
    }

    /// Wire encoding: `compact_u16(n) ‖ signature[0..n] ‖ message`.
    pub fn serialize(&self) -> Vec<u8> {
        let message = self.message.serialize();
        let mut buf = Vec::with_capacity(3 + self.signatures.len() * Signature::LEN + message.len());
        encode_compact_u16(&mut buf, self.signatures.len());
        for sig in &self.signatures {
            buf.extend_from_slice(sig.as_bytes());
        }
        buf.extend_from_slice(&message);
        buf
    }

    pub fn size_bytes(&self) -> usize {
        self.serialize().len()
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Transaction`]s.
///
/// # Usage
///
/// ```rust
/// use vault_client::crypto::{Blockhash, Keypair};
/// use vault_client::program::system;
/// use vault_client::transaction::TransactionBuilder;
///
/// let payer = Keypair::generate();
/// let to = Keypair::generate().address();
///
/// let tx = TransactionBuilder::new()
///     .fee_payer(payer.address())
///     .instruction(system::transfer(&payer.address(), &to, 1_000))
///     .recent_blockhash(Blockhash::default())
///     .build(&[&payer])
///     .unwrap();
///
/// assert!(tx.is_fully_signed());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBuilder {
    fee_payer: Option<Address>,
    instructions: Vec<Instruction>,
    recent_blockhash: Option<Blockhash>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the account that pays fees. It becomes the first signer.
    pub fn fee_payer(mut self, payer: Address) -> Self {
        self.fee_payer = Some(payer);
        self
    }

    /// Appends one instruction.
    pub fn instruction(mut self, ix: Instruction) -> Self {
        self.instructions.push(ix);
        self
    }

    /// Appends several instructions, preserving order.
    pub fn instructions(mut self, ixs: impl IntoIterator<Item = Instruction>) -> Self {
        self.instructions.extend(ixs);
        self
    }

    /// Anchors the transaction to a recent blockhash.
    pub fn recent_blockhash(mut self, hash: Blockhash) -> Self {
        self.recent_blockhash = Some(hash);
        self
    }

    pub fn get_instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn get_fee_payer(&self) -> Option<&Address> {
        self.fee_payer.as_ref()
    }

    /// Returns a copy of this builder with instruction `index` swapped for
    /// `ix`. The receiver is not modified.
    pub fn with_instruction_replaced(
        &self,
        index: usize,
        ix: Instruction,
    ) -> Result<Self, TransactionError> {
        if index >= self.instructions.len() {
            return Err(TransactionError::InstructionIndexOutOfRange {
                index,
                len: self.instructions.len(),
            });
        }
        let mut next = self.clone();
        next.instructions[index] = ix;
        Ok(next)
    }

    /// Compiles the message without signing. This is what fee quotes are
    /// computed over.
    pub fn compile_message(&self) -> Result<Message, TransactionError> {
        let payer = self.fee_payer.ok_or(TransactionError::MissingFeePayer)?;
        let hash = self
            .recent_blockhash
            .ok_or(TransactionError::MissingBlockhash)?;
        Message::compile(&self.instructions, &payer, hash)
    }

    /// Compiles and signs with every keypair in `signers`.
    ///
    /// Signers may be a subset of the required set; unfilled slots stay
    /// empty and the network decides. A keypair the message does not ask
    /// for is an error, as is a transaction too large for one packet.
    pub fn build(&self, signers: &[&Keypair]) -> Result<Transaction, TransactionError> {
        let message = self.compile_message()?;
        let mut tx = Transaction::new_unsigned(message);
        sign_transaction(&mut tx, signers)?;

        let size = tx.size_bytes();
        if size > PACKET_DATA_SIZE {
            return Err(TransactionError::TooLarge {
                size,
                max: PACKET_DATA_SIZE,
            });
        }
        Ok(tx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::system;
    use crate::transaction::instruction::AccountMeta;

    fn sample(payer: &Keypair, to: &Address, lamports: u64) -> TransactionBuilder {
        TransactionBuilder::new()
            .fee_payer(payer.address())
            .instruction(system::transfer(&payer.address(), to, lamports))
            .recent_blockhash(Blockhash::default().next())
    }

    #[test]
    fn build_signs_every_required_slot() {
        let payer = Keypair::generate();
        let to = Address::new_random();
        let tx = sample(&payer, &to, 10).build(&[&payer]).unwrap();
        assert_eq!(tx.signatures.len(), 1);
        assert!(tx.is_fully_signed());
        assert!(tx.missing_signers().is_empty());
        assert_eq!(tx.signature(), tx.signatures.first());
    }

    #[test]
    fn same_inputs_same_transaction() {
        let payer = Keypair::generate();
        let to = Address::new_random();
        let a = sample(&payer, &to, 10).build(&[&payer]).unwrap();
        let b = sample(&payer, &to, 10).build(&[&payer]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_fields_are_reported() {
        let payer = Keypair::generate();
        let ix = system::transfer(&payer.address(), &Address::new_random(), 1);

        let no_payer = TransactionBuilder::new()
            .instruction(ix.clone())
            .recent_blockhash(Blockhash::default());
        assert_eq!(
            no_payer.build(&[&payer]),
            Err(TransactionError::MissingFeePayer)
        );

        let no_hash = TransactionBuilder::new()
            .fee_payer(payer.address())
            .instruction(ix);
        assert_eq!(
            no_hash.build(&[&payer]),
            Err(TransactionError::MissingBlockhash)
        );
    }

    #[test]
    fn partial_signing_leaves_slots_empty() {
        let payer = Keypair::generate();
        let cosigner = Keypair::generate();
        let ix = Instruction::new(
            Address::new_random(),
            vec![
                AccountMeta::new(payer.address(), true),
                AccountMeta::new(cosigner.address(), true),
            ],
            vec![0],
        );
        let tx = TransactionBuilder::new()
            .fee_payer(payer.address())
            .instruction(ix)
            .recent_blockhash(Blockhash::default())
            .build(&[&payer])
            .unwrap();

        assert!(!tx.is_fully_signed());
        assert_eq!(tx.missing_signers(), vec![cosigner.address()]);
        assert!(tx.signature().is_some());
    }

    #[test]
    fn replacing_an_instruction_leaves_the_original_alone() {
        let payer = Keypair::generate();
        let to = Address::new_random();
        let provisional = sample(&payer, &to, 1_000);
        let corrected = provisional
            .with_instruction_replaced(0, system::transfer(&payer.address(), &to, 995))
            .unwrap();

        assert_eq!(
            provisional.get_instructions()[0],
            system::transfer(&payer.address(), &to, 1_000)
        );
        assert_eq!(
            corrected.get_instructions()[0],
            system::transfer(&payer.address(), &to, 995)
        );
        // Same shape, so the fee (a function of the message size) is unchanged.
        assert_eq!(
            provisional.compile_message().unwrap().serialize().len(),
            corrected.compile_message().unwrap().serialize().len()
        );
    }

    #[test]
    fn replace_out_of_range_is_an_error() {
        let payer = Keypair::generate();
        let b = sample(&payer, &Address::new_random(), 1);
        assert_eq!(
            b.with_instruction_replaced(3, system::transfer(&payer.address(), &payer.address(), 1)),
            Err(TransactionError::InstructionIndexOutOfRange { index: 3, len: 1 })
        );
    }

    #[test]
    fn oversized_transaction_is_rejected_locally() {
        let payer = Keypair::generate();
        let ix = Instruction::new(
            Address::new_random(),
            vec![AccountMeta::new(payer.address(), true)],
            vec![0u8; PACKET_DATA_SIZE],
        );
        let result = TransactionBuilder::new()
            .fee_payer(payer.address())
            .instruction(ix)
            .recent_blockhash(Blockhash::default())
            .build(&[&payer]);
        assert!(matches!(result, Err(TransactionError::TooLarge { .. })));
    }

    #[test]
    fn wire_format_prefixes_signatures() {
        let payer = Keypair::generate();
        let tx = sample(&payer, &Address::new_random(), 5).build(&[&payer]).unwrap();
        let bytes = tx.serialize();
        assert_eq!(bytes[0], 1);
        assert_eq!(&bytes[1..65], tx.signatures[0].as_bytes());
        assert_eq!(&bytes[65..], tx.message.serialize().as_slice());
    }
}
