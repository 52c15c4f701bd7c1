//! Transaction signing and signature checks.
//!
//! Signing is separate from building so a transaction can be assembled by
//! one party and signed by several (the vault's `initialize` needs both the
//! owner and the fresh state account). Every signer signs the same bytes:
//! the serialized message.

use super::builder::Transaction;
use super::error::TransactionError;
use crate::crypto::Keypair;

/// Fills the signature slots belonging to `signers`.
///
/// Slots of required signers not in `signers` are left untouched, so this
/// can be called repeatedly as co-signers become available. Offering a
/// keypair the message does not require is an error and nothing is signed.
pub fn sign_transaction(
    tx: &mut Transaction,
    signers: &[&Keypair],
) -> Result<(), TransactionError> {
    let required = tx.message.signer_keys();
    let mut positions = Vec::with_capacity(signers.len());
    for signer in signers {
        let address = signer.address();
        let slot = required
            .iter()
            .position(|k| *k == address)
            .ok_or(TransactionError::UnexpectedSigner(address))?;
        positions.push(slot);
    }

    let bytes = tx.message.serialize();
    for (signer, slot) in signers.iter().zip(positions) {
        tx.signatures[slot] = signer.sign(&bytes);
    }
    Ok(())
}

/// Checks every filled slot against its signer. Empty slots are skipped;
/// use [`Transaction::missing_signers`] to find those.
pub fn verify_signatures(tx: &Transaction) -> Result<(), TransactionError> {
    let bytes = tx.message.serialize();
    for (signer, sig) in tx.message.signer_keys().iter().zip(&tx.signatures) {
        if !sig.is_empty() && !sig.verify(signer, &bytes) {
            return Err(TransactionError::InvalidSignature { signer: *signer });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
