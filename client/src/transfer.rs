//! # Native Transfers
//!
//! [`sweep`] empties an account into another one, leaving exactly zero
//! behind. The fee is never guessed. The transfer is compiled once with the
//! full balance, the ledger prices that exact message, and the instruction
//! is then rebuilt for `balance - fee`:
//!
//! ```text
//! balance ──► provisional message ──► get_fee_for_message ──► rebuild(balance - fee) ──► sign ──► send
//! ```
//!
//! Replacing the amount does not change the message's accounts or
//! signers, so the quote stays exact for the rebuilt message.

use crate::connection::Connection;
use crate::crypto::{Address, Keypair, Signature};
use crate::error::{ClientError, Result};
use crate::program::system;
use crate::transaction::TransactionBuilder;

/// Outcome of a [`sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReceipt {
    pub signature: Signature,
    /// Lamports that reached the recipient.
    pub amount: u64,
    pub fee: u64,
}

/// Moves the entire balance of `from`, minus the exact fee, to `to`.
///
/// Fails with [`ClientError::InsufficientBalanceForFee`] without sending
/// anything when the fee would consume the whole balance.
pub async fn sweep(connection: &Connection, from: &Keypair, to: &Address) -> Result<SweepReceipt> {
    let source = from.address();
    let balance = connection.balance(&source).await?;
    let blockhash = connection.latest_blockhash().await?;

    let provisional = TransactionBuilder::new()
        .fee_payer(source)
        .instruction(system::transfer(&source, to, balance))
        .recent_blockhash(blockhash);
    let message = provisional.compile_message()?;
    let fee = connection
        .fee_for_message(&message)
        .await?
        .ok_or(ClientError::FeeUnavailable)?;
    tracing::debug!(%source, balance, fee, "quoted sweep fee");

    if fee >= balance {
        return Err(ClientError::InsufficientBalanceForFee { balance, fee });
    }
    let amount = balance - fee;

    let tx = provisional
        .with_instruction_replaced(0, system::transfer(&source, to, amount))?
        .build(&[from])?;
    let signature = connection.send_transaction(&tx).await?;
    tracing::info!(%source, %to, amount, fee, %signature, "swept account");

    Ok(SweepReceipt {
        signature,
        amount,
        fee,
    })
}

/// Sends `lamports` from `from` to `to`; `from` also pays the fee.
pub async fn transfer_lamports(
    connection: &Connection,
    from: &Keypair,
    to: &Address,
    lamports: u64,
) -> Result<Signature> {
    let builder = TransactionBuilder::new()
        .fee_payer(from.address())
        .instruction(system::transfer(&from.address(), to, lamports));
    let signature = connection.send(&builder, &[from]).await?;
    tracing::info!(from = %from.address(), %to, lamports, %signature, "transferred lamports");
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SIGNATURE_FEE_LAMPORTS;
    use crate::rpc::MemoryLedger;

    fn setup(balance: u64) -> (Arc<MemoryLedger>, Connection, Keypair) {
        let ledger = Arc::new(MemoryLedger::new());
        let conn = Connection::new(ledger.clone());
        let from = Keypair::generate();
        if balance > 0 {
            ledger.airdrop(&from.address(), balance);
        }
        (ledger, conn, from)
    }

    #[tokio::test]
    async fn sweep_leaves_exactly_zero() {
        let (ledger, conn, from) = setup(1_000_000);
        let to = Address::new_random();

        let receipt = sweep(&conn, &from, &to).await.unwrap();

        assert_eq!(receipt.fee, SIGNATURE_FEE_LAMPORTS);
        assert_eq!(receipt.amount, 1_000_000 - SIGNATURE_FEE_LAMPORTS);
        assert_eq!(ledger.lamports(&to), receipt.amount);
        assert_eq!(ledger.lamports(&from.address()), 0);
    }

    #[tokio::test]
    async fn sweep_uses_the_quoted_fee() {
        let (ledger, conn, from) = setup(1_000_000);
        ledger.set_fee_per_signature(12_345);
        let to = Address::new_random();

        let receipt = sweep(&conn, &from, &to).await.unwrap();
        assert_eq!(receipt.fee, 12_345);
        assert_eq!(ledger.lamports(&to), 1_000_000 - 12_345);
        assert_eq!(ledger.lamports(&from.address()), 0);
    }

    #[tokio::test]
    async fn fee_at_or_above_balance_sends_nothing() {
        for balance in [SIGNATURE_FEE_LAMPORTS, SIGNATURE_FEE_LAMPORTS - 1, 0] {
            let (ledger, conn, from) = setup(balance);
            let err = sweep(&conn, &from, &Address::new_random()).await.unwrap_err();
            assert!(matches!(
                err,
                ClientError::InsufficientBalanceForFee { balance: b, fee } if b == balance && fee == SIGNATURE_FEE_LAMPORTS
            ));
            assert_eq!(ledger.send_attempts(), 0);
            assert_eq!(ledger.lamports(&from.address()), balance);
        }
    }

    #[tokio::test]
    async fn one_lamport_over_the_fee() {
        let (ledger, conn, from) = setup(SIGNATURE_FEE_LAMPORTS + 1);
        let to = Address::new_random();
        let receipt = sweep(&conn, &from, &to).await.unwrap();
        assert_eq!(receipt.amount, 1);
        assert_eq!(ledger.lamports(&to), 1);
    }

    #[tokio::test]
    async fn plain_transfer() {
        let (ledger, conn, from) = setup(1_000_000);
        let to = Address::new_random();
        transfer_lamports(&conn, &from, &to, 42).await.unwrap();
        assert_eq!(ledger.lamports(&to), 42);
        assert_eq!(
            ledger.lamports(&from.address()),
            1_000_000 - 42 - SIGNATURE_FEE_LAMPORTS
        );
    }
}
