//! # Asset Account Resolution
//!
//! Every (owner, mint) pair has one canonical token account, the associated
//! token account. [`AssetAccountResolver::resolve`] returns it, creating it
//! first if it does not exist yet.
//!
//! Resolution is idempotent. An account that already exists is returned
//! without a transaction, and losing a creation race to someone else (the
//! network answers "already exists") counts as success.
//!
//! Owners that are program-derived addresses, such as the vault authority,
//! must be opted in with `allow_owner_off_curve`. The check runs before any
//! network call so a mistyped owner never costs a fee.

use crate::connection::Connection;
use crate::crypto::{Address, Keypair};
use crate::error::{ClientError, Result};
use crate::pda::associated_token_address;
use crate::program::token::create_associated_token_account;
use crate::rpc::LedgerError;
use crate::transaction::TransactionBuilder;

/// A resolved associated token account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetAccount {
    pub address: Address,
    pub owner: Address,
    pub mint: Address,
    /// Whether this call created the account.
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct AssetAccountResolver {
    connection: Connection,
}

impl AssetAccountResolver {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Returns the associated token account of `owner` for `mint`, creating
    /// it with `payer` funding the rent if it is missing.
    pub async fn resolve(
        &self,
        owner: &Address,
        mint: &Address,
        payer: &Keypair,
        allow_owner_off_curve: bool,
    ) -> Result<AssetAccount> {
        if !allow_owner_off_curve && !owner.is_on_curve() {
            return Err(ClientError::InvalidOwnerCurveFlag { owner: *owner });
        }

        let address = associated_token_address(owner, mint)?;
        let resolved = |created| AssetAccount {
            address,
            owner: *owner,
            mint: *mint,
            created,
        };
        let resolution_error = |source| ClientError::AccountResolution {
            owner: *owner,
            mint: *mint,
            source,
        };

        if self
            .connection
            .account(&address)
            .await
            .map_err(resolution_error)?
            .is_some()
        {
            tracing::debug!(%owner, %mint, %address, "token account exists");
            return Ok(resolved(false));
        }

        let builder = TransactionBuilder::new()
            .fee_payer(payer.address())
            .instruction(create_associated_token_account(
                &payer.address(),
                &address,
                owner,
                mint,
            ));
        match self.connection.send(&builder, &[payer]).await {
            Ok(signature) => {
                tracing::info!(%owner, %mint, %address, %signature, "created token account");
                Ok(resolved(true))
            }
            Err(ClientError::Network(LedgerError::AccountAlreadyExists(_))) => {
                tracing::debug!(%address, "token account created concurrently");
                Ok(resolved(false))
            }
            Err(ClientError::Network(err)) => {
                // The create may have landed even though we never saw it confirm.
                match self.connection.account(&address).await {
                    Ok(Some(_)) => Ok(resolved(false)),
                    _ => Err(resolution_error(err)),
                }
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::TOKEN_PROGRAM_ID;
    use crate::pda::vault_authority;
    use crate::crypto::{Blockhash, Signature};
    use crate::program::token::Mint;
    use crate::rpc::{
        AccountInfo, Commitment, LedgerClient, MemoryLedger, RetryPolicy, TransactionStatus,
    };
    use crate::transaction::{Message, Transaction};

    /// A funded payer and an initialized mint it controls.
    fn fund(ledger: &MemoryLedger) -> (Keypair, Address) {
        let payer = Keypair::generate();
        ledger.airdrop(&payer.address(), 1_000_000_000);
        let mint = Address::new_random();
        ledger.set_account(
            mint,
            AccountInfo {
                lamports: 1_461_600,
                owner: TOKEN_PROGRAM_ID,
                data: Mint {
                    mint_authority: Some(payer.address()),
                    decimals: 6,
                    is_initialized: true,
                    ..Mint::default()
                }
                .pack(),
                executable: false,
            },
        );
        (payer, mint)
    }

    fn setup() -> (Arc<MemoryLedger>, AssetAccountResolver, Keypair, Address) {
        let ledger = Arc::new(MemoryLedger::new());
        let (payer, mint) = fund(&ledger);
        let conn = Connection::new(ledger.clone()).with_retry(RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 1,
        });
        (ledger, AssetAccountResolver::new(conn), payer, mint)
    }

    #[tokio::test]
    async fn second_resolve_does_not_create_again() {
        let (ledger, resolver, payer, mint) = setup();
        let owner = Keypair::generate().address();

        let first = resolver.resolve(&owner, &mint, &payer, false).await.unwrap();
        let second = resolver.resolve(&owner, &mint, &payer, false).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.address, second.address);
        assert_eq!(ledger.send_attempts(), 1);
        assert_eq!(ledger.token_amount(&first.address), Some(0));
    }

    #[tokio::test]
    async fn off_curve_owner_needs_the_flag() {
        let (ledger, resolver, payer, mint) = setup();
        let (pda, _) = vault_authority(&Address::new_random(), &Address::new_random()).unwrap();

        let err = resolver.resolve(&pda, &mint, &payer, false).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidOwnerCurveFlag { owner } if owner == pda));
        assert_eq!(ledger.send_attempts(), 0);

        let ok = resolver.resolve(&pda, &mint, &payer, true).await.unwrap();
        assert!(ok.created);
    }

    /// Executes submissions but never reports them confirmed.
    struct SilentLedger(MemoryLedger);

    #[async_trait::async_trait]
    impl LedgerClient for SilentLedger {
        async fn get_balance(&self, a: &Address, c: Commitment) -> std::result::Result<u64, LedgerError> {
            self.0.get_balance(a, c).await
        }
        async fn get_account(
            &self,
            a: &Address,
            c: Commitment,
        ) -> std::result::Result<Option<AccountInfo>, LedgerError> {
            self.0.get_account(a, c).await
        }
        async fn get_latest_blockhash(&self, c: Commitment) -> std::result::Result<Blockhash, LedgerError> {
            self.0.get_latest_blockhash(c).await
        }
        async fn get_fee_for_message(
            &self,
            m: &Message,
            c: Commitment,
        ) -> std::result::Result<Option<u64>, LedgerError> {
            self.0.get_fee_for_message(m, c).await
        }
        async fn get_minimum_balance_for_rent_exemption(
            &self,
            len: usize,
        ) -> std::result::Result<u64, LedgerError> {
            self.0.get_minimum_balance_for_rent_exemption(len).await
        }
        async fn send_and_confirm_transaction(
            &self,
            tx: &Transaction,
            c: Commitment,
        ) -> std::result::Result<Signature, LedgerError> {
            let signature = self.0.send_and_confirm_transaction(tx, c).await?;
            Err(LedgerError::ConfirmationTimeout {
                signature,
                timeout_ms: 0,
            })
        }
        async fn get_signature_status(
            &self,
            s: &Signature,
            c: Commitment,
        ) -> std::result::Result<Option<TransactionStatus>, LedgerError> {
            self.0.get_signature_status(s, c).await
        }
    }

    #[tokio::test]
    async fn landed_despite_confirmation_timeout() {
        let ledger = MemoryLedger::new();
        let (payer, mint) = fund(&ledger);
        let resolver = AssetAccountResolver::new(Connection::new(Arc::new(SilentLedger(ledger))));
        let owner = Keypair::generate().address();

        let resolved = resolver.resolve(&owner, &mint, &payer, false).await.unwrap();
        assert_eq!(resolved.address, associated_token_address(&owner, &mint).unwrap());
        assert!(!resolved.created);
    }

    #[tokio::test]
    async fn lost_create_reply_still_reports_the_creation() {
        let (ledger, resolver, payer, mint) = setup();
        ledger.lose_replies([LedgerError::Timeout]);

        let resolved = resolver
            .resolve(&Keypair::generate().address(), &mint, &payer, false)
            .await
            .unwrap();
        assert!(resolved.created);
        assert_eq!(ledger.landed_transactions(), 1);
        assert_eq!(ledger.token_amount(&resolved.address), Some(0));
    }

    #[tokio::test]
    async fn network_failure_is_an_account_resolution_error() {
        let (ledger, resolver, payer, mint) = setup();
        ledger.inject_send_failures([LedgerError::Rejected("rent".into())]);

        let err = resolver
            .resolve(&Keypair::generate().address(), &mint, &payer, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::AccountResolution { source: LedgerError::Rejected(_), .. }
        ));
    }
}
