//! # Connection
//!
//! A [`Connection`] pairs a [`LedgerClient`] with the caller's commitment and
//! retry policy. Higher layers (resolver, transfers, vault) only talk to
//! the ledger through it, so those settings are applied uniformly.
//!
//! ## Submission and retries
//!
//! [`Connection::send`] fetches a blockhash, builds, signs and submits.
//! Transient failures are retried with backoff. A timeout or dropped
//! connection leaves the earlier submission in doubt: it may have executed
//! without us hearing back. So:
//!
//! - a retry resubmits the *same* signed bytes, which the ledger executes at
//!   most once. "Already processed" resolves to the earlier outcome;
//! - an expired blockhash rebuilds and re-signs, but only after the ledger's
//!   history shows the in-doubt transaction never executed.
//!
//! Rejections are returned on the first occurrence.

use std::sync::Arc;

use crate::config::{ClientConfig, TOKEN_PROGRAM_ID};
use crate::crypto::{Address, Blockhash, Keypair, Signature};
use crate::error::{ClientError, Result};
use crate::program::token::Mint;
use crate::rpc::{
    with_retry, AccountInfo, Commitment, HttpLedger, LedgerClient, LedgerError, RetryPolicy,
    TransactionStatus,
};
use crate::transaction::{Message, Transaction, TransactionBuilder};

#[derive(Clone)]
pub struct Connection {
    ledger: Arc<dyn LedgerClient>,
    commitment: Commitment,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("commitment", &self.commitment)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Wraps `ledger` with `confirmed` commitment and the default retry policy.
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            ledger,
            commitment: Commitment::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// An HTTP connection configured from `config`.
    pub fn from_config(config: &ClientConfig) -> std::result::Result<Self, LedgerError> {
        Ok(Self {
            ledger: Arc::new(HttpLedger::from_config(config)?),
            commitment: config.commitment,
            retry: config.retry.clone(),
        })
    }

    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn ledger(&self) -> &dyn LedgerClient {
        self.ledger.as_ref()
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    // -- Reads ---------------------------------------------------------------

    pub async fn balance(&self, address: &Address) -> std::result::Result<u64, LedgerError> {
        with_retry(&self.retry, "get_balance", || {
            self.ledger.get_balance(address, self.commitment)
        })
        .await
    }

    pub async fn account(
        &self,
        address: &Address,
    ) -> std::result::Result<Option<AccountInfo>, LedgerError> {
        with_retry(&self.retry, "get_account", || {
            self.ledger.get_account(address, self.commitment)
        })
        .await
    }

    pub async fn latest_blockhash(&self) -> std::result::Result<Blockhash, LedgerError> {
        with_retry(&self.retry, "get_latest_blockhash", || {
            self.ledger.get_latest_blockhash(self.commitment)
        })
        .await
    }

    pub async fn fee_for_message(
        &self,
        message: &Message,
    ) -> std::result::Result<Option<u64>, LedgerError> {
        with_retry(&self.retry, "get_fee_for_message", || {
            self.ledger.get_fee_for_message(message, self.commitment)
        })
        .await
    }

    pub async fn rent_exemption(&self, data_len: usize) -> std::result::Result<u64, LedgerError> {
        with_retry(&self.retry, "get_minimum_balance_for_rent_exemption", || {
            self.ledger.get_minimum_balance_for_rent_exemption(data_len)
        })
        .await
    }

    /// Decimals of `mint`, read from the chain.
    pub async fn mint_decimals(&self, mint: &Address) -> Result<u8> {
        let account = self
            .account(mint)
            .await?
            .ok_or(ClientError::InvalidMint(*mint))?;
        if account.owner != TOKEN_PROGRAM_ID {
            return Err(ClientError::InvalidMint(*mint));
        }
        match Mint::unpack(&account.data) {
            Some(state) if state.is_initialized => Ok(state.decimals),
            _ => Err(ClientError::InvalidMint(*mint)),
        }
    }

    // -- Writes --------------------------------------------------------------

    /// Stamps `builder` with a fresh blockhash, signs with `signers` and
    /// submits. Returns the fee payer's signature once the commitment is
    /// reached.
    pub async fn send(&self, builder: &TransactionBuilder, signers: &[&Keypair]) -> Result<Signature> {
        let mut tx = self.build_fresh(builder, signers).await?;
        let mut in_doubt = false;
        let mut attempt = 0;
        loop {
            let err = match self.submit(&tx).await {
                Ok(signature) => return Ok(signature),
                Err(err) => err,
            };
            if let Some(signature) = self.settle(&tx, &err, in_doubt).await? {
                return Ok(signature);
            }
            if !self.retry.should_retry(&err, attempt) {
                return Err(err.into());
            }
            self.back_off(&err, attempt).await;
            if err == LedgerError::BlockhashNotFound {
                tx = self.build_fresh(builder, signers).await?;
                in_doubt = false;
            } else {
                in_doubt = true;
            }
            attempt += 1;
        }
    }

    /// Submits an already signed transaction. Transient failures resubmit
    /// the same bytes. An expired blockhash is returned to the caller, who
    /// must rebuild, unless an earlier attempt turns out to have landed.
    pub async fn send_transaction(&self, tx: &Transaction) -> Result<Signature> {
        let mut in_doubt = false;
        let mut attempt = 0;
        loop {
            let err = match self.submit(tx).await {
                Ok(signature) => return Ok(signature),
                Err(err) => err,
            };
            if let Some(signature) = self.settle(tx, &err, in_doubt).await? {
                return Ok(signature);
            }
            if err == LedgerError::BlockhashNotFound || !self.retry.should_retry(&err, attempt) {
                return Err(err.into());
            }
            self.back_off(&err, attempt).await;
            in_doubt = true;
            attempt += 1;
        }
    }

    /// Decides whether a failed submission of `tx` was really a success.
    ///
    /// "Already processed" always means an earlier copy executed. An expired
    /// blockhash hides whether an in-doubt attempt executed. Both are
    /// answered from the ledger's history. `Ok(None)` means `tx` never
    /// executed and `err` stands.
    async fn settle(
        &self,
        tx: &Transaction,
        err: &LedgerError,
        in_doubt: bool,
    ) -> Result<Option<Signature>> {
        let ambiguous = *err == LedgerError::AlreadyProcessed
            || (in_doubt && *err == LedgerError::BlockhashNotFound);
        if !ambiguous {
            return Ok(None);
        }
        let Some(signature) = tx.signature().copied() else {
            return Ok(None);
        };

        let started = tokio::time::Instant::now();
        let mut attempt = 0;
        loop {
            let status = with_retry(&self.retry, "get_signature_status", || {
                self.ledger.get_signature_status(&signature, self.commitment)
            })
            .await?;
            match status {
                None => return Ok(None),
                Some(TransactionStatus::Confirmed) => {
                    tracing::info!(%signature, "earlier submission had landed");
                    return Ok(Some(signature));
                }
                Some(TransactionStatus::Failed(failure)) => return Err(failure.into()),
                Some(TransactionStatus::Processed) if attempt + 1 < self.retry.max_attempts => {
                    tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
                    attempt += 1;
                }
                // Executed, so it must not be rebuilt, but not yet settled.
                Some(TransactionStatus::Processed) => {
                    return Err(LedgerError::ConfirmationTimeout {
                        signature,
                        timeout_ms: started.elapsed().as_millis() as u64,
                    }
                    .into())
                }
            }
        }
    }

    async fn submit(&self, tx: &Transaction) -> std::result::Result<Signature, LedgerError> {
        let signature = self
            .ledger
            .send_and_confirm_transaction(tx, self.commitment)
            .await?;
        tracing::info!(%signature, commitment = %self.commitment, "transaction confirmed");
        Ok(signature)
    }

    async fn back_off(&self, err: &LedgerError, attempt: u32) {
        let delay = self.retry.delay_for_attempt(attempt);
        tracing::warn!(
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "submission failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }

    async fn build_fresh(
        &self,
        builder: &TransactionBuilder,
        signers: &[&Keypair],
    ) -> Result<Transaction> {
        let blockhash = self.latest_blockhash().await?;
        Ok(builder.clone().recent_blockhash(blockhash).build(signers)?)
    }
}
