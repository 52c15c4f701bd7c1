//! JSON-RPC ledger client over HTTP.
//!
//! Transactions and messages travel base64-encoded. Submission uses
//! `sendTransaction` followed by `getSignatureStatuses` polling until the
//! requested commitment is observed, the transaction fails, or the
//! confirmation timeout elapses.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::time::Instant;

use super::types::{
    LatestBlockhash, RpcErrorObject, RpcMethod, RpcRequest, RpcResponse, SignatureStatus,
    UiAccount, WithContext, RPC_SEND_TRANSACTION_PREFLIGHT_FAILURE,
    RPC_TRANSACTION_SIGNATURE_VERIFICATION_FAILURE,
};
use super::{
    AccountInfo, Commitment, LedgerClient, LedgerError, TransactionStatus, RPC_RATE_LIMITED,
};
use crate::config::ClientConfig;
use crate::crypto::{Address, Blockhash, Signature};
use crate::transaction::{Message, Transaction};

/// Per-request HTTP timeout. Confirmation waits are bounded separately.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transaction errors that mean a signer slot was empty or wrong.
const SIGNATURE_ERRORS: [&str; 2] = ["SignatureFailure", "MissingSignatureForFee"];

/// Why a call failed: either before a JSON-RPC answer existed, or the node
/// answered with an error object.
enum CallError {
    Ledger(LedgerError),
    Node(RpcErrorObject),
}

impl From<LedgerError> for CallError {
    fn from(err: LedgerError) -> Self {
        Self::Ledger(err)
    }
}

/// The `err` field of a failed preflight simulation, if present.
fn preflight_err(obj: &RpcErrorObject) -> Option<&serde_json::Value> {
    obj.data.as_ref().and_then(|d| d.get("err")).filter(|e| !e.is_null())
}

/// Maps a node error object onto [`LedgerError`] without any transaction
/// context.
pub(crate) fn map_node_error(obj: RpcErrorObject) -> LedgerError {
    if obj.code == RPC_SEND_TRANSACTION_PREFLIGHT_FAILURE {
        return match preflight_err(&obj) {
            Some(err) if err == "BlockhashNotFound" => LedgerError::BlockhashNotFound,
            Some(err) if err == "AlreadyProcessed" => LedgerError::AlreadyProcessed,
            Some(err) => LedgerError::Rejected(format!("{}: {}", obj.message, err)),
            None => LedgerError::Rejected(obj.message),
        };
    }
    if obj.code == RPC_TRANSACTION_SIGNATURE_VERIFICATION_FAILURE {
        return LedgerError::Rejected(obj.message);
    }
    LedgerError::Rpc {
        code: obj.code,
        message: obj.message,
    }
}

fn is_signature_error(obj: &RpcErrorObject) -> bool {
    obj.code == RPC_TRANSACTION_SIGNATURE_VERIFICATION_FAILURE
        || preflight_err(obj)
            .and_then(|e| e.as_str())
            .is_some_and(|e| SIGNATURE_ERRORS.contains(&e))
}

/// Reads the commitment level out of a signature status.
pub(crate) fn status_level(status: &SignatureStatus) -> Option<Commitment> {
    match status.confirmation_status.as_deref() {
        Some("finalized") => Some(Commitment::Finalized),
        Some("confirmed") => Some(Commitment::Confirmed),
        _ => None,
    }
}

/// Classifies a status entry against the commitment the caller waits for.
pub(crate) fn classify_status(status: SignatureStatus, commitment: Commitment) -> TransactionStatus {
    if let Some(err) = status.err {
        return TransactionStatus::Failed(LedgerError::Rejected(err.to_string()));
    }
    if status_level(&status).is_some_and(|l| commitment.is_reached_by(l)) {
        TransactionStatus::Confirmed
    } else {
        TransactionStatus::Processed
    }
}

/// A [`LedgerClient`] talking JSON-RPC 2.0 to a remote node.
pub struct HttpLedger {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl HttpLedger {
    pub fn new(url: impl Into<String>) -> Result<Self, LedgerError> {
        Self::with_timeouts(
            url,
            crate::config::DEFAULT_CONFIRM_TIMEOUT,
            crate::config::DEFAULT_POLL_INTERVAL,
        )
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, LedgerError> {
        Self::with_timeouts(
            config.rpc_url.clone(),
            config.confirm_timeout(),
            config.poll_interval(),
        )
    }

    pub fn with_timeouts(
        url: impl Into<String>,
        confirm_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
            confirm_timeout,
            poll_interval,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call_raw<T: DeserializeOwned>(
        &self,
        method: RpcMethod,
        params: serde_json::Value,
    ) -> Result<T, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        tracing::trace!(?method, id, "rpc request");

        let resp = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Timeout
                } else {
                    LedgerError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(LedgerError::Rpc {
                code: RPC_RATE_LIMITED,
                message: "too many requests".to_string(),
            }
            .into());
        }
        if !status.is_success() {
            return Err(LedgerError::Transport(format!("HTTP {}", status)).into());
        }

        let body: RpcResponse = resp
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;
        if let Some(err) = body.error {
            return Err(CallError::Node(err));
        }
        let result = body
            .result
            .ok_or_else(|| LedgerError::InvalidResponse("response has neither result nor error".into()))?;
        serde_json::from_value(result)
            .map_err(|e| LedgerError::InvalidResponse(format!("{:?}: {}", method, e)).into())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: RpcMethod,
        params: serde_json::Value,
    ) -> Result<T, LedgerError> {
        self.call_raw(method, params).await.map_err(|e| match e {
            CallError::Ledger(err) => err,
            CallError::Node(obj) => map_node_error(obj),
        })
    }

    /// One `getSignatureStatuses` lookup. `search_history` reaches past the
    /// node's recent status cache.
    async fn signature_status(
        &self,
        signature: &Signature,
        search_history: bool,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        let statuses: WithContext<Vec<Option<SignatureStatus>>> = self
            .call(
                RpcMethod::GetSignatureStatuses,
                json!([
                    [signature.to_string()],
                    { "searchTransactionHistory": search_history }
                ]),
            )
            .await?;
        Ok(statuses.value.into_iter().next().flatten())
    }

    async fn wait_for_confirmation(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> Result<(), LedgerError> {
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            match self.signature_status(signature, false).await {
                Ok(Some(status)) => match classify_status(status, commitment) {
                    TransactionStatus::Confirmed => return Ok(()),
                    TransactionStatus::Failed(err) => return Err(err),
                    TransactionStatus::Processed => {}
                },
                Ok(None) => {}
                // A flaky poll is not a failed transaction; keep waiting.
                Err(err) if err.is_transient() => {
                    tracing::debug!(%signature, error = %err, "status poll failed");
                }
                Err(err) => return Err(err),
            }

            if Instant::now() >= deadline {
                return Err(LedgerError::ConfirmationTimeout {
                    signature: *signature,
                    timeout_ms: self.confirm_timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl LedgerClient for HttpLedger {
    async fn get_balance(
        &self,
        address: &Address,
        commitment: Commitment,
    ) -> Result<u64, LedgerError> {
        let resp: WithContext<u64> = self
            .call(
                RpcMethod::GetBalance,
                json!([address.to_string(), { "commitment": commitment.as_str() }]),
            )
            .await?;
        Ok(resp.value)
    }

    async fn get_account(
        &self,
        address: &Address,
        commitment: Commitment,
    ) -> Result<Option<AccountInfo>, LedgerError> {
        let resp: WithContext<Option<UiAccount>> = self
            .call(
                RpcMethod::GetAccountInfo,
                json!([
                    address.to_string(),
                    { "encoding": "base64", "commitment": commitment.as_str() }
                ]),
            )
            .await?;
        let Some(account) = resp.value else {
            return Ok(None);
        };
        let owner = Address::from_str(&account.owner)
            .map_err(|e| LedgerError::InvalidResponse(format!("account owner: {}", e)))?;
        let data = BASE64
            .decode(account.data.0.as_bytes())
            .map_err(|e| LedgerError::InvalidResponse(format!("account data: {}", e)))?;
        Ok(Some(AccountInfo {
            lamports: account.lamports,
            owner,
            data,
            executable: account.executable,
        }))
    }

    async fn get_latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> Result<Blockhash, LedgerError> {
        let resp: WithContext<LatestBlockhash> = self
            .call(
                RpcMethod::GetLatestBlockhash,
                json!([{ "commitment": commitment.as_str() }]),
            )
            .await?;
        Blockhash::from_str(&resp.value.blockhash)
            .map_err(|e| LedgerError::InvalidResponse(format!("blockhash: {}", e)))
    }

    async fn get_fee_for_message(
        &self,
        message: &Message,
        commitment: Commitment,
    ) -> Result<Option<u64>, LedgerError> {
        let encoded = BASE64.encode(message.serialize());
        let resp: WithContext<Option<u64>> = self
            .call(
                RpcMethod::GetFeeForMessage,
                json!([encoded, { "commitment": commitment.as_str() }]),
            )
            .await?;
        Ok(resp.value)
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, LedgerError> {
        self.call(
            RpcMethod::GetMinimumBalanceForRentExemption,
            json!([data_len]),
        )
        .await
    }

    async fn send_and_confirm_transaction(
        &self,
        tx: &Transaction,
        commitment: Commitment,
    ) -> Result<Signature, LedgerError> {
        let wire = BASE64.encode(tx.serialize());
        let sent: Result<String, CallError> = self
            .call_raw(
                RpcMethod::SendTransaction,
                json!([
                    wire,
                    { "encoding": "base64", "preflightCommitment": commitment.as_str() }
                ]),
            )
            .await;

        let text = match sent {
            Ok(text) => text,
            Err(CallError::Node(obj)) if is_signature_error(&obj) => {
                let signer = tx
                    .missing_signers()
                    .first()
                    .or_else(|| tx.message.fee_payer())
                    .copied()
                    .unwrap_or_default();
                return Err(LedgerError::MissingSignature(signer));
            }
            Err(CallError::Node(obj)) => return Err(map_node_error(obj)),
            Err(CallError::Ledger(err)) => return Err(err),
        };

        let signature = Signature::from_str(&text)
            .map_err(|e| LedgerError::InvalidResponse(format!("signature: {}", e)))?;
        tracing::debug!(%signature, %commitment, "transaction submitted, awaiting confirmation");
        self.wait_for_confirmation(&signature, commitment).await?;
        Ok(signature)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
        commitment: Commitment,
    ) -> Result<Option<TransactionStatus>, LedgerError> {
        Ok(self
            .signature_status(signature, true)
            .await?
            .map(|status| classify_status(status, commitment)))
    }
}
