//! # JSON-RPC API Definitions
//!
//! Request envelopes and typed response payloads for the subset of the
//! ledger's JSON-RPC 2.0 API the client uses.
//!
//! ## Method Index
//!
//! | Method                               | Used for                            |
//! |--------------------------------------|-------------------------------------|
//! | `getBalance`                         | lamport balance of an address       |
//! | `getAccountInfo`                     | raw account contents (base64)       |
//! | `getLatestBlockhash`                 | freshness anchor for transactions   |
//! | `getFeeForMessage`                   | exact fee of a compiled message     |
//! | `getMinimumBalanceForRentExemption`  | funding for new accounts            |
//! | `sendTransaction`                    | submission (base64 wire bytes)      |
//! | `getSignatureStatuses`               | confirmation polling                |

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RPC Method Enumeration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RpcMethod {
    GetBalance,
    GetAccountInfo,
    GetLatestBlockhash,
    GetFeeForMessage,
    GetMinimumBalanceForRentExemption,
    SendTransaction,
    GetSignatureStatuses,
}

// ---------------------------------------------------------------------------
// RPC Request / Response
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: RpcMethod,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: RpcMethod, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response. Exactly one of `result` or `error` is set by a
/// conforming node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

/// JSON-RPC error object. `data` carries simulation details (logs, the
/// instruction error) when a preflight check fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Preflight simulation failed; `data.err` holds the transaction error.
pub const RPC_SEND_TRANSACTION_PREFLIGHT_FAILURE: i64 = -32002;

/// Signature verification failed before execution.
pub const RPC_TRANSACTION_SIGNATURE_VERIFICATION_FAILURE: i64 = -32003;

// ---------------------------------------------------------------------------
// Typed Response Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcContext {
    pub slot: u64,
}

/// Most reads wrap their value with the slot it was observed at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithContext<T> {
    pub context: RpcContext,
    pub value: T,
}

/// Account payload of `getAccountInfo` with `encoding: base64`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiAccount {
    pub lamports: u64,
    pub owner: String,
    /// `[payload, "base64"]`.
    pub data: (String, String),
    pub executable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestBlockhash {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

/// One entry of `getSignatureStatuses`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<u64>,
    /// Transaction error, if execution failed.
    pub err: Option<serde_json::Value>,
    /// `"processed"`, `"confirmed"` or `"finalized"`.
    pub confirmation_status: Option<String>,
}
