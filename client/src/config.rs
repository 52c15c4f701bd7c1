//! # Client Configuration & Constants
//!
//! Every well-known address and protocol limit the client relies on lives
//! here, next to [`ClientConfig`], the runtime knobs a caller can tune
//! (endpoint, commitment, retry behaviour).
//!
//! The program ids below are fixed by the network. They are stored as raw
//! bytes so they can be `const`; their base58 forms are noted alongside.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::Address;
use crate::rpc::{Commitment, RetryPolicy};

// ---------------------------------------------------------------------------
// Native Units
// ---------------------------------------------------------------------------

/// Lamports in one SOL. All native amounts are `u64` lamports.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Flat per-signature fee charged by the in-memory ledger. Mirrors the
/// network's base fee; the real fee is always quoted, never assumed.
pub const SIGNATURE_FEE_LAMPORTS: u64 = 5_000;

// ---------------------------------------------------------------------------
// Derivation Limits
// ---------------------------------------------------------------------------

/// Maximum length of a single derivation seed.
pub const MAX_SEED_LEN: usize = 32;

/// Maximum number of seeds, bump included.
pub const MAX_SEEDS: usize = 16;

/// Domain separator appended to every program-derived address preimage.
pub const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

// ---------------------------------------------------------------------------
// Transaction Limits
// ---------------------------------------------------------------------------

/// Largest serialized transaction the network accepts (IPv6 MTU minus headers).
pub const PACKET_DATA_SIZE: usize = 1232;

/// A message indexes accounts with a single byte.
pub const MAX_ACCOUNTS_PER_MESSAGE: usize = 256;

// ---------------------------------------------------------------------------
// Account Layouts
// ---------------------------------------------------------------------------

/// Packed size of an SPL mint account.
pub const MINT_ACCOUNT_LEN: usize = 82;

/// Packed size of an SPL token account.
pub const TOKEN_ACCOUNT_LEN: usize = 165;

// ---------------------------------------------------------------------------
// Program Ids
// ---------------------------------------------------------------------------

/// `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: Address = Address::new_from_array([0u8; 32]);

/// `TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA`
pub const TOKEN_PROGRAM_ID: Address = Address::new_from_array([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
    237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

/// `ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL`
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Address = Address::new_from_array([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

/// `metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s`
pub const TOKEN_METADATA_PROGRAM_ID: Address = Address::new_from_array([
    11, 112, 101, 177, 227, 209, 124, 69, 56, 157, 82, 127, 107, 4, 195, 205, 88, 184, 108, 115,
    26, 160, 253, 181, 73, 182, 209, 188, 3, 248, 41, 70,
]);

/// `D51uEDHLbWAxNfodfQDv7qkp8WZtxrhi3uganGbNos7o`: the devnet deployment of
/// the custody vault program.
pub const DEFAULT_VAULT_PROGRAM_ID: Address = Address::new_from_array([
    179, 83, 149, 163, 152, 90, 6, 113, 142, 132, 199, 48, 167, 202, 190, 32, 109, 81, 46, 4, 0,
    66, 25, 67, 128, 25, 141, 71, 69, 155, 84, 146,
]);

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Public devnet JSON-RPC endpoint.
pub const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";

/// Mainnet-beta JSON-RPC endpoint. Rate limited; bring your own for real use.
pub const MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Local test validator.
pub const LOCALNET_RPC_URL: &str = "http://127.0.0.1:8899";

/// How long `send_and_confirm_transaction` waits for the requested commitment.
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// Interval between signature status polls while confirming.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Returns a block explorer link for a transaction signature.
///
/// The cluster query parameter is inferred from the RPC URL; anything that
/// is not devnet, testnet or localhost is treated as mainnet.
pub fn explorer_tx_url(signature: &str, rpc_url: &str) -> String {
    match cluster_param(rpc_url) {
        Some(cluster) => format!(
            "https://explorer.solana.com/tx/{}?cluster={}",
            signature, cluster
        ),
        None => format!("https://explorer.solana.com/tx/{}", signature),
    }
}

fn cluster_param(rpc_url: &str) -> Option<&'static str> {
    if rpc_url.contains("devnet") {
        Some("devnet")
    } else if rpc_url.contains("testnet") {
        Some("testnet")
    } else if rpc_url.contains("127.0.0.1") || rpc_url.contains("localhost") {
        Some("custom")
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Runtime configuration shared by every client component.
///
/// Serializes to JSON with base58 addresses and lowercase commitment names:
///
/// ```json
/// {
///   "rpc_url": "https://api.devnet.solana.com",
///   "commitment": "confirmed",
///   "vault_program_id": "D51uEDHLbWAxNfodfQDv7qkp8WZtxrhi3uganGbNos7o",
///   "retry": { "max_attempts": 3, "initial_delay_ms": 250, "max_delay_ms": 4000 },
///   "confirm_timeout_ms": 60000,
///   "poll_interval_ms": 500
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// JSON-RPC endpoint of the ledger network.
    pub rpc_url: String,

    /// Commitment used for reads and awaited for writes.
    pub commitment: Commitment,

    /// Address of the deployed vault program.
    pub vault_program_id: Address,

    /// Backoff policy for transient network failures.
    pub retry: RetryPolicy,

    /// Upper bound on waiting for a submitted transaction to confirm.
    pub confirm_timeout_ms: u64,

    /// Delay between confirmation polls.
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEVNET_RPC_URL.to_string(),
            commitment: Commitment::Confirmed,
            vault_program_id: DEFAULT_VAULT_PROGRAM_ID,
            retry: RetryPolicy::default(),
            confirm_timeout_ms: DEFAULT_CONFIRM_TIMEOUT.as_millis() as u64,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl ClientConfig {
    /// Devnet defaults.
    pub fn devnet() -> Self {
        Self::default()
    }

    /// Local test validator with `confirmed` commitment.
    pub fn localnet() -> Self {
        Self {
            rpc_url: LOCALNET_RPC_URL.to_string(),
            ..Self::default()
        }
    }

    /// Loads a JSON config file. Missing fields fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn program_ids_match_their_base58_forms() {
        let cases = [
            (SYSTEM_PROGRAM_ID, "11111111111111111111111111111111"),
            (TOKEN_PROGRAM_ID, "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"),
            (
                ASSOCIATED_TOKEN_PROGRAM_ID,
                "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL",
            ),
            (
                TOKEN_METADATA_PROGRAM_ID,
                "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s",
            ),
            (
                DEFAULT_VAULT_PROGRAM_ID,
                "D51uEDHLbWAxNfodfQDv7qkp8WZtxrhi3uganGbNos7o",
            ),
        ];
        for (id, text) in cases {
            assert_eq!(id.to_string(), text);
            assert_eq!(Address::from_str(text).unwrap(), id);
        }
    }

    #[test]
    fn explorer_url_picks_cluster() {
        assert_eq!(
            explorer_tx_url("abc", DEVNET_RPC_URL),
            "https://explorer.solana.com/tx/abc?cluster=devnet"
        );
        assert_eq!(
            explorer_tx_url("abc", MAINNET_RPC_URL),
            "https://explorer.solana.com/tx/abc"
        );
        assert!(explorer_tx_url("abc", LOCALNET_RPC_URL).ends_with("cluster=custom"));
    }

    #[test]
    fn config_json_roundtrip() {
        let cfg = ClientConfig {
            commitment: Commitment::Finalized,
            ..ClientConfig::localnet()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"finalized\""));
        assert!(json.contains("D51uEDHLbWAxNfodfQDv7qkp8WZtxrhi3uganGbNos7o"));
        let recovered: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, recovered);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let cfg: ClientConfig =
            serde_json::from_str(r#"{ "rpc_url": "http://127.0.0.1:8899" }"#).unwrap();
        assert_eq!(cfg.rpc_url, LOCALNET_RPC_URL);
        assert_eq!(cfg.commitment, Commitment::Confirmed);
        assert_eq!(cfg.vault_program_id, DEFAULT_VAULT_PROGRAM_ID);
    }

    #[test]
    fn config_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, r#"{ "commitment": "finalized" }"#).unwrap();
        let cfg = ClientConfig::from_file(&path).unwrap();
        assert_eq!(cfg.commitment, Commitment::Finalized);
        assert!(ClientConfig::from_file(dir.path().join("missing.json")).is_err());
    }
}
