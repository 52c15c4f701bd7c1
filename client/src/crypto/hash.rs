//! # Hashing Utilities
//!
//! SHA-256 is the only hash the ledger asks of a client: it seeds
//! program-derived addresses and produces the 8-byte instruction
//! discriminators of Anchor-style programs. The [`Blockhash`] type also lives
//! here since it is, after all, a hash.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::keys::ParseError;

/// SHA-256 of a single buffer.
///
/// # Example
///
/// ```
/// use vault_client::crypto::sha256;
///
/// assert_eq!(sha256(b"vault").len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    hashv(&[data])
}

/// SHA-256 over the concatenation of `parts`, without allocating the
/// concatenation.
pub fn hashv(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// The 8-byte discriminator Anchor prepends to instruction data:
/// `sha256("{namespace}:{name}")[..8]`.
///
/// Instructions use the `global` namespace and the snake_case method name.
pub fn sighash(namespace: &str, name: &str) -> [u8; 8] {
    let preimage = format!("{}:{}", namespace, name);
    let digest = sha256(preimage.as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

// ---------------------------------------------------------------------------
// Blockhash
// ---------------------------------------------------------------------------

/// A recent blockhash: the freshness anchor that bounds how long a signed
/// transaction remains valid (roughly 150 blocks on mainnet).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Blockhash([u8; 32]);

impl Blockhash {
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derives the next hash in a chain. Used by the in-memory ledger to
    /// simulate block production.
    pub fn next(&self) -> Self {
        Self(sha256(&self.0))
    }
}

impl FromStr for Blockhash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| ParseError::InvalidBase58)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ParseError::WrongLength {
                expected: 32,
                got: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Blockhash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blockhash({})", self)
    }
}

impl Serialize for Blockhash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Blockhash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Blockhash::from_str(&s).map_err(de::Error::custom)
    }
}
