//! # Keys, Addresses, Signatures
//!
//! Ed25519 keypairs and the 32-byte [`Address`] type every account, program
//! and mint on the ledger is identified by.
//!
//! An address is either the public half of a keypair (a point on the Ed25519
//! curve) or a program-derived address that was deliberately chosen to lie
//! *off* the curve, so no private key can ever sign for it. The
//! [`Address::is_on_curve`] check is what tells the two apart.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (thanks, ed25519-dalek).
//! - Key generation uses `OsRng`.
//! - Key bytes are never logged and `Debug` only prints the public half.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use curve25519_dalek::edwards::CompressedEdwardsY;
use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, KEYPAIR_LENGTH,
    SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors that can occur during key operations.
///
/// Deliberately vague about *why* secret material was rejected.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("keypair validation failed: public key does not match secret key")]
    KeypairMismatch,

    #[error("failed to access keypair file: {0}")]
    Io(String),

    #[error("keypair file is not a JSON byte array: {0}")]
    MalformedFile(String),
}

/// Errors parsing an [`Address`] or [`Signature`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid base58 string")]
    InvalidBase58,

    #[error("wrong length: expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 32-byte account identifier, displayed in base58.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    /// Wraps raw bytes. `const` so program ids can be compile-time constants.
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// A random address nobody holds the key for. About half of these are
    /// off-curve; use `Keypair::generate().address()` when a wallet-like
    /// owner is needed.
    pub fn new_random() -> Self {
        Self(rand::random())
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns `true` if these bytes decompress to a point on the Ed25519
    /// curve, i.e. some private key *could* sign for this address.
    ///
    /// Program-derived addresses are required to return `false` here.
    pub fn is_on_curve(&self) -> bool {
        CompressedEdwardsY(self.0).decompress().is_some()
    }

    /// Base58 text form. Same as `to_string()`.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = ParseError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| ParseError::WrongLength {
            expected: 32,
            got: slice.len(),
        })?;
        Ok(Self(bytes))
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| ParseError::InvalidBase58)?;
        Self::try_from(bytes.as_slice())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58())
    }
}

// Text formats (JSON config, RPC) get base58; binary formats get raw bytes.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_base58())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Address::from_str(&s).map_err(de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Address)
        }
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// An Ed25519 signature. The first signature of a transaction doubles as its
/// identifier on the network.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    pub const LEN: usize = 64;

    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// The all-zero placeholder occupying a signer slot nobody has filled.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Verifies this signature over `message` against `signer`.
    ///
    /// Returns `false` for off-curve addresses rather than erroring; a PDA
    /// can never have produced a valid signature.
    pub fn verify(&self, signer: &Address, message: &[u8]) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(signer.as_bytes()) else {
            return false;
        };
        let sig = DalekSignature::from_bytes(&self.0);
        verifying_key.verify(message, &sig).is_ok()
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl FromStr for Signature {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| ParseError::InvalidBase58)?;
        let arr: [u8; 64] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ParseError::WrongLength {
                expected: 64,
                got: bytes.len(),
            })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_string();
        if text.len() > 16 {
            write!(f, "Signature({}...)", &text[..16])
        } else {
            write!(f, "Signature({})", text)
        }
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_str(&s).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// An Ed25519 signing identity.
///
/// Intentionally does NOT implement `Serialize`; writing secret material
/// out is always an explicit call ([`Keypair::write_to_file`],
/// [`Keypair::to_bytes`]).
///
/// The 64-byte form is `secret ‖ public`, the layout used by wallet files
/// produced by the standard key generator.
///
/// # Examples
///
/// ```
/// use vault_client::crypto::Keypair;
///
/// let kp = Keypair::generate();
/// let sig = kp.sign(b"deposit 1 SOL");
/// assert!(sig.verify(&kp.address(), b"deposit 1 SOL"));
/// ```
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte secret seed.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Rebuilds a keypair from its 64-byte `secret ‖ public` encoding.
    ///
    /// The embedded public half must match the one re-derived from the
    /// secret, otherwise the file was corrupted or tampered with.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let arr: [u8; KEYPAIR_LENGTH] =
            bytes.try_into().map_err(|_| KeyError::InvalidSecretKey)?;
        let signing_key =
            SigningKey::from_keypair_bytes(&arr).map_err(|_| KeyError::KeypairMismatch)?;
        Ok(Self { signing_key })
    }

    /// Parses a base58-encoded 64-byte keypair, the format browser wallets
    /// export.
    pub fn from_base58_string(s: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(s.trim())
            .into_vec()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Self::from_bytes(&bytes)
    }

    /// Reads a wallet file: a JSON array of 64 byte values.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| KeyError::Io(format!("{}: {}", path.display(), e)))?;
        let bytes: Vec<u8> =
            serde_json::from_str(&raw).map_err(|e| KeyError::MalformedFile(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Writes the keypair as a JSON byte array, readable only by the owner
    /// on Unix.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), KeyError> {
        let path = path.as_ref();
        let json = serde_json::to_string(&self.to_bytes().to_vec())
            .map_err(|e| KeyError::MalformedFile(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| KeyError::Io(format!("{}: {}", path.display(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| KeyError::Io(format!("{}: {}", path.display(), e)))?;
        }
        Ok(())
    }

    /// The public address this keypair signs for.
    pub fn address(&self) -> Address {
        Address(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// The 64-byte `secret ‖ public` encoding. Handle with care.
    pub fn to_bytes(&self) -> [u8; KEYPAIR_LENGTH] {
        self.signing_key.to_keypair_bytes()
    }

    /// Base58 of [`to_bytes`](Self::to_bytes).
    pub fn to_base58_string(&self) -> String {
        bs58::encode(self.to_bytes()).into_string()
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Public half only.
        write!(f, "Keypair(pub={})", self.address())
    }
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for Keypair {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keypair_address_is_on_curve() {
        let kp = Keypair::generate();
        assert!(kp.address().is_on_curve());
    }

    #[test]
    fn sign_verify_roundtrip() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"withdraw 0.5");
        assert!(sig.verify(&kp.address(), b"withdraw 0.5"));
        assert!(!sig.verify(&kp.address(), b"withdraw 5.0"));
        assert!(!sig.verify(&Keypair::generate().address(), b"withdraw 0.5"));
    }

    #[test]
    fn deterministic_from_seed() {
        let a = Keypair::from_seed(&[7u8; 32]);
        let b = Keypair::from_seed(&[7u8; 32]);
        assert_eq!(a.address(), b.address());
        assert_eq!(a.sign(b"x"), b.sign(b"x"));
    }

    #[test]
    fn sixty_four_byte_form_roundtrips() {
        let kp = Keypair::generate();
        let restored = Keypair::from_bytes(&kp.to_bytes()).unwrap();
        assert_eq!(kp, restored);

        let restored = Keypair::from_base58_string(&kp.to_base58_string()).unwrap();
        assert_eq!(kp, restored);
    }

    #[test]
    fn mismatched_public_half_is_rejected() {
        let kp = Keypair::generate();
        let mut bytes = kp.to_bytes();
        bytes[40] ^= 0xFF;
        assert!(matches!(
            Keypair::from_bytes(&bytes),
            Err(KeyError::KeypairMismatch)
        ));
        assert!(matches!(
            Keypair::from_bytes(&bytes[..32]),
            Err(KeyError::InvalidSecretKey)
        ));
    }

    #[test]
    fn wallet_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        let kp = Keypair::generate();
        kp.write_to_file(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with('['));
        let restored = Keypair::read_from_file(&path).unwrap();
        assert_eq!(kp.address(), restored.address());
    }

    #[test]
    fn wallet_file_errors_are_distinguishable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Keypair::read_from_file(dir.path().join("nope.json")),
            Err(KeyError::Io(_))
        ));
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "\"not an array\"").unwrap();
        assert!(matches!(
            Keypair::read_from_file(&path),
            Err(KeyError::MalformedFile(_))
        ));
    }

    #[test]
    fn address_text_roundtrip() {
        let addr = Keypair::generate().address();
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(addr, parsed);
        assert_eq!(
            "not-base58!".parse::<Address>(),
            Err(ParseError::InvalidBase58)
        );
        assert!(matches!(
            "abc".parse::<Address>(),
            Err(ParseError::WrongLength { expected: 32, .. })
        ));
    }

    #[test]
    fn address_serializes_as_base58_in_json() {
        let addr = Address::new_random();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn signature_text_roundtrip() {
        let sig = Keypair::generate().sign(b"msg");
        let parsed: Signature = sig.to_string().parse().unwrap();
        assert_eq!(sig, parsed);
        assert!(Signature::default().is_empty());
        assert!(!sig.is_empty());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = Keypair::generate();
        let debug = format!("{:?}", kp);
        assert!(debug.starts_with("Keypair(pub="));
        assert!(!debug.contains(&kp.to_base58_string()));
    }

    #[test]
    fn empty_signature_never_verifies() {
        let kp = Keypair::generate();
        assert!(!Signature::default().verify(&kp.address(), b"anything"));
    }
}
