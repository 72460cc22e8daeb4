//! ECDSA (NIST P-256) key pairs, signatures and public-key hashes.

use crate::hash::hash;
use p256::ecdsa::signature::{RandomizedSigner, Verifier};
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Length of a public-key hash in bytes.
pub const PUB_KEY_HASH_LEN: usize = 20;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("entropy source failure: {0}")]
    Entropy(#[from] rand::Error),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("signing failed")]
    SigningFailed,
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Hash of a public key. Outputs are locked to one of these.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PubKeyHash(pub [u8; PUB_KEY_HASH_LEN]);

impl PubKeyHash {
    /// First 20 bytes of the Blake3 hash of the encoded public key.
    pub fn of(public_key: &[u8]) -> Self {
        let digest = hash(public_key);
        let mut out = [0u8; PUB_KEY_HASH_LEN];
        out.copy_from_slice(&digest.0[..PUB_KEY_HASH_LEN]);
        Self(out)
    }

    pub fn from_bytes(bytes: [u8; PUB_KEY_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUB_KEY_HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PubKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKeyHash({})", self.to_hex())
    }
}

impl fmt::Display for PubKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for PubKeyHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A fixed-size `r || s` ECDSA signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

mod signature_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde::Serialize::serialize(bytes.as_slice(), serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 64], D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("signature must be 64 bytes"))
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        signature_serde::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Signature(signature_serde::deserialize(deserializer)?))
    }
}

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

/// A public key for signature verification.
#[derive(Clone)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parse a SEC1-encoded point (compressed or uncompressed).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// SEC1 compressed encoding (33 bytes). This is the form carried in
    /// transaction inputs and hashed into a [`PubKeyHash`].
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn pub_key_hash(&self) -> PubKeyHash {
        PubKeyHash::of(&self.to_bytes())
    }

    /// Verify an ECDSA/SHA-256 signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        let sig = EcdsaSignature::from_slice(&signature.0)
            .map_err(|_| CryptoError::InvalidSignature)?;
        self.0
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde::Serialize::serialize(self.to_bytes().as_slice(), serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        PublicKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.to_bytes()[..8]))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

/// Verify `signature` over `message` against a SEC1-encoded public key.
///
/// Malformed keys or signatures verify as `false`.
pub fn verify(public_key: &[u8], message: &[u8], signature: &Signature) -> bool {
    PublicKey::from_bytes(public_key)
        .and_then(|key| key.verify(message, signature))
        .is_ok()
}

/// A keypair for signing and verification.
pub struct Keypair {
    signing_key: SigningKey,
    pub public_key: PublicKey,
}

impl Keypair {
    /// Generate a new random keypair from the OS entropy source.
    ///
    /// An entropy failure is returned to the caller and not retried.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut secret = [0u8; 32];
        OsRng.try_fill_bytes(&mut secret)?;
        Self::from_private_key(&secret)
    }

    /// Create a keypair from a 32-byte private scalar.
    pub fn from_private_key(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let public_key = PublicKey(VerifyingKey::from(&signing_key));
        Ok(Self {
            signing_key,
            public_key,
        })
    }

    pub fn private_key(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.signing_key.to_bytes());
        out
    }

    pub fn pub_key_hash(&self) -> PubKeyHash {
        self.public_key.pub_key_hash()
    }

    /// The checksummed base-58 address of this keypair.
    pub fn address(&self) -> String {
        crate::address::encode_address(&self.pub_key_hash())
    }

    /// Sign a message. Every call draws fresh randomness, so repeated
    /// signatures over the same message differ but all verify.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        let sig: EcdsaSignature = self
            .signing_key
            .try_sign_with_rng(&mut OsRng, message)
            .map_err(|_| CryptoError::SigningFailed)?;
        let mut out = [0u8; 64];
        out.copy_from_slice(&sig.to_bytes());
        Ok(Signature(out))
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        self.public_key.verify(message, signature)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("pub_key_hash", &self.pub_key_hash())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let kp = Keypair::generate().unwrap();
        assert_ne!(kp.pub_key_hash(), PubKeyHash::default());
        assert_eq!(kp.public_key.to_bytes().len(), 33);
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = Keypair::generate().unwrap();
        let sig = kp.sign(b"Data to sign").unwrap();
        assert!(kp.verify(b"Data to sign", &sig).is_ok());
        assert!(verify(&kp.public_key.to_bytes(), b"Data to sign", &sig));
    }

    #[test]
    fn test_signatures_are_randomized() {
        let kp = Keypair::generate().unwrap();
        let s1 = kp.sign(b"same message").unwrap();
        let s2 = kp.sign(b"same message").unwrap();
        assert_ne!(s1, s2);
        assert!(kp.verify(b"same message", &s1).is_ok());
        assert!(kp.verify(b"same message", &s2).is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let kp = Keypair::generate().unwrap();
        let sig = kp.sign(b"Data to sign").unwrap();
        assert!(kp.verify(b"Wrong data", &sig).is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let kp1 = Keypair::generate().unwrap();
        let kp2 = Keypair::generate().unwrap();
        let sig = kp1.sign(b"hello").unwrap();
        assert!(kp2.verify(b"hello", &sig).is_err());
    }

    #[test]
    fn test_malformed_inputs_do_not_verify() {
        let kp = Keypair::generate().unwrap();
        let sig = kp.sign(b"hello").unwrap();
        assert!(!verify(b"not a key", b"hello", &sig));
        assert!(!verify(&kp.public_key.to_bytes(), b"hello", &Signature([0u8; 64])));
    }

    #[test]
    fn test_keypair_from_private_key() {
        let kp1 = Keypair::generate().unwrap();
        let kp2 = Keypair::from_private_key(&kp1.private_key()).unwrap();
        assert_eq!(kp1.public_key, kp2.public_key);
        assert_eq!(kp1.pub_key_hash(), kp2.pub_key_hash());
    }

    #[test]
    fn test_zero_private_key_rejected() {
        assert!(matches!(
            Keypair::from_private_key(&[0u8; 32]),
            Err(CryptoError::InvalidPrivateKey)
        ));
    }

    #[test]
    fn test_public_key_bytes_roundtrip() {
        let kp = Keypair::generate().unwrap();
        let parsed = PublicKey::from_bytes(&kp.public_key.to_bytes()).unwrap();
        assert_eq!(parsed, kp.public_key);
    }

    #[test]
    fn test_pub_key_hash_matches_bytes() {
        let kp = Keypair::generate().unwrap();
        assert_eq!(kp.pub_key_hash(), PubKeyHash::of(&kp.public_key.to_bytes()));
    }

    #[test]
    fn test_serde_rejects_malformed_bytes() {
        let short: Result<Signature, _> = serde_json::from_str("[1, 2, 3]");
        assert!(short.is_err());

        let bogus: Result<PublicKey, _> = serde_json::from_str("[2, 0, 0]");
        assert!(bogus.is_err());

        let kp = Keypair::generate().unwrap();
        let json = serde_json::to_string(&kp.public_key).unwrap();
        let parsed: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, kp.public_key);
    }
}
