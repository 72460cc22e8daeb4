//! Base-58 checksummed addresses.
//!
//! An address is `base58(version || pub_key_hash || checksum)` where the
//! checksum is the first four bytes of `hash(hash(version || pub_key_hash))`.

use crate::crypto::{PubKeyHash, PUB_KEY_HASH_LEN};
use crate::hash::hash;
use thiserror::Error;

/// Version byte prefixed to every address.
pub const ADDRESS_VERSION: u8 = 0x00;

/// Number of checksum bytes appended to an address.
pub const ADDRESS_CHECKSUM_LEN: usize = 4;

const ADDRESS_PAYLOAD_LEN: usize = 1 + PUB_KEY_HASH_LEN + ADDRESS_CHECKSUM_LEN;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58 encoding")]
    InvalidEncoding,
    #[error("invalid address length: {0} bytes")]
    InvalidLength(usize),
    #[error("unsupported address version {0:#04x}")]
    UnsupportedVersion(u8),
    #[error("address checksum mismatch")]
    ChecksumMismatch,
}

fn checksum(versioned: &[u8]) -> [u8; ADDRESS_CHECKSUM_LEN] {
    let second = hash(hash(versioned).as_bytes());
    let mut out = [0u8; ADDRESS_CHECKSUM_LEN];
    out.copy_from_slice(&second.0[..ADDRESS_CHECKSUM_LEN]);
    out
}

/// Encode a public-key hash as an address.
pub fn encode_address(pub_key_hash: &PubKeyHash) -> String {
    let mut payload = Vec::with_capacity(ADDRESS_PAYLOAD_LEN);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(pub_key_hash.as_bytes());
    let sum = checksum(&payload);
    payload.extend_from_slice(&sum);
    bs58::encode(payload).into_string()
}

/// Decode an address back to the public-key hash it locks to.
pub fn decode_address(address: &str) -> Result<PubKeyHash, AddressError> {
    let payload = bs58::decode(address)
        .into_vec()
        .map_err(|_| AddressError::InvalidEncoding)?;
    if payload.len() != ADDRESS_PAYLOAD_LEN {
        return Err(AddressError::InvalidLength(payload.len()));
    }

    let (versioned, sum) = payload.split_at(1 + PUB_KEY_HASH_LEN);
    if checksum(versioned) != sum {
        return Err(AddressError::ChecksumMismatch);
    }
    if versioned[0] != ADDRESS_VERSION {
        return Err(AddressError::UnsupportedVersion(versioned[0]));
    }

    let mut bytes = [0u8; PUB_KEY_HASH_LEN];
    bytes.copy_from_slice(&versioned[1..]);
    Ok(PubKeyHash(bytes))
}

/// Whether `address` decodes to a public-key hash.
pub fn validate_address(address: &str) -> bool {
    decode_address(address).is_ok()
}
