//! Cryptographic primitives for the handshakes and secure messaging.
//!
//! Key derivation follows ICAO 9303-11 section 9.7.1; the field and
//! curve arithmetic follows TR-03111.

mod elliptic_curve;
mod mod_group;
pub mod prime_field;
pub mod standard_params;
pub mod tdes;

pub use self::{
    elliptic_curve::{ecdsa_verify, AffinePoint, EllipticCurve},
    mod_group::{DhUint, ModPGroup},
    prime_field::{PrimeField, Uint},
};
use {
    sha1::{Digest, Sha1},
    sha2::Sha256,
    zeroize::Zeroizing,
};

/// KDF counter for encryption keys.
pub const KDF_ENC: u32 = 1;
/// KDF counter for MAC keys.
pub const KDF_MAC: u32 = 2;
/// KDF counter for the PACE password key.
pub const KDF_PACE: u32 = 3;

/// ISO/IEC 7816-4 padding: `0x80` then zeros up to the block size.
pub fn pad(bytes: &mut Vec<u8>, block_size: usize) {
    bytes.push(0x80);
    bytes.resize(bytes.len().next_multiple_of(block_size), 0x00);
}

/// Strip ISO/IEC 7816-4 padding. Returns `None` if no `0x80` marker is found.
pub fn unpad(bytes: &mut Vec<u8>) -> Option<()> {
    let length = bytes.iter().rposition(|&x| x == 0x80)?;
    bytes.truncate(length);
    Some(())
}

/// BAC key seed: first 16 bytes of SHA-1 over the MRZ key string.
///
/// See ICAO 9303-11 section 9.7.2.
pub fn seed_from_mrz(mrz: &str) -> Zeroizing<[u8; 16]> {
    let mut hasher = Sha1::new();
    hasher.update(mrz.as_bytes());
    let hash = hasher.finalize();
    Zeroizing::new(hash[0..16].try_into().unwrap())
}

/// Full SHA-1 of the MRZ key, used as the PACE password input.
pub fn mrz_hash(mrz: &str) -> Zeroizing<[u8; 20]> {
    let mut hasher = Sha1::new();
    hasher.update(mrz.as_bytes());
    Zeroizing::new(hasher.finalize().into())
}

/// KDF for 3DES and AES-128 keys: SHA-1 over `secret || counter`.
pub fn kdf_128(secret: &[u8], counter: u32) -> Zeroizing<[u8; 16]> {
    let mut hasher = Sha1::new();
    hasher.update(secret);
    hasher.update(counter.to_be_bytes());
    let hash = hasher.finalize();
    Zeroizing::new(hash[0..16].try_into().unwrap())
}

/// KDF for AES-192 keys: truncated SHA-256 over `secret || counter`.
pub fn kdf_192(secret: &[u8], counter: u32) -> Zeroizing<[u8; 24]> {
    Zeroizing::new(kdf_256(secret, counter)[0..24].try_into().unwrap())
}

/// KDF for AES-256 keys: SHA-256 over `secret || counter`.
pub fn kdf_256(secret: &[u8], counter: u32) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(counter.to_be_bytes());
    Zeroizing::new(hasher.finalize().into())
}
