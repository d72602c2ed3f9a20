//! Canonical signing primitives
//!
//! Bit-exact encodings shared by the delegation and payment protocols so a
//! remote verifier can rebuild and check exactly what was signed:
//! - SHA-256 digests for request bodies and canonical request messages
//! - 65-byte `r ‖ s ‖ v` signatures, `v = recoveryId + 27`, hex with `0x`
//! - low-S normalisation on everything we produce or pass along

use ethers::core::k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use ethers::types::Address;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Offset applied to the recovery id (legacy Ethereum `v`)
pub const RECOVERY_ID_OFFSET: u8 = 27;

/// SHA-256 of `bytes`
pub fn digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Lowercase hex SHA-256 of `bytes`, no prefix
pub fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(digest(bytes))
}

/// `0x`-prefixed lowercase hex
pub fn to_0x_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Encode `r ‖ s ‖ (recovery_id + 27)` as a `0x`-prefixed 65-byte hex string.
pub fn encode_signature(r: &[u8], s: &[u8], recovery_id: u8) -> Result<String> {
    if r.len() != 32 || s.len() != 32 {
        return Err(Error::Encoding(format!(
            "signature scalars must be 32 bytes each, got r={} s={}",
            r.len(),
            s.len()
        )));
    }
    if recovery_id > 1 {
        return Err(Error::Encoding(format!(
            "recovery id must be 0 or 1, got {}",
            recovery_id
        )));
    }

    let mut out = [0u8; 65];
    out[..32].copy_from_slice(r);
    out[32..64].copy_from_slice(s);
    out[64] = recovery_id + RECOVERY_ID_OFFSET;
    Ok(to_0x_hex(&out))
}

/// Sign a 32-byte prehash with a local key; the result is low-S.
pub fn sign_prehash(key: &SigningKey, hash: &[u8; 32]) -> Result<String> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(hash)
        .map_err(|e| Error::Encoding(format!("Failed to sign: {}", e)))?;
    let (signature, recovery_id) = low_s(signature, recovery_id);
    let (r, s) = signature.split_bytes();
    encode_signature(&r, &s, recovery_id.to_byte())
}

fn low_s(signature: Signature, recovery_id: RecoveryId) -> (Signature, RecoveryId) {
    match signature.normalize_s() {
        // Negating s mirrors R across the x-axis, so the y parity flips
        Some(normalized) => (
            normalized,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (signature, recovery_id),
    }
}

/// Decode a 65-byte hex signature from an external signer into `(signature, recovery id)`.
///
/// Accepts `v` as 0/1 or 27/28.
fn decode_signature(sig_hex: &str) -> Result<(Signature, RecoveryId)> {
    let trimmed = sig_hex.trim();
    let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if raw.len() != 130 {
        return Err(Error::Encoding(format!(
            "Invalid signature length: expected 130 hex chars, got {}",
            raw.len()
        )));
    }

    let bytes = hex::decode(raw).map_err(|e| Error::Encoding(format!("Invalid signature hex: {}", e)))?;

    let v = bytes[64];
    let recovery_byte = if v >= RECOVERY_ID_OFFSET { v - RECOVERY_ID_OFFSET } else { v };
    let recovery_id = match recovery_byte {
        0 | 1 => RecoveryId::from_byte(recovery_byte),
        _ => None,
    }
    .ok_or_else(|| Error::Encoding(format!("Invalid signature recovery byte: {}", v)))?;

    let signature = Signature::from_slice(&bytes[..64])
        .map_err(|e| Error::Encoding(format!("Invalid signature scalars: {}", e)))?;

    Ok((signature, recovery_id))
}

/// Normalise a signature returned by an external signer: `0x` prefix,
/// `v` in 27/28, low-S.
pub fn normalize_signature(sig_hex: &str) -> Result<String> {
    let (signature, recovery_id) = decode_signature(sig_hex)?;
    let (signature, recovery_id) = low_s(signature, recovery_id);
    let (r, s) = signature.split_bytes();
    encode_signature(&r, &s, recovery_id.to_byte())
}

/// Recover the Ethereum address that produced `sig_hex` over `hash`.
pub fn recover_address(hash: &[u8; 32], sig_hex: &str) -> Result<Address> {
    let (signature, recovery_id) = decode_signature(sig_hex)?;
    let key = VerifyingKey::recover_from_prehash(hash, &signature, recovery_id)
        .map_err(|e| Error::Encoding(format!("Signature recovery failed: {}", e)))?;
    Ok(ethers::utils::public_key_to_address(&key))
}

/// Parse a `0x`-prefixed (or bare) 32-byte hex value.
pub fn parse_hash(hex_str: &str) -> Result<[u8; 32]> {
    let raw = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    let bytes = hex::decode(raw).map_err(|e| Error::Encoding(format!("Invalid hash hex: {}", e)))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| Error::Encoding(format!("hash must be 32 bytes, got {}", b.len())))
}
