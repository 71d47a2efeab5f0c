//! AES-256-GCM sealing for stored drive tokens.
//!
//! A sealed value is a single column-friendly string `<nonce>:<ciphertext>`,
//! both halves base64. The master key is 32 bytes and comes from the
//! environment only.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Separator between the nonce and ciphertext halves of a sealed value.
const SEALED_SEPARATOR: char = ':';

/// Validates that the master key is exactly 32 bytes when base64 decoded.
///
/// # Returns
/// * `Ok(Vec<u8>)` - Decoded key bytes (32 bytes)
/// * `Err` - If key is invalid length or invalid base64
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>> {
    let key_bytes = BASE64
        .decode(key_base64.trim())
        .context("Failed to decode base64 encryption key")?;

    if key_bytes.len() != KEY_SIZE {
        return Err(anyhow!(
            "Encryption key must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        ));
    }

    Ok(key_bytes)
}

/// Encrypts `plaintext` with a fresh random nonce.
///
/// Returns the packed `<nonce>:<ciphertext>` form stored in the
/// `encrypted_refresh_token` and `access_token` columns.
pub fn seal(plaintext: &str, key: &[u8]) -> Result<String> {
    let cipher = cipher_for(key)?;

    // Never reuse a nonce under the same key
    let nonce_bytes = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext_bytes = cipher
        .encrypt(&nonce_bytes, plaintext.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok(format!(
        "{}{}{}",
        BASE64.encode(nonce_bytes),
        SEALED_SEPARATOR,
        BASE64.encode(ciphertext_bytes)
    ))
}

/// Decrypts a value produced by [`seal`].
///
/// Fails on a malformed packing, wrong key, or tampered ciphertext.
pub fn open(sealed: &str, key: &[u8]) -> Result<String> {
    let cipher = cipher_for(key)?;

    let (nonce_b64, ciphertext_b64) = sealed
        .split_once(SEALED_SEPARATOR)
        .ok_or_else(|| anyhow!("Sealed value is missing the nonce separator"))?;

    let nonce_bytes = BASE64.decode(nonce_b64).context("Failed to decode nonce")?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(anyhow!(
            "Invalid nonce size: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        ));
    }
    let ciphertext_bytes = BASE64
        .decode(ciphertext_b64)
        .context("Failed to decode ciphertext")?;

    let plaintext_bytes = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext_bytes.as_ref())
        .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

    String::from_utf8(plaintext_bytes).context("Decrypted data is not valid UTF-8")
}

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != KEY_SIZE {
        return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
    }
    Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("Failed to create cipher: {}", e))
}
