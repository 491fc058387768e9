//! Symmetric encryption for managed-database credentials.
//!
//! Generated passwords are AES-256-GCM encrypted before they are handed back
//! for persistence, and decrypted again at use time by the handler's
//! `resolve_connection_info`. The key is derived from operator-supplied key
//! material with SHA-256; ciphertexts travel as base64(nonce || ciphertext).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine as _;
use noema_types::RoutingError;
use rand::RngCore;
use sha2::{Digest, Sha256};

const NONCE_SIZE: usize = 12;

fn derive_key(key_material: &str) -> [u8; 32] {
    let digest = Sha256::digest(key_material.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

pub fn encrypt_secret(key_material: &str, plaintext: &str) -> Result<String, RoutingError> {
    let key = derive_key(key_material);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| RoutingError::SecretResolution(format!("failed to create cipher: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| RoutingError::SecretResolution(format!("encryption failed: {e}")))?;

    let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);
    Ok(base64::engine::general_purpose::STANDARD.encode(combined))
}

pub fn decrypt_secret(key_material: &str, encoded: &str) -> Result<String, RoutingError> {
    let combined = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| RoutingError::SecretResolution(format!("invalid ciphertext encoding: {e}")))?;
    if combined.len() < NONCE_SIZE {
        return Err(RoutingError::SecretResolution(
            "ciphertext too short".to_string(),
        ));
    }

    let key = derive_key(key_material);
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| RoutingError::SecretResolution(format!("failed to create cipher: {e}")))?;

    let nonce = Nonce::from_slice(&combined[..NONCE_SIZE]);
    let plaintext = cipher
        .decrypt(nonce, &combined[NONCE_SIZE..])
        .map_err(|e| RoutingError::SecretResolution(format!("decryption failed: {e}")))?;

    String::from_utf8(plaintext)
        .map_err(|e| RoutingError::SecretResolution(format!("decrypted secret is not utf-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let encrypted = encrypt_secret("key material", "generated-password").unwrap();
        assert_ne!(encrypted, "generated-password");
        let decrypted = decrypt_secret("key material", &encrypted).unwrap();
        assert_eq!(decrypted, "generated-password");
    }

    #[test]
    fn wrong_key_fails_closed() {
        let encrypted = encrypt_secret("right key", "secret").unwrap();
        let err = decrypt_secret("wrong key", &encrypted).unwrap_err();
        assert!(matches!(err, RoutingError::SecretResolution(_)));
    }

    #[test]
    fn garbage_ciphertext_fails_closed() {
        let err = decrypt_secret("key", "not base64!!!").unwrap_err();
        assert!(matches!(err, RoutingError::SecretResolution(_)));
    }
}
