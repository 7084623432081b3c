//! AES-256-GCM sealing for everything the vault persists.
//!
//! Blobs are `nonce || ciphertext` with a random 96-bit nonce per seal
//! and caller-supplied associated data binding the blob to its context
//! (a device name, or the master-key wrap label). Authentication failure
//! means tampering, truncation or the wrong key; callers translate that
//! into their own error kind.

use aes_gcm::{
    Aes256Gcm, Key,
    aead::{Aead, KeyInit, Payload},
};
use anyhow::Result;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Seal `plaintext` under `key`, authenticating `aad` alongside it.
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    use rand::Rng;

    let nonce: [u8; NONCE_LEN] = rand::rng().random();
    let gcm_nonce = &nonce.into();

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(
            gcm_nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| anyhow::anyhow!("aes-gcm encryption failed: {e}"))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Open a `nonce || ciphertext` blob sealed with [`seal`]. The same
/// `aad` must be supplied or authentication fails.
pub fn open(key: &[u8; KEY_LEN], blob: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if blob.len() <= NONCE_LEN {
        anyhow::bail!("sealed blob too short: {} bytes", blob.len());
    }

    let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
    let nonce_arr: [u8; NONCE_LEN] = nonce
        .try_into()
        .map_err(|_| anyhow::anyhow!("malformed nonce"))?;
    let gcm_nonce = &nonce_arr.into();

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(
            gcm_nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|e| anyhow::anyhow!("aes-gcm decryption failed: {e}"))?;

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> [u8; KEY_LEN] {
        use rand::Rng;
        rand::rng().random()
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = random_key();
        let blob = seal(&key, b"hunter2", b"device:1").unwrap();
        let opened = open(&key, &blob, b"device:1").unwrap();
        assert_eq!(opened, b"hunter2");
    }

    #[test]
    fn wrong_key_fails() {
        let key = random_key();
        let other = random_key();
        let blob = seal(&key, b"hunter2", b"").unwrap();
        assert!(open(&other, &blob, b"").is_err());
    }

    #[test]
    fn aad_mismatch_fails() {
        let key = random_key();
        let blob = seal(&key, b"hunter2", b"device:1").unwrap();
        assert!(open(&key, &blob, b"device:2").is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = random_key();
        let mut blob = seal(&key, b"hunter2", b"").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(open(&key, &blob, b"").is_err());
    }

    #[test]
    fn truncated_blob_fails() {
        let key = random_key();
        assert!(open(&key, &[0u8; NONCE_LEN], b"").is_err());
        assert!(open(&key, b"", b"").is_err());
    }

    #[test]
    fn nonces_are_unique_per_seal() {
        let key = random_key();
        let a = seal(&key, b"same", b"").unwrap();
        let b = seal(&key, b"same", b"").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }
}
