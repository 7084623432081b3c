use std::sync::Arc;

use crate::db::Store;
use crate::domain::EngineError;

use super::cipher;
use super::keyring::VaultKeyring;

/// Seals and opens per-device secrets under the vault master key. Each
/// blob is bound to its device name through the AEAD associated data, so
/// a blob copied onto another device row fails to open. Names are unique
/// and devices are never renamed, which keeps the binding stable.
pub struct CredentialStore {
    store: Store,
    keyring: Arc<VaultKeyring>,
}

impl CredentialStore {
    #[must_use]
    pub const fn new(store: Store, keyring: Arc<VaultKeyring>) -> Self {
        Self { store, keyring }
    }

    /// Encrypt a secret for the named device. Fails when the vault is not
    /// open; the caller persists the returned blob inside its own commit.
    pub async fn seal(&self, device_name: &str, secret: &str) -> Result<Vec<u8>, EngineError> {
        let key = self.keyring.master_key().await?;
        cipher::seal(&key, secret.as_bytes(), &device_aad(device_name))
            .map_err(|_| EngineError::Internal("Failed to seal credential".to_string()))
    }

    /// Decrypt the stored blob for a device. `NotFound` when the device
    /// has no blob yet, `CorruptCredential` on any integrity failure.
    pub async fn reveal(
        &self,
        device_id: i32,
        device_name: &str,
    ) -> Result<String, EngineError> {
        let key = self.keyring.master_key().await?;

        let Some(blob) = self.store.get_credential_blob(device_id).await? else {
            return Err(EngineError::NotFound("credential"));
        };

        let plaintext = cipher::open(&key, &blob, &device_aad(device_name))
            .map_err(|_| EngineError::CorruptCredential)?;

        String::from_utf8(plaintext).map_err(|_| EngineError::CorruptCredential)
    }
}

fn device_aad(device_name: &str) -> Vec<u8> {
    format!("keywarden.device-credential.v1:{device_name}").into_bytes()
}
