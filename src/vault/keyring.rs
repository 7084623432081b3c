use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task;
use zeroize::{Zeroize, Zeroizing};

use crate::config::SecurityConfig;
use crate::db::Store;
use crate::domain::EngineError;

use super::cipher;

/// Bound to the wrapped master key so the blob cannot be swapped for some
/// other sealed value and still decrypt.
const MASTER_KEY_AAD: &[u8] = b"keywarden.vault.master-key.v1";

const KDF_SALT_LEN: usize = 16;

struct MasterKey([u8; cipher::KEY_LEN]);

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VaultStatus {
    pub initialized: bool,
    pub unlocked: bool,
}

/// Holds the unwrapped master key while the vault is open. The key exists
/// only in this process; the database stores it wrapped under a KEK derived
/// from the operator passphrase.
pub struct VaultKeyring {
    store: Store,
    security: SecurityConfig,
    key: RwLock<Option<MasterKey>>,
}

impl VaultKeyring {
    #[must_use]
    pub fn new(store: Store, security: SecurityConfig) -> Self {
        Self {
            store,
            security,
            key: RwLock::new(None),
        }
    }

    pub async fn is_initialized(&self) -> Result<bool, EngineError> {
        Ok(self.store.get_vault_record().await?.is_some())
    }

    pub async fn is_unlocked(&self) -> bool {
        self.key.read().await.is_some()
    }

    pub async fn status(&self) -> Result<VaultStatus, EngineError> {
        Ok(VaultStatus {
            initialized: self.is_initialized().await?,
            unlocked: self.is_unlocked().await,
        })
    }

    /// Generate the master key, wrap it under the passphrase KEK and persist
    /// the record. The vault comes up unlocked so the operator does not have
    /// to immediately re-enter the passphrase.
    pub async fn setup(&self, passphrase: &str) -> Result<(), EngineError> {
        if self.store.get_vault_record().await?.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }

        let salt: [u8; KDF_SALT_LEN] = rand::rng().random();
        let kek = derive_kek(passphrase.to_string(), salt.to_vec(), self.security.clone()).await?;

        let master: [u8; cipher::KEY_LEN] = rand::rng().random();
        let wrapped = cipher::seal(&kek, &master, MASTER_KEY_AAD)
            .map_err(|_| EngineError::Internal("Failed to wrap master key".to_string()))?;

        if !self
            .store
            .insert_vault_record(salt.to_vec(), wrapped)
            .await?
        {
            return Err(EngineError::AlreadyInitialized);
        }

        *self.key.write().await = Some(MasterKey(master));
        Ok(())
    }

    /// Re-derive the KEK and unwrap the master key. An AEAD failure means
    /// the passphrase was wrong; the wrapped blob authenticates itself.
    pub async fn unlock(&self, passphrase: &str) -> Result<(), EngineError> {
        let Some(record) = self.store.get_vault_record().await? else {
            return Err(EngineError::VaultNotInitialized);
        };

        let kek = derive_kek(
            passphrase.to_string(),
            record.kdf_salt,
            self.security.clone(),
        )
        .await?;

        let unwrapped = cipher::open(&kek, &record.wrapped_key, MASTER_KEY_AAD)
            .map_err(|_| EngineError::WrongPassphrase)?;

        let unwrapped = Zeroizing::new(unwrapped);
        let master: [u8; cipher::KEY_LEN] = unwrapped
            .as_slice()
            .try_into()
            .map_err(|_| EngineError::CorruptCredential)?;

        *self.key.write().await = Some(MasterKey(master));
        Ok(())
    }

    /// Drop the in-memory key. Sealed blobs stay readable only after the
    /// next successful unlock.
    pub async fn lock(&self) {
        *self.key.write().await = None;
    }

    /// Copy of the master key for a single seal or open call. Errors
    /// distinguish a vault that was never set up from one that is merely
    /// locked.
    pub(crate) async fn master_key(
        &self,
    ) -> Result<Zeroizing<[u8; cipher::KEY_LEN]>, EngineError> {
        if let Some(key) = self.key.read().await.as_ref() {
            return Ok(Zeroizing::new(key.0));
        }

        if self.is_initialized().await? {
            Err(EngineError::VaultLocked)
        } else {
            Err(EngineError::VaultNotInitialized)
        }
    }
}

/// Argon2id as a raw KDF. Runs on the blocking pool with the same cost
/// parameters used for account passwords.
async fn derive_kek(
    passphrase: String,
    salt: Vec<u8>,
    security: SecurityConfig,
) -> Result<Zeroizing<[u8; cipher::KEY_LEN]>, EngineError> {
    task::spawn_blocking(move || {
        let params = Params::new(
            security.argon2_memory_cost_kib,
            security.argon2_time_cost,
            security.argon2_parallelism,
            Some(cipher::KEY_LEN),
        )
        .map_err(|e| EngineError::Internal(format!("Invalid Argon2 parameters: {e}")))?;

        let mut kek = Zeroizing::new([0u8; cipher::KEY_LEN]);
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(passphrase.as_bytes(), &salt, kek.as_mut())
            .map_err(|e| EngineError::Internal(format!("Key derivation failed: {e}")))?;

        Ok(kek)
    })
    .await
    .map_err(|e| EngineError::Internal(format!("Key derivation task failed: {e}")))?
}
