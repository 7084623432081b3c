use std::sync::Arc;

use crate::db::AuditRecord;
use crate::domain::{Actor, AuditAction, EngineError};
use crate::policy;
use crate::vault::{VaultKeyring, VaultStatus};

use super::audit::AuditLedger;

/// SUPER_ADMIN surface over the keyring: one-time setup, unlock, lock
/// and the unauthenticated status probe.
pub struct VaultService {
    keyring: Arc<VaultKeyring>,
    audit: Arc<AuditLedger>,
    min_passphrase_length: usize,
}

impl VaultService {
    #[must_use]
    pub const fn new(
        keyring: Arc<VaultKeyring>,
        audit: Arc<AuditLedger>,
        min_passphrase_length: usize,
    ) -> Self {
        Self {
            keyring,
            audit,
            min_passphrase_length,
        }
    }

    /// One-time initialization. Generates and wraps the master key; the
    /// vault comes up unlocked. There is no recovery path: losing the
    /// passphrase strands every sealed credential.
    pub async fn setup(&self, actor: &Actor, passphrase: &str) -> Result<(), EngineError> {
        policy::require_super_admin(actor)?;

        if passphrase.len() < self.min_passphrase_length {
            return Err(EngineError::Validation(format!(
                "Passphrase must be at least {} characters",
                self.min_passphrase_length
            )));
        }

        self.keyring.setup(passphrase).await?;

        self.audit
            .append(AuditRecord {
                actor_name: actor.username.clone(),
                action: AuditAction::SetupVault,
                target: "vault".to_string(),
                details: None,
            })
            .await
    }

    /// Unlock with the operator passphrase. Failed attempts, including a
    /// wrong passphrase, are recorded in the ledger.
    pub async fn unlock(&self, actor: &Actor, passphrase: &str) -> Result<(), EngineError> {
        let attempt = async {
            policy::require_super_admin(actor)?;
            self.keyring.unlock(passphrase).await
        };

        match attempt.await {
            Ok(()) => {
                self.audit
                    .append(AuditRecord {
                        actor_name: actor.username.clone(),
                        action: AuditAction::UnlockVault,
                        target: "vault".to_string(),
                        details: None,
                    })
                    .await
            }
            Err(err) => {
                self.audit
                    .record_denied(
                        &actor.username,
                        AuditAction::UnlockVault,
                        "vault".to_string(),
                        &err,
                    )
                    .await;
                Err(err)
            }
        }
    }

    /// Drop the in-memory master key. Idempotent.
    pub async fn lock(&self, actor: &Actor) -> Result<(), EngineError> {
        policy::require_super_admin(actor)?;

        self.keyring.lock().await;

        self.audit
            .append(AuditRecord {
                actor_name: actor.username.clone(),
                action: AuditAction::LockVault,
                target: "vault".to_string(),
                details: None,
            })
            .await
    }

    /// Flags only, no authentication required; used for UI gating.
    pub async fn status(&self) -> Result<VaultStatus, EngineError> {
        self.keyring.status().await
    }
}
