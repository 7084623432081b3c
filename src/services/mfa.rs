use std::sync::Arc;

use serde_json::json;

use crate::db::{AuditRecord, Store};
use crate::domain::{Actor, AuditAction, EngineError};
use crate::policy;
use crate::totp;

use super::audit::AuditLedger;

/// A freshly generated TOTP binding. Nothing is persisted yet; the user
/// proves possession through `activate` before the secret becomes active.
#[derive(Debug, Clone)]
pub struct MfaBinding {
    pub secret: Vec<u8>,
    pub otpauth_uri: String,
}

pub struct MfaService {
    store: Store,
    audit: Arc<AuditLedger>,
    issuer: String,
}

impl MfaService {
    #[must_use]
    pub const fn new(store: Store, audit: Arc<AuditLedger>, issuer: String) -> Self {
        Self {
            store,
            audit,
            issuer,
        }
    }

    /// Generate a fresh secret and provisioning URI for the caller. Fails
    /// if a binding is already active; the user must go through a
    /// SUPER_ADMIN reset first.
    pub async fn bind(&self, actor: &Actor) -> Result<MfaBinding, EngineError> {
        if self.store.user_totp_secret(actor.user_id).await?.is_some() {
            return Err(EngineError::Validation(
                "MFA is already active for this account".to_string(),
            ));
        }

        let secret = totp::generate_secret();
        let otpauth_uri = totp::provisioning_uri(&secret, &self.issuer, &actor.username);

        Ok(MfaBinding {
            secret,
            otpauth_uri,
        })
    }

    /// Verify one code against the pending secret and persist it as the
    /// caller's active binding.
    pub async fn activate(
        &self,
        actor: &Actor,
        secret: &[u8],
        code: &str,
    ) -> Result<(), EngineError> {
        if self.store.user_totp_secret(actor.user_id).await?.is_some() {
            return Err(EngineError::Validation(
                "MFA is already active for this account".to_string(),
            ));
        }

        if !totp::verify(secret, code)? {
            return Err(EngineError::InvalidCode);
        }

        if !self
            .store
            .set_user_totp_secret(actor.user_id, Some(secret.to_vec()))
            .await?
        {
            return Err(EngineError::NotFound("user"));
        }

        self.audit
            .append(AuditRecord {
                actor_name: actor.username.clone(),
                action: AuditAction::ActivateMfa,
                target: actor.username.clone(),
                details: None,
            })
            .await
    }

    /// Check a code against the user's active binding.
    pub async fn verify(&self, user_id: i32, code: &str) -> Result<(), EngineError> {
        let Some(secret) = self.store.user_totp_secret(user_id).await? else {
            return Err(EngineError::NotBound);
        };

        if totp::verify(&secret, code)? {
            Ok(())
        } else {
            Err(EngineError::InvalidCode)
        }
    }

    /// Clear a user's binding so they can re-enroll. SUPER_ADMIN only.
    pub async fn reset_binding(&self, actor: &Actor, user_id: i32) -> Result<(), EngineError> {
        policy::require_super_admin(actor)?;

        let Some(target) = self.store.get_user(user_id).await? else {
            return Err(EngineError::NotFound("user"));
        };

        self.store.set_user_totp_secret(user_id, None).await?;

        self.audit
            .append(AuditRecord {
                actor_name: actor.username.clone(),
                action: AuditAction::ResetMfa,
                target: target.username.clone(),
                details: Some(json!({ "applicant": target.username })),
            })
            .await
    }
}
