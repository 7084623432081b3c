use std::sync::Arc;

use serde_json::json;

use crate::db::{AccessRequest, AuditRecord, NewRequest, Store};
use crate::domain::{
    Actor, AuditAction, DeviceEvent, DeviceStatus, EngineError, LeaseDuration, RequestStatus, Role,
};
use crate::locks::DeviceLocks;
use crate::policy::{self, AccessPolicy};
use crate::vault::CredentialStore;

use super::audit::AuditLedger;
use super::mfa::MfaService;

/// The access-request workflow: create, approve, reject, reveal,
/// complete. Every mutation takes the device lock, re-reads state under
/// it, applies the lifecycle transition and commits state plus audit
/// entry in one transaction.
pub struct RequestService {
    store: Store,
    credentials: Arc<CredentialStore>,
    policy: Arc<AccessPolicy>,
    mfa: Arc<MfaService>,
    audit: Arc<AuditLedger>,
    locks: Arc<DeviceLocks>,
}

impl RequestService {
    #[must_use]
    pub const fn new(
        store: Store,
        credentials: Arc<CredentialStore>,
        policy: Arc<AccessPolicy>,
        mfa: Arc<MfaService>,
        audit: Arc<AuditLedger>,
        locks: Arc<DeviceLocks>,
    ) -> Self {
        Self {
            store,
            credentials,
            policy,
            mfa,
            audit,
            locks,
        }
    }

    /// Open an access request against a SAFE device. USER-only; admins
    /// approve requests, they do not file them.
    pub async fn create(
        &self,
        actor: &Actor,
        device_id: i32,
        reason: &str,
        duration: LeaseDuration,
    ) -> Result<AccessRequest, EngineError> {
        policy::require_user_role(actor)?;

        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EngineError::Validation(
                "Reason must not be empty".to_string(),
            ));
        }

        let _guard = self.locks.acquire(device_id).await;

        let device = self
            .store
            .get_device(device_id)
            .await?
            .ok_or(EngineError::NotFound("device"))?;

        // SAFE -> PENDING_APPROVAL; anything else answers DeviceBusy.
        device.status.apply(DeviceEvent::Request)?;

        let record = AuditRecord {
            actor_name: actor.username.clone(),
            action: AuditAction::CreateRequest,
            target: device.name.clone(),
            details: Some(json!({
                "device": device.name,
                "reason": reason,
                "duration": duration.as_str(),
                "applicant": actor.username,
            })),
        };

        let request = self
            .store
            .create_request_commit(
                NewRequest {
                    device_id,
                    user_id: actor.user_id,
                    reason: reason.to_string(),
                    duration,
                },
                record,
            )
            .await?
            .ok_or(EngineError::DeviceBusy)?;

        Ok(request)
    }

    /// Approve a pending request. Vault must be open, the approver must
    /// hold scope over the device and present a valid TOTP code. Refused
    /// attempts are recorded in the ledger.
    pub async fn approve(
        &self,
        actor: &Actor,
        request_id: i32,
        totp_code: &str,
    ) -> Result<(), EngineError> {
        match self.try_approve(actor, request_id, totp_code).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.audit
                    .record_denied(
                        &actor.username,
                        AuditAction::ApproveRequest,
                        format!("request#{request_id}"),
                        &err,
                    )
                    .await;
                Err(err)
            }
        }
    }

    async fn try_approve(
        &self,
        actor: &Actor,
        request_id: i32,
        totp_code: &str,
    ) -> Result<(), EngineError> {
        let (request, device, _guard) = self.load_locked(request_id).await?;

        self.policy.require_vault_open().await?;
        policy::require_approver(actor, device.group_id)?;
        policy::require_mfa_bound(actor)?;
        self.mfa.verify(actor.user_id, totp_code).await?;

        let after = device.status.apply(DeviceEvent::Approve)?;

        let applicant = self
            .store
            .get_user(request.user_id)
            .await?
            .map(|u| u.username);

        let record = AuditRecord {
            actor_name: actor.username.clone(),
            action: AuditAction::ApproveRequest,
            target: device.name.clone(),
            details: Some(json!({
                "device": device.name,
                "applicant": applicant,
                "status_before": device.status.as_str(),
                "status_after": after.as_str(),
            })),
        };

        if !self
            .store
            .approve_request_commit(request.id, device.id, record)
            .await?
        {
            return Err(EngineError::DeviceBusy);
        }

        Ok(())
    }

    /// Turn down a pending request and release the device back to SAFE.
    /// Same role and scope gate as approve, but no vault or TOTP: no
    /// credential is touched.
    pub async fn reject(&self, actor: &Actor, request_id: i32) -> Result<(), EngineError> {
        let (request, device, _guard) = self.load_locked(request_id).await?;

        policy::require_approver(actor, device.group_id)?;

        let after = device.status.apply(DeviceEvent::Reject)?;

        let applicant = self
            .store
            .get_user(request.user_id)
            .await?
            .map(|u| u.username);

        let record = AuditRecord {
            actor_name: actor.username.clone(),
            action: AuditAction::RejectRequest,
            target: device.name.clone(),
            details: Some(json!({
                "device": device.name,
                "applicant": applicant,
                "status_before": device.status.as_str(),
                "status_after": after.as_str(),
            })),
        };

        if !self
            .store
            .reject_request_commit(request.id, device.id, record)
            .await?
        {
            return Err(EngineError::DeviceBusy);
        }

        Ok(())
    }

    /// Mark an in-use device as handed back. Allowed to the requester or
    /// an admin with scope; the device parks in PENDING_RESET until an
    /// admin rotates the credential.
    pub async fn complete(&self, actor: &Actor, request_id: i32) -> Result<(), EngineError> {
        let (request, device, _guard) = self.load_locked(request_id).await?;

        policy::require_participant(actor, request.user_id, device.group_id)?;

        let after = device.status.apply(DeviceEvent::Complete)?;

        let record = AuditRecord {
            actor_name: actor.username.clone(),
            action: AuditAction::CompleteRequest,
            target: device.name.clone(),
            details: Some(json!({
                "device": device.name,
                "applicant": actor.username,
                "status_before": device.status.as_str(),
                "status_after": after.as_str(),
            })),
        };

        if !self
            .store
            .complete_request_commit(request.id, device.id, record)
            .await?
        {
            return Err(EngineError::DeviceBusy);
        }

        Ok(())
    }

    /// Decrypt and return the credential for an approved request. The
    /// first reveal drives APPROVED -> IN_USE; later calls are idempotent
    /// reads. The attempt is recorded even when it fails.
    pub async fn reveal(&self, actor: &Actor, request_id: i32) -> Result<String, EngineError> {
        match self.try_reveal(actor, request_id).await {
            Ok(plaintext) => Ok(plaintext),
            Err(err) => {
                self.audit
                    .record_denied(
                        &actor.username,
                        AuditAction::ViewPassword,
                        format!("request#{request_id}"),
                        &err,
                    )
                    .await;
                Err(err)
            }
        }
    }

    async fn try_reveal(&self, actor: &Actor, request_id: i32) -> Result<String, EngineError> {
        let (request, device, _guard) = self.load_locked(request_id).await?;

        self.policy.require_vault_open().await?;
        policy::require_user_role(actor)?;
        policy::require_owner(actor, request.user_id)?;

        if request.status != RequestStatus::Approved {
            return Err(EngineError::invalid_transition(
                request.status.as_str(),
                "reveal",
            ));
        }

        let first_read = match device.status {
            DeviceStatus::Approved => true,
            DeviceStatus::InUse => false,
            _ => {
                return Err(EngineError::invalid_transition(
                    device.status.as_str(),
                    "reveal",
                ));
            }
        };

        let plaintext = self.credentials.reveal(device.id, &device.name).await?;

        let record = AuditRecord {
            actor_name: actor.username.clone(),
            action: AuditAction::ViewPassword,
            target: device.name.clone(),
            details: Some(json!({
                "device": device.name,
                "applicant": actor.username,
                "first_read": first_read,
            })),
        };

        if !self
            .store
            .mark_credential_revealed(device.id, first_read, record)
            .await?
        {
            return Err(EngineError::DeviceBusy);
        }

        Ok(plaintext)
    }

    pub async fn list_my_requests(&self, actor: &Actor) -> Result<Vec<AccessRequest>, EngineError> {
        Ok(self.store.list_requests_for_user(actor.user_id).await?)
    }

    /// Approval queue. ADMIN sees their group's requests, SUPER_ADMIN all.
    pub async fn list_pending_requests(
        &self,
        actor: &Actor,
    ) -> Result<Vec<AccessRequest>, EngineError> {
        let group_filter = match actor.role {
            Role::SuperAdmin => None,
            Role::Admin => match actor.managed_group_id {
                Some(group_id) => Some(group_id),
                None => return Ok(Vec::new()),
            },
            Role::User => return Err(EngineError::Forbidden),
        };

        Ok(self.store.list_pending_requests(group_filter).await?)
    }

    /// Fetch the request, lock its device, then re-read both under the
    /// lock so checks run against settled state.
    async fn load_locked(
        &self,
        request_id: i32,
    ) -> Result<(AccessRequest, crate::db::Device, tokio::sync::OwnedMutexGuard<()>), EngineError>
    {
        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or(EngineError::NotFound("request"))?;

        let guard = self.locks.acquire(request.device_id).await;

        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or(EngineError::NotFound("request"))?;

        let device = self
            .store
            .get_device(request.device_id)
            .await?
            .ok_or(EngineError::NotFound("device"))?;

        Ok((request, device, guard))
    }
}
