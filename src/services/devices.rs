use std::sync::Arc;

use serde_json::json;

use crate::db::{AuditRecord, Device, NewDevice, Store};
use crate::domain::{Actor, AuditAction, DeviceEvent, EngineError, Role};
use crate::locks::DeviceLocks;
use crate::policy::{self, AccessPolicy};
use crate::vault::CredentialStore;

use super::audit::AuditLedger;

#[derive(Debug, Clone)]
pub struct NewDeviceInput {
    pub name: String,
    pub ip: String,
    pub protocol: String,
    pub group_id: i32,
    /// Sealed into the vault at creation when present. A device created
    /// without one carries no blob until an admin resets it.
    pub initial_secret: Option<String>,
}

/// Device inventory plus the credential-rotation (reset) workflow.
pub struct DeviceService {
    store: Store,
    credentials: Arc<CredentialStore>,
    policy: Arc<AccessPolicy>,
    audit: Arc<AuditLedger>,
    locks: Arc<DeviceLocks>,
}

impl DeviceService {
    #[must_use]
    pub const fn new(
        store: Store,
        credentials: Arc<CredentialStore>,
        policy: Arc<AccessPolicy>,
        audit: Arc<AuditLedger>,
        locks: Arc<DeviceLocks>,
    ) -> Self {
        Self {
            store,
            credentials,
            policy,
            audit,
            locks,
        }
    }

    /// ADMIN within their managed group or SUPER_ADMIN anywhere; requires
    /// an open vault even when no initial secret is sealed.
    pub async fn create_device(
        &self,
        actor: &Actor,
        input: NewDeviceInput,
    ) -> Result<Device, EngineError> {
        self.policy.require_vault_open().await?;
        policy::require_approver(actor, input.group_id)?;

        let name = input.name.trim().to_string();
        if name.is_empty() || input.ip.trim().is_empty() {
            return Err(EngineError::Validation(
                "Device name and IP must not be empty".to_string(),
            ));
        }

        if self.store.get_group(input.group_id).await?.is_none() {
            return Err(EngineError::NotFound("device group"));
        }

        if self.store.get_device_by_name(&name).await?.is_some() {
            return Err(EngineError::Validation(format!(
                "Device '{name}' already exists"
            )));
        }

        let blob = match &input.initial_secret {
            Some(secret) => Some(self.credentials.seal(&name, secret).await?),
            None => None,
        };

        let record = AuditRecord {
            actor_name: actor.username.clone(),
            action: AuditAction::CreateDevice,
            target: name.clone(),
            details: Some(json!({ "device": name, "ip": input.ip })),
        };

        let device = self
            .store
            .create_device_commit(
                NewDevice {
                    name,
                    ip: input.ip,
                    protocol: input.protocol,
                    group_id: input.group_id,
                    created_by_id: actor.user_id,
                },
                blob,
                record,
            )
            .await?;

        Ok(device)
    }

    /// SUPER_ADMIN and USER see the whole inventory (users need it to
    /// request access); a scoped ADMIN sees only their group.
    pub async fn list_devices(&self, actor: &Actor) -> Result<Vec<Device>, EngineError> {
        let group_filter = match actor.role {
            Role::Admin => match actor.managed_group_id {
                Some(group_id) => Some(group_id),
                None => return Ok(Vec::new()),
            },
            Role::SuperAdmin | Role::User => None,
        };

        Ok(self.store.list_devices(group_filter).await?)
    }

    /// Rotate a device credential and return the device to SAFE. Legal
    /// from SAFE, IN_USE and PENDING_RESET; closes the active request if
    /// one exists. Every refused attempt lands in the ledger.
    pub async fn reset_device(
        &self,
        actor: &Actor,
        device_id: i32,
        new_secret: &str,
    ) -> Result<(), EngineError> {
        match self.try_reset(actor, device_id, new_secret).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.audit
                    .record_denied(
                        &actor.username,
                        AuditAction::ResetPassword,
                        format!("device#{device_id}"),
                        &err,
                    )
                    .await;
                Err(err)
            }
        }
    }

    async fn try_reset(
        &self,
        actor: &Actor,
        device_id: i32,
        new_secret: &str,
    ) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(device_id).await;

        let device = self
            .store
            .get_device(device_id)
            .await?
            .ok_or(EngineError::NotFound("device"))?;

        self.policy.require_vault_open().await?;
        policy::require_approver(actor, device.group_id)?;

        if new_secret.is_empty() {
            return Err(EngineError::Validation(
                "New credential must not be empty".to_string(),
            ));
        }

        let after = device.status.apply(DeviceEvent::Reset)?;
        let blob = self.credentials.seal(&device.name, new_secret).await?;

        let active = self.store.active_request_for_device(device_id).await?;
        let applicant = match &active {
            Some(request) => self
                .store
                .get_user(request.user_id)
                .await?
                .map(|u| u.username),
            None => None,
        };

        let record = AuditRecord {
            actor_name: actor.username.clone(),
            action: AuditAction::ResetPassword,
            target: device.name.clone(),
            details: Some(json!({
                "device": device.name,
                "status_before": device.status.as_str(),
                "status_after": after.as_str(),
                "applicant": applicant,
            })),
        };

        let committed = self
            .store
            .reset_device_commit(
                device_id,
                device.status,
                blob,
                active.map(|r| r.id),
                record,
            )
            .await?;

        if !committed {
            return Err(EngineError::DeviceBusy);
        }

        Ok(())
    }
}
