use std::sync::Arc;

use serde_json::json;

use crate::db::{AuditRecord, DeviceGroup, Store};
use crate::domain::{Actor, AuditAction, EngineError};
use crate::policy;

use super::audit::AuditLedger;

/// Device-group directory. Groups partition the device inventory and
/// define the scope of ADMIN accounts.
pub struct GroupService {
    store: Store,
    audit: Arc<AuditLedger>,
}

impl GroupService {
    #[must_use]
    pub const fn new(store: Store, audit: Arc<AuditLedger>) -> Self {
        Self { store, audit }
    }

    /// Open to every authenticated caller; users browse groups when
    /// requesting access, admins when managing devices.
    pub async fn list(&self) -> Result<Vec<DeviceGroup>, EngineError> {
        Ok(self.store.list_groups().await?)
    }

    pub async fn create(
        &self,
        actor: &Actor,
        name: &str,
        description: &str,
    ) -> Result<DeviceGroup, EngineError> {
        policy::require_super_admin(actor)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation(
                "Group name must not be empty".to_string(),
            ));
        }

        if self.store.get_group_by_name(name).await?.is_some() {
            return Err(EngineError::Validation(format!(
                "Group '{name}' already exists"
            )));
        }

        let group = self
            .store
            .create_group(name.to_string(), description.to_string())
            .await?;

        self.audit
            .append(AuditRecord {
                actor_name: actor.username.clone(),
                action: AuditAction::CreateGroup,
                target: group.name.clone(),
                details: None,
            })
            .await?;

        Ok(group)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        group_id: i32,
        name: &str,
        description: &str,
    ) -> Result<(), EngineError> {
        policy::require_super_admin(actor)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::Validation(
                "Group name must not be empty".to_string(),
            ));
        }

        let existing = self
            .store
            .get_group(group_id)
            .await?
            .ok_or(EngineError::NotFound("device group"))?;

        if let Some(other) = self.store.get_group_by_name(name).await?
            && other.id != group_id
        {
            return Err(EngineError::Validation(format!(
                "Group '{name}' already exists"
            )));
        }

        self.store
            .update_group(group_id, name.to_string(), description.to_string())
            .await?;

        self.audit
            .append(AuditRecord {
                actor_name: actor.username.clone(),
                action: AuditAction::UpdateGroup,
                target: name.to_string(),
                details: Some(json!({ "name_before": existing.name })),
            })
            .await?;

        Ok(())
    }

    /// Deletion is blocked while devices or scoped admins still reference
    /// the group.
    pub async fn delete(&self, actor: &Actor, group_id: i32) -> Result<(), EngineError> {
        policy::require_super_admin(actor)?;

        let group = self
            .store
            .get_group(group_id)
            .await?
            .ok_or(EngineError::NotFound("device group"))?;

        if self.store.group_device_count(group_id).await? > 0
            || self.store.group_admin_count(group_id).await? > 0
        {
            return Err(EngineError::GroupInUse);
        }

        self.store.delete_group(group_id).await?;

        self.audit
            .append(AuditRecord {
                actor_name: actor.username.clone(),
                action: AuditAction::DeleteGroup,
                target: group.name.clone(),
                details: None,
            })
            .await?;

        Ok(())
    }
}
