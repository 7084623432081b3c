use std::sync::Arc;

use serde_json::json;

use crate::config::SecurityConfig;
use crate::db::{AuditRecord, NewUser, Store, User, UserUpdate};
use crate::domain::{Actor, AuditAction, EngineError, Role};
use crate::policy;
use crate::totp;

use super::audit::AuditLedger;

/// Account management and login. The engine has no session layer; the
/// embedding RPC boundary calls `authenticate` once and then supplies the
/// resulting `Actor` with every operation.
pub struct UserService {
    store: Store,
    audit: Arc<AuditLedger>,
    security: SecurityConfig,
}

impl UserService {
    #[must_use]
    pub const fn new(store: Store, audit: Arc<AuditLedger>, security: SecurityConfig) -> Self {
        Self {
            store,
            audit,
            security,
        }
    }

    /// Verify credentials and, for MFA-bound accounts, a TOTP code.
    /// A bound user calling without a code hears `MfaRequired` so clients
    /// can prompt for the second factor without burning the password.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        totp_code: Option<&str>,
    ) -> Result<Actor, EngineError> {
        if !self.store.verify_password(username, password).await? {
            return Err(EngineError::InvalidCredentials);
        }

        let user = self
            .store
            .get_user_by_username(username)
            .await?
            .ok_or(EngineError::InvalidCredentials)?;

        if user.mfa_bound {
            let code = totp_code.ok_or(EngineError::MfaRequired)?;
            let secret = self
                .store
                .user_totp_secret(user.id)
                .await?
                .ok_or(EngineError::NotBound)?;
            if !totp::verify(&secret, code)? {
                return Err(EngineError::InvalidCode);
            }
        }

        Ok(actor_from(&user))
    }

    /// Rebuild the caller identity for an established session.
    pub async fn actor_for_user(&self, user_id: i32) -> Result<Actor, EngineError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(EngineError::NotFound("user"))?;
        Ok(actor_from(&user))
    }

    pub async fn list_users(&self, actor: &Actor) -> Result<Vec<User>, EngineError> {
        policy::require_super_admin(actor)?;
        Ok(self.store.list_users().await?)
    }

    pub async fn create_user(&self, actor: &Actor, new: NewUser) -> Result<User, EngineError> {
        policy::require_super_admin(actor)?;

        if new.username.trim().is_empty() {
            return Err(EngineError::Validation(
                "Username must not be empty".to_string(),
            ));
        }
        self.check_password_length(&new.password)?;
        self.check_group_assignment(new.role, new.managed_group_id)
            .await?;

        if self.store.get_user_by_username(&new.username).await?.is_some() {
            return Err(EngineError::Validation(format!(
                "Username '{}' already exists",
                new.username
            )));
        }

        let user = self.store.create_user(new, Some(&self.security)).await?;

        self.audit
            .append(AuditRecord {
                actor_name: actor.username.clone(),
                action: AuditAction::CreateUser,
                target: user.username.clone(),
                details: Some(json!({ "role": user.role.as_str() })),
            })
            .await?;

        Ok(user)
    }

    pub async fn update_user(
        &self,
        actor: &Actor,
        user_id: i32,
        update: UserUpdate,
    ) -> Result<(), EngineError> {
        policy::require_super_admin(actor)?;

        let target = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(EngineError::NotFound("user"))?;

        self.check_group_assignment(update.role, update.managed_group_id)
            .await?;

        // Never leave the system without a SUPER_ADMIN.
        if target.role == Role::SuperAdmin
            && update.role != Role::SuperAdmin
            && self.store.count_users_with_role(Role::SuperAdmin).await? <= 1
        {
            return Err(EngineError::Validation(
                "Cannot demote the last SUPER_ADMIN".to_string(),
            ));
        }

        let role_after = update.role;
        self.store.update_user_profile(user_id, update).await?;

        self.audit
            .append(AuditRecord {
                actor_name: actor.username.clone(),
                action: AuditAction::UpdateUser,
                target: target.username.clone(),
                details: Some(json!({
                    "role_before": target.role.as_str(),
                    "role_after": role_after.as_str(),
                })),
            })
            .await?;

        Ok(())
    }

    pub async fn delete_user(&self, actor: &Actor, user_id: i32) -> Result<(), EngineError> {
        policy::require_super_admin(actor)?;

        if actor.user_id == user_id {
            return Err(EngineError::Validation(
                "Cannot delete your own account".to_string(),
            ));
        }

        let target = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(EngineError::NotFound("user"))?;

        if target.role == Role::SuperAdmin
            && self.store.count_users_with_role(Role::SuperAdmin).await? <= 1
        {
            return Err(EngineError::Validation(
                "Cannot delete the last SUPER_ADMIN".to_string(),
            ));
        }

        // Request rows reference the user; history must stay replayable.
        if !self.store.list_requests_for_user(user_id).await?.is_empty() {
            return Err(EngineError::Validation(
                "User has request history and cannot be deleted".to_string(),
            ));
        }

        self.store.delete_user(user_id).await?;

        self.audit
            .append(AuditRecord {
                actor_name: actor.username.clone(),
                action: AuditAction::DeleteUser,
                target: target.username.clone(),
                details: None,
            })
            .await?;

        Ok(())
    }

    /// SUPER_ADMIN sets a new password for any account, e.g. after a
    /// lockout. Does not require the old password.
    pub async fn admin_reset_password(
        &self,
        actor: &Actor,
        user_id: i32,
        new_password: &str,
    ) -> Result<(), EngineError> {
        policy::require_super_admin(actor)?;
        self.check_password_length(new_password)?;

        let target = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(EngineError::NotFound("user"))?;

        self.store
            .update_user_password(user_id, new_password.to_string(), Some(&self.security))
            .await?;

        self.audit
            .append(AuditRecord {
                actor_name: actor.username.clone(),
                action: AuditAction::AdminResetUserPwd,
                target: target.username.clone(),
                details: Some(json!({ "applicant": target.username })),
            })
            .await?;

        Ok(())
    }

    /// Self-service password change; verifies the current password first.
    pub async fn change_own_password(
        &self,
        actor: &Actor,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), EngineError> {
        self.check_password_length(new_password)?;

        if current_password == new_password {
            return Err(EngineError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        if !self
            .store
            .verify_password(&actor.username, current_password)
            .await?
        {
            return Err(EngineError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        self.store
            .update_user_password(actor.user_id, new_password.to_string(), Some(&self.security))
            .await?;

        self.audit
            .append(AuditRecord {
                actor_name: actor.username.clone(),
                action: AuditAction::UpdateSelfPwd,
                target: actor.username.clone(),
                details: None,
            })
            .await?;

        Ok(())
    }

    fn check_password_length(&self, password: &str) -> Result<(), EngineError> {
        if password.len() < self.security.min_password_length {
            return Err(EngineError::Validation(format!(
                "Password must be at least {} characters",
                self.security.min_password_length
            )));
        }
        Ok(())
    }

    /// ADMIN accounts must manage exactly one existing group; other roles
    /// must not carry a group assignment.
    async fn check_group_assignment(
        &self,
        role: Role,
        managed_group_id: Option<i32>,
    ) -> Result<(), EngineError> {
        match (role, managed_group_id) {
            (Role::Admin, Some(group_id)) => {
                if self.store.get_group(group_id).await?.is_none() {
                    return Err(EngineError::NotFound("device group"));
                }
                Ok(())
            }
            (Role::Admin, None) => Err(EngineError::Validation(
                "ADMIN accounts require a managed group".to_string(),
            )),
            (_, Some(_)) => Err(EngineError::Validation(
                "Only ADMIN accounts may carry a managed group".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }
}

fn actor_from(user: &User) -> Actor {
    Actor {
        user_id: user.id,
        username: user.username.clone(),
        role: user.role,
        managed_group_id: user.managed_group_id,
        mfa_bound: user.mfa_bound,
    }
}
