//! Ordered authorization checks consulted before every sensitive
//! operation. Rule order matters: the vault gate is evaluated first,
//! then group scope, then role, then MFA binding, so a caller always
//! sees the earliest applicable denial.

use std::sync::Arc;

use crate::domain::{Actor, EngineError, Role};
use crate::vault::VaultKeyring;

/// Stateful half of the guard: the vault gate needs the keyring to tell
/// a never-initialized vault apart from a locked one.
pub struct AccessPolicy {
    keyring: Arc<VaultKeyring>,
}

impl AccessPolicy {
    #[must_use]
    pub const fn new(keyring: Arc<VaultKeyring>) -> Self {
        Self { keyring }
    }

    /// Create-device, approve, reveal and reset require an open vault.
    pub async fn require_vault_open(&self) -> Result<(), EngineError> {
        self.keyring.master_key().await.map(|_| ())
    }
}

/// User and group management, vault control and MFA resets.
pub fn require_super_admin(actor: &Actor) -> Result<(), EngineError> {
    if matches!(actor.role, Role::SuperAdmin) {
        Ok(())
    } else {
        Err(EngineError::Forbidden)
    }
}

/// Approve, reject, reset and device creation: ADMIN within their managed
/// group, or SUPER_ADMIN anywhere. Scope is checked before the role so an
/// out-of-scope admin hears `OutOfScope`, not `Forbidden`.
pub fn require_approver(actor: &Actor, device_group_id: i32) -> Result<(), EngineError> {
    match actor.role {
        Role::SuperAdmin => Ok(()),
        Role::Admin => {
            if actor.manages_group(device_group_id) {
                Ok(())
            } else {
                Err(EngineError::OutOfScope)
            }
        }
        Role::User => Err(EngineError::Forbidden),
    }
}

/// Approval additionally demands an activated TOTP binding. An unbound
/// approver must hear `MfaRequired`, never `InvalidCode`.
pub fn require_mfa_bound(actor: &Actor) -> Result<(), EngineError> {
    if actor.mfa_bound {
        Ok(())
    } else {
        Err(EngineError::MfaRequired)
    }
}

/// Request creation and reveal are USER-only operations.
pub fn require_user_role(actor: &Actor) -> Result<(), EngineError> {
    if matches!(actor.role, Role::User) {
        Ok(())
    } else {
        Err(EngineError::Forbidden)
    }
}

/// Reveal is restricted to the requester who owns the grant.
pub fn require_owner(actor: &Actor, owner_id: i32) -> Result<(), EngineError> {
    if actor.user_id == owner_id {
        Ok(())
    } else {
        Err(EngineError::NotOwner)
    }
}

/// Complete may come from the requester handing the device back or from
/// an admin with scope over it.
pub fn require_participant(
    actor: &Actor,
    owner_id: i32,
    device_group_id: i32,
) -> Result<(), EngineError> {
    if actor.user_id == owner_id {
        return Ok(());
    }
    match actor.role {
        Role::SuperAdmin => Ok(()),
        Role::Admin => {
            if actor.manages_group(device_group_id) {
                Ok(())
            } else {
                Err(EngineError::OutOfScope)
            }
        }
        Role::User => Err(EngineError::NotOwner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(role: Role, managed: Option<i32>, mfa: bool) -> Actor {
        Actor {
            user_id: 7,
            username: "t".to_string(),
            role,
            managed_group_id: managed,
            mfa_bound: mfa,
        }
    }

    #[test]
    fn approver_scope_and_role() {
        assert!(require_approver(&actor(Role::SuperAdmin, None, true), 3).is_ok());
        assert!(require_approver(&actor(Role::Admin, Some(3), true), 3).is_ok());
        assert!(matches!(
            require_approver(&actor(Role::Admin, Some(2), true), 3),
            Err(EngineError::OutOfScope)
        ));
        assert!(matches!(
            require_approver(&actor(Role::Admin, None, true), 3),
            Err(EngineError::OutOfScope)
        ));
        assert!(matches!(
            require_approver(&actor(Role::User, None, true), 3),
            Err(EngineError::Forbidden)
        ));
    }

    #[test]
    fn unbound_approver_needs_mfa_not_a_code() {
        assert!(matches!(
            require_mfa_bound(&actor(Role::Admin, Some(1), false)),
            Err(EngineError::MfaRequired)
        ));
        assert!(require_mfa_bound(&actor(Role::Admin, Some(1), true)).is_ok());
    }

    #[test]
    fn user_only_operations() {
        assert!(require_user_role(&actor(Role::User, None, false)).is_ok());
        assert!(matches!(
            require_user_role(&actor(Role::Admin, Some(1), true)),
            Err(EngineError::Forbidden)
        ));
        assert!(matches!(
            require_user_role(&actor(Role::SuperAdmin, None, true)),
            Err(EngineError::Forbidden)
        ));
    }

    #[test]
    fn ownership() {
        let a = actor(Role::User, None, false);
        assert!(require_owner(&a, 7).is_ok());
        assert!(matches!(
            require_owner(&a, 8),
            Err(EngineError::NotOwner)
        ));
    }

    #[test]
    fn complete_participants() {
        assert!(require_participant(&actor(Role::User, None, false), 7, 3).is_ok());
        assert!(matches!(
            require_participant(&actor(Role::User, None, false), 8, 3),
            Err(EngineError::NotOwner)
        ));
        assert!(require_participant(&actor(Role::Admin, Some(3), false), 8, 3).is_ok());
        assert!(matches!(
            require_participant(&actor(Role::Admin, Some(2), false), 8, 3),
            Err(EngineError::OutOfScope)
        ));
        assert!(require_participant(&actor(Role::SuperAdmin, None, false), 8, 3).is_ok());
    }

    #[test]
    fn super_admin_gate() {
        assert!(require_super_admin(&actor(Role::SuperAdmin, None, false)).is_ok());
        assert!(matches!(
            require_super_admin(&actor(Role::Admin, Some(1), true)),
            Err(EngineError::Forbidden)
        ));
    }
}
