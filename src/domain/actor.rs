use serde::{Deserialize, Serialize};

use super::role::Role;

/// Verified caller identity for every engine operation.
///
/// The embedding RPC layer owns token/session verification and hands the
/// resulting identity in; the engine never parses tokens. Obtain one via
/// `UserService::authenticate` or `UserService::actor_for_user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
    /// Group this ADMIN administers. `None` for USER and SUPER_ADMIN.
    pub managed_group_id: Option<i32>,
    /// Whether the user has an activated TOTP binding.
    pub mfa_bound: bool,
}

impl Actor {
    /// True when the actor's scope covers a device group: SUPER_ADMIN
    /// covers everything, an ADMIN only the group they manage.
    #[must_use]
    pub fn manages_group(&self, group_id: i32) -> bool {
        match self.role {
            Role::SuperAdmin => true,
            Role::Admin => self.managed_group_id == Some(group_id),
            Role::User => false,
        }
    }
}
