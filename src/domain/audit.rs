use std::fmt;

use serde::{Deserialize, Serialize};

/// Action tags recorded in the audit ledger. One tag per auditable
/// operation; denied attempts reuse the tag of the operation they were
/// aimed at, with an `outcome: "denied"` detail field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    CreateDevice,
    ResetPassword,
    CreateRequest,
    ApproveRequest,
    RejectRequest,
    CompleteRequest,
    ViewPassword,
    CreateUser,
    UpdateUser,
    DeleteUser,
    AdminResetUserPwd,
    UpdateSelfPwd,
    ActivateMfa,
    ResetMfa,
    CreateGroup,
    UpdateGroup,
    DeleteGroup,
    SetupVault,
    UnlockVault,
    LockVault,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateDevice => "CREATE_DEVICE",
            Self::ResetPassword => "RESET_PASSWORD",
            Self::CreateRequest => "CREATE_REQUEST",
            Self::ApproveRequest => "APPROVE_REQUEST",
            Self::RejectRequest => "REJECT_REQUEST",
            Self::CompleteRequest => "COMPLETE_REQUEST",
            Self::ViewPassword => "VIEW_PASSWORD",
            Self::CreateUser => "CREATE_USER",
            Self::UpdateUser => "UPDATE_USER",
            Self::DeleteUser => "DELETE_USER",
            Self::AdminResetUserPwd => "ADMIN_RESET_USER_PWD",
            Self::UpdateSelfPwd => "UPDATE_SELF_PWD",
            Self::ActivateMfa => "ACTIVATE_MFA",
            Self::ResetMfa => "RESET_MFA",
            Self::CreateGroup => "CREATE_GROUP",
            Self::UpdateGroup => "UPDATE_GROUP",
            Self::DeleteGroup => "DELETE_GROUP",
            Self::SetupVault => "SETUP_VAULT",
            Self::UnlockVault => "UNLOCK_VAULT",
            Self::LockVault => "LOCK_VAULT",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
