use thiserror::Error;

/// Unified error taxonomy for every engine operation.
///
/// Policy, ownership and state-precondition failures are recoverable: the
/// caller can retry with corrected input or after the vault is unlocked,
/// and engine state is never left half-mutated. `CorruptCredential` is
/// fatal for that one credential (an admin reset replaces it) but not for
/// the process.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("vault is not initialized")]
    VaultNotInitialized,

    #[error("vault is locked")]
    VaultLocked,

    #[error("wrong vault passphrase")]
    WrongPassphrase,

    #[error("vault is already initialized")]
    AlreadyInitialized,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("operation not permitted for this role")]
    Forbidden,

    #[error("target is outside the caller's managed group")]
    OutOfScope,

    #[error("mfa code required")]
    MfaRequired,

    #[error("invalid mfa code")]
    InvalidCode,

    #[error("no mfa binding for this user")]
    NotBound,

    #[error("device already has an active request")]
    DeviceBusy,

    #[error("invalid transition: {from} cannot {action}")]
    InvalidTransition { from: String, action: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("request belongs to another user")]
    NotOwner,

    #[error("stored credential is corrupt or was sealed under a different key")]
    CorruptCredential,

    #[error("group is still referenced by devices or admins")]
    GroupInUse,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn invalid_transition(from: impl Into<String>, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.into(),
            action: action.into(),
        }
    }

    /// Stable tag used in denial audit entries and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::VaultNotInitialized => "VAULT_NOT_INITIALIZED",
            Self::VaultLocked => "VAULT_LOCKED",
            Self::WrongPassphrase => "WRONG_PASSPHRASE",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Forbidden => "FORBIDDEN",
            Self::OutOfScope => "OUT_OF_SCOPE",
            Self::MfaRequired => "MFA_REQUIRED",
            Self::InvalidCode => "INVALID_CODE",
            Self::NotBound => "NOT_BOUND",
            Self::DeviceBusy => "DEVICE_BUSY",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::NotOwner => "NOT_OWNER",
            Self::CorruptCredential => "CORRUPT_CREDENTIAL",
            Self::GroupInUse => "GROUP_IN_USE",
            Self::Validation(_) => "VALIDATION",
            Self::Database(_) => "DATABASE",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl From<sea_orm::DbErr> for EngineError {
    fn from(e: sea_orm::DbErr) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e.to_string())
    }
}
