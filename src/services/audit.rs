use serde_json::json;
use tracing::error;

use crate::db::{AuditEntry, AuditRecord, Store};
use crate::domain::{Actor, AuditAction, EngineError};
use crate::policy;

/// Append-only ledger of every security-relevant action. Successful
/// workflow mutations write their entry inside the same transaction as
/// the state change; this service covers everything else: standalone
/// appends for account and vault operations, denial records for refused
/// attempts, and the administrator-facing list.
pub struct AuditLedger {
    store: Store,
}

impl AuditLedger {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn append(&self, record: AuditRecord) -> Result<(), EngineError> {
        self.store.append_audit(record).await?;
        Ok(())
    }

    /// Record a refused attempt. The refused operation already failed, so
    /// a ledger write error here is traced rather than surfaced; the
    /// caller returns the original denial either way.
    pub async fn record_denied(
        &self,
        actor_name: &str,
        action: AuditAction,
        target: String,
        denial: &EngineError,
    ) {
        let record = AuditRecord {
            actor_name: actor_name.to_string(),
            action,
            target,
            details: Some(json!({
                "outcome": "denied",
                "error": denial.kind(),
            })),
        };

        if let Err(e) = self.store.append_audit(record).await {
            error!(error = %e, action = %action, "Failed to record denied attempt");
        }
    }

    /// Paged, filterable view of the ledger. Restricted to SUPER_ADMIN
    /// like the rest of the management surface.
    pub async fn list(
        &self,
        actor: &Actor,
        page: u64,
        page_size: u64,
        action_filter: Option<String>,
        actor_filter: Option<String>,
    ) -> Result<(Vec<AuditEntry>, u64), EngineError> {
        policy::require_super_admin(actor)?;

        let page_size = page_size.clamp(1, 200);
        let entries = self
            .store
            .list_audit(page.max(1), page_size, action_filter, actor_filter)
            .await?;
        Ok(entries)
    }
}
