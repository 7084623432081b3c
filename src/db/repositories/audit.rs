use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::AuditAction;
use crate::entities::{audit_entries, prelude::*};

/// One ledger entry waiting to be appended. Workflow repositories insert
/// these inside their transactions so the audit row commits or rolls
/// back together with the state change it describes.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub actor_name: String,
    pub action: AuditAction,
    pub target: String,
    pub details: Option<serde_json::Value>,
}

impl AuditRecord {
    pub(crate) fn into_active_model(self) -> audit_entries::ActiveModel {
        audit_entries::ActiveModel {
            actor_name: Set(self.actor_name),
            action: Set(self.action.as_str().to_string()),
            target: Set(self.target),
            details: Set(self.details.map(|d| d.to_string())),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
    }
}

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Standalone append, outside any workflow transaction. Used for
    /// denied attempts, vault operations and account management.
    pub async fn append(&self, record: AuditRecord) -> Result<()> {
        AuditEntries::insert(record.into_active_model())
            .exec(&self.conn)
            .await
            .context("Failed to append audit entry")?;
        Ok(())
    }

    pub async fn list(
        &self,
        page: u64,
        page_size: u64,
        action_filter: Option<String>,
        actor_filter: Option<String>,
    ) -> Result<(Vec<audit_entries::Model>, u64)> {
        let mut query = AuditEntries::find()
            .order_by_desc(audit_entries::Column::CreatedAt)
            .order_by_desc(audit_entries::Column::Id);

        if let Some(action) = action_filter {
            query = query.filter(audit_entries::Column::Action.eq(action));
        }

        if let Some(actor) = actor_filter {
            query = query.filter(audit_entries::Column::ActorName.eq(actor));
        }

        let paginator = query.paginate(&self.conn, page_size);
        let total_pages = paginator.num_pages().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total_pages))
    }
}
