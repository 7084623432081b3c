use sea_orm::entity::prelude::*;
use serde::Serialize;

/// Append-only audit ledger row. Nothing in the engine updates or
/// deletes these.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "audit_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub actor_name: String,

    /// Action tag, e.g. APPROVE_REQUEST or VIEW_PASSWORD.
    pub action: String,

    /// Human-readable target: device or user name, group name, "vault".
    pub target: String,

    /// JSON object with contextual fields (status_before, reason, ...).
    pub details: Option<String>,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
