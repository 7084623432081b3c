use anyhow::{Context, Result};
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};

use crate::entities::{prelude::*, vault_meta};

/// Row id of the singleton vault record.
const VAULT_ROW_ID: i32 = 1;

pub struct VaultRepository {
    conn: DatabaseConnection,
}

impl VaultRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_meta(&self) -> Result<Option<vault_meta::Model>> {
        VaultMeta::find_by_id(VAULT_ROW_ID)
            .one(&self.conn)
            .await
            .context("Failed to query vault metadata")
    }

    /// First-writer-wins insert of the vault record. Returns `false` when a
    /// record already exists, leaving it untouched.
    pub async fn insert_meta(&self, kdf_salt: Vec<u8>, wrapped_key: Vec<u8>) -> Result<bool> {
        let rows = VaultMeta::insert(vault_meta::ActiveModel {
            id: Set(VAULT_ROW_ID),
            kdf_salt: Set(kdf_salt),
            wrapped_key: Set(wrapped_key),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
        })
        .on_conflict(
            OnConflict::column(vault_meta::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.conn)
        .await
        .context("Failed to insert vault metadata")?;

        Ok(rows > 0)
    }
}
