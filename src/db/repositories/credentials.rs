use anyhow::{Context, Result};
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::entities::prelude::*;

/// Read side of the credential table. Writes happen inside the device
/// workflow transactions so a blob can never outlive a failed state change.
pub struct CredentialRepository {
    conn: DatabaseConnection,
}

impl CredentialRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_blob(&self, device_id: i32) -> Result<Option<Vec<u8>>> {
        let model = Credentials::find_by_id(device_id)
            .one(&self.conn)
            .await
            .context("Failed to query credential")?;

        Ok(model.map(|m| m.blob))
    }
}
