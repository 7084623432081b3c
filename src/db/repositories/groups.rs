use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};

use crate::entities::{device_groups, devices, prelude::*, users};

pub struct GroupRepository {
    conn: DatabaseConnection,
}

impl GroupRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<device_groups::Model>> {
        DeviceGroups::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query device group")
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<device_groups::Model>> {
        DeviceGroups::find()
            .filter(device_groups::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query device group")
    }

    pub async fn list(&self) -> Result<Vec<device_groups::Model>> {
        DeviceGroups::find()
            .all(&self.conn)
            .await
            .context("Failed to list device groups")
    }

    pub async fn create(&self, name: String, description: String) -> Result<device_groups::Model> {
        device_groups::ActiveModel {
            name: Set(name),
            description: Set(description),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert device group")
    }

    pub async fn update(&self, id: i32, name: String, description: String) -> Result<bool> {
        let Some(model) = DeviceGroups::find_by_id(id).one(&self.conn).await? else {
            return Ok(false);
        };

        let mut active: device_groups::ActiveModel = model.into();
        active.name = Set(name);
        active.description = Set(description);
        active
            .update(&self.conn)
            .await
            .context("Failed to update device group")?;

        Ok(true)
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = DeviceGroups::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete device group")?;

        Ok(result.rows_affected > 0)
    }

    /// Devices still assigned to the group. A non-zero count blocks deletion.
    pub async fn device_count(&self, id: i32) -> Result<u64> {
        let n = Devices::find()
            .filter(devices::Column::GroupId.eq(id))
            .count(&self.conn)
            .await?;
        Ok(n)
    }

    /// Admins still scoped to the group. A non-zero count blocks deletion.
    pub async fn admin_count(&self, id: i32) -> Result<u64> {
        let n = Users::find()
            .filter(users::Column::ManagedGroupId.eq(id))
            .count(&self.conn)
            .await?;
        Ok(n)
    }
}
