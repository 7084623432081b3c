use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::domain::DeviceStatus;
use crate::entities::{access_requests, credentials, devices, prelude::*};

use super::audit::AuditRecord;

#[derive(Debug, Clone)]
pub struct Device {
    pub id: i32,
    pub name: String,
    pub ip: String,
    pub protocol: String,
    pub status: DeviceStatus,
    pub group_id: i32,
    pub created_by_id: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<devices::Model> for Device {
    type Error = anyhow::Error;

    fn try_from(model: devices::Model) -> Result<Self> {
        Ok(Self {
            id: model.id,
            name: model.name,
            ip: model.ip,
            protocol: model.protocol,
            status: model.status.parse()?,
            group_id: model.group_id,
            created_by_id: model.created_by_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewDevice {
    pub name: String,
    pub ip: String,
    pub protocol: String,
    pub group_id: i32,
    pub created_by_id: i32,
}

pub struct DeviceRepository {
    conn: DatabaseConnection,
}

impl DeviceRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<Device>> {
        let model = Devices::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query device")?;

        model.map(Device::try_from).transpose()
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Device>> {
        let model = Devices::find()
            .filter(devices::Column::Name.eq(name))
            .one(&self.conn)
            .await
            .context("Failed to query device")?;

        model.map(Device::try_from).transpose()
    }

    pub async fn list(&self, group_filter: Option<i32>) -> Result<Vec<Device>> {
        let mut query = Devices::find().order_by_asc(devices::Column::Id);

        if let Some(group_id) = group_filter {
            query = query.filter(devices::Column::GroupId.eq(group_id));
        }

        let models = query.all(&self.conn).await.context("Failed to list devices")?;
        models.into_iter().map(Device::try_from).collect()
    }

    /// Insert a device, its sealed credential when one was supplied, and
    /// the audit entry for the creation. The rows commit atomically.
    pub async fn create_commit(
        &self,
        new: NewDevice,
        blob: Option<Vec<u8>>,
        audit: AuditRecord,
    ) -> Result<Device> {
        let txn = self.conn.begin().await?;
        let now = chrono::Utc::now().to_rfc3339();

        let model = devices::ActiveModel {
            name: Set(new.name),
            ip: Set(new.ip),
            protocol: Set(new.protocol),
            status: Set(DeviceStatus::Safe.as_str().to_string()),
            group_id: Set(new.group_id),
            created_by_id: Set(new.created_by_id),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert device")?;

        if let Some(blob) = blob {
            credentials::ActiveModel {
                device_id: Set(model.id),
                blob: Set(blob),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await
            .context("Failed to insert credential")?;
        }

        AuditEntries::insert(audit.into_active_model())
            .exec(&txn)
            .await
            .context("Failed to append audit entry")?;

        txn.commit().await?;
        Device::try_from(model)
    }

    /// Move a device back to SAFE, overwrite its credential and close the
    /// active request if one exists. The status update is guarded on the
    /// expected current state; returns `false` when the device moved
    /// underneath the caller and nothing was written.
    pub async fn reset_commit(
        &self,
        device_id: i32,
        from: DeviceStatus,
        blob: Vec<u8>,
        complete_request_id: Option<i32>,
        audit: AuditRecord,
    ) -> Result<bool> {
        let txn = self.conn.begin().await?;
        let now = chrono::Utc::now().to_rfc3339();

        let updated = Devices::update_many()
            .col_expr(
                devices::Column::Status,
                Expr::value(DeviceStatus::Safe.as_str()),
            )
            .col_expr(devices::Column::UpdatedAt, Expr::value(now.clone()))
            .filter(devices::Column::Id.eq(device_id))
            .filter(devices::Column::Status.eq(from.as_str()))
            .exec(&txn)
            .await
            .context("Failed to update device status")?;

        if updated.rows_affected == 0 {
            return Ok(false);
        }

        Credentials::insert(credentials::ActiveModel {
            device_id: Set(device_id),
            blob: Set(blob),
            updated_at: Set(now.clone()),
        })
        .on_conflict(
            OnConflict::column(credentials::Column::DeviceId)
                .update_columns([credentials::Column::Blob, credentials::Column::UpdatedAt])
                .to_owned(),
        )
        .exec(&txn)
        .await
        .context("Failed to overwrite credential")?;

        if let Some(request_id) = complete_request_id {
            AccessRequests::update_many()
                .col_expr(
                    access_requests::Column::Status,
                    Expr::value(crate::domain::RequestStatus::Completed.as_str()),
                )
                .col_expr(access_requests::Column::UpdatedAt, Expr::value(now))
                .filter(access_requests::Column::Id.eq(request_id))
                .exec(&txn)
                .await
                .context("Failed to close active request")?;
        }

        AuditEntries::insert(audit.into_active_model())
            .exec(&txn)
            .await
            .context("Failed to append audit entry")?;

        txn.commit().await?;
        Ok(true)
    }
}
