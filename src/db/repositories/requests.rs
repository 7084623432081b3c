use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::domain::{DeviceStatus, LeaseDuration, RequestStatus};
use crate::entities::{access_requests, devices, prelude::*};

use super::audit::AuditRecord;

#[derive(Debug, Clone)]
pub struct AccessRequest {
    pub id: i32,
    pub device_id: i32,
    pub user_id: i32,
    pub reason: String,
    pub duration: LeaseDuration,
    pub status: RequestStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<access_requests::Model> for AccessRequest {
    type Error = anyhow::Error;

    fn try_from(model: access_requests::Model) -> Result<Self> {
        Ok(Self {
            id: model.id,
            device_id: model.device_id,
            user_id: model.user_id,
            reason: model.reason,
            duration: model.duration.parse()?,
            status: model.status.parse()?,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub device_id: i32,
    pub user_id: i32,
    pub reason: String,
    pub duration: LeaseDuration,
}

pub struct RequestRepository {
    conn: DatabaseConnection,
}

impl RequestRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<AccessRequest>> {
        let model = AccessRequests::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query access request")?;

        model.map(AccessRequest::try_from).transpose()
    }

    /// The PENDING or APPROVED request currently attached to a device.
    /// The workflow allows at most one.
    pub async fn active_for_device(&self, device_id: i32) -> Result<Option<AccessRequest>> {
        let model = AccessRequests::find()
            .filter(access_requests::Column::DeviceId.eq(device_id))
            .filter(
                access_requests::Column::Status.is_in([
                    RequestStatus::Pending.as_str(),
                    RequestStatus::Approved.as_str(),
                ]),
            )
            .one(&self.conn)
            .await
            .context("Failed to query active request")?;

        model.map(AccessRequest::try_from).transpose()
    }

    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<AccessRequest>> {
        let models = AccessRequests::find()
            .filter(access_requests::Column::UserId.eq(user_id))
            .order_by_desc(access_requests::Column::CreatedAt)
            .order_by_desc(access_requests::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list access requests")?;

        models.into_iter().map(AccessRequest::try_from).collect()
    }

    /// Pending requests, optionally narrowed to devices in one group for
    /// scoped approvers.
    pub async fn list_pending(&self, group_filter: Option<i32>) -> Result<Vec<AccessRequest>> {
        let mut query = AccessRequests::find()
            .filter(access_requests::Column::Status.eq(RequestStatus::Pending.as_str()))
            .order_by_asc(access_requests::Column::CreatedAt)
            .order_by_asc(access_requests::Column::Id);

        if let Some(group_id) = group_filter {
            query = query
                .inner_join(Devices)
                .filter(devices::Column::GroupId.eq(group_id));
        }

        let models = query
            .all(&self.conn)
            .await
            .context("Failed to list pending requests")?;

        models.into_iter().map(AccessRequest::try_from).collect()
    }

    /// Open a request and move its device to PENDING_APPROVAL in one
    /// transaction. The device update is guarded on SAFE; returns `None`
    /// when the device was taken first.
    pub async fn create_commit(
        &self,
        new: NewRequest,
        audit: AuditRecord,
    ) -> Result<Option<AccessRequest>> {
        let txn = self.conn.begin().await?;
        let now = chrono::Utc::now().to_rfc3339();

        let updated = Devices::update_many()
            .col_expr(
                devices::Column::Status,
                Expr::value(DeviceStatus::PendingApproval.as_str()),
            )
            .col_expr(devices::Column::UpdatedAt, Expr::value(now.clone()))
            .filter(devices::Column::Id.eq(new.device_id))
            .filter(devices::Column::Status.eq(DeviceStatus::Safe.as_str()))
            .exec(&txn)
            .await
            .context("Failed to update device status")?;

        if updated.rows_affected == 0 {
            return Ok(None);
        }

        let model = access_requests::ActiveModel {
            device_id: Set(new.device_id),
            user_id: Set(new.user_id),
            reason: Set(new.reason),
            duration: Set(new.duration.as_str().to_string()),
            status: Set(RequestStatus::Pending.as_str().to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert access request")?;

        AuditEntries::insert(audit.into_active_model())
            .exec(&txn)
            .await
            .context("Failed to append audit entry")?;

        txn.commit().await?;
        AccessRequest::try_from(model).map(Some)
    }

    pub async fn approve_commit(
        &self,
        request_id: i32,
        device_id: i32,
        audit: AuditRecord,
    ) -> Result<bool> {
        self.decide_commit(
            request_id,
            RequestStatus::Approved,
            device_id,
            DeviceStatus::PendingApproval,
            DeviceStatus::Approved,
            audit,
        )
        .await
    }

    pub async fn reject_commit(
        &self,
        request_id: i32,
        device_id: i32,
        audit: AuditRecord,
    ) -> Result<bool> {
        self.decide_commit(
            request_id,
            RequestStatus::Rejected,
            device_id,
            DeviceStatus::PendingApproval,
            DeviceStatus::Safe,
            audit,
        )
        .await
    }

    pub async fn complete_commit(
        &self,
        request_id: i32,
        device_id: i32,
        audit: AuditRecord,
    ) -> Result<bool> {
        self.decide_commit(
            request_id,
            RequestStatus::Completed,
            device_id,
            DeviceStatus::InUse,
            DeviceStatus::PendingReset,
            audit,
        )
        .await
    }

    /// Record a credential read. On the first read of an approved grant the
    /// device also moves APPROVED -> IN_USE; later reads only audit.
    pub async fn mark_revealed(
        &self,
        device_id: i32,
        transition: bool,
        audit: AuditRecord,
    ) -> Result<bool> {
        let txn = self.conn.begin().await?;

        if transition {
            let updated = Devices::update_many()
                .col_expr(
                    devices::Column::Status,
                    Expr::value(DeviceStatus::InUse.as_str()),
                )
                .col_expr(
                    devices::Column::UpdatedAt,
                    Expr::value(chrono::Utc::now().to_rfc3339()),
                )
                .filter(devices::Column::Id.eq(device_id))
                .filter(devices::Column::Status.eq(DeviceStatus::Approved.as_str()))
                .exec(&txn)
                .await
                .context("Failed to update device status")?;

            if updated.rows_affected == 0 {
                return Ok(false);
            }
        }

        AuditEntries::insert(audit.into_active_model())
            .exec(&txn)
            .await
            .context("Failed to append audit entry")?;

        txn.commit().await?;
        Ok(true)
    }

    /// Shared shape of approve, reject and complete: one guarded device
    /// transition plus the request status flip, committed together.
    async fn decide_commit(
        &self,
        request_id: i32,
        to_request: RequestStatus,
        device_id: i32,
        from_device: DeviceStatus,
        to_device: DeviceStatus,
        audit: AuditRecord,
    ) -> Result<bool> {
        let txn = self.conn.begin().await?;
        let now = chrono::Utc::now().to_rfc3339();

        let updated = Devices::update_many()
            .col_expr(devices::Column::Status, Expr::value(to_device.as_str()))
            .col_expr(devices::Column::UpdatedAt, Expr::value(now.clone()))
            .filter(devices::Column::Id.eq(device_id))
            .filter(devices::Column::Status.eq(from_device.as_str()))
            .exec(&txn)
            .await
            .context("Failed to update device status")?;

        if updated.rows_affected == 0 {
            return Ok(false);
        }

        let updated = AccessRequests::update_many()
            .col_expr(
                access_requests::Column::Status,
                Expr::value(to_request.as_str()),
            )
            .col_expr(access_requests::Column::UpdatedAt, Expr::value(now))
            .filter(access_requests::Column::Id.eq(request_id))
            .filter(
                access_requests::Column::Status.is_in([
                    RequestStatus::Pending.as_str(),
                    RequestStatus::Approved.as_str(),
                ]),
            )
            .exec(&txn)
            .await
            .context("Failed to update request status")?;

        if updated.rows_affected == 0 {
            return Ok(false);
        }

        AuditEntries::insert(audit.into_active_model())
            .exec(&txn)
            .await
            .context("Failed to append audit entry")?;

        txn.commit().await?;
        Ok(true)
    }
}
