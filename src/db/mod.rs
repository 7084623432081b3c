use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::domain::{DeviceStatus, Role};

pub mod migrator;
pub mod repositories;

pub use crate::entities::audit_entries::Model as AuditEntry;
pub use crate::entities::device_groups::Model as DeviceGroup;
pub use crate::entities::vault_meta::Model as VaultRecord;
pub use repositories::audit::AuditRecord;
pub use repositories::devices::{Device, NewDevice};
pub use repositories::requests::{AccessRequest, NewRequest};
pub use repositories::users::{NewUser, User, UserUpdate};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.starts_with(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> repositories::users::UserRepository {
        repositories::users::UserRepository::new(self.conn.clone())
    }

    fn group_repo(&self) -> repositories::groups::GroupRepository {
        repositories::groups::GroupRepository::new(self.conn.clone())
    }

    fn device_repo(&self) -> repositories::devices::DeviceRepository {
        repositories::devices::DeviceRepository::new(self.conn.clone())
    }

    fn request_repo(&self) -> repositories::requests::RequestRepository {
        repositories::requests::RequestRepository::new(self.conn.clone())
    }

    fn credential_repo(&self) -> repositories::credentials::CredentialRepository {
        repositories::credentials::CredentialRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    fn vault_repo(&self) -> repositories::vault::VaultRepository {
        repositories::vault::VaultRepository::new(self.conn.clone())
    }

    // Users

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.user_repo().list().await
    }

    pub async fn count_users_with_role(&self, role: Role) -> Result<u64> {
        self.user_repo().count_with_role(role).await
    }

    pub async fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        self.user_repo().verify_password(username, password).await
    }

    pub async fn create_user(
        &self,
        new: NewUser,
        security: Option<&SecurityConfig>,
    ) -> Result<User> {
        self.user_repo().create(new, security).await
    }

    pub async fn update_user_profile(&self, id: i32, update: UserUpdate) -> Result<bool> {
        self.user_repo().update_profile(id, update).await
    }

    pub async fn update_user_password(
        &self,
        id: i32,
        new_password: String,
        security: Option<&SecurityConfig>,
    ) -> Result<bool> {
        self.user_repo()
            .update_password(id, new_password, security)
            .await
    }

    pub async fn user_totp_secret(&self, id: i32) -> Result<Option<Vec<u8>>> {
        self.user_repo().totp_secret(id).await
    }

    pub async fn set_user_totp_secret(&self, id: i32, secret: Option<Vec<u8>>) -> Result<bool> {
        self.user_repo().set_totp_secret(id, secret).await
    }

    pub async fn delete_user(&self, id: i32) -> Result<bool> {
        self.user_repo().delete(id).await
    }

    // Device groups

    pub async fn get_group(&self, id: i32) -> Result<Option<DeviceGroup>> {
        self.group_repo().get(id).await
    }

    pub async fn get_group_by_name(&self, name: &str) -> Result<Option<DeviceGroup>> {
        self.group_repo().get_by_name(name).await
    }

    pub async fn list_groups(&self) -> Result<Vec<DeviceGroup>> {
        self.group_repo().list().await
    }

    pub async fn create_group(&self, name: String, description: String) -> Result<DeviceGroup> {
        self.group_repo().create(name, description).await
    }

    pub async fn update_group(&self, id: i32, name: String, description: String) -> Result<bool> {
        self.group_repo().update(id, name, description).await
    }

    pub async fn delete_group(&self, id: i32) -> Result<bool> {
        self.group_repo().delete(id).await
    }

    pub async fn group_device_count(&self, id: i32) -> Result<u64> {
        self.group_repo().device_count(id).await
    }

    pub async fn group_admin_count(&self, id: i32) -> Result<u64> {
        self.group_repo().admin_count(id).await
    }

    // Devices

    pub async fn get_device(&self, id: i32) -> Result<Option<Device>> {
        self.device_repo().get(id).await
    }

    pub async fn get_device_by_name(&self, name: &str) -> Result<Option<Device>> {
        self.device_repo().get_by_name(name).await
    }

    pub async fn list_devices(&self, group_filter: Option<i32>) -> Result<Vec<Device>> {
        self.device_repo().list(group_filter).await
    }

    pub async fn create_device_commit(
        &self,
        new: NewDevice,
        blob: Option<Vec<u8>>,
        audit: AuditRecord,
    ) -> Result<Device> {
        self.device_repo().create_commit(new, blob, audit).await
    }

    pub async fn reset_device_commit(
        &self,
        device_id: i32,
        from: DeviceStatus,
        blob: Vec<u8>,
        complete_request_id: Option<i32>,
        audit: AuditRecord,
    ) -> Result<bool> {
        self.device_repo()
            .reset_commit(device_id, from, blob, complete_request_id, audit)
            .await
    }

    // Access requests

    pub async fn get_request(&self, id: i32) -> Result<Option<AccessRequest>> {
        self.request_repo().get(id).await
    }

    pub async fn active_request_for_device(&self, device_id: i32) -> Result<Option<AccessRequest>> {
        self.request_repo().active_for_device(device_id).await
    }

    pub async fn list_requests_for_user(&self, user_id: i32) -> Result<Vec<AccessRequest>> {
        self.request_repo().list_for_user(user_id).await
    }

    pub async fn list_pending_requests(
        &self,
        group_filter: Option<i32>,
    ) -> Result<Vec<AccessRequest>> {
        self.request_repo().list_pending(group_filter).await
    }

    pub async fn create_request_commit(
        &self,
        new: NewRequest,
        audit: AuditRecord,
    ) -> Result<Option<AccessRequest>> {
        self.request_repo().create_commit(new, audit).await
    }

    pub async fn approve_request_commit(
        &self,
        request_id: i32,
        device_id: i32,
        audit: AuditRecord,
    ) -> Result<bool> {
        self.request_repo()
            .approve_commit(request_id, device_id, audit)
            .await
    }

    pub async fn reject_request_commit(
        &self,
        request_id: i32,
        device_id: i32,
        audit: AuditRecord,
    ) -> Result<bool> {
        self.request_repo()
            .reject_commit(request_id, device_id, audit)
            .await
    }

    pub async fn complete_request_commit(
        &self,
        request_id: i32,
        device_id: i32,
        audit: AuditRecord,
    ) -> Result<bool> {
        self.request_repo()
            .complete_commit(request_id, device_id, audit)
            .await
    }

    pub async fn mark_credential_revealed(
        &self,
        device_id: i32,
        transition: bool,
        audit: AuditRecord,
    ) -> Result<bool> {
        self.request_repo()
            .mark_revealed(device_id, transition, audit)
            .await
    }

    // Credentials

    pub async fn get_credential_blob(&self, device_id: i32) -> Result<Option<Vec<u8>>> {
        self.credential_repo().get_blob(device_id).await
    }

    // Audit ledger

    pub async fn append_audit(&self, record: AuditRecord) -> Result<()> {
        self.audit_repo().append(record).await
    }

    pub async fn list_audit(
        &self,
        page: u64,
        page_size: u64,
        action_filter: Option<String>,
        actor_filter: Option<String>,
    ) -> Result<(Vec<AuditEntry>, u64)> {
        self.audit_repo()
            .list(page, page_size, action_filter, actor_filter)
            .await
    }

    // Vault metadata

    pub async fn get_vault_record(&self) -> Result<Option<VaultRecord>> {
        self.vault_repo().get_meta().await
    }

    pub async fn insert_vault_record(
        &self,
        kdf_salt: Vec<u8>,
        wrapped_key: Vec<u8>,
    ) -> Result<bool> {
        self.vault_repo().insert_meta(kdf_salt, wrapped_key).await
    }
}
