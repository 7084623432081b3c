pub use super::access_requests::Entity as AccessRequests;
pub use super::audit_entries::Entity as AuditEntries;
pub use super::credentials::Entity as Credentials;
pub use super::device_groups::Entity as DeviceGroups;
pub use super::devices::Entity as Devices;
pub use super::users::Entity as Users;
pub use super::vault_meta::Entity as VaultMeta;
