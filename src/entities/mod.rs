pub mod prelude;

pub mod access_requests;
pub mod audit_entries;
pub mod credentials;
pub mod device_groups;
pub mod devices;
pub mod users;
pub mod vault_meta;
