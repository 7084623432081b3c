pub mod audit;
pub use audit::AuditLedger;

pub mod users;
pub use users::UserService;

pub mod mfa;
pub use mfa::{MfaBinding, MfaService};

pub mod groups;
pub use groups::GroupService;

pub mod vault;
pub use vault::VaultService;

pub mod devices;
pub use devices::{DeviceService, NewDeviceInput};

pub mod requests;
pub use requests::RequestService;
