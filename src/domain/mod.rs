//! Core domain vocabulary: roles, lifecycle state machines, the audit
//! action set and the unified error taxonomy.
//!
//! Statuses are tagged enums with explicit transition tables rather than
//! string comparisons; repositories convert to and from the TEXT columns
//! at the storage boundary.

pub mod actor;
pub mod audit;
pub mod device;
pub mod error;
pub mod request;
pub mod role;

pub use actor::Actor;
pub use audit::AuditAction;
pub use device::{DeviceEvent, DeviceStatus};
pub use error::EngineError;
pub use request::{LeaseDuration, RequestStatus};
pub use role::Role;
