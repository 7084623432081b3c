pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod locks;
pub mod policy;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod totp;
pub mod vault;

pub use config::Config;
pub use domain::{Actor, EngineError, Role};
pub use state::Engine;
