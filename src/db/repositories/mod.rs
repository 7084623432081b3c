pub mod audit;
pub mod credentials;
pub mod devices;
pub mod groups;
pub mod requests;
pub mod users;
pub mod vault;
