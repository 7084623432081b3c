pub mod cipher;
pub mod credentials;
pub mod keyring;

pub use credentials::CredentialStore;
pub use keyring::{VaultKeyring, VaultStatus};
