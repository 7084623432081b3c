use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::locks::DeviceLocks;
use crate::policy::AccessPolicy;
use crate::services::{
    AuditLedger, DeviceService, GroupService, MfaService, RequestService, UserService,
    VaultService,
};
use crate::vault::{CredentialStore, VaultKeyring};

/// One fully wired engine. The embedding layer (an RPC server, a CLI, a
/// test harness) constructs it once and calls the services through the
/// public fields, passing the authenticated `Actor` into every operation.
#[derive(Clone)]
pub struct Engine {
    pub config: Config,

    pub store: Store,

    pub keyring: Arc<VaultKeyring>,

    pub audit: Arc<AuditLedger>,

    pub users: Arc<UserService>,

    pub mfa: Arc<MfaService>,

    pub groups: Arc<GroupService>,

    pub vault: Arc<VaultService>,

    pub devices: Arc<DeviceService>,

    pub requests: Arc<RequestService>,
}

impl Engine {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let keyring = Arc::new(VaultKeyring::new(store.clone(), config.security.clone()));
        let policy = Arc::new(AccessPolicy::new(keyring.clone()));
        let credentials = Arc::new(CredentialStore::new(store.clone(), keyring.clone()));
        let locks = Arc::new(DeviceLocks::new());

        let audit = Arc::new(AuditLedger::new(store.clone()));

        let users = Arc::new(UserService::new(
            store.clone(),
            audit.clone(),
            config.security.clone(),
        ));

        let mfa = Arc::new(MfaService::new(
            store.clone(),
            audit.clone(),
            config.security.totp_issuer.clone(),
        ));

        let groups = Arc::new(GroupService::new(store.clone(), audit.clone()));

        let vault = Arc::new(VaultService::new(
            keyring.clone(),
            audit.clone(),
            config.security.min_password_length,
        ));

        let devices = Arc::new(DeviceService::new(
            store.clone(),
            credentials.clone(),
            policy.clone(),
            audit.clone(),
            locks.clone(),
        ));

        let requests = Arc::new(RequestService::new(
            store.clone(),
            credentials,
            policy,
            mfa.clone(),
            audit.clone(),
            locks,
        ));

        Ok(Self {
            config,
            store,
            keyring,
            audit,
            users,
            mfa,
            groups,
            vault,
            devices,
            requests,
        })
    }
}
