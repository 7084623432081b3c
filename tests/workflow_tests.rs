//! End-to-end tests for the request brokerage workflow: request,
//! approve, reveal, complete and reset against a live engine.

use chrono::{Duration, Utc};

use keywarden::config::Config;
use keywarden::db::NewUser;
use keywarden::domain::{
    Actor, DeviceStatus, EngineError, LeaseDuration, RequestStatus, Role,
};
use keywarden::services::NewDeviceInput;
use keywarden::{Engine, totp};

async fn spawn_engine() -> Engine {
    let db_path =
        std::env::temp_dir().join(format!("keywarden-workflow-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    // Keep key derivation at the cheap end so vault setup stays fast.
    config.security.argon2_memory_cost_kib = 8;
    config.security.argon2_time_cost = 1;

    Engine::new(config).await.expect("failed to build engine")
}

struct Fixture {
    engine: Engine,
    root: Actor,
    admin: Actor,
    admin_secret: Vec<u8>,
    alice: Actor,
    group_id: i32,
    device_id: i32,
}

/// Bootstrap admin login, vault setup, one group with a scoped
/// MFA-activated approver, one requesting user and one device sealed
/// with an initial credential.
async fn provisioned() -> Fixture {
    let engine = spawn_engine().await;

    let root = engine
        .users
        .authenticate("admin", "changeme", None)
        .await
        .expect("bootstrap admin login");

    engine
        .vault
        .setup(&root, "vault-passphrase")
        .await
        .expect("vault setup");

    let group = engine
        .groups
        .create(&root, "core-network", "Core routers and switches")
        .await
        .expect("create group");

    let carol = engine
        .users
        .create_user(
            &root,
            NewUser {
                username: "carol".to_string(),
                password: "carol-pass-1".to_string(),
                role: Role::Admin,
                real_name: "Carol".to_string(),
                contact_info: "carol@example.com".to_string(),
                managed_group_id: Some(group.id),
            },
        )
        .await
        .expect("create approver");

    let admin = engine
        .users
        .actor_for_user(carol.id)
        .await
        .expect("approver actor");
    let binding = engine.mfa.bind(&admin).await.expect("mfa bind");
    let code = totp::code_at(&binding.secret, Utc::now()).expect("totp code");
    engine
        .mfa
        .activate(&admin, &binding.secret, &code)
        .await
        .expect("mfa activate");
    let admin = engine
        .users
        .actor_for_user(carol.id)
        .await
        .expect("refresh approver actor");

    let alice_row = engine
        .users
        .create_user(
            &root,
            NewUser {
                username: "alice".to_string(),
                password: "alice-pass-1".to_string(),
                role: Role::User,
                real_name: "Alice".to_string(),
                contact_info: String::new(),
                managed_group_id: None,
            },
        )
        .await
        .expect("create user");
    let alice = engine
        .users
        .actor_for_user(alice_row.id)
        .await
        .expect("user actor");

    let device = engine
        .devices
        .create_device(
            &admin,
            NewDeviceInput {
                name: "edge-router-1".to_string(),
                ip: "10.0.0.1".to_string(),
                protocol: "SSH".to_string(),
                group_id: group.id,
                initial_secret: Some("root:hunter2".to_string()),
            },
        )
        .await
        .expect("create device");

    Fixture {
        engine,
        root,
        admin,
        admin_secret: binding.secret,
        alice,
        group_id: group.id,
        device_id: device.id,
    }
}

fn code_now(secret: &[u8]) -> String {
    totp::code_at(secret, Utc::now()).expect("totp code")
}

/// A six-digit code guaranteed to fail: distinct from every code inside
/// the accepted skew window, padded by one extra step on both sides so a
/// step boundary crossed mid-test cannot turn it valid.
fn wrong_code(secret: &[u8]) -> String {
    let now = Utc::now();
    let valid: Vec<String> = [-60i64, -30, 0, 30, 60]
        .iter()
        .map(|offset| {
            totp::code_at(secret, now + Duration::seconds(*offset)).expect("totp code")
        })
        .collect();

    let mut n = 0u32;
    loop {
        let candidate = format!("{n:06}");
        if !valid.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

async fn device_status(engine: &Engine, device_id: i32) -> DeviceStatus {
    engine
        .store
        .get_device(device_id)
        .await
        .expect("query device")
        .expect("device exists")
        .status
}

async fn request_status(engine: &Engine, request_id: i32) -> RequestStatus {
    engine
        .store
        .get_request(request_id)
        .await
        .expect("query request")
        .expect("request exists")
        .status
}

#[tokio::test]
async fn migrations_seed_the_bootstrap_account() {
    let db_path =
        std::env::temp_dir().join(format!("keywarden-bootstrap-test-{}.db", uuid::Uuid::new_v4()));
    let store = keywarden::db::Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("open store");
    store.ping().await.expect("ping");

    let admin = store
        .get_user_by_username("admin")
        .await
        .expect("query bootstrap account")
        .expect("bootstrap account exists");
    assert_eq!(admin.role, Role::SuperAdmin);
    assert!(!admin.mfa_bound);
}

#[tokio::test]
async fn full_lifecycle_from_request_to_reset() {
    let fx = provisioned().await;

    let request = fx
        .engine
        .requests
        .create(
            &fx.alice,
            fx.device_id,
            "quarterly patch window",
            LeaseDuration::TwoHours,
        )
        .await
        .expect("create request");
    assert_eq!(request.status, RequestStatus::Pending);
    assert_eq!(device_status(&fx.engine, fx.device_id).await, DeviceStatus::PendingApproval);
    assert_eq!(request.duration, LeaseDuration::TwoHours);

    let pending = fx
        .engine
        .requests
        .list_pending_requests(&fx.admin)
        .await
        .expect("pending queue");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, request.id);

    let mine = fx
        .engine
        .requests
        .list_my_requests(&fx.alice)
        .await
        .expect("own requests");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].reason, "quarterly patch window");

    fx.engine
        .requests
        .approve(&fx.admin, request.id, &code_now(&fx.admin_secret))
        .await
        .expect("approve");
    assert_eq!(request_status(&fx.engine, request.id).await, RequestStatus::Approved);
    assert_eq!(device_status(&fx.engine, fx.device_id).await, DeviceStatus::Approved);

    // First reveal flips the device to IN_USE; repeats are plain reads.
    let secret = fx
        .engine
        .requests
        .reveal(&fx.alice, request.id)
        .await
        .expect("first reveal");
    assert_eq!(secret, "root:hunter2");
    assert_eq!(device_status(&fx.engine, fx.device_id).await, DeviceStatus::InUse);

    let again = fx
        .engine
        .requests
        .reveal(&fx.alice, request.id)
        .await
        .expect("repeat reveal");
    assert_eq!(again, secret);
    assert_eq!(device_status(&fx.engine, fx.device_id).await, DeviceStatus::InUse);

    fx.engine
        .requests
        .complete(&fx.alice, request.id)
        .await
        .expect("complete");
    assert_eq!(request_status(&fx.engine, request.id).await, RequestStatus::Completed);
    assert_eq!(device_status(&fx.engine, fx.device_id).await, DeviceStatus::PendingReset);

    fx.engine
        .devices
        .reset_device(&fx.admin, fx.device_id, "root:rotated")
        .await
        .expect("reset");
    assert_eq!(device_status(&fx.engine, fx.device_id).await, DeviceStatus::Safe);

    // The rotated credential is what the next grant reveals.
    let request = fx
        .engine
        .requests
        .create(&fx.alice, fx.device_id, "verify rotation", LeaseDuration::OneHour)
        .await
        .expect("second request");
    fx.engine
        .requests
        .approve(&fx.admin, request.id, &code_now(&fx.admin_secret))
        .await
        .expect("second approve");
    let rotated = fx
        .engine
        .requests
        .reveal(&fx.alice, request.id)
        .await
        .expect("reveal rotation");
    assert_eq!(rotated, "root:rotated");

    // Request history pins the account: alice can no longer be deleted.
    let err = fx
        .engine
        .users
        .delete_user(&fx.root, fx.alice.user_id)
        .await
        .expect_err("delete with history");
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn busy_device_refuses_second_request() {
    let fx = provisioned().await;

    fx.engine
        .requests
        .create(&fx.alice, fx.device_id, "first", LeaseDuration::OneHour)
        .await
        .expect("first request");

    let err = fx
        .engine
        .requests
        .create(&fx.alice, fx.device_id, "second", LeaseDuration::OneHour)
        .await
        .expect_err("second request must fail");
    assert!(matches!(err, EngineError::DeviceBusy));
}

#[tokio::test]
async fn concurrent_requests_have_a_single_winner() {
    let fx = provisioned().await;

    let mut handles = Vec::new();
    for reason in ["patch window", "cert renewal"] {
        let engine = fx.engine.clone();
        let alice = fx.alice.clone();
        let device_id = fx.device_id;
        handles.push(tokio::spawn(async move {
            engine
                .requests
                .create(&alice, device_id, reason, LeaseDuration::OneHour)
                .await
        }));
    }

    let mut won = 0;
    let mut busy = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => won += 1,
            Err(EngineError::DeviceBusy) => busy += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(won, 1);
    assert_eq!(busy, 1);
    assert_eq!(device_status(&fx.engine, fx.device_id).await, DeviceStatus::PendingApproval);
}

#[tokio::test]
async fn wrong_code_denies_approval_and_is_audited() {
    let fx = provisioned().await;

    let request = fx
        .engine
        .requests
        .create(&fx.alice, fx.device_id, "patching", LeaseDuration::OneHour)
        .await
        .expect("create request");

    let err = fx
        .engine
        .requests
        .approve(&fx.admin, request.id, &wrong_code(&fx.admin_secret))
        .await
        .expect_err("bad code must fail");
    assert!(matches!(err, EngineError::InvalidCode));

    // Nothing moved.
    assert_eq!(request_status(&fx.engine, request.id).await, RequestStatus::Pending);
    assert_eq!(device_status(&fx.engine, fx.device_id).await, DeviceStatus::PendingApproval);

    // The refused attempt still landed in the ledger.
    let (entries, _) = fx
        .engine
        .audit
        .list(&fx.root, 1, 50, Some("APPROVE_REQUEST".to_string()), None)
        .await
        .expect("audit list");
    let denied = entries
        .iter()
        .find(|e| e.details.as_deref().is_some_and(|d| d.contains("denied")))
        .expect("denied approve entry");
    assert!(denied.details.as_deref().unwrap().contains("INVALID_CODE"));
    assert_eq!(denied.actor_name, "carol");
}

#[tokio::test]
async fn unbound_approver_hears_mfa_required_not_invalid_code() {
    let fx = provisioned().await;

    let dave = fx
        .engine
        .users
        .create_user(
            &fx.root,
            NewUser {
                username: "dave".to_string(),
                password: "dave-pass-1".to_string(),
                role: Role::Admin,
                real_name: "Dave".to_string(),
                contact_info: String::new(),
                managed_group_id: Some(fx.group_id),
            },
        )
        .await
        .expect("second approver");
    let dave = fx
        .engine
        .users
        .actor_for_user(dave.id)
        .await
        .expect("dave actor");

    let request = fx
        .engine
        .requests
        .create(&fx.alice, fx.device_id, "patching", LeaseDuration::OneHour)
        .await
        .expect("create request");

    let err = fx
        .engine
        .requests
        .approve(&dave, request.id, "123456")
        .await
        .expect_err("unbound approver must fail");
    assert!(matches!(err, EngineError::MfaRequired));
}

#[tokio::test]
async fn rejection_releases_the_device() {
    let fx = provisioned().await;

    let request = fx
        .engine
        .requests
        .create(&fx.alice, fx.device_id, "patching", LeaseDuration::OneHour)
        .await
        .expect("create request");

    // No vault or TOTP needed: nothing credential-shaped is touched.
    fx.engine
        .requests
        .reject(&fx.admin, request.id)
        .await
        .expect("reject");

    assert_eq!(request_status(&fx.engine, request.id).await, RequestStatus::Rejected);
    assert_eq!(device_status(&fx.engine, fx.device_id).await, DeviceStatus::Safe);

    // The device is immediately requestable again.
    fx.engine
        .requests
        .create(&fx.alice, fx.device_id, "retry", LeaseDuration::OneHour)
        .await
        .expect("new request after rejection");
}

#[tokio::test]
async fn role_gates_on_request_and_reveal() {
    let fx = provisioned().await;

    // Admins do not file requests.
    let err = fx
        .engine
        .requests
        .create(&fx.admin, fx.device_id, "as admin", LeaseDuration::OneHour)
        .await
        .expect_err("admin request must fail");
    assert!(matches!(err, EngineError::Forbidden));

    let request = fx
        .engine
        .requests
        .create(&fx.alice, fx.device_id, "patching", LeaseDuration::OneHour)
        .await
        .expect("create request");
    fx.engine
        .requests
        .approve(&fx.admin, request.id, &code_now(&fx.admin_secret))
        .await
        .expect("approve");

    // Approvers cannot read the credential they granted.
    let err = fx
        .engine
        .requests
        .reveal(&fx.admin, request.id)
        .await
        .expect_err("admin reveal must fail");
    assert!(matches!(err, EngineError::Forbidden));

    // Another user cannot read someone else's grant.
    let bob = fx
        .engine
        .users
        .create_user(
            &fx.root,
            NewUser {
                username: "bob".to_string(),
                password: "bob-pass-12".to_string(),
                role: Role::User,
                real_name: "Bob".to_string(),
                contact_info: String::new(),
                managed_group_id: None,
            },
        )
        .await
        .expect("create bob");
    let bob = fx
        .engine
        .users
        .actor_for_user(bob.id)
        .await
        .expect("bob actor");

    let err = fx
        .engine
        .requests
        .reveal(&bob, request.id)
        .await
        .expect_err("non-owner reveal must fail");
    assert!(matches!(err, EngineError::NotOwner));

    // The owner still can.
    fx.engine
        .requests
        .reveal(&fx.alice, request.id)
        .await
        .expect("owner reveal");
}

#[tokio::test]
async fn admin_scope_stops_at_the_group_boundary() {
    let fx = provisioned().await;

    let other_group = fx
        .engine
        .groups
        .create(&fx.root, "lab", "Lab equipment")
        .await
        .expect("second group");

    let eve = fx
        .engine
        .users
        .create_user(
            &fx.root,
            NewUser {
                username: "eve".to_string(),
                password: "eve-pass-12".to_string(),
                role: Role::Admin,
                real_name: "Eve".to_string(),
                contact_info: String::new(),
                managed_group_id: Some(other_group.id),
            },
        )
        .await
        .expect("out-of-scope admin");
    let eve = fx
        .engine
        .users
        .actor_for_user(eve.id)
        .await
        .expect("eve actor");

    // Device creation outside the managed group.
    let err = fx
        .engine
        .devices
        .create_device(
            &eve,
            NewDeviceInput {
                name: "edge-router-2".to_string(),
                ip: "10.0.0.2".to_string(),
                protocol: "SSH".to_string(),
                group_id: fx.group_id,
                initial_secret: None,
            },
        )
        .await
        .expect_err("cross-group device creation must fail");
    assert!(matches!(err, EngineError::OutOfScope));

    // Approval outside the managed group.
    let request = fx
        .engine
        .requests
        .create(&fx.alice, fx.device_id, "patching", LeaseDuration::OneHour)
        .await
        .expect("create request");
    let err = fx
        .engine
        .requests
        .approve(&eve, request.id, "123456")
        .await
        .expect_err("cross-group approval must fail");
    assert!(matches!(err, EngineError::OutOfScope));

    // Scoped listings only show the admin's own inventory and queue;
    // users see the whole inventory so they can request access.
    let devices = fx.engine.devices.list_devices(&eve).await.expect("list");
    assert!(devices.is_empty());
    let devices = fx
        .engine
        .devices
        .list_devices(&fx.alice)
        .await
        .expect("list");
    assert_eq!(devices.len(), 1);
    let queue = fx
        .engine
        .requests
        .list_pending_requests(&eve)
        .await
        .expect("queue");
    assert!(queue.is_empty());
}

#[tokio::test]
async fn reset_is_refused_mid_approval() {
    let fx = provisioned().await;

    fx.engine
        .requests
        .create(&fx.alice, fx.device_id, "patching", LeaseDuration::OneHour)
        .await
        .expect("create request");

    let err = fx
        .engine
        .devices
        .reset_device(&fx.admin, fx.device_id, "root:sneaky")
        .await
        .expect_err("reset during approval must fail");
    assert!(matches!(err, EngineError::InvalidTransition { .. }));
    assert_eq!(device_status(&fx.engine, fx.device_id).await, DeviceStatus::PendingApproval);
}

#[tokio::test]
async fn device_without_initial_secret_reveals_nothing_until_reset() {
    let fx = provisioned().await;

    let bare = fx
        .engine
        .devices
        .create_device(
            &fx.admin,
            NewDeviceInput {
                name: "spare-switch".to_string(),
                ip: "10.0.0.9".to_string(),
                protocol: "SSH".to_string(),
                group_id: fx.group_id,
                initial_secret: None,
            },
        )
        .await
        .expect("bare device");

    // Provisioning pass: reset from SAFE seals the first credential.
    fx.engine
        .devices
        .reset_device(&fx.admin, bare.id, "switch:initial")
        .await
        .expect("provision credential");

    let request = fx
        .engine
        .requests
        .create(&fx.alice, bare.id, "commissioning", LeaseDuration::FourHours)
        .await
        .expect("request");
    fx.engine
        .requests
        .approve(&fx.admin, request.id, &code_now(&fx.admin_secret))
        .await
        .expect("approve");

    let secret = fx
        .engine
        .requests
        .reveal(&fx.alice, request.id)
        .await
        .expect("reveal");
    assert_eq!(secret, "switch:initial");
}

#[tokio::test]
async fn stepped_authentication_for_bound_accounts() {
    let fx = provisioned().await;

    let err = fx
        .engine
        .users
        .authenticate("carol", "wrong-password", None)
        .await
        .expect_err("wrong password");
    assert!(matches!(err, EngineError::InvalidCredentials));

    // Correct password, no code: the client is told to prompt for one.
    let err = fx
        .engine
        .users
        .authenticate("carol", "carol-pass-1", None)
        .await
        .expect_err("missing code");
    assert!(matches!(err, EngineError::MfaRequired));

    let err = fx
        .engine
        .users
        .authenticate("carol", "carol-pass-1", Some(&wrong_code(&fx.admin_secret)))
        .await
        .expect_err("wrong code");
    assert!(matches!(err, EngineError::InvalidCode));

    let actor = fx
        .engine
        .users
        .authenticate("carol", "carol-pass-1", Some(&code_now(&fx.admin_secret)))
        .await
        .expect("full login");
    assert_eq!(actor.username, "carol");
    assert!(actor.mfa_bound);

    // Unbound accounts log in with the password alone.
    let actor = fx
        .engine
        .users
        .authenticate("alice", "alice-pass-1", None)
        .await
        .expect("password-only login");
    assert!(!actor.mfa_bound);
}

#[tokio::test]
async fn group_deletion_blocked_while_referenced() {
    let fx = provisioned().await;

    // Referenced by a device and by carol.
    let err = fx
        .engine
        .groups
        .delete(&fx.root, fx.group_id)
        .await
        .expect_err("delete referenced group");
    assert!(matches!(err, EngineError::GroupInUse));

    let empty = fx
        .engine
        .groups
        .create(&fx.root, "decommissioned", "")
        .await
        .expect("empty group");
    fx.engine
        .groups
        .delete(&fx.root, empty.id)
        .await
        .expect("delete empty group");

    let names: Vec<String> = fx
        .engine
        .groups
        .list()
        .await
        .expect("list groups")
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert!(names.contains(&"core-network".to_string()));
    assert!(!names.contains(&"decommissioned".to_string()));
}

#[tokio::test]
async fn last_super_admin_cannot_be_removed_or_demoted() {
    let fx = provisioned().await;

    let err = fx
        .engine
        .users
        .delete_user(&fx.root, fx.root.user_id)
        .await
        .expect_err("self delete");
    assert!(matches!(err, EngineError::Validation(_)));

    let err = fx
        .engine
        .users
        .update_user(
            &fx.root,
            fx.root.user_id,
            keywarden::db::UserUpdate {
                role: Role::User,
                real_name: "Administrator".to_string(),
                contact_info: String::new(),
                managed_group_id: None,
            },
        )
        .await
        .expect_err("demote last super admin");
    assert!(matches!(err, EngineError::Validation(_)));

    // An account without history deletes cleanly.
    let temp = fx
        .engine
        .users
        .create_user(
            &fx.root,
            NewUser {
                username: "contractor".to_string(),
                password: "contractor-1".to_string(),
                role: Role::User,
                real_name: String::new(),
                contact_info: String::new(),
                managed_group_id: None,
            },
        )
        .await
        .expect("create disposable user");
    fx.engine
        .users
        .delete_user(&fx.root, temp.id)
        .await
        .expect("delete disposable user");
    assert!(
        fx.engine
            .users
            .actor_for_user(temp.id)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn management_surface_is_super_admin_only() {
    let fx = provisioned().await;

    let err = fx
        .engine
        .users
        .create_user(
            &fx.admin,
            NewUser {
                username: "mallory".to_string(),
                password: "mallory-pass".to_string(),
                role: Role::User,
                real_name: String::new(),
                contact_info: String::new(),
                managed_group_id: None,
            },
        )
        .await
        .expect_err("admin cannot create users");
    assert!(matches!(err, EngineError::Forbidden));

    let err = fx
        .engine
        .groups
        .create(&fx.alice, "rogue", "")
        .await
        .expect_err("user cannot create groups");
    assert!(matches!(err, EngineError::Forbidden));

    let err = fx
        .engine
        .audit
        .list(&fx.alice, 1, 10, None, None)
        .await
        .expect_err("user cannot read the ledger");
    assert!(matches!(err, EngineError::Forbidden));

    let err = fx
        .engine
        .mfa
        .reset_binding(&fx.admin, fx.alice.user_id)
        .await
        .expect_err("admin cannot reset bindings");
    assert!(matches!(err, EngineError::Forbidden));

    let err = fx
        .engine
        .users
        .list_users(&fx.alice)
        .await
        .expect_err("user cannot list accounts");
    assert!(matches!(err, EngineError::Forbidden));

    // The directory itself works for the SUPER_ADMIN.
    let users = fx.engine.users.list_users(&fx.root).await.expect("list");
    let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
    assert!(names.contains(&"admin"));
    assert!(names.contains(&"carol"));
    assert!(names.contains(&"alice"));
}

#[tokio::test]
async fn password_self_service_and_admin_reset() {
    let fx = provisioned().await;

    let err = fx
        .engine
        .users
        .change_own_password(&fx.alice, "not-the-password", "alice-pass-2")
        .await
        .expect_err("wrong current password");
    assert!(matches!(err, EngineError::Validation(_)));

    fx.engine
        .users
        .change_own_password(&fx.alice, "alice-pass-1", "alice-pass-2")
        .await
        .expect("change own password");
    fx.engine
        .users
        .authenticate("alice", "alice-pass-2", None)
        .await
        .expect("login with new password");

    fx.engine
        .users
        .admin_reset_password(&fx.root, fx.alice.user_id, "issued-by-root")
        .await
        .expect("admin reset");
    fx.engine
        .users
        .authenticate("alice", "issued-by-root", None)
        .await
        .expect("login with issued password");
    let err = fx
        .engine
        .users
        .authenticate("alice", "alice-pass-2", None)
        .await
        .expect_err("old password is dead");
    assert!(matches!(err, EngineError::InvalidCredentials));
}

#[tokio::test]
async fn profile_and_group_updates_apply() {
    let fx = provisioned().await;

    fx.engine
        .users
        .update_user(
            &fx.root,
            fx.admin.user_id,
            keywarden::db::UserUpdate {
                role: Role::Admin,
                real_name: "Carol Ng".to_string(),
                contact_info: "carol@ops.example.com".to_string(),
                managed_group_id: Some(fx.group_id),
            },
        )
        .await
        .expect("update profile");
    let carol = fx
        .engine
        .store
        .get_user(fx.admin.user_id)
        .await
        .expect("query user")
        .expect("user exists");
    assert_eq!(carol.real_name, "Carol Ng");
    assert_eq!(carol.contact_info, "carol@ops.example.com");

    // Group assignments are validated with the role.
    let err = fx
        .engine
        .users
        .create_user(
            &fx.root,
            NewUser {
                username: "frank".to_string(),
                password: "frank-pass-1".to_string(),
                role: Role::Admin,
                real_name: String::new(),
                contact_info: String::new(),
                managed_group_id: None,
            },
        )
        .await
        .expect_err("admin without group");
    assert!(matches!(err, EngineError::Validation(_)));

    let err = fx
        .engine
        .users
        .update_user(
            &fx.root,
            fx.alice.user_id,
            keywarden::db::UserUpdate {
                role: Role::User,
                real_name: String::new(),
                contact_info: String::new(),
                managed_group_id: Some(fx.group_id),
            },
        )
        .await
        .expect_err("user with group");
    assert!(matches!(err, EngineError::Validation(_)));

    fx.engine
        .groups
        .update(&fx.root, fx.group_id, "core-net", "Renamed")
        .await
        .expect("rename group");
    let names: Vec<String> = fx
        .engine
        .groups
        .list()
        .await
        .expect("list groups")
        .into_iter()
        .map(|g| g.name)
        .collect();
    assert!(names.contains(&"core-net".to_string()));
    assert!(!names.contains(&"core-network".to_string()));
}

#[tokio::test]
async fn mfa_reset_allows_reenrollment() {
    let fx = provisioned().await;

    fx.engine
        .mfa
        .reset_binding(&fx.root, fx.admin.user_id)
        .await
        .expect("reset binding");

    // Password-only login works again while unbound.
    let carol = fx
        .engine
        .users
        .authenticate("carol", "carol-pass-1", None)
        .await
        .expect("login without code after reset");
    assert!(!carol.mfa_bound);

    let binding = fx.engine.mfa.bind(&carol).await.expect("re-bind");
    let err = fx
        .engine
        .mfa
        .activate(&carol, &binding.secret, &wrong_code(&binding.secret))
        .await
        .expect_err("wrong activation code");
    assert!(matches!(err, EngineError::InvalidCode));

    // The failed activation left the account unbound.
    let carol = fx
        .engine
        .users
        .actor_for_user(carol.user_id)
        .await
        .expect("refresh");
    assert!(!carol.mfa_bound);

    fx.engine
        .mfa
        .activate(&carol, &binding.secret, &code_now(&binding.secret))
        .await
        .expect("activate");
    let carol = fx
        .engine
        .users
        .actor_for_user(carol.user_id)
        .await
        .expect("refresh");
    assert!(carol.mfa_bound);
}

#[tokio::test]
async fn audit_trail_covers_the_lifecycle() {
    let fx = provisioned().await;

    let request = fx
        .engine
        .requests
        .create(&fx.alice, fx.device_id, "patching", LeaseDuration::OneHour)
        .await
        .expect("request");
    fx.engine
        .requests
        .approve(&fx.admin, request.id, &code_now(&fx.admin_secret))
        .await
        .expect("approve");
    fx.engine
        .requests
        .reveal(&fx.alice, request.id)
        .await
        .expect("reveal");
    fx.engine
        .requests
        .reveal(&fx.alice, request.id)
        .await
        .expect("repeat reveal");

    for action in [
        "SETUP_VAULT",
        "CREATE_GROUP",
        "CREATE_USER",
        "ACTIVATE_MFA",
        "CREATE_DEVICE",
        "CREATE_REQUEST",
        "APPROVE_REQUEST",
    ] {
        let (entries, _) = fx
            .engine
            .audit
            .list(&fx.root, 1, 10, Some(action.to_string()), None)
            .await
            .expect("audit list");
        assert!(!entries.is_empty(), "missing {action} entry");
    }

    // Both reveals are recorded; only the first is a first_read.
    let (reveals, _) = fx
        .engine
        .audit
        .list(&fx.root, 1, 10, Some("VIEW_PASSWORD".to_string()), None)
        .await
        .expect("reveal entries");
    assert_eq!(reveals.len(), 2);
    let first_reads: Vec<bool> = reveals
        .iter()
        .map(|e| e.details.as_deref().unwrap().contains("\"first_read\":true"))
        .collect();
    assert!(first_reads.contains(&true));
    assert!(first_reads.contains(&false));

    // Actor filter narrows to one account's actions.
    let (by_alice, _) = fx
        .engine
        .audit
        .list(&fx.root, 1, 50, None, Some("alice".to_string()))
        .await
        .expect("actor filter");
    assert!(!by_alice.is_empty());
    assert!(by_alice.iter().all(|e| e.actor_name == "alice"));
}
