use anyhow::{Context, Result, anyhow};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tokio::task;

use crate::config::SecurityConfig;
use crate::domain::Role;
use crate::entities::{prelude::*, users};

/// Account row with the password hash and TOTP secret stripped off.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub real_name: String,
    pub contact_info: String,
    pub managed_group_id: Option<i32>,
    pub mfa_bound: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<users::Model> for User {
    type Error = anyhow::Error;

    fn try_from(model: users::Model) -> Result<Self> {
        Ok(Self {
            id: model.id,
            username: model.username,
            role: model.role.parse()?,
            real_name: model.real_name,
            contact_info: model.contact_info,
            managed_group_id: model.managed_group_id,
            mfa_bound: model.totp_secret.is_some(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub real_name: String,
    pub contact_info: String,
    pub managed_group_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub role: Role,
    pub real_name: String,
    pub contact_info: String,
    pub managed_group_id: Option<i32>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<User>> {
        let model = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user")?;

        model.map(User::try_from).transpose()
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let model = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user")?;

        model.map(User::try_from).transpose()
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let models = Users::find()
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        models.into_iter().map(User::try_from).collect()
    }

    pub async fn count_with_role(&self, role: Role) -> Result<u64> {
        use sea_orm::PaginatorTrait;

        let n = Users::find()
            .filter(users::Column::Role.eq(role.as_str()))
            .count(&self.conn)
            .await?;
        Ok(n)
    }

    /// Argon2 verification runs on the blocking pool; hashes are tuned to
    /// take tens of milliseconds and would stall the async runtime.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        let Some(model) = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user")?
        else {
            return Ok(false);
        };

        let password = password.to_string();
        let hash = model.password_hash;

        task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash)
                .map_err(|e| anyhow!("Invalid password hash in database: {e}"))?;
            Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        })
        .await
        .context("Password verification task failed")?
    }

    pub async fn create(&self, new: NewUser, security: Option<&SecurityConfig>) -> Result<User> {
        let hash = hash_blocking(new.password, security.cloned()).await?;
        let now = chrono::Utc::now().to_rfc3339();

        let model = users::ActiveModel {
            username: Set(new.username),
            password_hash: Set(hash),
            role: Set(new.role.as_str().to_string()),
            real_name: Set(new.real_name),
            contact_info: Set(new.contact_info),
            managed_group_id: Set(new.managed_group_id),
            totp_secret: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert user")?;

        User::try_from(model)
    }

    pub async fn update_profile(&self, id: i32, update: UserUpdate) -> Result<bool> {
        let Some(model) = Users::find_by_id(id).one(&self.conn).await? else {
            return Ok(false);
        };

        let mut active: users::ActiveModel = model.into();
        active.role = Set(update.role.as_str().to_string());
        active.real_name = Set(update.real_name);
        active.contact_info = Set(update.contact_info);
        active.managed_group_id = Set(update.managed_group_id);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active
            .update(&self.conn)
            .await
            .context("Failed to update user")?;

        Ok(true)
    }

    pub async fn update_password(
        &self,
        id: i32,
        new_password: String,
        security: Option<&SecurityConfig>,
    ) -> Result<bool> {
        let Some(model) = Users::find_by_id(id).one(&self.conn).await? else {
            return Ok(false);
        };

        let hash = hash_blocking(new_password, security.cloned()).await?;

        let mut active: users::ActiveModel = model.into();
        active.password_hash = Set(hash);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active
            .update(&self.conn)
            .await
            .context("Failed to update password")?;

        Ok(true)
    }

    pub async fn totp_secret(&self, id: i32) -> Result<Option<Vec<u8>>> {
        let model = Users::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user")?;

        Ok(model.and_then(|m| m.totp_secret))
    }

    pub async fn set_totp_secret(&self, id: i32, secret: Option<Vec<u8>>) -> Result<bool> {
        let Some(model) = Users::find_by_id(id).one(&self.conn).await? else {
            return Ok(false);
        };

        let mut active: users::ActiveModel = model.into();
        active.totp_secret = Set(secret);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active
            .update(&self.conn)
            .await
            .context("Failed to update TOTP binding")?;

        Ok(true)
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Users::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }
}

async fn hash_blocking(password: String, security: Option<SecurityConfig>) -> Result<String> {
    task::spawn_blocking(move || hash_password(&password, security.as_ref()))
        .await
        .context("Password hashing task failed")?
}

/// Hash a password with Argon2id. Uses the configured cost parameters when
/// provided, otherwise the argon2 crate defaults.
pub fn hash_password(password: &str, security: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = match security {
        Some(cfg) => {
            let params = Params::new(
                cfg.argon2_memory_cost_kib,
                cfg.argon2_time_cost,
                cfg.argon2_parallelism,
                None,
            )
            .map_err(|e| anyhow!("Invalid Argon2 parameters: {e}"))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password(password.as_bytes(), &salt)
                .map_err(|e| anyhow!("Failed to hash password: {e}"))?
                .to_string()
        }
        None => Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {e}"))?
            .to_string(),
    };

    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_password_produces_verifiable_phc_string() {
        let hash = hash_password("hunter2", None).unwrap();
        assert!(hash.starts_with("$argon2id$"));

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"hunter2", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"wrong", &parsed)
                .is_err()
        );
    }

    #[test]
    fn hash_password_honours_configured_costs() {
        let cfg = SecurityConfig {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..Default::default()
        };
        let hash = hash_password("hunter2", Some(&cfg)).unwrap();
        assert!(hash.contains("m=8192,t=1,p=1"));
    }
}
