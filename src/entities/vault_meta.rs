use sea_orm::entity::prelude::*;

/// Singleton row (id = 1) holding the vault's persistent material: the
/// Argon2id salt and the master key wrapped under the passphrase-derived
/// key. Presence of the row means the vault is initialized; the unlocked
/// state itself is never persisted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "vault_meta")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    pub kdf_salt: Vec<u8>,

    /// `nonce || ciphertext` of the 32-byte master key.
    pub wrapped_key: Vec<u8>,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
