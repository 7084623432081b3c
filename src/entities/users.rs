use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    /// Argon2id password hash
    pub password_hash: String,

    /// SUPER_ADMIN | ADMIN | USER
    pub role: String,

    pub real_name: String,

    pub contact_info: String,

    /// Group an ADMIN administers. NULL for USER and SUPER_ADMIN.
    pub managed_group_id: Option<i32>,

    /// Raw TOTP secret, present only once MFA activation succeeded.
    pub totp_secret: Option<Vec<u8>>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::device_groups::Entity",
        from = "Column::ManagedGroupId",
        to = "super::device_groups::Column::Id"
    )]
    DeviceGroup,
}

impl Related<super::device_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeviceGroup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
