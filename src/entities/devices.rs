use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "devices")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Unique; credential blobs are cryptographically bound to it.
    #[sea_orm(unique)]
    pub name: String,

    pub ip: String,

    /// Access protocol tag (SSH, RDP, ...). Free-form, not interpreted.
    pub protocol: String,

    /// SAFE | PENDING_APPROVAL | APPROVED | IN_USE | PENDING_RESET
    pub status: String,

    pub group_id: i32,

    pub created_by_id: i32,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::device_groups::Entity",
        from = "Column::GroupId",
        to = "super::device_groups::Column::Id"
    )]
    DeviceGroup,
    #[sea_orm(has_many = "super::access_requests::Entity")]
    AccessRequests,
}

impl Related<super::device_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeviceGroup.def()
    }
}

impl Related<super::access_requests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccessRequests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
