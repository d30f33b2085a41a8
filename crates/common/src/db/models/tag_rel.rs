//! Object-to-tag relation entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Visibility of a tag relation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagRelStatus {
    Available,
    Hide,
    Deleted,
}

impl TagRelStatus {
    pub const fn as_i32(self) -> i32 {
        match self {
            TagRelStatus::Available => 1,
            TagRelStatus::Hide => 2,
            TagRelStatus::Deleted => 10,
        }
    }
}

impl From<i32> for TagRelStatus {
    fn from(value: i32) -> Self {
        match value {
            1 => TagRelStatus::Available,
            2 => TagRelStatus::Hide,
            _ => TagRelStatus::Deleted,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tag_rel")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub tag_id: i64,

    pub object_id: String,

    pub status: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tag::Entity",
        from = "Column::TagId",
        to = "super::tag::Column::Id"
    )]
    Tag,
}

impl Related<super::tag::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tag.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn rel_status(&self) -> TagRelStatus {
        TagRelStatus::from(self.status)
    }
}
