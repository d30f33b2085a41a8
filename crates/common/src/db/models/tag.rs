//! Tag entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tag")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Main tag for synonyms, 0 for main tags
    pub main_tag_id: i64,

    pub slug_name: String,

    pub display_name: String,

    #[sea_orm(column_type = "Text")]
    pub original_text: String,

    #[sea_orm(column_type = "Text")]
    pub parsed_text: String,

    pub recommend: bool,

    pub reserved: bool,

    /// Number of visible objects carrying this tag
    pub object_count: i32,

    pub status: i32,

    pub user_id: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tag_rel::Entity")]
    TagRels,
}

impl Related<super::tag_rel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TagRels.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub const TAG_STATUS_AVAILABLE: i32 = 1;
pub const TAG_STATUS_DELETED: i32 = 10;
