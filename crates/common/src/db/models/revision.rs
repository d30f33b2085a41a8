//! Revision entity: snapshots of an object and its tags

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Review state of a revision
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionStatus {
    Unreviewed,
    ReviewPassed,
    ReviewRejected,
}

impl RevisionStatus {
    pub const fn as_i32(self) -> i32 {
        match self {
            RevisionStatus::Unreviewed => 0,
            RevisionStatus::ReviewPassed => 1,
            RevisionStatus::ReviewRejected => 2,
        }
    }
}

impl From<i32> for RevisionStatus {
    fn from(value: i32) -> Self {
        match value {
            0 => RevisionStatus::Unreviewed,
            2 => RevisionStatus::ReviewRejected,
            _ => RevisionStatus::ReviewPassed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "revision")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub user_id: String,

    pub object_type: String,

    pub object_id: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// JSON snapshot of the object and its tags
    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(column_type = "Text")]
    pub log: String,

    pub status: i32,

    pub review_user_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn revision_status(&self) -> RevisionStatus {
        RevisionStatus::from(self.status)
    }
}
