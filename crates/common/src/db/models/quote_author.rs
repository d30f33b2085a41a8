//! Quote author entity
//!
//! The author's bio doubles as the editable content body.

use sea_orm::entity::prelude::*;
use sea_orm::Value;
use serde::{Deserialize, Serialize};

use crate::content::{ContentEntity, ContentExtra, ContentKind, ContentStatus, Counters, NewContent, PinState, ShowState};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tq_quote_author")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    #[sea_orm(column_type = "Text")]
    pub author_name: String,

    pub avatar: String,

    #[sea_orm(column_type = "Text")]
    pub bio: String,

    pub status: i32,
    pub pin: i32,
    pub show: i32,

    pub view_count: i32,
    pub unique_view_count: i32,
    pub vote_count: i32,
    pub collection_count: i32,
    pub follow_count: i32,
    pub comment_count: i32,
    pub hot_score: i32,

    pub revision_id: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::quote::Entity")]
    Quotes,
}

impl Related<super::quote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Quotes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ContentEntity for Model {
    const KIND: ContentKind = ContentKind::QuoteAuthor;
    type Entity = Entity;

    fn id_column() -> Column {
        Column::Id
    }

    fn name_column() -> Column {
        Column::AuthorName
    }

    fn status_column() -> Column {
        Column::Status
    }

    fn created_at_column() -> Column {
        Column::CreatedAt
    }

    fn new_pending(input: &NewContent, now: DateTimeWithTimeZone) -> Self {
        let bio = if input.bio.is_empty() {
            input.original_text.clone()
        } else {
            input.bio.clone()
        };
        Self {
            id: String::new(),
            user_id: input.user_id.clone(),
            author_name: input.name.clone(),
            avatar: input.avatar.clone(),
            bio,
            status: ContentStatus::Pending.as_i32(),
            pin: PinState::UnPin.as_i32(),
            show: ShowState::Show.as_i32(),
            view_count: 0,
            unique_view_count: 0,
            vote_count: 0,
            collection_count: 0,
            follow_count: 0,
            comment_count: 0,
            hot_score: 0,
            revision_id: "0".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn name(&self) -> &str {
        &self.author_name
    }

    fn set_name(&mut self, name: String) {
        self.author_name = name;
    }

    fn original_text(&self) -> &str {
        &self.bio
    }

    fn parsed_text(&self) -> &str {
        &self.bio
    }

    fn set_content(&mut self, original: String, _parsed: String) {
        self.bio = original;
    }

    fn status_code(&self) -> i32 {
        self.status
    }

    fn set_status_code(&mut self, status: i32) {
        self.status = status;
    }

    fn pin_code(&self) -> i32 {
        self.pin
    }

    fn set_pin_code(&mut self, pin: i32) {
        self.pin = pin;
    }

    fn show_code(&self) -> i32 {
        self.show
    }

    fn set_show_code(&mut self, show: i32) {
        self.show = show;
    }

    fn counters(&self) -> Counters {
        Counters {
            view_count: self.view_count,
            unique_view_count: self.unique_view_count,
            vote_count: self.vote_count,
            collection_count: self.collection_count,
            follow_count: self.follow_count,
            comment_count: self.comment_count,
            hot_score: self.hot_score,
        }
    }

    fn revision_id(&self) -> &str {
        &self.revision_id
    }

    fn set_revision_id(&mut self, revision_id: String) {
        self.revision_id = revision_id;
    }

    fn created_at(&self) -> DateTimeWithTimeZone {
        self.created_at
    }

    fn updated_at(&self) -> DateTimeWithTimeZone {
        self.updated_at
    }

    fn set_updated_at(&mut self, at: DateTimeWithTimeZone) {
        self.updated_at = at;
    }

    fn extra(&self) -> ContentExtra {
        ContentExtra {
            avatar: Some(self.avatar.clone()),
            bio: Some(self.bio.clone()),
            ..Default::default()
        }
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.clone().into()),
            ("user_id", self.user_id.clone().into()),
            ("author_name", self.author_name.clone().into()),
            ("avatar", self.avatar.clone().into()),
            ("bio", self.bio.clone().into()),
            ("status", self.status.into()),
            ("pin", self.pin.into()),
            ("show", self.show.into()),
            ("view_count", self.view_count.into()),
            ("unique_view_count", self.unique_view_count.into()),
            ("vote_count", self.vote_count.into()),
            ("collection_count", self.collection_count.into()),
            ("follow_count", self.follow_count.into()),
            ("comment_count", self.comment_count.into()),
            ("hot_score", self.hot_score.into()),
            ("revision_id", self.revision_id.clone().into()),
            ("created_at", self.created_at.into()),
            ("updated_at", self.updated_at.into()),
        ]
    }
}
