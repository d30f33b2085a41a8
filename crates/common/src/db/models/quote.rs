//! Quote entity

use sea_orm::entity::prelude::*;
use sea_orm::Value;
use serde::{Deserialize, Serialize};

use crate::content::{ContentEntity, ContentExtra, ContentKind, ContentStatus, Counters, NewContent, PinState, ShowState};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tq_quote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: String,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub original_text: String,

    #[sea_orm(column_type = "Text")]
    pub parsed_text: String,

    pub quote_author_id: String,

    pub quote_piece_id: String,

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

    /// Last time title or body changed
    pub post_update_time: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::quote_author::Entity",
        from = "Column::QuoteAuthorId",
        to = "super::quote_author::Column::Id"
    )]
    QuoteAuthor,

    #[sea_orm(
        belongs_to = "super::quote_piece::Entity",
        from = "Column::QuotePieceId",
        to = "super::quote_piece::Column::Id"
    )]
    QuotePiece,
}

impl Related<super::quote_author::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QuoteAuthor.def()
    }
}

impl Related<super::quote_piece::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QuotePiece.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ContentEntity for Model {
    const KIND: ContentKind = ContentKind::Quote;
    type Entity = Entity;

    fn id_column() -> Column {
        Column::Id
    }

    fn name_column() -> Column {
        Column::Title
    }

    fn status_column() -> Column {
        Column::Status
    }

    fn created_at_column() -> Column {
        Column::CreatedAt
    }

    fn new_pending(input: &NewContent, now: DateTimeWithTimeZone) -> Self {
        Self {
            id: String::new(),
            user_id: input.user_id.clone(),
            title: input.name.clone(),
            original_text: input.original_text.clone(),
            parsed_text: input.parsed_text.clone(),
            quote_author_id: input.quote_author_id.clone(),
            quote_piece_id: input.quote_piece_id.clone(),
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
            post_update_time: Some(now),
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
        &self.title
    }

    fn set_name(&mut self, name: String) {
        self.title = name;
    }

    fn original_text(&self) -> &str {
        &self.original_text
    }

    fn parsed_text(&self) -> &str {
        &self.parsed_text
    }

    fn set_content(&mut self, original: String, parsed: String) {
        self.original_text = original;
        self.parsed_text = parsed;
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

    fn post_update_time(&self) -> Option<DateTimeWithTimeZone> {
        self.post_update_time
    }

    fn set_post_update_time(&mut self, at: DateTimeWithTimeZone) {
        self.post_update_time = Some(at);
    }

    fn extra(&self) -> ContentExtra {
        ContentExtra {
            quote_author_id: Some(self.quote_author_id.clone()),
            quote_piece_id: Some(self.quote_piece_id.clone()),
            ..Default::default()
        }
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", self.id.clone().into()),
            ("user_id", self.user_id.clone().into()),
            ("title", self.title.clone().into()),
            ("original_text", self.original_text.clone().into()),
            ("parsed_text", self.parsed_text.clone().into()),
            ("quote_author_id", self.quote_author_id.clone().into()),
            ("quote_piece_id", self.quote_piece_id.clone().into()),
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
            ("post_update_time", self.post_update_time.into()),
        ]
    }
}
