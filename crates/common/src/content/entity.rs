use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{EntityTrait, FromQueryResult, Value};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ContentKind, ContentStatus, PinState, ShowState};

/// Fields needed to create a new row
#[derive(Debug, Clone, Default)]
pub struct NewContent {
    pub user_id: String,
    pub name: String,
    pub original_text: String,
    pub parsed_text: String,
    pub avatar: String,
    pub bio: String,
    pub publish_date: Option<DateTimeWithTimeZone>,
    pub piece_type: Option<i32>,
    pub quote_author_id: String,
    pub quote_piece_id: String,
}

/// Kind-specific attributes exposed in responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentExtra {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_author_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_piece_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piece_type: Option<i32>,
}

/// Engagement counters shared by all kinds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub view_count: i32,
    pub unique_view_count: i32,
    pub vote_count: i32,
    pub collection_count: i32,
    pub follow_count: i32,
    pub comment_count: i32,
    pub hot_score: i32,
}

/// A content row the generic repository and services operate on.
///
/// Implemented by the sea-orm models of the three content tables.
pub trait ContentEntity:
    FromQueryResult + Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: ContentKind;

    /// The sea-orm entity whose model this is
    type Entity: EntityTrait<Model = Self>;

    fn id_column() -> <Self::Entity as EntityTrait>::Column;
    /// Column matched by name lookups
    fn name_column() -> <Self::Entity as EntityTrait>::Column;
    fn status_column() -> <Self::Entity as EntityTrait>::Column;
    fn created_at_column() -> <Self::Entity as EntityTrait>::Column;

    /// A fresh row in `Pending`, unpinned and shown, without an id
    fn new_pending(input: &NewContent, now: DateTimeWithTimeZone) -> Self;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn user_id(&self) -> &str;

    /// Title, or author name for authors
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);

    fn original_text(&self) -> &str;
    fn parsed_text(&self) -> &str;
    fn set_content(&mut self, original: String, parsed: String);

    fn status_code(&self) -> i32;
    fn set_status_code(&mut self, status: i32);
    fn pin_code(&self) -> i32;
    fn set_pin_code(&mut self, pin: i32);
    fn show_code(&self) -> i32;
    fn set_show_code(&mut self, show: i32);

    fn counters(&self) -> Counters;

    fn revision_id(&self) -> &str;
    fn set_revision_id(&mut self, revision_id: String);

    fn created_at(&self) -> DateTimeWithTimeZone;
    fn updated_at(&self) -> DateTimeWithTimeZone;
    fn set_updated_at(&mut self, at: DateTimeWithTimeZone);

    /// Last time the content body changed; only quotes track it
    fn post_update_time(&self) -> Option<DateTimeWithTimeZone> {
        None
    }

    fn set_post_update_time(&mut self, _at: DateTimeWithTimeZone) {}

    fn extra(&self) -> ContentExtra {
        ContentExtra::default()
    }

    /// Every persisted column with its current value, in insert order
    fn columns(&self) -> Vec<(&'static str, Value)>;

    fn column_value(&self, column: &str) -> Option<Value> {
        self.columns()
            .into_iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    fn status(&self) -> Option<ContentStatus> {
        ContentStatus::from_i32(self.status_code())
    }

    fn is_status(&self, status: ContentStatus) -> bool {
        self.status_code() == status.as_i32()
    }

    fn set_status(&mut self, status: ContentStatus) {
        self.set_status_code(status.as_i32());
    }

    fn pin(&self) -> PinState {
        PinState::from_i32(self.pin_code())
    }

    fn set_pin(&mut self, pin: PinState) {
        self.set_pin_code(pin.as_i32());
    }

    fn show(&self) -> ShowState {
        ShowState::from_i32(self.show_code())
    }

    fn set_show(&mut self, show: ShowState) {
        self.set_show_code(show.as_i32());
    }
}
