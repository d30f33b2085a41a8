use serde::{Deserialize, Serialize};
use std::fmt;

/// The three content aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Quote,
    QuoteAuthor,
    QuotePiece,
}

/// Tag requirements applied when content is added
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPolicy {
    /// At least one recommended tag is mandatory
    Required,
    /// Tags are checked only when some are supplied
    IfPresent,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Quote, ContentKind::QuoteAuthor, ContentKind::QuotePiece];

    /// Object type name used in reason keys, activity keys and tag relations
    pub const fn object_type(self) -> &'static str {
        match self {
            ContentKind::Quote => "quote",
            ContentKind::QuoteAuthor => "quote_author",
            ContentKind::QuotePiece => "quote_piece",
        }
    }

    pub const fn table(self) -> &'static str {
        match self {
            ContentKind::Quote => "tq_quote",
            ContentKind::QuoteAuthor => "tq_quote_author",
            ContentKind::QuotePiece => "tq_quote_piece",
        }
    }

    /// Numeric object type embedded in generated ids
    pub const fn type_code(self) -> u16 {
        match self {
            ContentKind::Quote => 11,
            ContentKind::QuoteAuthor => 12,
            ContentKind::QuotePiece => 13,
        }
    }

    /// Column holding the display name
    pub const fn name_column(self) -> &'static str {
        match self {
            ContentKind::QuoteAuthor => "author_name",
            ContentKind::Quote | ContentKind::QuotePiece => "title",
        }
    }

    /// Column driving the `active` ordering
    pub const fn active_column(self) -> &'static str {
        match self {
            ContentKind::Quote => "post_update_time",
            ContentKind::QuoteAuthor | ContentKind::QuotePiece => "updated_at",
        }
    }

    /// Columns written when an edit is applied directly
    pub const fn edit_columns(self) -> &'static [&'static str] {
        match self {
            ContentKind::Quote => &["title", "original_text", "parsed_text", "updated_at", "post_update_time"],
            ContentKind::QuoteAuthor => &["author_name", "bio", "updated_at"],
            ContentKind::QuotePiece => &["title", "original_text", "parsed_text", "updated_at"],
        }
    }

    /// Extra predicate for the `unanswered` ordering
    pub const fn unanswered_filter(self) -> Option<&'static str> {
        match self {
            ContentKind::Quote => Some("comment_count = 0"),
            ContentKind::QuoteAuthor | ContentKind::QuotePiece => None,
        }
    }

    pub const fn tag_policy(self) -> TagPolicy {
        match self {
            ContentKind::Quote => TagPolicy::Required,
            ContentKind::QuoteAuthor | ContentKind::QuotePiece => TagPolicy::IfPresent,
        }
    }

    /// Path segment used by the HTTP surface
    pub const fn route(self) -> &'static str {
        match self {
            ContentKind::Quote => "quotes",
            ContentKind::QuoteAuthor => "quote-authors",
            ContentKind::QuotePiece => "quote-pieces",
        }
    }

    pub fn from_object_type(object_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.object_type() == object_type)
    }

    /// Leading digits shared by every generated id of this kind
    pub fn id_prefix(self) -> String {
        format!("1{:03}", self.type_code())
    }

    /// Generated id for a sequence number: `1` + 3-digit type code + 13-digit sequence
    pub fn unique_id(self, seq: i64) -> String {
        format!("1{:03}{:013}", self.type_code(), seq)
    }

    /// Per-user counter column on the user table
    pub fn user_count_column(self) -> String {
        format!("{}_count", self.object_type())
    }

    /// Kind-scoped reason key, e.g. `error.quote.not_found`
    pub fn reason(self, suffix: &str) -> String {
        format!("error.{}.{}", self.object_type(), suffix)
    }

    pub fn activity_key(self, activity: ActivityType) -> String {
        format!("{}.{}", self.object_type(), activity.as_str())
    }

    pub fn event_key(self, event: EventType) -> String {
        format!("{}.{}", self.object_type(), event.as_str())
    }

    /// Meta key under which the close reason is stored
    pub fn close_reason_meta_key(self) -> String {
        format!("{}.close_reason", self.object_type())
    }

    /// Admin search prefix selecting a single id, e.g. `quote:`
    pub fn admin_id_prefix(self) -> String {
        format!("{}:", self.object_type())
    }

    /// Title shown for deleted entries in collection lists
    pub const fn deleted_title(self) -> &'static str {
        match self {
            ContentKind::Quote => "Deleted quote",
            ContentKind::QuoteAuthor => "Deleted quote author",
            ContentKind::QuotePiece => "Deleted quote piece",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.object_type())
    }
}

/// Activity recorded for a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Asked,
    Closed,
    Reopened,
    Edited,
    Deleted,
    Undeleted,
    Pin,
    Unpin,
    Hide,
    Show,
}

impl ActivityType {
    pub const fn as_str(self) -> &'static str {
        match self {
            ActivityType::Asked => "asked",
            ActivityType::Closed => "closed",
            ActivityType::Reopened => "reopened",
            ActivityType::Edited => "edited",
            ActivityType::Deleted => "deleted",
            ActivityType::Undeleted => "undeleted",
            ActivityType::Pin => "pin",
            ActivityType::Unpin => "unpin",
            ActivityType::Hide => "hide",
            ActivityType::Show => "show",
        }
    }
}

/// Domain event published for downstream consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl EventType {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::Create => "create",
            EventType::Update => "update",
            EventType::Delete => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_follow_object_type() {
        assert_eq!(ContentKind::Quote.reason("not_found"), "error.quote.not_found");
        assert_eq!(
            ContentKind::QuoteAuthor.activity_key(ActivityType::Undeleted),
            "quote_author.undeleted"
        );
        assert_eq!(ContentKind::QuotePiece.event_key(EventType::Delete), "quote_piece.delete");
        assert_eq!(ContentKind::Quote.close_reason_meta_key(), "quote.close_reason");
        assert_eq!(ContentKind::QuoteAuthor.admin_id_prefix(), "quote_author:");
        assert_eq!(ContentKind::from_object_type("quote_piece"), Some(ContentKind::QuotePiece));
        assert_eq!(ContentKind::from_object_type("answer"), None);
    }

    #[test]
    fn test_unique_id_layout() {
        let id = ContentKind::Quote.unique_id(7);
        assert_eq!(id, "10110000000000007");
        assert_eq!(id.len(), 17);
        assert!(id.starts_with(&ContentKind::Quote.id_prefix()));
        assert_eq!(ContentKind::QuoteAuthor.unique_id(1), "10120000000000001");
    }

    #[test]
    fn test_kind_columns() {
        assert_eq!(ContentKind::QuoteAuthor.name_column(), "author_name");
        assert_eq!(ContentKind::Quote.active_column(), "post_update_time");
        assert!(ContentKind::QuotePiece.unanswered_filter().is_none());
        assert_eq!(ContentKind::Quote.tag_policy(), TagPolicy::Required);
    }
}
