//! Request and response shapes shared by services and handlers
//!
//! Ids in responses are already encoded for the request context; ids in
//! requests may be short or long and are decoded by the services.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::content::{ContentExtra, OperationKind};

/// One page of results plus the total match count
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paginated<T> {
    pub list: Vec<T>,
    pub count: u64,
}

impl<T> Paginated<T> {
    pub fn new(list: Vec<T>, count: u64) -> Self {
        Self { list, count }
    }

    pub fn empty() -> Self {
        Self { list: Vec::new(), count: 0 }
    }
}

/// Caller role as carried in the access token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Admins and moderators
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "moderator" => Role::Moderator,
            _ => Role::User,
        }
    }
}

// ============================================================================
// Tags and users
// ============================================================================

/// Tag as submitted with content
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagItem {
    pub slug_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub parsed_text: String,
}

/// Tag as stored
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagInfo {
    pub id: String,
    pub slug_name: String,
    pub display_name: String,
    /// Slug of the main tag when this tag is a synonym
    #[serde(default)]
    pub main_tag_slug_name: String,
    pub recommend: bool,
    pub reserved: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserBasicInfo {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar: String,
    pub rank: i32,
    pub status: String,
}

/// Operator shown next to a list entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Operator {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar: String,
    pub rank: i32,
}

impl From<&UserBasicInfo> for Operator {
    fn from(user: &UserBasicInfo) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar: user.avatar.clone(),
            rank: user.rank,
        }
    }
}

/// Banner describing why content is closed, deleted or waiting for review
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Operation {
    pub operation_type: String,
    pub operation_description: String,
    pub operation_msg: String,
    pub operation_time: i64,
    pub level: String,
}

/// Close reason persisted as meta
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CloseReasonMeta {
    pub close_type: i32,
    pub close_msg: String,
}

/// Minimal info on a quote's author or piece
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelatedBasicInfo {
    pub id: String,
    pub name: String,
    pub avatar: String,
}

/// Action offered to the viewer on a detail page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberAction {
    pub action: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

// ============================================================================
// Responses
// ============================================================================

/// Detail view
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContentInfo {
    pub id: String,
    pub title: String,
    pub url_title: String,
    pub content: String,
    pub html: String,
    pub description: String,
    pub tags: Vec<TagInfo>,
    pub view_count: i32,
    pub unique_view_count: i32,
    pub vote_count: i32,
    pub collection_count: i32,
    pub follow_count: i32,
    pub comment_count: i32,
    pub status: i32,
    pub pin: i32,
    pub show: i32,
    pub create_time: i64,
    pub update_time: i64,
    pub edit_time: i64,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserBasicInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    pub vote_status: String,
    pub is_followed: bool,
    pub answered: bool,
    pub first_answer_id: String,
    pub collected: bool,
    pub member_actions: Vec<MemberAction>,
    #[serde(flatten)]
    pub extra: ContentExtra,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_author_basic_info: Option<RelatedBasicInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_piece_basic_info: Option<RelatedBasicInfo>,
}

/// List view entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContentPageItem {
    pub id: String,
    pub created_at: i64,
    pub title: String,
    pub url_title: String,
    pub description: String,
    pub pin: i32,
    pub show: i32,
    pub status: i32,
    pub tags: Vec<TagInfo>,
    pub vote_count: i32,
    pub view_count: i32,
    pub collection_count: i32,
    pub follow_count: i32,
    pub comment_count: i32,
    pub operated_at: i64,
    pub operation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    #[serde(flatten)]
    pub extra: ContentExtra,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_author_basic_info: Option<RelatedBasicInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_piece_basic_info: Option<RelatedBasicInfo>,
}

/// Short entry returned by name search
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentBaseInfo {
    pub id: String,
    pub title: String,
    pub url_title: String,
    pub view_count: i32,
    pub collection_count: i32,
    pub follow_count: i32,
    pub status: String,
}

/// Entry on a user's profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserContentInfo {
    pub id: String,
    pub title: String,
    pub url_title: String,
    pub status: String,
    pub vote_count: i32,
    pub view_count: i32,
    pub collection_count: i32,
    pub follow_count: i32,
    pub comment_count: i32,
    pub create_time: i64,
    pub update_time: i64,
    pub tags: Vec<TagInfo>,
}

/// Admin listing entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdminContentItem {
    pub id: String,
    pub title: String,
    pub url_title: String,
    pub status: String,
    pub pin: i32,
    pub show: i32,
    pub vote_count: i32,
    pub view_count: i32,
    pub collection_count: i32,
    pub follow_count: i32,
    pub create_time: i64,
    pub update_time: i64,
    pub edit_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserBasicInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SitemapEntry {
    pub id: String,
    pub title: String,
    pub url_title: String,
    pub updated_at: String,
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AddContentReq {
    /// Title, or author name for authors
    #[validate(length(min = 1, max = 150))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 65535))]
    pub content: String,
    /// Rendered body; defaults to the raw content
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub tags: Vec<TagItem>,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub bio: String,
    /// Unix seconds
    #[serde(default)]
    pub publish_date: Option<i64>,
    #[serde(default)]
    pub piece_type: Option<i32>,

    // Quote links: an explicit id wins over a name
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub piece_id: String,
    #[serde(default)]
    pub piece: String,

    #[serde(default, skip_deserializing)]
    pub user_id: String,
    #[serde(default, skip_deserializing)]
    pub role: Role,
    #[serde(default, skip_deserializing)]
    pub can_use_reserved_tag: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateContentReq {
    #[serde(default, skip_deserializing)]
    pub id: String,
    #[validate(length(min = 1, max = 150))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 65535))]
    pub content: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub tags: Vec<TagItem>,
    #[serde(default)]
    #[validate(length(max = 300))]
    pub edit_summary: String,

    #[serde(default, skip_deserializing)]
    pub user_id: String,
    #[serde(default, skip_deserializing)]
    pub role: Role,
    /// Editor may apply the change directly
    #[serde(default, skip_deserializing)]
    pub no_need_review: bool,
    #[serde(default, skip_deserializing)]
    pub can_use_reserved_tag: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseReq {
    #[serde(default, skip_deserializing)]
    pub id: String,
    pub close_type: i32,
    #[serde(default)]
    pub close_msg: String,
    #[serde(default, skip_deserializing)]
    pub user_id: String,
}

/// Target of reopen and recover
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectReq {
    pub id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoveReq {
    pub id: String,
    pub user_id: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationReq {
    #[serde(default, skip_deserializing)]
    pub id: String,
    pub operation: OperationKind,
    #[serde(default, skip_deserializing)]
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageReq {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub page_size: u64,
    #[serde(default)]
    pub order: String,
    /// Tag slug; synonyms of the tag are included
    #[serde(default)]
    pub tag: String,
    /// Takes precedence over `tag`
    #[serde(default)]
    pub tag_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub in_days: i64,
    #[serde(default, skip_deserializing)]
    pub login_user_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendReq {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub page_size: u64,
    #[serde(default, skip_deserializing)]
    pub login_user_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminPageReq {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub page_size: u64,
    /// Status name; empty lists every status
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminSetStatusReq {
    #[serde(default, skip_deserializing)]
    pub id: String,
    pub status: String,
    #[serde(default, skip_deserializing)]
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalPageReq {
    pub username: String,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub page_size: u64,
    #[serde(default)]
    pub order: String,
    #[serde(default, skip_deserializing)]
    pub login_user_id: String,
    #[serde(default, skip_deserializing)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonalCollectionReq {
    #[serde(default, skip_deserializing)]
    pub user_id: String,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub page_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_request_ignores_server_fields() {
        let req: AddContentReq = serde_json::from_value(serde_json::json!({
            "title": "Know thyself",
            "user_id": "spoofed",
            "role": "admin",
            "tags": [{ "slug_name": "wisdom" }]
        }))
        .unwrap();
        assert!(req.user_id.is_empty());
        assert_eq!(req.role, Role::User);
        assert_eq!(req.tags[0].slug_name, "wisdom");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_add_request_rejects_empty_title() {
        let req = AddContentReq::default();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_info_flattens_extra() {
        let info = ContentInfo {
            id: "1".into(),
            extra: ContentExtra {
                quote_author_id: Some("2".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["quote_author_id"], "2");
        assert!(value.get("bio").is_none());
    }
}
