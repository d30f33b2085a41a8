//! Collaborators the content services depend on
//!
//! Tags, users, revisions, review, meta, votes, follows, collections,
//! answers and id generation are owned by the host platform. Each concern is
//! a trait so services can be wired against Postgres in production and
//! against in-memory fakes in tests.

mod sql;

pub use sql::SqlPlatform;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::ReviewConfig;
use crate::content::{ContentKind, ContentStatus, Lookup};
use crate::db::models::{Meta, Revision, RevisionStatus};
use crate::errors::Result;
use crate::queue::Queues;
use crate::schema::{Role, TagInfo, TagItem, UserBasicInfo};

// ============================================================================
// Tags
// ============================================================================

#[async_trait]
pub trait TagCommon: Send + Sync {
    /// Tags visibly attached to an object
    async fn object_tags(&self, object_id: &str) -> Result<Vec<TagInfo>>;

    /// Visible tags for many objects at once, keyed by object id
    async fn batch_object_tags(&self, object_ids: &[String]) -> Result<HashMap<String, Vec<TagInfo>>>;

    async fn tag_by_slug(&self, slug_name: &str) -> Result<Lookup<TagInfo>>;

    /// Ids of the tags declared synonyms of `main_tag_id`
    async fn synonym_tag_ids(&self, main_tag_id: &str) -> Result<Vec<String>>;

    async fn tags_by_slugs(&self, slug_names: &[String]) -> Result<Vec<TagInfo>>;

    /// Whether any of the submitted tags is a recommended tag
    async fn exist_recommend(&self, tags: &[TagItem]) -> Result<bool>;

    async fn following_tag_ids(&self, user_id: &str) -> Result<Vec<String>>;

    /// Replace the object's tag set, creating unknown tags
    async fn change_tags(&self, object_id: &str, tags: &[TagItem], user_id: &str) -> Result<()>;

    async fn hide_tag_rels(&self, object_id: &str) -> Result<()>;

    async fn show_tag_rels(&self, object_id: &str) -> Result<()>;

    async fn remove_tag_rels(&self, object_id: &str) -> Result<()>;

    async fn recover_tag_rels(&self, object_id: &str) -> Result<()>;

    /// Recount `object_count` for the given tags
    async fn refresh_tag_counts(&self, tag_ids: &[String]) -> Result<()>;

    /// Recount every tag the object has ever been related to
    async fn refresh_object_tag_counts(&self, object_id: &str) -> Result<()>;
}

// ============================================================================
// Users
// ============================================================================

#[async_trait]
pub trait UserCommon: Send + Sync {
    async fn batch_basic_info(&self, user_ids: &[String]) -> Result<HashMap<String, UserBasicInfo>>;

    async fn get_by_username(&self, username: &str) -> Result<Lookup<UserBasicInfo>>;

    /// Store the user's number of items of `kind`
    async fn update_content_count(&self, kind: ContentKind, user_id: &str, count: u64) -> Result<()>;

    async fn role(&self, user_id: &str) -> Result<Role>;
}

// ============================================================================
// Revisions and review
// ============================================================================

/// Snapshot to record
#[derive(Debug, Clone)]
pub struct NewRevision {
    pub kind: ContentKind,
    pub object_id: String,
    pub user_id: String,
    pub title: String,
    /// JSON of the object and its tags
    pub content: String,
    pub log: String,
    pub status: RevisionStatus,
}

#[async_trait]
pub trait RevisionService: Send + Sync {
    /// Store a revision; a passed revision becomes the object's current revision
    async fn add_revision(&self, revision: NewRevision) -> Result<String>;

    async fn exist_unreviewed(&self, object_id: &str) -> Result<bool>;

    async fn last_revision(&self, object_id: &str) -> Result<Lookup<Revision>>;
}

/// What the review decision looks at
#[derive(Debug, Clone)]
pub struct ReviewSubject {
    pub kind: ContentKind,
    pub object_id: String,
    pub user_id: String,
    pub role: Role,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait ReviewService: Send + Sync {
    /// Status a freshly added item should move to
    async fn review_new(&self, subject: &ReviewSubject) -> Result<ContentStatus>;
}

/// Publishes content from trusted roles, everything when `auto_approve` is set
pub struct ConfigReview {
    config: ReviewConfig,
}

impl ConfigReview {
    pub fn new(config: ReviewConfig) -> Self {
        Self { config }
    }

    pub fn is_trusted(&self, role: Role) -> bool {
        self.config.trusted_roles.iter().any(|r| r == role.as_str())
    }
}

#[async_trait]
impl ReviewService for ConfigReview {
    async fn review_new(&self, subject: &ReviewSubject) -> Result<ContentStatus> {
        if self.config.auto_approve || self.is_trusted(subject.role) {
            Ok(ContentStatus::Available)
        } else {
            tracing::debug!(kind = %subject.kind, object_id = %subject.object_id, "Held for review");
            Ok(ContentStatus::Pending)
        }
    }
}

// ============================================================================
// Meta, interactions, ids
// ============================================================================

#[async_trait]
pub trait MetaService: Send + Sync {
    async fn get_meta(&self, object_id: &str, key: &str) -> Result<Lookup<Meta>>;

    /// Insert, or replace the value of the existing (object, key) row
    async fn upsert_meta(&self, object_id: &str, key: &str, value: &str) -> Result<()>;
}

#[async_trait]
pub trait VoteService: Send + Sync {
    /// `vote_up`, `vote_down` or empty
    async fn vote_status(&self, kind: ContentKind, object_id: &str, user_id: &str) -> Result<String>;
}

#[async_trait]
pub trait FollowService: Send + Sync {
    async fn is_followed(&self, kind: ContentKind, user_id: &str, object_id: &str) -> Result<bool>;

    /// Ids of the objects of `kind` the user follows
    async fn followed_object_ids(&self, kind: ContentKind, user_id: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait CollectionService: Send + Sync {
    /// Subset of `object_ids` the user collected
    async fn collected(&self, user_id: &str, object_ids: &[String]) -> Result<HashSet<String>>;

    /// One page of the user's collected objects of `kind`, newest first, plus the total
    async fn user_collections(
        &self,
        kind: ContentKind,
        user_id: &str,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<String>, u64)>;
}

#[async_trait]
pub trait AnswerLookup: Send + Sync {
    /// Ids of the user's live answers on an object, oldest first
    async fn answer_ids(&self, user_id: &str, object_id: &str) -> Result<Vec<String>>;
}

#[async_trait]
pub trait IdGenerator: Send + Sync {
    async fn next_id(&self, kind: ContentKind) -> Result<String>;
}

// ============================================================================
// Bundle
// ============================================================================

/// Everything a content service calls besides its own repository
#[derive(Clone)]
pub struct Platform {
    pub tags: Arc<dyn TagCommon>,
    pub users: Arc<dyn UserCommon>,
    pub revisions: Arc<dyn RevisionService>,
    pub review: Arc<dyn ReviewService>,
    pub meta: Arc<dyn MetaService>,
    pub votes: Arc<dyn VoteService>,
    pub follows: Arc<dyn FollowService>,
    pub collections: Arc<dyn CollectionService>,
    pub answers: Arc<dyn AnswerLookup>,
    pub queues: Queues,
}

impl Platform {
    /// Postgres-backed collaborators with the configured review policy
    pub fn sql(platform: Arc<SqlPlatform>, review: ReviewConfig, queues: Queues) -> Self {
        Self {
            tags: platform.clone(),
            users: platform.clone(),
            revisions: platform.clone(),
            review: Arc::new(ConfigReview::new(review)),
            meta: platform.clone(),
            votes: platform.clone(),
            follows: platform.clone(),
            collections: platform.clone(),
            answers: platform,
            queues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(role: Role) -> ReviewSubject {
        ReviewSubject {
            kind: ContentKind::Quote,
            object_id: "10110000000000001".into(),
            user_id: "1".into(),
            role,
            title: "Know thyself".into(),
            content: String::new(),
            tags: vec!["wisdom".into()],
        }
    }

    #[tokio::test]
    async fn test_review_holds_regular_users() {
        let review = ConfigReview::new(ReviewConfig::default());
        assert_eq!(review.review_new(&subject(Role::User)).await.unwrap(), ContentStatus::Pending);
        assert_eq!(
            review.review_new(&subject(Role::Moderator)).await.unwrap(),
            ContentStatus::Available
        );
    }

    #[tokio::test]
    async fn test_review_auto_approve() {
        let review = ConfigReview::new(ReviewConfig {
            auto_approve: true,
            trusted_roles: Vec::new(),
        });
        assert_eq!(review.review_new(&subject(Role::User)).await.unwrap(), ContentStatus::Available);
        assert!(!review.is_trusted(Role::Admin));
    }
}
