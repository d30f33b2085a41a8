//! Formatting shared by every content service
//!
//! Turns rows into response shapes and batches the lookups they need
//! (tags, users, collections, related author and piece) per page rather
//! than per row.

use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::RelatedRepos;
use crate::config::ContentConfig;
use crate::content::{ContentEntity, ContentExtra, ContentStatus, RequestContext, ShowState};
use crate::db::ContentRepo;
use crate::errors::Result;
use crate::platform::Platform;
use crate::schema::{
    CloseReasonMeta, ContentInfo, ContentPageItem, Operation, Operator, RelatedBasicInfo, SitemapEntry, TagInfo,
};
use crate::text;

const DETAIL_EXCERPT_LEN: usize = 120;
const LIST_EXCERPT_LEN: usize = 80;
const EXCERPT_MARKER: &str = "...";

/// Timestamps at or before the epoch are reported as 0
fn timestamp(at: DateTimeWithTimeZone) -> i64 {
    let ts = at.timestamp();
    if ts < 1 {
        0
    } else {
        ts
    }
}

fn encoded_extra(ctx: &RequestContext, extra: ContentExtra) -> ContentExtra {
    ContentExtra {
        quote_author_id: extra.quote_author_id.map(|id| ctx.encode(&id)),
        quote_piece_id: extra.quote_piece_id.map(|id| ctx.encode(&id)),
        ..extra
    }
}

fn basic_info<T: ContentEntity>(ctx: &RequestContext, entity: &T) -> RelatedBasicInfo {
    RelatedBasicInfo {
        id: ctx.encode(entity.id()),
        name: entity.name().to_string(),
        avatar: entity.extra().avatar.unwrap_or_default(),
    }
}

/// Display title, falling back to the excerpt for untitled rows
fn title_or(entity_name: &str, description: &str) -> String {
    if entity_name.is_empty() {
        description.to_string()
    } else {
        entity_name.to_string()
    }
}

/// Detail shape of a row without any joined data; tags start empty
pub fn show_format<E: ContentEntity>(ctx: &RequestContext, entity: &E) -> ContentInfo {
    let counters = entity.counters();
    let html = entity.parsed_text().to_string();
    let description = text::excerpt(&html, EXCERPT_MARKER, DETAIL_EXCERPT_LEN);
    let title = title_or(entity.name(), &description);
    let updated = entity.updated_at();

    ContentInfo {
        id: ctx.encode(entity.id()),
        url_title: text::url_title(&title),
        title,
        content: entity.original_text().to_string(),
        html,
        description,
        tags: Vec::new(),
        view_count: counters.view_count,
        unique_view_count: counters.unique_view_count,
        vote_count: counters.vote_count,
        collection_count: counters.collection_count,
        follow_count: counters.follow_count,
        comment_count: counters.comment_count,
        status: entity.status_code(),
        pin: entity.pin_code(),
        show: entity.show_code(),
        create_time: timestamp(entity.created_at()),
        update_time: timestamp(entity.post_update_time().unwrap_or(updated)),
        edit_time: timestamp(updated),
        user_id: entity.user_id().to_string(),
        extra: encoded_extra(ctx, entity.extra()),
        ..Default::default()
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotTags {
    #[serde(default)]
    tags: Vec<TagInfo>,
}

/// Related author/piece info keyed by raw id
#[derive(Debug, Default)]
struct RelatedInfo {
    authors: HashMap<String, RelatedBasicInfo>,
    pieces: HashMap<String, RelatedBasicInfo>,
}

impl RelatedInfo {
    fn for_entity<E: ContentEntity>(&self, entity: &E) -> (Option<RelatedBasicInfo>, Option<RelatedBasicInfo>) {
        let extra = entity.extra();
        let author = extra.quote_author_id.and_then(|id| self.authors.get(&id).cloned());
        let piece = extra.quote_piece_id.and_then(|id| self.pieces.get(&id).cloned());
        (author, piece)
    }
}

/// Shared formatting and bookkeeping for one content kind
pub struct ContentCommon<E: ContentEntity> {
    repo: Arc<dyn ContentRepo<E>>,
    platform: Platform,
    config: Arc<ContentConfig>,
    related: Option<RelatedRepos>,
}

impl<E: ContentEntity> Clone for ContentCommon<E> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            platform: self.platform.clone(),
            config: self.config.clone(),
            related: self.related.clone(),
        }
    }
}

impl<E: ContentEntity> ContentCommon<E> {
    pub fn new(
        repo: Arc<dyn ContentRepo<E>>,
        platform: Platform,
        config: Arc<ContentConfig>,
        related: Option<RelatedRepos>,
    ) -> Self {
        Self {
            repo,
            platform,
            config,
            related,
        }
    }

    /// Full detail of one row for a (possibly anonymous) viewer
    pub async fn info(&self, ctx: &RequestContext, id: &str, login_user_id: &str) -> Result<ContentInfo> {
        let kind = E::KIND;
        let entity = self.repo.get(id).await?.require(kind.object_type(), id)?;
        let mut info = show_format(ctx, &entity);

        if entity.is_status(ContentStatus::Closed) {
            info.operation = self.close_operation(id).await;
        }

        info.tags = if entity.is_status(ContentStatus::Deleted) {
            // live relations are gone once deleted
            self.revision_tags(id).await?
        } else {
            self.platform.tags.object_tags(id).await?
        };

        let owner = entity.user_id().to_string();
        let users = self.platform.users.batch_basic_info(std::slice::from_ref(&owner)).await?;
        info.user_info = users.get(&owner).cloned();

        if !login_user_id.is_empty() {
            info.vote_status = self.platform.votes.vote_status(kind, id, login_user_id).await?;
            info.is_followed = self.platform.follows.is_followed(kind, login_user_id, id).await?;
            let answers = self.platform.answers.answer_ids(login_user_id, id).await?;
            if let Some(first) = answers.first() {
                info.answered = true;
                info.first_answer_id = ctx.encode(first);
            }
            let ids = [id.to_string()];
            info.collected = self
                .platform
                .collections
                .collected(login_user_id, &ids)
                .await?
                .contains(id);
        }

        let related = self.related_info(ctx, std::slice::from_ref(&entity)).await?;
        let (author, piece) = related.for_entity(&entity);
        info.quote_author_basic_info = author;
        info.quote_piece_basic_info = piece;

        Ok(info)
    }

    async fn close_operation(&self, id: &str) -> Option<Operation> {
        let key = E::KIND.close_reason_meta_key();
        let meta = match self.platform.meta.get_meta(id, &key).await {
            Ok(found) => found.found()?,
            Err(e) => {
                error!(id, error = %e, "Failed to load close reason");
                return None;
            }
        };
        let reason: CloseReasonMeta = match serde_json::from_str(&meta.value) {
            Ok(reason) => reason,
            Err(e) => {
                error!(id, error = %e, "Malformed close reason meta");
                return None;
            }
        };
        let Some(config) = self.config.close_reason(reason.close_type) else {
            warn!(id, close_type = reason.close_type, "Close reason no longer configured");
            return None;
        };
        Some(Operation {
            operation_type: config.name.clone(),
            operation_description: config.description.clone(),
            operation_msg: reason.close_msg,
            operation_time: timestamp(meta.created_at),
            level: "info".to_string(),
        })
    }

    async fn revision_tags(&self, id: &str) -> Result<Vec<TagInfo>> {
        let Some(revision) = self.platform.revisions.last_revision(id).await?.found() else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<SnapshotTags>(&revision.content) {
            Ok(snapshot) => Ok(snapshot.tags),
            Err(e) => {
                warn!(id, revision_id = revision.id, error = %e, "Unreadable revision snapshot");
                Ok(Vec::new())
            }
        }
    }

    async fn related_info(&self, ctx: &RequestContext, entities: &[E]) -> Result<RelatedInfo> {
        let Some(related) = &self.related else {
            return Ok(RelatedInfo::default());
        };
        let mut author_ids = HashSet::new();
        let mut piece_ids = HashSet::new();
        for entity in entities {
            let extra = entity.extra();
            author_ids.extend(extra.quote_author_id.filter(|id| !id.is_empty()));
            piece_ids.extend(extra.quote_piece_id.filter(|id| !id.is_empty()));
        }
        if author_ids.is_empty() && piece_ids.is_empty() {
            return Ok(RelatedInfo::default());
        }

        let author_ids: Vec<String> = author_ids.into_iter().collect();
        let piece_ids: Vec<String> = piece_ids.into_iter().collect();
        let (authors, pieces) = futures::try_join!(
            related.authors.find_by_ids(&author_ids),
            related.pieces.find_by_ids(&piece_ids),
        )?;

        Ok(RelatedInfo {
            authors: authors
                .iter()
                .map(|a| (a.id().to_string(), basic_info(ctx, a)))
                .collect(),
            pieces: pieces
                .iter()
                .map(|p| (p.id().to_string(), basic_info(ctx, p)))
                .collect(),
        })
    }

    /// List entries for a page of rows
    pub async fn format_page(&self, ctx: &RequestContext, rows: Vec<E>) -> Result<Vec<ContentPageItem>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|e| e.id().to_string()).collect();
        let user_ids: Vec<String> = rows.iter().map(|e| e.user_id().to_string()).collect();

        let (tags, users, related) = futures::try_join!(
            self.platform.tags.batch_object_tags(&ids),
            self.platform.users.batch_basic_info(&user_ids),
            self.related_info(ctx, &rows),
        )?;

        Ok(rows
            .iter()
            .map(|entity| {
                let counters = entity.counters();
                let description = text::excerpt(entity.parsed_text(), EXCERPT_MARKER, LIST_EXCERPT_LEN);
                let title = title_or(entity.name(), &description);
                let created = timestamp(entity.created_at());
                let (author, piece) = related.for_entity(entity);
                ContentPageItem {
                    id: ctx.encode(entity.id()),
                    created_at: created,
                    url_title: text::url_title(&title),
                    title,
                    description,
                    pin: entity.pin_code(),
                    show: entity.show_code(),
                    status: entity.status_code(),
                    tags: tags.get(entity.id()).cloned().unwrap_or_default(),
                    vote_count: counters.vote_count,
                    view_count: counters.view_count,
                    collection_count: counters.collection_count,
                    follow_count: counters.follow_count,
                    comment_count: counters.comment_count,
                    operated_at: created,
                    operation_type: "asked".to_string(),
                    operator: users.get(entity.user_id()).map(Operator::from),
                    extra: encoded_extra(ctx, entity.extra()),
                    quote_author_basic_info: author,
                    quote_piece_basic_info: piece,
                }
            })
            .collect())
    }

    /// Detail shapes for rows, with tags, users and collected flags
    pub async fn format_list(&self, ctx: &RequestContext, rows: &[E], login_user_id: &str) -> Result<Vec<ContentInfo>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|e| e.id().to_string()).collect();
        let user_ids: Vec<String> = rows.iter().map(|e| e.user_id().to_string()).collect();

        let tags = self.platform.tags.batch_object_tags(&ids).await?;
        let users = self.platform.users.batch_basic_info(&user_ids).await?;
        let collected = if login_user_id.is_empty() {
            HashSet::new()
        } else {
            self.platform.collections.collected(login_user_id, &ids).await?
        };
        let related = self.related_info(ctx, rows).await?;

        Ok(rows
            .iter()
            .map(|entity| {
                let mut info = show_format(ctx, entity);
                info.tags = tags.get(entity.id()).cloned().unwrap_or_default();
                info.user_info = users.get(entity.user_id()).cloned();
                info.collected = collected.contains(entity.id());
                let (author, piece) = related.for_entity(entity);
                info.quote_author_basic_info = author;
                info.quote_piece_basic_info = piece;
                info
            })
            .collect())
    }

    /// Formatted rows keyed by raw id; unknown ids are skipped
    pub async fn find_info_by_ids(
        &self,
        ctx: &RequestContext,
        ids: &[String],
        login_user_id: &str,
    ) -> Result<HashMap<String, ContentInfo>> {
        let rows = self.repo.find_by_ids(ids).await?;
        let infos = self.format_list(ctx, &rows, login_user_id).await?;
        Ok(rows
            .iter()
            .map(|e| e.id().to_string())
            .zip(infos)
            .collect())
    }

    pub async fn update_pv(&self, id: &str) -> Result<()> {
        self.repo.update_pv_count(id).await
    }

    pub async fn update_collection_count(&self, id: &str) -> Result<i64> {
        self.repo.update_collection_count(id).await
    }

    /// Non-deleted items of a user, hidden ones included
    pub async fn user_count(&self, user_id: &str) -> Result<u64> {
        self.repo.user_count(user_id, None).await
    }

    /// Count shown on a profile: hidden items only for the owner and admins
    pub async fn personal_user_count(&self, user_id: &str, login_user_id: &str, is_admin: bool) -> Result<u64> {
        let show = if is_admin || (!login_user_id.is_empty() && login_user_id == user_id) {
            None
        } else {
            Some(ShowState::Show)
        };
        self.repo.user_count(user_id, show).await
    }

    /// Store the user's current count on the user row; failures are logged
    pub async fn sync_user_count(&self, user_id: &str) {
        let outcome = match self.user_count(user_id).await {
            Ok(count) => {
                self.platform
                    .users
                    .update_content_count(E::KIND, user_id, count)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            error!(kind = %E::KIND, user_id, error = %e, "Failed to update user content count");
        }
    }

    pub async fn update_search(&self, id: &str) -> Result<()> {
        self.repo.update_search(id).await
    }

    /// Soft delete everything a user posted of this kind
    pub async fn remove_all_user_content(&self, user_id: &str) -> Result<Vec<String>> {
        let ids = self.repo.remove_all_by_user(user_id).await?;
        for id in &ids {
            if let Err(e) = self.platform.tags.remove_tag_rels(id).await {
                error!(kind = %E::KIND, id = %id, error = %e, "Failed to remove tag relations");
                continue;
            }
            if let Err(e) = self.platform.tags.refresh_object_tag_counts(id).await {
                error!(kind = %E::KIND, id = %id, error = %e, "Failed to refresh tag counts");
            }
        }
        self.sync_user_count(user_id).await;
        info!(kind = %E::KIND, user_id, removed = ids.len(), "Removed user content");
        Ok(ids)
    }

    /// One sitemap page of at most `sitemap_max_size` entries
    pub async fn sitemap(&self, page: u64, short_id: bool) -> Result<Vec<SitemapEntry>> {
        self.repo.sitemap(page, self.config.sitemap_max_size, short_id).await
    }

    /// Warm the sitemap cache, returning the number of pages
    pub async fn sitemap_cron(&self, short_id: bool) -> Result<u64> {
        let kind = E::KIND;
        let total = self.repo.count().await?;
        let max = self.config.sitemap_max_size.max(1);

        let pages = if total <= max {
            self.repo.sitemap(1, total, short_id).await?;
            1
        } else {
            let pages = total.div_ceil(max);
            for page in 1..=pages {
                self.repo.sitemap(page, max, short_id).await?;
            }
            pages
        };

        info!(kind = %kind, total, pages, "Sitemap refreshed");
        Ok(pages)
    }
}
