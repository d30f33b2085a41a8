//! Lifecycle, listing and admin operations for one content kind
//!
//! Ids arriving in requests may be short ids and are decoded here; ids in
//! responses are encoded per `RequestContext`. Side effects that are not
//! part of the caller's contract (search indexing, tag counts, user counts,
//! queue sends) are logged on failure and never fail the request.

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::common::ContentCommon;
use super::permission::ContentPermission;
use super::{RelatedRepos, Viewer};
use crate::config::ContentConfig;
use crate::content::{
    ActivityType, ContentEntity, ContentKind, ContentStatus, EventType, Lookup, NewContent, OperationKind, OrderCond,
    PinState, RequestContext, ShowState, TagPolicy,
};
use crate::db::models::RevisionStatus;
use crate::db::query::{AdminPageQuery, PageQuery, RecommendQuery};
use crate::db::ContentRepo;
use crate::errors::{reason, AppError, Result};
use crate::platform::{NewRevision, Platform, ReviewSubject};
use crate::queue::{ActivityMsg, EventMsg, ExternalNotificationMsg, NotificationMsg};
use crate::schema::{
    AddContentReq, AdminContentItem, AdminPageReq, AdminSetStatusReq, CloseReq, ContentBaseInfo, ContentInfo,
    ContentPageItem, ObjectReq, Operation, OperationReq, PageReq, Paginated, PersonalCollectionReq, PersonalPageReq,
    RecommendReq, RemoveReq, TagInfo, TagItem, UpdateContentReq, UserContentInfo,
};
use crate::short_id;
use crate::text;

/// Close reason whose message must be a link to the original
const DUPLICATE_REASON_KEY: &str = "reason.duplicate";

fn is_url(value: &str) -> bool {
    reqwest::Url::parse(value.trim())
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

/// Slugs may not contain spaces
fn normalize_tags(tags: &[TagItem]) -> Vec<TagItem> {
    tags.iter()
        .map(|tag| TagItem {
            slug_name: tag.slug_name.trim().replace(' ', "-"),
            ..tag.clone()
        })
        .collect()
}

fn slug_set(tags: &[TagItem]) -> BTreeSet<String> {
    tags.iter().map(|t| t.slug_name.clone()).collect()
}

fn tags_field_error(reason_key: &str, message: impl Into<String>) -> AppError {
    AppError::bad_request(reason_key).with_field("tags", message)
}

fn moderators_only(slugs: &[String]) -> String {
    let quoted: Vec<String> = slugs.iter().map(|s| format!("\"{s}\"")).collect();
    format!("{} can only be used by moderators.", quoted.join(","))
}

/// Tag infos for a snapshot: stored tags first, unknown slugs as bare entries
fn snapshot_tags(items: &[TagItem], known: &[TagInfo]) -> Vec<TagInfo> {
    items
        .iter()
        .map(|item| {
            known
                .iter()
                .find(|t| t.slug_name == item.slug_name)
                .cloned()
                .unwrap_or_else(|| TagInfo {
                    slug_name: item.slug_name.clone(),
                    display_name: item.display_name.clone(),
                    ..Default::default()
                })
        })
        .collect()
}

fn epoch_seconds(at: DateTimeWithTimeZone) -> i64 {
    at.timestamp().max(0)
}

/// Operations on one content kind
pub struct ContentService<E: ContentEntity> {
    repo: Arc<dyn ContentRepo<E>>,
    common: ContentCommon<E>,
    platform: Platform,
    config: Arc<ContentConfig>,
}

impl<E: ContentEntity> ContentService<E> {
    pub fn new(
        repo: Arc<dyn ContentRepo<E>>,
        platform: Platform,
        config: Arc<ContentConfig>,
        related: Option<RelatedRepos>,
    ) -> Self {
        let common = ContentCommon::new(repo.clone(), platform.clone(), config.clone(), related);
        Self {
            repo,
            common,
            platform,
            config,
        }
    }

    pub fn common(&self) -> &ContentCommon<E> {
        &self.common
    }

    fn kind(&self) -> ContentKind {
        E::KIND
    }

    /// Whether `user_id` created the row; false when the row is missing
    pub async fn is_owner(&self, id: &str, user_id: &str) -> Result<bool> {
        if user_id.is_empty() {
            return Ok(false);
        }
        let id = short_id::decode(id);
        Ok(self
            .repo
            .get(&id)
            .await?
            .found()
            .is_some_and(|entity| entity.user_id() == user_id))
    }

    // ========================================================================
    // Outbox helpers
    // ========================================================================

    fn send_activity(
        &self,
        user_id: &str,
        object_id: &str,
        activity: ActivityType,
        trigger_user_id: Option<&str>,
        revision_id: Option<String>,
    ) {
        self.platform.queues.activity.send(ActivityMsg {
            user_id: user_id.to_string(),
            trigger_user_id: trigger_user_id.map(str::to_string),
            object_id: object_id.to_string(),
            original_object_id: object_id.to_string(),
            activity_type: self.kind().activity_key(activity),
            revision_id,
        });
    }

    fn send_event(&self, event: EventType, user_id: &str, object_id: &str, object_user_id: &str) {
        self.platform.queues.event.send(EventMsg {
            event_type: self.kind().event_key(event),
            user_id: user_id.to_string(),
            target_id: object_id.to_string(),
            object_id: object_id.to_string(),
            object_user_id: object_user_id.to_string(),
        });
    }

    fn send_owner_notification(&self, entity: &E, trigger_user_id: &str, action: String) {
        self.platform.queues.notification.send(NotificationMsg {
            object_id: entity.id().to_string(),
            object_type: self.kind().object_type().to_string(),
            receiver_user_id: entity.user_id().to_string(),
            trigger_user_id: trigger_user_id.to_string(),
            action,
        });
    }

    /// JSON snapshot of the row plus its tags, stored with revisions
    fn snapshot(entity: &E, tags: &[TagInfo]) -> Result<String> {
        let mut value = serde_json::to_value(entity)?;
        if let serde_json::Value::Object(map) = &mut value {
            map.insert("tags".to_string(), serde_json::to_value(tags)?);
        }
        Ok(value.to_string())
    }

    async fn refresh_tag_counts_logged(&self, id: &str, tags: &[TagInfo]) {
        if tags.is_empty() {
            return;
        }
        let tag_ids: Vec<String> = tags.iter().map(|t| t.id.clone()).collect();
        if let Err(e) = self.platform.tags.refresh_tag_counts(&tag_ids).await {
            error!(kind = %self.kind(), id, error = %e, "Failed to refresh tag counts");
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Close with a configured reason; missing rows are ignored
    pub async fn close(&self, req: CloseReq) -> Result<()> {
        let id = short_id::decode(&req.id);
        if !self.repo.get(&id).await?.is_found() {
            return Ok(());
        }

        let close_reason = self
            .config
            .close_reason(req.close_type)
            .ok_or_else(|| AppError::bad_request(reason::REASON_NOT_FOUND))?;
        if close_reason.key == DUPLICATE_REASON_KEY && !is_url(&req.close_msg) {
            return Err(AppError::bad_request(reason::INVALID_URL));
        }

        self.repo.update_status(&id, ContentStatus::Closed).await?;

        let meta = serde_json::to_string(&crate::schema::CloseReasonMeta {
            close_type: req.close_type,
            close_msg: req.close_msg.clone(),
        })?;
        self.platform
            .meta
            .upsert_meta(&id, &self.kind().close_reason_meta_key(), &meta)
            .await?;

        self.send_activity(&req.user_id, &id, ActivityType::Closed, None, None);
        crate::metrics::record_content_op(self.kind().object_type(), "close");
        info!(kind = %self.kind(), id = %id, close_type = req.close_type, "Content closed");
        Ok(())
    }

    /// Back to `Available`; missing rows are ignored
    pub async fn reopen(&self, req: ObjectReq) -> Result<()> {
        let id = short_id::decode(&req.id);
        if !self.repo.get(&id).await?.is_found() {
            return Ok(());
        }
        self.repo.update_status(&id, ContentStatus::Available).await?;
        self.send_activity(&req.user_id, &id, ActivityType::Reopened, None, None);
        crate::metrics::record_content_op(self.kind().object_type(), "reopen");
        Ok(())
    }

    /// Pin, unpin, hide or show. Hidden items cannot be pinned and pinned
    /// items cannot be hidden; such requests are no-ops.
    pub async fn operation(&self, req: OperationReq) -> Result<()> {
        let id = short_id::decode(&req.id);
        let Some(mut entity) = self.repo.get(&id).await?.found() else {
            return Ok(());
        };

        match req.operation {
            OperationKind::Pin if entity.show() == ShowState::Hide => return Ok(()),
            OperationKind::Hide if entity.pin() == PinState::Pin => return Ok(()),
            _ => {}
        }

        let activity = match req.operation {
            OperationKind::Pin => {
                entity.set_pin(PinState::Pin);
                ActivityType::Pin
            }
            OperationKind::Unpin => {
                entity.set_pin(PinState::UnPin);
                ActivityType::Unpin
            }
            OperationKind::Hide => {
                entity.set_show(ShowState::Hide);
                self.platform.tags.hide_tag_rels(&id).await?;
                self.platform.tags.refresh_object_tag_counts(&id).await?;
                ActivityType::Hide
            }
            OperationKind::Show => {
                entity.set_show(ShowState::Show);
                self.platform.tags.show_tag_rels(&id).await?;
                self.platform.tags.refresh_object_tag_counts(&id).await?;
                ActivityType::Show
            }
        };

        self.repo.update_operation(&entity).await?;
        self.send_activity(&req.user_id, &id, activity, None, None);
        crate::metrics::record_content_op(self.kind().object_type(), activity.as_str());
        Ok(())
    }

    /// Soft delete. Repeated calls are no-ops; only admins may delete
    /// someone else's item.
    pub async fn remove(&self, req: RemoveReq) -> Result<()> {
        let id = short_id::decode(&req.id);
        let Some(entity) = self.repo.get(&id).await?.found() else {
            return Ok(());
        };
        if entity.is_status(ContentStatus::Deleted) {
            return Ok(());
        }
        if !req.is_admin && entity.user_id() != req.user_id {
            return Err(AppError::bad_request(self.kind().reason("cannot_deleted")));
        }

        self.repo
            .update_status_keep_time(&id, ContentStatus::Deleted)
            .await?;
        self.common.sync_user_count(entity.user_id()).await;

        let tags = match self.platform.tags.object_tags(&id).await {
            Ok(tags) => tags,
            Err(e) => {
                error!(kind = %self.kind(), id = %id, error = %e, "Failed to load tags of removed content");
                return Ok(());
            }
        };
        if let Err(e) = self.platform.tags.remove_tag_rels(&id).await {
            error!(kind = %self.kind(), id = %id, error = %e, "Failed to remove tag relations");
        }
        self.refresh_tag_counts_logged(&id, &tags).await;

        self.send_activity(
            entity.user_id(),
            &id,
            ActivityType::Deleted,
            Some(&req.user_id),
            None,
        );
        self.send_event(EventType::Delete, &req.user_id, &id, entity.user_id());
        crate::metrics::record_content_op(self.kind().object_type(), "remove");
        info!(kind = %self.kind(), id = %id, by = %req.user_id, "Content removed");
        Ok(())
    }

    /// Undo a soft delete. Fails when the row never existed; other statuses are no-ops.
    pub async fn recover(&self, req: ObjectReq) -> Result<()> {
        let id = short_id::decode(&req.id);
        let entity = self
            .repo
            .get(&id)
            .await?
            .require(self.kind().object_type(), &id)?;
        if !entity.is_status(ContentStatus::Deleted) {
            return Ok(());
        }

        self.repo.recover(&id).await?;
        self.common.sync_user_count(entity.user_id()).await;

        if let Err(e) = self.platform.tags.recover_tag_rels(&id).await {
            error!(kind = %self.kind(), id = %id, error = %e, "Failed to recover tag relations");
        }
        let tags = self.platform.tags.object_tags(&id).await?;
        self.refresh_tag_counts_logged(&id, &tags).await;

        self.send_activity(
            &req.user_id,
            &id,
            ActivityType::Undeleted,
            Some(&req.user_id),
            None,
        );
        crate::metrics::record_content_op(self.kind().object_type(), "recover");
        Ok(())
    }

    // ========================================================================
    // Add and update
    // ========================================================================

    /// Row fields from an add request
    pub fn new_content(req: &AddContentReq) -> NewContent {
        let html = if req.html.is_empty() {
            req.content.clone()
        } else {
            req.html.clone()
        };
        NewContent {
            user_id: req.user_id.clone(),
            name: req.title.trim().to_string(),
            original_text: req.content.clone(),
            parsed_text: html,
            avatar: req.avatar.clone(),
            bio: req.bio.clone(),
            publish_date: req
                .publish_date
                .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
                .map(DateTimeWithTimeZone::from),
            piece_type: req.piece_type,
            quote_author_id: String::new(),
            quote_piece_id: String::new(),
        }
    }

    /// Tag rules for new content; returns the normalized tags
    pub(crate) async fn check_new_tags(&self, req: &AddContentReq) -> Result<Vec<TagItem>> {
        let tags = normalize_tags(&req.tags);
        if self.kind().tag_policy() == TagPolicy::IfPresent && tags.is_empty() {
            return Ok(tags);
        }
        if tags.is_empty() {
            return Err(tags_field_error(reason::RECOMMEND_TAG_ENTER, reason::TAG_NOT_FOUND));
        }
        if !self.platform.tags.exist_recommend(&tags).await? {
            return Err(tags_field_error(
                reason::RECOMMEND_TAG_ENTER,
                reason::RECOMMEND_TAG_ENTER,
            ));
        }

        if !req.can_use_reserved_tag {
            let slugs: Vec<String> = slug_set(&tags).into_iter().collect();
            let reserved: Vec<String> = self
                .platform
                .tags
                .tags_by_slugs(&slugs)
                .await?
                .into_iter()
                .filter(|t| t.reserved)
                .map(|t| t.display_name)
                .collect();
            if !reserved.is_empty() {
                return Err(tags_field_error(reason::RECOMMEND_TAG_ENTER, moderators_only(&reserved)));
            }
        }
        Ok(tags)
    }

    /// Create a row from `input` after tag checks, review and bookkeeping
    pub async fn create(&self, req: &AddContentReq, input: NewContent) -> Result<E> {
        let tags = self.check_new_tags(req).await?;
        self.insert(req, input, tags).await
    }

    /// Persist a row whose tags already passed `check_new_tags`
    async fn insert(&self, req: &AddContentReq, input: NewContent, tags: Vec<TagItem>) -> Result<E> {
        let kind = self.kind();

        let now: DateTimeWithTimeZone = Utc::now().into();
        let mut entity = E::new_pending(&input, now);
        entity.set_post_update_time(now);
        self.repo.add(&mut entity).await?;
        let id = entity.id().to_string();

        let status = self
            .platform
            .review
            .review_new(&ReviewSubject {
                kind,
                object_id: id.clone(),
                user_id: req.user_id.clone(),
                role: req.role,
                title: entity.name().to_string(),
                content: entity.original_text().to_string(),
                tags: tags.iter().map(|t| t.slug_name.clone()).collect(),
            })
            .await?;
        if status != ContentStatus::Pending {
            self.repo.update_status(&id, status).await?;
            entity.set_status(status);
        }

        self.platform.tags.change_tags(&id, &tags, &req.user_id).await?;
        if let Err(e) = self.repo.update_search(&id).await {
            warn!(kind = %kind, id = %id, error = %e, "Search index update failed");
        }

        let tag_infos = self.platform.tags.object_tags(&id).await?;
        let revision_id = self
            .platform
            .revisions
            .add_revision(NewRevision {
                kind,
                object_id: id.clone(),
                user_id: req.user_id.clone(),
                title: entity.name().to_string(),
                content: Self::snapshot(&entity, &tag_infos)?,
                log: String::new(),
                status: RevisionStatus::ReviewPassed,
            })
            .await?;
        entity.set_revision_id(revision_id.clone());
        self.common.sync_user_count(&req.user_id).await;

        self.send_activity(&req.user_id, &id, ActivityType::Asked, None, Some(revision_id));
        if status == ContentStatus::Available {
            self.platform.queues.external.send(ExternalNotificationMsg {
                object_id: id.clone(),
                title: entity.name().to_string(),
                user_id: req.user_id.clone(),
                tags: tag_infos.iter().map(|t| t.slug_name.clone()).collect(),
            });
        }
        self.send_event(EventType::Create, &req.user_id, &id, &req.user_id);
        crate::metrics::record_content_op(kind.object_type(), "add");
        info!(kind = %kind, id = %id, status = %status, "Content added");
        Ok(entity)
    }

    /// Create a row and return its detail as seen by the author
    pub async fn add(&self, ctx: &RequestContext, req: AddContentReq) -> Result<ContentInfo> {
        let input = Self::new_content(&req);
        self.add_with(ctx, req, input).await
    }

    /// `add` with caller-prepared row fields
    pub async fn add_with(&self, ctx: &RequestContext, req: AddContentReq, input: NewContent) -> Result<ContentInfo> {
        let tags = self.check_new_tags(&req).await?;
        self.add_checked(ctx, req, input, tags).await
    }

    /// `add_with` for tags the caller already checked
    pub(crate) async fn add_checked(
        &self,
        ctx: &RequestContext,
        req: AddContentReq,
        input: NewContent,
        tags: Vec<TagItem>,
    ) -> Result<ContentInfo> {
        let entity = self.insert(&req, input, tags).await?;
        let viewer = Viewer::new(req.user_id.clone(), req.role);
        self.get(ctx, entity.id(), &viewer).await
    }

    /// Edit title, body and tags. Returns `None` when the row does not exist.
    ///
    /// Trusted editors apply the change directly; everyone else records an
    /// unreviewed revision. Nothing is written when nothing changed.
    pub async fn update(&self, ctx: &RequestContext, req: UpdateContentReq) -> Result<Option<ContentInfo>> {
        let kind = self.kind();
        let id = short_id::decode(&req.id);
        let viewer = Viewer::new(req.user_id.clone(), req.role);

        if self.platform.revisions.exist_unreviewed(&id).await? {
            return Err(AppError::bad_request(kind.reason("cannot_update")));
        }
        let Some(mut entity) = self.repo.get(&id).await?.found() else {
            return Ok(None);
        };
        if entity.is_status(ContentStatus::Deleted) {
            return Err(AppError::bad_request(kind.reason("cannot_update")));
        }

        let tags = normalize_tags(&req.tags);
        let old_tags = self.platform.tags.object_tags(&id).await?;
        let new_slugs = slug_set(&tags);
        let old_slugs: BTreeSet<String> = old_tags.iter().map(|t| t.slug_name.clone()).collect();
        let title = req.title.trim().to_string();

        if new_slugs == old_slugs && entity.name() == title && entity.original_text() == req.content {
            return self.get(ctx, &id, &viewer).await.map(Some);
        }

        let slugs: Vec<String> = new_slugs.iter().cloned().collect();
        let new_tags = self.platform.tags.tags_by_slugs(&slugs).await?;

        if !req.can_use_reserved_tag {
            if let Some(missing) = old_tags
                .iter()
                .find(|t| t.reserved && !new_slugs.contains(&t.slug_name))
            {
                let message = format!("The reserved tag \"{}\" must be present.", missing.display_name);
                return Err(AppError::bad_request_msg(reason::REQUEST_FORMAT, message.clone()).with_field("tags", message));
            }
            let added_reserved: Vec<String> = new_tags
                .iter()
                .filter(|t| t.reserved && !old_slugs.contains(&t.slug_name))
                .map(|t| t.display_name.clone())
                .collect();
            if !added_reserved.is_empty() {
                let message = moderators_only(&added_reserved);
                return Err(AppError::bad_request_msg(reason::REQUEST_FORMAT, message.clone()).with_field("tags", message));
            }
        }

        if kind.tag_policy() == TagPolicy::Required || !tags.is_empty() {
            if tags.is_empty() || !self.platform.tags.exist_recommend(&tags).await? {
                return Err(tags_field_error(
                    reason::RECOMMEND_TAG_ENTER,
                    reason::RECOMMEND_TAG_ENTER,
                ));
            }
        }

        let html = if req.html.is_empty() {
            req.content.clone()
        } else {
            req.html.clone()
        };
        let now: DateTimeWithTimeZone = Utc::now().into();
        entity.set_name(title);
        entity.set_content(req.content.clone(), html);
        entity.set_updated_at(now);
        entity.set_post_update_time(now);

        let (status, revision_user) = if req.no_need_review {
            self.repo.update(&entity, kind.edit_columns()).await?;
            self.platform
                .tags
                .change_tags(&id, &tags, &req.user_id)
                .await?;
            (RevisionStatus::ReviewPassed, entity.user_id().to_string())
        } else {
            (RevisionStatus::Unreviewed, req.user_id.clone())
        };

        let revision_id = self
            .platform
            .revisions
            .add_revision(NewRevision {
                kind,
                object_id: id.clone(),
                user_id: revision_user,
                title: entity.name().to_string(),
                content: Self::snapshot(&entity, &snapshot_tags(&tags, &new_tags))?,
                log: req.edit_summary.clone(),
                status,
            })
            .await?;

        if req.no_need_review {
            self.send_activity(
                &req.user_id,
                &id,
                ActivityType::Edited,
                None,
                Some(revision_id),
            );
            self.send_event(EventType::Update, &req.user_id, &id, entity.user_id());
        }
        crate::metrics::record_content_op(kind.object_type(), "update");
        info!(kind = %kind, id = %id, applied = req.no_need_review, "Content updated");

        self.get(ctx, &id, &viewer).await.map(Some)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Detail with viewer permissions applied. Deleted and pending items are
    /// visible only to their owner and to staff.
    pub async fn get(&self, ctx: &RequestContext, id: &str, viewer: &Viewer) -> Result<ContentInfo> {
        let id = short_id::decode(id);
        let mut info = self.common.info(ctx, &id, &viewer.user_id).await?;

        let is_owner = viewer.is(&info.user_id);
        let status = ContentStatus::from_i32(info.status);
        let mut permission = ContentPermission::for_viewer(viewer.role, is_owner);

        let restricted = matches!(status, Some(ContentStatus::Deleted | ContentStatus::Pending));
        if restricted && !permission.can_reopen && !is_owner {
            return Err(AppError::not_found(self.kind().object_type(), id));
        }

        permission.adjust(status, PinState::from_i32(info.pin), ShowState::from_i32(info.show));

        match status {
            Some(ContentStatus::Deleted) => {
                info.operation = Some(Operation {
                    operation_msg: self.kind().reason("already_deleted"),
                    level: "danger".to_string(),
                    ..Default::default()
                });
            }
            Some(ContentStatus::Pending) => {
                info.operation = Some(Operation {
                    operation_msg: self.kind().reason("under_review"),
                    level: "secondary".to_string(),
                    ..Default::default()
                });
            }
            _ => {}
        }

        info.member_actions = permission.member_actions(viewer.is_logged_in(), is_owner, status);
        Ok(info)
    }

    /// `get`, then count the view
    pub async fn get_and_add_pv(&self, ctx: &RequestContext, id: &str, viewer: &Viewer) -> Result<ContentInfo> {
        let info = self.get(ctx, id, viewer).await?;
        let raw_id = short_id::decode(id);
        if let Err(e) = self.common.update_pv(&raw_id).await {
            error!(kind = %self.kind(), id = %raw_id, error = %e, "Failed to count view");
        }
        Ok(info)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Lookup<E>> {
        self.repo.find_by_name(name.trim()).await
    }

    /// Public listing
    pub async fn page(
        &self,
        ctx: &RequestContext,
        req: PageReq,
        viewer: &Viewer,
    ) -> Result<Paginated<ContentPageItem>> {
        let mut query = PageQuery {
            page: req.page,
            page_size: req.page_size,
            order: OrderCond::parse(&req.order),
            in_days: req.in_days,
            ..Default::default()
        };

        let tag_id = req.tag_id.trim();
        let tag = req.tag.trim().to_lowercase();
        if !tag_id.is_empty() {
            query.tag_ids = vec![tag_id.to_string()];
        } else if !tag.is_empty() {
            let Some(found) = self.platform.tags.tag_by_slug(&tag).await?.found() else {
                return Ok(Paginated::empty());
            };
            let mut ids = vec![found.id.clone()];
            ids.extend(self.platform.tags.synonym_tag_ids(&found.id).await?);
            query.tag_ids = ids;
        }

        let username = req.username.trim();
        if !username.is_empty() {
            let Some(user) = self.platform.users.get_by_username(username).await?.found() else {
                return Ok(Paginated::empty());
            };
            query.show_hidden = viewer.is(&user.id) || viewer.role.is_staff();
            query.user_id = Some(user.id);
        }

        if query.order == OrderCond::Hot {
            query.in_days = self.config.hot_in_days;
        }

        let (rows, count) = self.repo.page(&query).await?;
        let list = self.common.format_page(ctx, rows).await?;
        Ok(Paginated::new(list, count))
    }

    /// Feed built from followed tags and followed items
    pub async fn recommend_page(&self, ctx: &RequestContext, req: RecommendReq) -> Result<Paginated<ContentPageItem>> {
        if req.login_user_id.is_empty() {
            return Ok(Paginated::empty());
        }
        let tag_ids = self.platform.tags.following_tag_ids(&req.login_user_id).await?;
        let followed_ids = self
            .platform
            .follows
            .followed_object_ids(self.kind(), &req.login_user_id)
            .await?;

        let query = RecommendQuery {
            page: req.page,
            page_size: req.page_size,
            user_id: req.login_user_id,
            tag_ids,
            followed_ids,
        };
        let (rows, count) = self.repo.recommend_page(&query).await?;
        let list = self.common.format_page(ctx, rows).await?;
        Ok(Paginated::new(list, count))
    }

    /// Up to `title_search_limit` live items whose name contains `name`
    pub async fn search_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Vec<ContentBaseInfo>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .repo
            .search_by_name(name, self.config.title_search_limit)
            .await?;
        Ok(rows
            .iter()
            .map(|entity| {
                let counters = entity.counters();
                ContentBaseInfo {
                    id: ctx.encode(entity.id()),
                    title: entity.name().to_string(),
                    url_title: text::url_title(entity.name()),
                    view_count: counters.view_count,
                    collection_count: counters.collection_count,
                    follow_count: counters.follow_count,
                    status: ContentStatus::label(entity.status_code()).to_string(),
                }
            })
            .collect())
    }

    /// Hot items sharing the first tag, excluding the item itself
    pub async fn similar(&self, ctx: &RequestContext, id: &str, viewer: &Viewer) -> Result<Paginated<ContentPageItem>> {
        let raw_id = short_id::decode(id);
        let info = match self.common.info(ctx, &raw_id, &viewer.user_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(kind = %self.kind(), id = %raw_id, error = %e, "No similar items for unreadable content");
                return Ok(Paginated::empty());
            }
        };

        let req = PageReq {
            page: 1,
            page_size: self.config.similar_page_size,
            order: OrderCond::Hot.as_str().to_string(),
            tag: info.tags.first().map(|t| t.slug_name.clone()).unwrap_or_default(),
            ..Default::default()
        };
        let page = self.page(ctx, req, viewer).await?;
        let before = page.list.len();
        let list: Vec<ContentPageItem> = page.list.into_iter().filter(|item| item.id != info.id).collect();
        let removed = (before - list.len()) as u64;
        Ok(Paginated::new(list, page.count.saturating_sub(removed)))
    }

    /// Items on a user's profile; pending ones only for the owner and admins
    pub async fn personal_page(&self, ctx: &RequestContext, req: PersonalPageReq) -> Result<Paginated<UserContentInfo>> {
        let user = self
            .platform
            .users
            .get_by_username(req.username.trim())
            .await?
            .found()
            .ok_or_else(|| AppError::bad_request(reason::USER_NOT_FOUND))?;

        let privileged = req.is_admin || (!req.login_user_id.is_empty() && req.login_user_id == user.id);
        let query = PageQuery {
            page: req.page,
            page_size: req.page_size,
            user_id: Some(user.id.clone()),
            order: OrderCond::parse(&req.order),
            show_hidden: privileged,
            show_pending: privileged,
            ..Default::default()
        };
        let (rows, count) = self.repo.page(&query).await?;

        let ids: Vec<String> = rows.iter().map(|e| e.id().to_string()).collect();
        let tags = self.platform.tags.batch_object_tags(&ids).await?;
        let list = rows
            .iter()
            .map(|entity| {
                let counters = entity.counters();
                UserContentInfo {
                    id: ctx.encode(entity.id()),
                    title: entity.name().to_string(),
                    url_title: text::url_title(entity.name()),
                    status: ContentStatus::label(entity.status_code()).to_string(),
                    vote_count: counters.vote_count,
                    view_count: counters.view_count,
                    collection_count: counters.collection_count,
                    follow_count: counters.follow_count,
                    comment_count: counters.comment_count,
                    create_time: epoch_seconds(entity.created_at()),
                    update_time: epoch_seconds(entity.updated_at()),
                    tags: tags.get(entity.id()).cloned().unwrap_or_default(),
                }
            })
            .collect();
        Ok(Paginated::new(list, count))
    }

    /// The user's collected items of this kind, bodies stripped
    pub async fn personal_collection_page(
        &self,
        ctx: &RequestContext,
        req: PersonalCollectionReq,
    ) -> Result<Paginated<ContentInfo>> {
        let (ids, count) = self
            .platform
            .collections
            .user_collections(self.kind(), &req.user_id, req.page, req.page_size.max(1))
            .await?;
        let mut infos = self.common.find_info_by_ids(ctx, &ids, &req.user_id).await?;

        let list = ids
            .iter()
            .filter_map(|id| infos.remove(id))
            .map(|mut info| {
                info.content.clear();
                info.html.clear();
                if ContentStatus::from_i32(info.status) == Some(ContentStatus::Deleted) {
                    info.title = self.kind().deleted_title().to_string();
                }
                info
            })
            .collect();
        Ok(Paginated::new(list, count))
    }

    // ========================================================================
    // Admin
    // ========================================================================

    /// Force a status, notifying the owner of closes and deletes
    pub async fn admin_set_status(&self, req: AdminSetStatusReq) -> Result<()> {
        let kind = self.kind();
        let status: ContentStatus = req
            .status
            .trim()
            .parse()
            .map_err(|_| AppError::bad_request(reason::REQUEST_FORMAT))?;
        let id = short_id::decode(&req.id);
        let entity = self
            .repo
            .get(&id)
            .await?
            .found()
            .ok_or_else(|| AppError::bad_request(kind.reason("not_found")))?;
        let previous = entity.status();

        self.repo.update_status(&id, status).await?;

        let closed_action = format!("your_{}_is_closed", kind.object_type());
        match (status, previous) {
            (ContentStatus::Deleted, _) => {
                self.send_activity(
                    entity.user_id(),
                    &id,
                    ActivityType::Deleted,
                    Some(&req.user_id),
                    None,
                );
                self.send_owner_notification(&entity, &req.user_id, closed_action);
            }
            (ContentStatus::Available, Some(ContentStatus::Closed)) => {
                self.send_activity(
                    entity.user_id(),
                    &id,
                    ActivityType::Reopened,
                    Some(&req.user_id),
                    None,
                );
            }
            (ContentStatus::Closed, previous) if previous != Some(ContentStatus::Closed) => {
                self.send_activity(
                    entity.user_id(),
                    &id,
                    ActivityType::Closed,
                    Some(&req.user_id),
                    None,
                );
                self.send_owner_notification(&entity, &req.user_id, closed_action);
            }
            (ContentStatus::Available, Some(ContentStatus::Deleted)) => {
                self.send_activity(
                    entity.user_id(),
                    &id,
                    ActivityType::Undeleted,
                    Some(&req.user_id),
                    None,
                );
            }
            _ => {}
        }
        crate::metrics::record_content_op(kind.object_type(), "admin_set_status");
        info!(kind = %kind, id = %id, status = %status, by = %req.user_id, "Status set by admin");
        Ok(())
    }

    pub async fn admin_page(&self, ctx: &RequestContext, req: AdminPageReq) -> Result<Paginated<AdminContentItem>> {
        let status = match req.status.trim() {
            "" => None,
            value => Some(
                value
                    .parse::<ContentStatus>()
                    .map_err(|_| AppError::bad_request(reason::REQUEST_FORMAT))?,
            ),
        };
        let query = AdminPageQuery {
            page: req.page,
            page_size: req.page_size,
            status,
            query: req.query,
        };
        let (rows, count) = self.repo.admin_page(&query).await?;

        let user_ids: Vec<String> = rows.iter().map(|e| e.user_id().to_string()).collect();
        let users = self.platform.users.batch_basic_info(&user_ids).await?;
        let list = rows
            .iter()
            .map(|entity| {
                let counters = entity.counters();
                AdminContentItem {
                    id: ctx.encode(entity.id()),
                    title: entity.name().to_string(),
                    url_title: text::url_title(entity.name()),
                    status: ContentStatus::label(entity.status_code()).to_string(),
                    pin: entity.pin_code(),
                    show: entity.show_code(),
                    vote_count: counters.vote_count,
                    view_count: counters.view_count,
                    collection_count: counters.collection_count,
                    follow_count: counters.follow_count,
                    create_time: epoch_seconds(entity.created_at()),
                    update_time: epoch_seconds(entity.post_update_time().unwrap_or_else(|| entity.updated_at())),
                    edit_time: epoch_seconds(entity.updated_at()),
                    user_info: users.get(entity.user_id()).cloned(),
                }
            })
            .collect();
        Ok(Paginated::new(list, count))
    }

    /// Soft delete everything a user posted of this kind; returns the removed ids
    pub async fn remove_all_user_content(&self, ctx: &RequestContext, user_id: &str) -> Result<Vec<String>> {
        let ids = self.common.remove_all_user_content(user_id).await?;
        Ok(short_id::encode_all(ctx.short_id, &ids))
    }

    /// Number of items on a user's profile; hidden ones count for the owner and admins
    pub async fn personal_count(&self, req: PersonalPageReq) -> Result<u64> {
        let user = self
            .platform
            .users
            .get_by_username(req.username.trim())
            .await?
            .found()
            .ok_or_else(|| AppError::bad_request(reason::USER_NOT_FOUND))?;
        self.common
            .personal_user_count(&user.id, &req.login_user_id, req.is_admin)
            .await
    }

    /// Recount collections after a user collects or uncollects an item
    pub async fn collection_changed(&self, id: &str) -> Result<i64> {
        let id = short_id::decode(id);
        self.repo.get(&id).await?.require(self.kind().object_type(), &id)?;
        let count = self.common.update_collection_count(&id).await?;
        info!(kind = %self.kind(), id = %id, count, "Collection count refreshed");
        Ok(count)
    }

    pub async fn sitemap_cron(&self, short_id: bool) -> Result<u64> {
        self.common.sitemap_cron(short_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/quotes/1"));
        assert!(is_url(" http://example.com "));
        assert!(!is_url("see the other one"));
        assert!(!is_url("ftp://example.com/file"));
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags(&[TagItem {
            slug_name: " ancient philosophy ".into(),
            ..Default::default()
        }]);
        assert_eq!(tags[0].slug_name, "ancient-philosophy");
    }

    #[test]
    fn test_moderators_only_message() {
        let message = moderators_only(&["featured".to_string(), "faq".to_string()]);
        assert_eq!(message, "\"featured\",\"faq\" can only be used by moderators.");
    }

    #[test]
    fn test_snapshot_tags_keeps_unknown_slugs() {
        let items = vec![
            TagItem {
                slug_name: "wisdom".into(),
                ..Default::default()
            },
            TagItem {
                slug_name: "new-tag".into(),
                display_name: "New tag".into(),
                ..Default::default()
            },
        ];
        let known = vec![TagInfo {
            id: "3".into(),
            slug_name: "wisdom".into(),
            display_name: "Wisdom".into(),
            recommend: true,
            ..Default::default()
        }];
        let tags = snapshot_tags(&items, &known);
        assert_eq!(tags[0].id, "3");
        assert_eq!(tags[1].display_name, "New tag");
        assert!(tags[1].id.is_empty());
    }

    // ------------------------------------------------------------------------
    // Service flows over in-memory storage
    // ------------------------------------------------------------------------

    use crate::db::models::TagRelStatus;
    use crate::schema::Role;
    use crate::testing::Harness;

    fn ctx() -> RequestContext {
        RequestContext::new(false, "en_US")
    }

    fn tag(slug: &str) -> TagItem {
        TagItem {
            slug_name: slug.to_string(),
            ..Default::default()
        }
    }

    fn quote_req(title: &str, user_id: &str, role: Role, tags: &[&str]) -> AddContentReq {
        AddContentReq {
            title: title.to_string(),
            content: format!("{title}."),
            tags: tags.iter().map(|s| tag(s)).collect(),
            author: "Socrates".into(),
            piece: "Apology".into(),
            user_id: user_id.to_string(),
            role,
            ..Default::default()
        }
    }

    async fn published(h: &Harness, title: &str) -> ContentInfo {
        h.quote_service
            .add_quote(&ctx(), quote_req(title, "1", Role::Moderator, &["wisdom"]))
            .await
            .unwrap()
    }

    fn harness() -> Harness {
        let h = Harness::new();
        h.platform.seed_tag("wisdom", true, false);
        h.platform.seed_user("1", "plato", Role::Moderator);
        h.platform.seed_user("2", "glaucon", Role::User);
        h
    }

    fn count_of(activities: &[ActivityMsg], activity_type: &str) -> usize {
        activities.iter().filter(|a| a.activity_type == activity_type).count()
    }

    #[tokio::test]
    async fn test_remove_twice_is_a_noop() {
        let mut h = harness();
        let info = published(&h, "Know thyself").await;
        assert_eq!(ContentStatus::from_i32(info.status), Some(ContentStatus::Available));
        assert_eq!(h.platform.user_count(ContentKind::Quote, "1"), Some(1));
        h.activities();

        let req = RemoveReq {
            id: info.id.clone(),
            user_id: "1".into(),
            is_admin: false,
        };
        h.quotes.remove(req.clone()).await.unwrap();
        h.quotes.remove(req).await.unwrap();

        assert_eq!(count_of(&h.activities(), "quote.deleted"), 1);
        assert_eq!(h.platform.tag_rel_status(&info.id), vec![TagRelStatus::Deleted]);
        assert_eq!(h.platform.user_count(ContentKind::Quote, "1"), Some(0));
        assert!(h.quote_repo.rows()[0].is_status(ContentStatus::Deleted));
    }

    #[tokio::test]
    async fn test_remove_requires_owner_or_admin() {
        let h = harness();
        let info = published(&h, "Know thyself").await;

        let err = h
            .quotes
            .remove(RemoveReq {
                id: info.id.clone(),
                user_id: "2".into(),
                is_admin: false,
            })
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "error.quote.cannot_deleted");

        h.quotes
            .remove(RemoveReq {
                id: info.id,
                user_id: "9".into(),
                is_admin: true,
            })
            .await
            .unwrap();
        assert!(h.quote_repo.rows()[0].is_status(ContentStatus::Deleted));
    }

    #[tokio::test]
    async fn test_is_owner() {
        let h = harness();
        let info = published(&h, "Know thyself").await;
        assert!(h.quotes.is_owner(&info.id, "1").await.unwrap());
        assert!(!h.quotes.is_owner(&info.id, "2").await.unwrap());
        assert!(!h.quotes.is_owner(&info.id, "").await.unwrap());
        assert!(!h.quotes.is_owner("10010000000000999", "1").await.unwrap());
    }

    #[tokio::test]
    async fn test_recover() {
        let mut h = harness();
        let missing = h
            .quotes
            .recover(ObjectReq {
                id: ContentKind::Quote.unique_id(99),
                user_id: "1".into(),
            })
            .await
            .unwrap_err();
        assert!(missing.is_not_found());

        let info = published(&h, "Know thyself").await;
        let req = ObjectReq {
            id: info.id.clone(),
            user_id: "1".into(),
        };
        h.activities();
        h.quotes.recover(req.clone()).await.unwrap();
        assert!(h.activities().is_empty());

        h.quotes
            .remove(RemoveReq {
                id: info.id.clone(),
                user_id: "1".into(),
                is_admin: false,
            })
            .await
            .unwrap();
        h.quotes.recover(req).await.unwrap();

        assert!(h.quote_repo.rows()[0].is_status(ContentStatus::Available));
        assert_eq!(h.platform.tag_rel_status(&info.id), vec![TagRelStatus::Available]);
        assert_eq!(count_of(&h.activities(), "quote.undeleted"), 1);
        assert_eq!(h.platform.user_count(ContentKind::Quote, "1"), Some(1));
    }

    #[tokio::test]
    async fn test_pin_and_hide_exclude_each_other() {
        let h = harness();
        let info = published(&h, "Know thyself").await;
        let op = |operation| OperationReq {
            id: info.id.clone(),
            operation,
            user_id: "1".into(),
        };

        h.quotes.operation(op(OperationKind::Hide)).await.unwrap();
        h.quotes.operation(op(OperationKind::Pin)).await.unwrap();
        let row = h.quote_repo.rows()[0].clone();
        assert_eq!((row.pin(), row.show()), (PinState::UnPin, ShowState::Hide));
        assert_eq!(h.platform.tag_rel_status(&info.id), vec![TagRelStatus::Hide]);

        h.quotes.operation(op(OperationKind::Show)).await.unwrap();
        h.quotes.operation(op(OperationKind::Pin)).await.unwrap();
        h.quotes.operation(op(OperationKind::Hide)).await.unwrap();
        let row = h.quote_repo.rows()[0].clone();
        assert_eq!((row.pin(), row.show()), (PinState::Pin, ShowState::Show));
        assert_eq!(h.platform.tag_rel_status(&info.id), vec![TagRelStatus::Available]);
    }

    #[tokio::test]
    async fn test_close_twice_keeps_one_meta_row() {
        let mut h = harness();
        let info = published(&h, "Know thyself").await;
        h.activities();

        let req = CloseReq {
            id: info.id.clone(),
            close_type: 2,
            close_msg: String::new(),
            user_id: "1".into(),
        };
        h.quotes.close(req.clone()).await.unwrap();
        h.quotes.close(req).await.unwrap();

        assert_eq!(h.platform.meta_rows(&info.id), 1);
        assert_eq!(count_of(&h.activities(), "quote.closed"), 2);

        let detail = h.quotes.get(&ctx(), &info.id, &Viewer::anonymous()).await.unwrap();
        assert_eq!(ContentStatus::from_i32(detail.status), Some(ContentStatus::Closed));
        assert_eq!(detail.operation.map(|o| o.level), Some("info".to_string()));
    }

    #[tokio::test]
    async fn test_close_validates_reason() {
        let h = harness();
        let info = published(&h, "Know thyself").await;
        let close = |close_type, close_msg: &str| CloseReq {
            id: info.id.clone(),
            close_type,
            close_msg: close_msg.to_string(),
            user_id: "1".into(),
        };

        let err = h.quotes.close(close(99, "")).await.unwrap_err();
        assert_eq!(err.reason(), reason::REASON_NOT_FOUND);
        let err = h.quotes.close(close(1, "same as the other")).await.unwrap_err();
        assert_eq!(err.reason(), reason::INVALID_URL);
        h.quotes
            .close(close(1, "https://example.com/quotes/1"))
            .await
            .unwrap();

        // missing rows are ignored
        h.quotes
            .close(CloseReq {
                id: ContentKind::Quote.unique_id(42),
                close_type: 99,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_tag_policy_per_kind() {
        let h = harness();
        h.platform.seed_tag("misc", false, false);
        h.platform.seed_tag("featured", true, true);

        let err = h
            .quote_service
            .add_quote(&ctx(), quote_req("No tags", "1", Role::User, &[]))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), reason::RECOMMEND_TAG_ENTER);

        let err = h
            .quote_service
            .add_quote(&ctx(), quote_req("Plain tag", "1", Role::User, &["misc"]))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), reason::RECOMMEND_TAG_ENTER);

        let err = h
            .quote_service
            .add_quote(&ctx(), quote_req("Reserved", "2", Role::User, &["featured"]))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), reason::RECOMMEND_TAG_ENTER);

        let author = h
            .authors
            .add(
                &ctx(),
                AddContentReq {
                    title: "Heraclitus".into(),
                    user_id: "1".into(),
                    role: Role::Moderator,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(author.title, "Heraclitus");
        assert!(author.tags.is_empty());
    }

    #[tokio::test]
    async fn test_pending_item_hidden_from_other_users() {
        let h = harness();
        let info = h
            .quote_service
            .add_quote(&ctx(), quote_req("The unexamined life", "2", Role::User, &["wisdom"]))
            .await
            .unwrap();
        assert_eq!(ContentStatus::from_i32(info.status), Some(ContentStatus::Pending));
        assert_eq!(info.operation.map(|o| o.level), Some("secondary".to_string()));

        let other = Viewer::new("3", Role::User);
        let err = h.quotes.get(&ctx(), &info.id, &other).await.unwrap_err();
        assert!(err.is_not_found());

        let moderator = Viewer::new("1", Role::Moderator);
        let seen = h.quotes.get(&ctx(), &info.id, &moderator).await.unwrap();
        assert_eq!(seen.id, info.id);

        let public = h
            .quotes
            .page(&ctx(), PageReq::default(), &Viewer::anonymous())
            .await
            .unwrap();
        assert_eq!(public.count, 0);
    }

    #[tokio::test]
    async fn test_page_orders_by_score_and_filters_tags() {
        let h = harness();
        h.platform.seed_tag("virtue", true, false);
        let low = published(&h, "Low").await;
        let high = published(&h, "High").await;
        let other = h
            .quote_service
            .add_quote(&ctx(), quote_req("Other", "1", Role::Moderator, &["virtue"]))
            .await
            .unwrap();
        h.quote_repo.modify(&low.id, |q| q.vote_count = 1);
        h.quote_repo.modify(&high.id, |q| q.vote_count = 8);
        h.quote_repo.modify(&other.id, |q| q.vote_count = 3);

        let page = h
            .quotes
            .page(
                &ctx(),
                PageReq {
                    order: "score".into(),
                    ..Default::default()
                },
                &Viewer::anonymous(),
            )
            .await
            .unwrap();
        let ids: Vec<&str> = page.list.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec![high.id.as_str(), other.id.as_str(), low.id.as_str()]);

        let tagged = h
            .quotes
            .page(
                &ctx(),
                PageReq {
                    tag: "Virtue".into(),
                    ..Default::default()
                },
                &Viewer::anonymous(),
            )
            .await
            .unwrap();
        assert_eq!(tagged.count, 1);
        assert_eq!(tagged.list[0].id, other.id);

        let unknown = h
            .quotes
            .page(
                &ctx(),
                PageReq {
                    tag: "nothing".into(),
                    ..Default::default()
                },
                &Viewer::anonymous(),
            )
            .await
            .unwrap();
        assert!(unknown.list.is_empty());
    }

    #[tokio::test]
    async fn test_update_paths() {
        let mut h = harness();
        let info = published(&h, "Know thyself").await;
        h.activities();

        let unchanged = UpdateContentReq {
            id: info.id.clone(),
            title: "Know thyself".into(),
            content: "Know thyself.".into(),
            tags: vec![tag("wisdom")],
            user_id: "1".into(),
            role: Role::Moderator,
            no_need_review: true,
            ..Default::default()
        };
        h.quotes.update(&ctx(), unchanged.clone()).await.unwrap();
        assert_eq!(h.platform.revisions(&info.id).len(), 1);

        let applied = UpdateContentReq {
            title: "Know yourself".into(),
            edit_summary: "wording".into(),
            ..unchanged.clone()
        };
        let updated = h.quotes.update(&ctx(), applied).await.unwrap().unwrap();
        assert_eq!(updated.title, "Know yourself");
        assert_eq!(count_of(&h.activities(), "quote.edited"), 1);

        let suggested = UpdateContentReq {
            title: "Know thy limits".into(),
            user_id: "2".into(),
            role: Role::User,
            no_need_review: false,
            ..unchanged.clone()
        };
        let shown = h.quotes.update(&ctx(), suggested.clone()).await.unwrap().unwrap();
        assert_eq!(shown.title, "Know yourself");
        let revisions = h.platform.revisions(&info.id);
        assert_eq!(revisions.len(), 3);
        assert_eq!(revisions[2].revision_status(), RevisionStatus::Unreviewed);
        assert!(h.activities().is_empty());

        let err = h.quotes.update(&ctx(), suggested).await.unwrap_err();
        assert_eq!(err.reason(), "error.quote.cannot_update");

        let missing = UpdateContentReq {
            id: ContentKind::Quote.unique_id(77),
            ..Default::default()
        };
        assert!(h.quotes.update(&ctx(), missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admin_set_status_notifies_owner() {
        let mut h = harness();
        let info = published(&h, "Know thyself").await;
        h.activities();

        let set = |status: &str| AdminSetStatusReq {
            id: info.id.clone(),
            status: status.to_string(),
            user_id: "9".into(),
        };
        h.quotes.admin_set_status(set("closed")).await.unwrap();
        let notifications = h.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].action, "your_quote_is_closed");
        assert_eq!(notifications[0].receiver_user_id, "1");

        h.quotes.admin_set_status(set("available")).await.unwrap();
        assert_eq!(count_of(&h.activities(), "quote.reopened"), 1);

        let err = h.quotes.admin_set_status(set("archived")).await.unwrap_err();
        assert_eq!(err.reason(), reason::REQUEST_FORMAT);

        let err = h
            .quotes
            .admin_set_status(AdminSetStatusReq {
                id: ContentKind::Quote.unique_id(5),
                status: "closed".into(),
                user_id: "9".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "error.quote.not_found");
    }

    #[tokio::test]
    async fn test_personal_page_and_search() {
        let h = harness();
        published(&h, "Know thyself").await;
        h.quote_service
            .add_quote(&ctx(), quote_req("Wonder is the beginning", "2", Role::User, &["wisdom"]))
            .await
            .unwrap();

        let err = h
            .quotes
            .personal_page(
                &ctx(),
                PersonalPageReq {
                    username: "nobody".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.reason(), reason::USER_NOT_FOUND);

        let anonymous_view = h
            .quotes
            .personal_page(
                &ctx(),
                PersonalPageReq {
                    username: "glaucon".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(anonymous_view.count, 0);

        let own_view = h
            .quotes
            .personal_page(
                &ctx(),
                PersonalPageReq {
                    username: "glaucon".into(),
                    login_user_id: "2".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(own_view.count, 1);
        assert_eq!(own_view.list[0].status, "pending");
        assert_eq!(own_view.list[0].tags[0].slug_name, "wisdom");

        let found = h.quotes.search_by_name(&ctx(), "thyself").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(h.quotes.search_by_name(&ctx(), "  ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_item_keeps_tags_from_last_revision() {
        let h = harness();
        let info = published(&h, "Know thyself").await;
        h.quotes
            .remove(RemoveReq {
                id: info.id.clone(),
                user_id: "1".into(),
                is_admin: false,
            })
            .await
            .unwrap();
        assert!(h.platform.tag_rel_status(&info.id).iter().all(|s| *s == TagRelStatus::Deleted));

        let detail = h.quotes.common().info(&ctx(), &info.id, "").await.unwrap();
        assert_eq!(ContentStatus::from_i32(detail.status), Some(ContentStatus::Deleted));
        let slugs: Vec<&str> = detail.tags.iter().map(|t| t.slug_name.as_str()).collect();
        assert_eq!(slugs, vec!["wisdom"]);

        let admin = h.quotes.get(&ctx(), &info.id, &Viewer::new("9", Role::Admin)).await.unwrap();
        assert_eq!(admin.operation.map(|o| o.level), Some("danger".to_string()));
    }

    #[tokio::test]
    async fn test_short_ids_round_trip_through_services() {
        let h = harness();
        let short = RequestContext::new(true, "en_US");
        let info = h
            .quote_service
            .add_quote(&short, quote_req("Know thyself", "1", Role::Moderator, &["wisdom"]))
            .await
            .unwrap();

        let raw = h.quote_repo.rows()[0].id.clone();
        assert_ne!(info.id, raw);
        assert_eq!(short_id::decode(&info.id), raw);
        assert_eq!(
            info.extra.quote_author_id.as_deref().map(short_id::decode),
            Some(h.author_repo.rows()[0].id.clone())
        );

        let fetched = h.quotes.get(&short, &info.id, &Viewer::anonymous()).await.unwrap();
        assert_eq!(fetched.id, info.id);
        let plain = h.quotes.get(&ctx(), &info.id, &Viewer::anonymous()).await.unwrap();
        assert_eq!(plain.id, raw);

        h.quotes
            .close(CloseReq {
                id: info.id.clone(),
                close_type: 2,
                user_id: "1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(h.quote_repo.rows()[0].is_status(ContentStatus::Closed));

        let removed = h.quotes.remove_all_user_content(&short, "1").await.unwrap();
        assert_eq!(removed, vec![info.id.clone()]);
        assert!(h.quote_repo.rows()[0].is_status(ContentStatus::Deleted));
        assert_eq!(h.platform.user_count(ContentKind::Quote, "1"), Some(0));
    }

    #[tokio::test]
    async fn test_recommend_page_follows_tags() {
        let h = harness();
        let info = published(&h, "Know thyself").await;
        h.platform.follow_tag("2", "1");

        let anonymous = h.quotes.recommend_page(&ctx(), RecommendReq::default()).await.unwrap();
        assert_eq!(anonymous.count, 0);

        let follower = h
            .quotes
            .recommend_page(
                &ctx(),
                RecommendReq {
                    login_user_id: "2".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(follower.count, 1);
        assert_eq!(follower.list[0].id, info.id);

        // own items are not recommended back
        h.platform.follow_tag("1", "1");
        let author = h
            .quotes
            .recommend_page(
                &ctx(),
                RecommendReq {
                    login_user_id: "1".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(author.list.is_empty());
    }

    #[tokio::test]
    async fn test_similar_excludes_the_item_itself() {
        let h = harness();
        let first = published(&h, "Know thyself").await;
        let second = published(&h, "Nothing in excess").await;

        let similar = h.quotes.similar(&ctx(), &first.id, &Viewer::anonymous()).await.unwrap();
        assert_eq!(similar.count, 1);
        assert_eq!(similar.list[0].id, second.id);

        let missing = h
            .quotes
            .similar(&ctx(), &ContentKind::Quote.unique_id(404), &Viewer::anonymous())
            .await
            .unwrap();
        assert!(missing.list.is_empty());
    }

    #[tokio::test]
    async fn test_sitemap_cron_covers_available_items() {
        let h = harness();
        assert_eq!(h.quotes.sitemap_cron(false).await.unwrap(), 1);

        published(&h, "Know thyself").await;
        published(&h, "Nothing in excess").await;
        h.quote_service
            .add_quote(&ctx(), quote_req("Still pending", "2", Role::User, &["wisdom"]))
            .await
            .unwrap();

        assert_eq!(h.quotes.sitemap_cron(false).await.unwrap(), 1);
        let entries = h.quotes.common().sitemap(1, false).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].url_title, "nothing-in-excess");
    }

    #[tokio::test]
    async fn test_personal_count_includes_hidden_for_owner() {
        let h = harness();
        let info = published(&h, "Know thyself").await;
        published(&h, "Nothing in excess").await;
        h.quotes
            .operation(OperationReq {
                id: info.id.clone(),
                operation: OperationKind::Hide,
                user_id: "1".into(),
            })
            .await
            .unwrap();

        let count = |login_user_id: &str, is_admin| PersonalPageReq {
            username: "plato".into(),
            login_user_id: login_user_id.to_string(),
            is_admin,
            ..Default::default()
        };
        assert_eq!(h.quotes.personal_count(count("", false)).await.unwrap(), 1);
        assert_eq!(h.quotes.personal_count(count("1", false)).await.unwrap(), 2);
        assert_eq!(h.quotes.personal_count(count("9", true)).await.unwrap(), 2);

        let err = h
            .quotes
            .personal_count(PersonalPageReq {
                username: "nobody".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.reason(), reason::USER_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_collection_changed_recounts() {
        let h = harness();
        let info = published(&h, "Know thyself").await;
        h.platform.collect("2", &info.id);
        h.platform.collect("3", &info.id);

        assert_eq!(h.quotes.collection_changed(&info.id).await.unwrap(), 2);
        assert_eq!(h.quote_repo.rows()[0].collection_count, 2);

        let detail = h.quotes.get(&ctx(), &info.id, &Viewer::new("2", Role::User)).await.unwrap();
        assert!(detail.collected);
        assert_eq!(detail.collection_count, 2);

        let err = h
            .quotes
            .collection_changed(&ContentKind::Quote.unique_id(404))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
