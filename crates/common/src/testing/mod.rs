//! In-memory collaborators for service tests

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::config::{ContentConfig, ReviewConfig};
use crate::content::{ContentEntity, ContentKind, ContentStatus, Lookup, OrderCond, ShowState};
use crate::db::models::{Meta, Quote, QuoteAuthor, QuotePiece, Revision, RevisionStatus, TagRelStatus};
use crate::db::query::{AdminPageQuery, PageQuery, RecommendQuery};
use crate::db::ContentRepo;
use crate::errors::Result;
use crate::platform::{
    AnswerLookup, CollectionService, ConfigReview, FollowService, MetaService, NewRevision, Platform, RevisionService,
    TagCommon, UserCommon, VoteService,
};
use crate::queue::{ActivityMsg, NotificationMsg, QueueReceivers, Queues};
use crate::schema::{Role, SitemapEntry, TagInfo, TagItem, UserBasicInfo};
use crate::services::{ContentService, QuoteService, RelatedRepos};

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

#[derive(Default)]
struct State {
    seq: HashMap<ContentKind, i64>,
    tags: Vec<TagInfo>,
    /// (object_id, tag_id, status)
    rels: Vec<(String, String, TagRelStatus)>,
    users: Vec<(UserBasicInfo, Role)>,
    user_counts: HashMap<(ContentKind, String), u64>,
    revisions: Vec<Revision>,
    meta: Vec<Meta>,
    followed_tags: HashMap<String, Vec<String>>,
    /// (user_id, object_id)
    collections: Vec<(String, String)>,
}

/// Tags, users, revisions and meta kept in memory
#[derive(Default)]
pub struct MemoryPlatform {
    state: Mutex<State>,
}

impl MemoryPlatform {
    pub fn seed_tag(&self, slug: &str, recommend: bool, reserved: bool) -> String {
        let mut state = self.state.lock().unwrap();
        let id = (state.tags.len() + 1).to_string();
        state.tags.push(TagInfo {
            id: id.clone(),
            slug_name: slug.to_string(),
            display_name: slug.to_string(),
            recommend,
            reserved,
            ..Default::default()
        });
        id
    }

    pub fn seed_user(&self, id: &str, username: &str, role: Role) {
        let info = UserBasicInfo {
            id: id.to_string(),
            username: username.to_string(),
            display_name: username.to_string(),
            status: "normal".to_string(),
            ..Default::default()
        };
        self.state.lock().unwrap().users.push((info, role));
    }

    pub fn follow_tag(&self, user_id: &str, tag_id: &str) {
        self.state
            .lock()
            .unwrap()
            .followed_tags
            .entry(user_id.to_string())
            .or_default()
            .push(tag_id.to_string());
    }

    pub fn collect(&self, user_id: &str, object_id: &str) {
        self.state
            .lock()
            .unwrap()
            .collections
            .push((user_id.to_string(), object_id.to_string()));
    }

    fn collection_count(&self, object_id: &str) -> i64 {
        self.state
            .lock()
            .unwrap()
            .collections
            .iter()
            .filter(|(_, o)| o == object_id)
            .count() as i64
    }

    pub fn meta_rows(&self, object_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .meta
            .iter()
            .filter(|m| m.object_id == object_id)
            .count()
    }

    pub fn revisions(&self, object_id: &str) -> Vec<Revision> {
        self.state
            .lock()
            .unwrap()
            .revisions
            .iter()
            .filter(|r| r.object_id == object_id)
            .cloned()
            .collect()
    }

    pub fn user_count(&self, kind: ContentKind, user_id: &str) -> Option<u64> {
        self.state
            .lock()
            .unwrap()
            .user_counts
            .get(&(kind, user_id.to_string()))
            .copied()
    }

    pub fn tag_rel_status(&self, object_id: &str) -> Vec<TagRelStatus> {
        self.state
            .lock()
            .unwrap()
            .rels
            .iter()
            .filter(|(o, _, _)| o == object_id)
            .map(|(_, _, s)| *s)
            .collect()
    }

    fn has_tag(&self, object_id: &str, tag_ids: &[String]) -> bool {
        self.state
            .lock()
            .unwrap()
            .rels
            .iter()
            .any(|(o, t, s)| o == object_id && *s == TagRelStatus::Available && tag_ids.contains(t))
    }

    fn next_id(&self, kind: ContentKind) -> String {
        let mut state = self.state.lock().unwrap();
        let seq = state.seq.entry(kind).or_insert(0);
        *seq += 1;
        kind.unique_id(*seq)
    }

    fn set_rels(&self, object_id: &str, from: &[TagRelStatus], to: TagRelStatus) {
        let mut state = self.state.lock().unwrap();
        for rel in state.rels.iter_mut().filter(|(o, _, _)| o == object_id) {
            if from.contains(&rel.2) {
                rel.2 = to;
            }
        }
    }
}

#[async_trait]
impl TagCommon for MemoryPlatform {
    async fn object_tags(&self, object_id: &str) -> Result<Vec<TagInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rels
            .iter()
            .filter(|(o, _, s)| o == object_id && *s == TagRelStatus::Available)
            .filter_map(|(_, t, _)| state.tags.iter().find(|tag| &tag.id == t).cloned())
            .collect())
    }

    async fn batch_object_tags(&self, object_ids: &[String]) -> Result<HashMap<String, Vec<TagInfo>>> {
        let mut out = HashMap::new();
        for id in object_ids {
            let tags = self.object_tags(id).await?;
            if !tags.is_empty() {
                out.insert(id.clone(), tags);
            }
        }
        Ok(out)
    }

    async fn tag_by_slug(&self, slug_name: &str) -> Result<Lookup<TagInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state.tags.iter().find(|t| t.slug_name == slug_name).cloned().into())
    }

    async fn synonym_tag_ids(&self, _main_tag_id: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn tags_by_slugs(&self, slug_names: &[String]) -> Result<Vec<TagInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tags
            .iter()
            .filter(|t| slug_names.contains(&t.slug_name))
            .cloned()
            .collect())
    }

    async fn exist_recommend(&self, tags: &[TagItem]) -> Result<bool> {
        let slugs: Vec<String> = tags.iter().map(|t| t.slug_name.clone()).collect();
        Ok(self.tags_by_slugs(&slugs).await?.iter().any(|t| t.recommend))
    }

    async fn following_tag_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.followed_tags.get(user_id).cloned().unwrap_or_default())
    }

    async fn change_tags(&self, object_id: &str, tags: &[TagItem], _user_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut wanted = Vec::new();
        for item in tags {
            let existing = state
                .tags
                .iter()
                .find(|t| t.slug_name == item.slug_name)
                .map(|t| t.id.clone());
            let id = match existing {
                Some(id) => id,
                None => {
                    let id = (state.tags.len() + 1).to_string();
                    state.tags.push(TagInfo {
                        id: id.clone(),
                        slug_name: item.slug_name.clone(),
                        display_name: item.slug_name.clone(),
                        ..Default::default()
                    });
                    id
                }
            };
            wanted.push(id);
        }
        for rel in state.rels.iter_mut().filter(|(o, _, _)| o == object_id) {
            rel.2 = if wanted.contains(&rel.1) {
                TagRelStatus::Available
            } else {
                TagRelStatus::Deleted
            };
        }
        for id in wanted {
            if !state.rels.iter().any(|(o, t, _)| o == object_id && *t == id) {
                state.rels.push((object_id.to_string(), id, TagRelStatus::Available));
            }
        }
        Ok(())
    }

    async fn hide_tag_rels(&self, object_id: &str) -> Result<()> {
        self.set_rels(object_id, &[TagRelStatus::Available], TagRelStatus::Hide);
        Ok(())
    }

    async fn show_tag_rels(&self, object_id: &str) -> Result<()> {
        self.set_rels(object_id, &[TagRelStatus::Hide], TagRelStatus::Available);
        Ok(())
    }

    async fn remove_tag_rels(&self, object_id: &str) -> Result<()> {
        self.set_rels(
            object_id,
            &[TagRelStatus::Available, TagRelStatus::Hide],
            TagRelStatus::Deleted,
        );
        Ok(())
    }

    async fn recover_tag_rels(&self, object_id: &str) -> Result<()> {
        self.set_rels(object_id, &[TagRelStatus::Deleted], TagRelStatus::Available);
        Ok(())
    }

    async fn refresh_tag_counts(&self, _tag_ids: &[String]) -> Result<()> {
        Ok(())
    }

    async fn refresh_object_tag_counts(&self, _object_id: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl UserCommon for MemoryPlatform {
    async fn batch_basic_info(&self, user_ids: &[String]) -> Result<HashMap<String, UserBasicInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .filter(|(u, _)| user_ids.contains(&u.id))
            .map(|(u, _)| (u.id.clone(), u.clone()))
            .collect())
    }

    async fn get_by_username(&self, username: &str) -> Result<Lookup<UserBasicInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .find(|(u, _)| u.username == username)
            .map(|(u, _)| u.clone())
            .into())
    }

    async fn update_content_count(&self, kind: ContentKind, user_id: &str, count: u64) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .user_counts
            .insert((kind, user_id.to_string()), count);
        Ok(())
    }

    async fn role(&self, user_id: &str) -> Result<Role> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .find(|(u, _)| u.id == user_id)
            .map(|(_, r)| *r)
            .unwrap_or_default())
    }
}

#[async_trait]
impl RevisionService for MemoryPlatform {
    async fn add_revision(&self, revision: NewRevision) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let id = state.revisions.len() as i64 + 1;
        state.revisions.push(Revision {
            id,
            user_id: revision.user_id,
            object_type: revision.kind.object_type().to_string(),
            object_id: revision.object_id,
            title: revision.title,
            content: revision.content,
            log: revision.log,
            status: revision.status.as_i32(),
            review_user_id: None,
            created_at: now(),
            updated_at: now(),
        });
        Ok(id.to_string())
    }

    async fn exist_unreviewed(&self, object_id: &str) -> Result<bool> {
        Ok(self
            .revisions(object_id)
            .iter()
            .any(|r| r.revision_status() == RevisionStatus::Unreviewed))
    }

    async fn last_revision(&self, object_id: &str) -> Result<Lookup<Revision>> {
        Ok(self
            .revisions(object_id)
            .into_iter()
            .filter(|r| r.revision_status() == RevisionStatus::ReviewPassed)
            .next_back()
            .into())
    }
}

#[async_trait]
impl MetaService for MemoryPlatform {
    async fn get_meta(&self, object_id: &str, key: &str) -> Result<Lookup<Meta>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .meta
            .iter()
            .find(|m| m.object_id == object_id && m.key == key)
            .cloned()
            .into())
    }

    async fn upsert_meta(&self, object_id: &str, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(meta) = state
            .meta
            .iter_mut()
            .find(|m| m.object_id == object_id && m.key == key)
        {
            meta.value = value.to_string();
            meta.updated_at = now();
            return Ok(());
        }
        let id = state.meta.len() as i64 + 1;
        state.meta.push(Meta {
            id,
            object_id: object_id.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            created_at: now(),
            updated_at: now(),
        });
        Ok(())
    }
}

#[async_trait]
impl VoteService for MemoryPlatform {
    async fn vote_status(&self, _kind: ContentKind, _object_id: &str, _user_id: &str) -> Result<String> {
        Ok(String::new())
    }
}

#[async_trait]
impl FollowService for MemoryPlatform {
    async fn is_followed(&self, _kind: ContentKind, _user_id: &str, _object_id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn followed_object_ids(&self, _kind: ContentKind, _user_id: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl CollectionService for MemoryPlatform {
    async fn collected(&self, user_id: &str, object_ids: &[String]) -> Result<HashSet<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .collections
            .iter()
            .filter(|(u, o)| u == user_id && object_ids.contains(o))
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn user_collections(
        &self,
        _kind: ContentKind,
        _user_id: &str,
        _page: u64,
        _page_size: u64,
    ) -> Result<(Vec<String>, u64)> {
        Ok((Vec::new(), 0))
    }
}

#[async_trait]
impl AnswerLookup for MemoryPlatform {
    async fn answer_ids(&self, _user_id: &str, _object_id: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Content rows kept in insertion order
pub struct MemoryRepo<E> {
    rows: Mutex<Vec<E>>,
    platform: Arc<MemoryPlatform>,
    _kind: PhantomData<E>,
}

impl<E: ContentEntity> MemoryRepo<E> {
    pub fn new(platform: Arc<MemoryPlatform>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            platform,
            _kind: PhantomData,
        }
    }

    pub fn rows(&self) -> Vec<E> {
        self.rows.lock().unwrap().clone()
    }

    /// Edit a stored row in place
    pub fn modify(&self, id: &str, f: impl FnOnce(&mut E)) {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.id() == id) {
            f(row);
        }
    }

    fn listed(&self, keep: impl Fn(&E) -> bool) -> Vec<E> {
        self.rows.lock().unwrap().iter().filter(|r| keep(r)).cloned().collect()
    }
}

fn paged<E>(mut rows: Vec<E>, page: u64, page_size: u64) -> (Vec<E>, u64) {
    let total = rows.len() as u64;
    let size = if page_size == 0 { 20 } else { page_size };
    let offset = (page.max(1) - 1).saturating_mul(size);
    let rows = if offset >= total {
        Vec::new()
    } else {
        rows.drain(offset as usize..).take(size as usize).collect()
    };
    (rows, total)
}

#[async_trait]
impl<E: ContentEntity> ContentRepo<E> for MemoryRepo<E> {
    async fn add(&self, entity: &mut E) -> Result<()> {
        entity.set_id(self.platform.next_id(E::KIND));
        self.rows.lock().unwrap().push(entity.clone());
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.rows.lock().unwrap().retain(|r| r.id() != id);
        Ok(())
    }

    async fn update(&self, entity: &E, cols: &[&str]) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| r.id() == entity.id()) else {
            return Ok(());
        };
        let mut stored = serde_json::to_value(&*row)?;
        let incoming = serde_json::to_value(entity)?;
        for col in cols {
            if let Some(value) = incoming.get(*col) {
                stored[*col] = value.clone();
            }
        }
        *row = serde_json::from_value(stored)?;
        Ok(())
    }

    async fn update_pv_count(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn update_collection_count(&self, id: &str) -> Result<i64> {
        let count = self.platform.collection_count(id);
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.id() == id) {
            let mut stored = serde_json::to_value(&*row)?;
            stored["collection_count"] = count.into();
            *row = serde_json::from_value(stored)?;
        }
        Ok(count)
    }

    async fn update_status(&self, id: &str, status: ContentStatus) -> Result<()> {
        self.modify(id, |row| {
            row.set_status(status);
            row.set_updated_at(now());
        });
        Ok(())
    }

    async fn update_status_keep_time(&self, id: &str, status: ContentStatus) -> Result<()> {
        self.modify(id, |row| row.set_status(status));
        Ok(())
    }

    async fn recover(&self, id: &str) -> Result<()> {
        self.modify(id, |row| row.set_status(ContentStatus::Available));
        Ok(())
    }

    async fn update_operation(&self, entity: &E) -> Result<()> {
        let (pin, show) = (entity.pin(), entity.show());
        self.modify(entity.id(), |row| {
            row.set_pin(pin);
            row.set_show(show);
        });
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Lookup<E>> {
        Ok(self.listed(|r| r.id() == id).into_iter().next().into())
    }

    async fn search_by_name(&self, name: &str, limit: u64) -> Result<Vec<E>> {
        let mut rows = self.listed(|r| r.name().contains(name) && !r.is_status(ContentStatus::Deleted));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn find_by_name(&self, name: &str) -> Result<Lookup<E>> {
        Ok(self
            .listed(|r| r.name() == name && !r.is_status(ContentStatus::Deleted))
            .into_iter()
            .next()
            .into())
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<E>> {
        Ok(self.listed(|r| ids.iter().any(|id| id == r.id())))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self
            .listed(|r| r.status_code() < ContentStatus::Deleted.as_i32() && r.show() == ShowState::Show)
            .len() as u64)
    }

    async fn user_count(&self, user_id: &str, show: Option<ShowState>) -> Result<u64> {
        Ok(self
            .listed(|r| {
                r.user_id() == user_id
                    && !r.is_status(ContentStatus::Deleted)
                    && show.map_or(true, |s| r.show() == s)
            })
            .len() as u64)
    }

    async fn sitemap(&self, page: u64, page_size: u64, _short_id: bool) -> Result<Vec<SitemapEntry>> {
        let rows = self.listed(|r| r.is_status(ContentStatus::Available));
        let (rows, _) = paged(rows, page, page_size);
        Ok(rows
            .iter()
            .map(|r| SitemapEntry {
                id: r.id().to_string(),
                title: r.name().to_string(),
                url_title: crate::text::url_title(r.name()),
                updated_at: r.updated_at().format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            })
            .collect())
    }

    async fn page(&self, query: &PageQuery) -> Result<(Vec<E>, u64)> {
        let user = query.user_id.clone().filter(|u| !u.is_empty());
        let mut rows = self.listed(|r| {
            let visible = r.is_status(ContentStatus::Available)
                || r.is_status(ContentStatus::Closed)
                || (query.show_pending && r.is_status(ContentStatus::Pending));
            let shown = r.show() == ShowState::Show || (user.is_some() && query.show_hidden);
            let owned = user.as_deref().map_or(true, |u| r.user_id() == u);
            let tagged = query.tag_ids.is_empty() || self.platform.has_tag(r.id(), &query.tag_ids);
            visible && shown && owned && tagged
        });
        rows.sort_by(|a, b| {
            let pin = b.pin_code().cmp(&a.pin_code());
            let (ca, cb) = (a.counters(), b.counters());
            pin.then_with(|| match query.order {
                OrderCond::Score => cb
                    .vote_count
                    .cmp(&ca.vote_count)
                    .then(cb.view_count.cmp(&ca.view_count)),
                OrderCond::Hot => cb.hot_score.cmp(&ca.hot_score),
                OrderCond::Active => b.updated_at().cmp(&a.updated_at()),
                _ => b.created_at().cmp(&a.created_at()),
            })
        });
        Ok(paged(rows, query.page, query.page_size))
    }

    async fn recommend_page(&self, query: &RecommendQuery) -> Result<(Vec<E>, u64)> {
        let rows = self.listed(|r| {
            let followed = query.followed_ids.iter().any(|id| id == r.id());
            let tagged = !query.tag_ids.is_empty()
                && r.user_id() != query.user_id
                && self.platform.has_tag(r.id(), &query.tag_ids);
            r.show() == ShowState::Show && r.is_status(ContentStatus::Available) && (followed || tagged)
        });
        Ok(paged(rows, query.page, query.page_size))
    }

    async fn admin_page(&self, query: &AdminPageQuery) -> Result<(Vec<E>, u64)> {
        let rows = self.listed(|r| {
            query.status.map_or(true, |s| r.is_status(s)) && (query.query.is_empty() || r.name().contains(&query.query))
        });
        Ok(paged(rows, query.page, query.page_size))
    }

    async fn remove_all_by_user(&self, user_id: &str) -> Result<Vec<String>> {
        let mut rows = self.rows.lock().unwrap();
        let mut ids = Vec::new();
        for row in rows
            .iter_mut()
            .filter(|r| r.user_id() == user_id && !r.is_status(ContentStatus::Deleted))
        {
            row.set_status(ContentStatus::Deleted);
            ids.push(row.id().to_string());
        }
        Ok(ids)
    }

    async fn update_search(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}

/// Services over in-memory storage, sharing one platform and outbox
pub struct Harness {
    pub platform: Arc<MemoryPlatform>,
    pub quote_repo: Arc<MemoryRepo<Quote>>,
    pub author_repo: Arc<MemoryRepo<QuoteAuthor>>,
    pub piece_repo: Arc<MemoryRepo<QuotePiece>>,
    pub quotes: Arc<ContentService<Quote>>,
    pub authors: Arc<ContentService<QuoteAuthor>>,
    pub pieces: Arc<ContentService<QuotePiece>>,
    pub quote_service: QuoteService,
    pub receivers: QueueReceivers,
}

impl Harness {
    pub fn new() -> Self {
        let platform = Arc::new(MemoryPlatform::default());
        let (queues, receivers) = Queues::new(256);
        let bundle = Platform {
            tags: platform.clone(),
            users: platform.clone(),
            revisions: platform.clone(),
            review: Arc::new(ConfigReview::new(ReviewConfig::default())),
            meta: platform.clone(),
            votes: platform.clone(),
            follows: platform.clone(),
            collections: platform.clone(),
            answers: platform.clone(),
            queues,
        };
        let config = Arc::new(ContentConfig::default());

        let quote_repo = Arc::new(MemoryRepo::<Quote>::new(platform.clone()));
        let author_repo = Arc::new(MemoryRepo::<QuoteAuthor>::new(platform.clone()));
        let piece_repo = Arc::new(MemoryRepo::<QuotePiece>::new(platform.clone()));
        let related = RelatedRepos {
            authors: author_repo.clone(),
            pieces: piece_repo.clone(),
        };

        let quotes = Arc::new(ContentService::new(
            quote_repo.clone(),
            bundle.clone(),
            config.clone(),
            Some(related),
        ));
        let authors = Arc::new(ContentService::new(author_repo.clone(), bundle.clone(), config.clone(), None));
        let pieces = Arc::new(ContentService::new(piece_repo.clone(), bundle, config, None));
        let quote_service = QuoteService::new(quotes.clone(), authors.clone(), pieces.clone());

        Self {
            platform,
            quote_repo,
            author_repo,
            piece_repo,
            quotes,
            authors,
            pieces,
            quote_service,
            receivers,
        }
    }

    pub fn activities(&mut self) -> Vec<ActivityMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = self.receivers.activity.try_recv() {
            out.push(msg);
        }
        out
    }

    pub fn notifications(&mut self) -> Vec<NotificationMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = self.receivers.notification.try_recv() {
            out.push(msg);
        }
        out
    }
}
