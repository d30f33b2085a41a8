//! Postgres-backed platform collaborators
//!
//! Tags, meta, revisions, collections and ids go through the sea-orm
//! entities; host tables without an entity here (`"user"`, `activity`,
//! `answer`) are read with raw statements.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, Set, Statement,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

use super::{
    AnswerLookup, CollectionService, FollowService, IdGenerator, MetaService, NewRevision, RevisionService, TagCommon,
    UserCommon, VoteService,
};
use crate::content::{ContentKind, Lookup};
use crate::db::models::*;
use crate::db::query::SqlParams;
use crate::db::DbPool;
use crate::errors::Result;
use crate::schema::{Role, TagInfo, TagItem, UserBasicInfo};

const TAG_FOLLOW_ACTIVITY: &str = "tag.follow";
const ANSWER_STATUS_DELETED: i32 = 10;

#[derive(Debug, FromQueryResult)]
struct IdRow {
    id: String,
}

#[derive(Debug, FromQueryResult)]
struct UserRow {
    id: String,
    username: String,
    display_name: String,
    avatar: String,
    rank: i32,
    status: String,
}

impl From<UserRow> for UserBasicInfo {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
            avatar: row.avatar,
            rank: row.rank,
            status: row.status,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct RoleRow {
    role: String,
}

#[derive(Debug, FromQueryResult)]
struct ActivityTypeRow {
    activity_type: String,
}

fn now() -> sea_orm::prelude::DateTimeWithTimeZone {
    chrono::Utc::now().into()
}

fn parse_tag_ids(ids: &[String]) -> Vec<i64> {
    ids.iter().filter_map(|id| id.trim().parse::<i64>().ok()).collect()
}

/// Platform collaborators over the primary database
#[derive(Clone)]
pub struct SqlPlatform {
    pool: DbPool,
}

impl SqlPlatform {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn stmt(sql: impl Into<String>, values: Vec<sea_orm::Value>) -> Statement {
        Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
    }

    /// Attach the main tag's slug to synonyms
    async fn to_infos(&self, tags: Vec<Tag>) -> Result<Vec<TagInfo>> {
        let main_ids: BTreeSet<i64> = tags.iter().map(|t| t.main_tag_id).filter(|id| *id != 0).collect();
        let main_slugs: HashMap<i64, String> = if main_ids.is_empty() {
            HashMap::new()
        } else {
            TagEntity::find()
                .filter(TagColumn::Id.is_in(main_ids))
                .all(self.pool.read())
                .await?
                .into_iter()
                .map(|t| (t.id, t.slug_name))
                .collect()
        };

        Ok(tags
            .into_iter()
            .map(|t| TagInfo {
                id: t.id.to_string(),
                main_tag_slug_name: main_slugs.get(&t.main_tag_id).cloned().unwrap_or_default(),
                slug_name: t.slug_name,
                display_name: t.display_name,
                recommend: t.recommend,
                reserved: t.reserved,
            })
            .collect())
    }

    async fn set_rel_status(&self, object_id: &str, from: &[TagRelStatus], to: TagRelStatus) -> Result<()> {
        let from: Vec<i32> = from.iter().map(|s| s.as_i32()).collect();
        let result = TagRelEntity::update_many()
            .col_expr(TagRelColumn::Status, Expr::value(to.as_i32()))
            .col_expr(TagRelColumn::UpdatedAt, Expr::value(now()))
            .filter(TagRelColumn::ObjectId.eq(object_id))
            .filter(TagRelColumn::Status.is_in(from))
            .exec(self.pool.write())
            .await?;
        debug!(object_id, status = ?to, rows = result.rows_affected, "Tag relations updated");
        Ok(())
    }

    async fn activity_ids(&self, user_id: &str, activity_type: &str) -> Result<Vec<String>> {
        let rows = IdRow::find_by_statement(Self::stmt(
            "SELECT object_id AS id FROM activity WHERE user_id = $1 AND activity_type = $2 AND cancelled = FALSE \
             ORDER BY created_at DESC",
            vec![user_id.into(), activity_type.into()],
        ))
        .all(self.pool.read())
        .await?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }
}

// ============================================================================
// Tags
// ============================================================================

#[async_trait]
impl TagCommon for SqlPlatform {
    async fn object_tags(&self, object_id: &str) -> Result<Vec<TagInfo>> {
        let ids = [object_id.to_string()];
        Ok(self.batch_object_tags(&ids).await?.remove(object_id).unwrap_or_default())
    }

    async fn batch_object_tags(&self, object_ids: &[String]) -> Result<HashMap<String, Vec<TagInfo>>> {
        if object_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rels = TagRelEntity::find()
            .filter(TagRelColumn::ObjectId.is_in(object_ids.iter().cloned()))
            .filter(TagRelColumn::Status.eq(TagRelStatus::Available.as_i32()))
            .order_by_asc(TagRelColumn::Id)
            .all(self.pool.read())
            .await?;
        if rels.is_empty() {
            return Ok(HashMap::new());
        }

        let tag_ids: BTreeSet<i64> = rels.iter().map(|r| r.tag_id).collect();
        let tags = TagEntity::find()
            .filter(TagColumn::Id.is_in(tag_ids))
            .filter(TagColumn::Status.eq(TAG_STATUS_AVAILABLE))
            .all(self.pool.read())
            .await?;
        let by_id: HashMap<String, TagInfo> = self
            .to_infos(tags)
            .await?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect();

        let mut grouped: HashMap<String, Vec<TagInfo>> = HashMap::new();
        for rel in rels {
            if let Some(tag) = by_id.get(&rel.tag_id.to_string()) {
                grouped.entry(rel.object_id).or_default().push(tag.clone());
            }
        }
        Ok(grouped)
    }

    async fn tag_by_slug(&self, slug_name: &str) -> Result<Lookup<TagInfo>> {
        let tag = TagEntity::find()
            .filter(TagColumn::SlugName.eq(slug_name))
            .filter(TagColumn::Status.eq(TAG_STATUS_AVAILABLE))
            .one(self.pool.read())
            .await?;
        match tag {
            Some(tag) => Ok(self.to_infos(vec![tag]).await?.pop().into()),
            None => Ok(Lookup::NotFound),
        }
    }

    async fn synonym_tag_ids(&self, main_tag_id: &str) -> Result<Vec<String>> {
        let Ok(main_tag_id) = main_tag_id.parse::<i64>() else {
            return Ok(Vec::new());
        };
        let tags = TagEntity::find()
            .filter(TagColumn::MainTagId.eq(main_tag_id))
            .filter(TagColumn::Status.eq(TAG_STATUS_AVAILABLE))
            .all(self.pool.read())
            .await?;
        Ok(tags.into_iter().map(|t| t.id.to_string()).collect())
    }

    async fn tags_by_slugs(&self, slug_names: &[String]) -> Result<Vec<TagInfo>> {
        if slug_names.is_empty() {
            return Ok(Vec::new());
        }
        let tags = TagEntity::find()
            .filter(TagColumn::SlugName.is_in(slug_names.iter().cloned()))
            .filter(TagColumn::Status.eq(TAG_STATUS_AVAILABLE))
            .all(self.pool.read())
            .await?;
        self.to_infos(tags).await
    }

    async fn exist_recommend(&self, tags: &[TagItem]) -> Result<bool> {
        let slugs: Vec<String> = tags.iter().map(|t| t.slug_name.clone()).collect();
        Ok(self.tags_by_slugs(&slugs).await?.iter().any(|t| t.recommend))
    }

    async fn following_tag_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.activity_ids(user_id, TAG_FOLLOW_ACTIVITY).await
    }

    async fn change_tags(&self, object_id: &str, tags: &[TagItem], user_id: &str) -> Result<()> {
        let db = self.pool.write();
        let at = now();

        let slugs: Vec<String> = tags
            .iter()
            .map(|t| t.slug_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut known = if slugs.is_empty() {
            Vec::new()
        } else {
            TagEntity::find()
                .filter(TagColumn::SlugName.is_in(slugs.clone()))
                .filter(TagColumn::Status.eq(TAG_STATUS_AVAILABLE))
                .all(db)
                .await?
        };

        for item in tags {
            if known.iter().any(|t| t.slug_name == item.slug_name) {
                continue;
            }
            let display_name = if item.display_name.is_empty() {
                item.slug_name.clone()
            } else {
                item.display_name.clone()
            };
            let created = TagActiveModel {
                id: NotSet,
                main_tag_id: Set(0),
                slug_name: Set(item.slug_name.clone()),
                display_name: Set(display_name),
                original_text: Set(item.original_text.clone()),
                parsed_text: Set(item.parsed_text.clone()),
                recommend: Set(false),
                reserved: Set(false),
                object_count: Set(0),
                status: Set(TAG_STATUS_AVAILABLE),
                user_id: Set(user_id.to_string()),
                created_at: Set(at),
                updated_at: Set(at),
            }
            .insert(db)
            .await?;
            debug!(slug_name = %created.slug_name, "Tag created");
            known.push(created);
        }

        let target: HashSet<i64> = known.iter().map(|t| t.id).collect();
        let rels = TagRelEntity::find()
            .filter(TagRelColumn::ObjectId.eq(object_id))
            .all(db)
            .await?;

        let mut touched: BTreeSet<i64> = BTreeSet::new();
        for rel in &rels {
            let wanted = if target.contains(&rel.tag_id) {
                TagRelStatus::Available
            } else {
                TagRelStatus::Deleted
            };
            if rel.rel_status() != wanted {
                let mut active: TagRelActiveModel = rel.clone().into();
                active.status = Set(wanted.as_i32());
                active.updated_at = Set(at);
                active.update(db).await?;
            }
            touched.insert(rel.tag_id);
        }

        for tag_id in &target {
            if rels.iter().any(|r| r.tag_id == *tag_id) {
                continue;
            }
            TagRelActiveModel {
                id: NotSet,
                tag_id: Set(*tag_id),
                object_id: Set(object_id.to_string()),
                status: Set(TagRelStatus::Available.as_i32()),
                created_at: Set(at),
                updated_at: Set(at),
            }
            .insert(db)
            .await?;
            touched.insert(*tag_id);
        }

        let touched: Vec<String> = touched.into_iter().map(|id| id.to_string()).collect();
        self.refresh_tag_counts(&touched).await
    }

    async fn hide_tag_rels(&self, object_id: &str) -> Result<()> {
        self.set_rel_status(object_id, &[TagRelStatus::Available], TagRelStatus::Hide)
            .await
    }

    async fn show_tag_rels(&self, object_id: &str) -> Result<()> {
        self.set_rel_status(object_id, &[TagRelStatus::Hide], TagRelStatus::Available)
            .await
    }

    async fn remove_tag_rels(&self, object_id: &str) -> Result<()> {
        self.set_rel_status(
            object_id,
            &[TagRelStatus::Available, TagRelStatus::Hide],
            TagRelStatus::Deleted,
        )
        .await
    }

    async fn recover_tag_rels(&self, object_id: &str) -> Result<()> {
        self.set_rel_status(object_id, &[TagRelStatus::Deleted], TagRelStatus::Available)
            .await
    }

    async fn refresh_tag_counts(&self, tag_ids: &[String]) -> Result<()> {
        let ids = parse_tag_ids(tag_ids);
        if ids.is_empty() {
            return Ok(());
        }
        let mut params = SqlParams::default();
        let status = params.bind(TagRelStatus::Available.as_i32());
        let filter = params.in_list("id", ids);
        let sql = format!(
            "UPDATE tag SET object_count = (SELECT COUNT(*) FROM tag_rel tr WHERE tr.tag_id = tag.id AND tr.status = {status}) \
             WHERE {filter}"
        );
        self.pool.write().execute(Self::stmt(sql, params.into_values())).await?;
        Ok(())
    }

    async fn refresh_object_tag_counts(&self, object_id: &str) -> Result<()> {
        let sql = "UPDATE tag SET object_count = (SELECT COUNT(*) FROM tag_rel tr WHERE tr.tag_id = tag.id AND tr.status = $1) \
                   WHERE id IN (SELECT tag_id FROM tag_rel WHERE object_id = $2)";
        self.pool
            .write()
            .execute(Self::stmt(
                sql,
                vec![TagRelStatus::Available.as_i32().into(), object_id.into()],
            ))
            .await?;
        Ok(())
    }
}

// ============================================================================
// Users
// ============================================================================

#[async_trait]
impl UserCommon for SqlPlatform {
    async fn batch_basic_info(&self, user_ids: &[String]) -> Result<HashMap<String, UserBasicInfo>> {
        let ids: BTreeSet<&String> = user_ids.iter().filter(|id| !id.is_empty()).collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut params = SqlParams::default();
        let filter = params.in_list("id", ids.into_iter().cloned());
        let sql = format!(r#"SELECT id, username, display_name, avatar, rank, status FROM "user" WHERE {filter}"#);
        let rows = UserRow::find_by_statement(Self::stmt(sql, params.into_values()))
            .all(self.pool.read())
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.id.clone(), UserBasicInfo::from(row)))
            .collect())
    }

    async fn get_by_username(&self, username: &str) -> Result<Lookup<UserBasicInfo>> {
        let row = UserRow::find_by_statement(Self::stmt(
            r#"SELECT id, username, display_name, avatar, rank, status FROM "user" WHERE username = $1 LIMIT 1"#,
            vec![username.into()],
        ))
        .one(self.pool.read())
        .await?;
        Ok(row.map(UserBasicInfo::from).into())
    }

    async fn update_content_count(&self, kind: ContentKind, user_id: &str, count: u64) -> Result<()> {
        let sql = format!(r#"UPDATE "user" SET {} = $1 WHERE id = $2"#, kind.user_count_column());
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        self.pool
            .write()
            .execute(Self::stmt(sql, vec![count.into(), user_id.into()]))
            .await?;
        Ok(())
    }

    async fn role(&self, user_id: &str) -> Result<Role> {
        let row = RoleRow::find_by_statement(Self::stmt(
            r#"SELECT role FROM "user" WHERE id = $1"#,
            vec![user_id.into()],
        ))
        .one(self.pool.read())
        .await?;
        Ok(row.map(|r| Role::parse(&r.role)).unwrap_or_default())
    }
}

// ============================================================================
// Revisions
// ============================================================================

#[async_trait]
impl RevisionService for SqlPlatform {
    async fn add_revision(&self, revision: NewRevision) -> Result<String> {
        let at = now();
        let passed = revision.status == RevisionStatus::ReviewPassed;
        let saved = RevisionActiveModel {
            id: NotSet,
            user_id: Set(revision.user_id),
            object_type: Set(revision.kind.object_type().to_string()),
            object_id: Set(revision.object_id.clone()),
            title: Set(revision.title),
            content: Set(revision.content),
            log: Set(revision.log),
            status: Set(revision.status.as_i32()),
            review_user_id: Set(None),
            created_at: Set(at),
            updated_at: Set(at),
        }
        .insert(self.pool.write())
        .await?;

        let revision_id = saved.id.to_string();
        if passed {
            let sql = format!("UPDATE {} SET revision_id = $1 WHERE id = $2", revision.kind.table());
            self.pool
                .write()
                .execute(Self::stmt(sql, vec![revision_id.clone().into(), revision.object_id.into()]))
                .await?;
        }
        Ok(revision_id)
    }

    async fn exist_unreviewed(&self, object_id: &str) -> Result<bool> {
        let pending = RevisionEntity::find()
            .filter(RevisionColumn::ObjectId.eq(object_id))
            .filter(RevisionColumn::Status.eq(RevisionStatus::Unreviewed.as_i32()))
            .count(self.pool.read())
            .await?;
        Ok(pending > 0)
    }

    async fn last_revision(&self, object_id: &str) -> Result<Lookup<Revision>> {
        let revision = RevisionEntity::find()
            .filter(RevisionColumn::ObjectId.eq(object_id))
            .filter(RevisionColumn::Status.eq(RevisionStatus::ReviewPassed.as_i32()))
            .order_by_desc(RevisionColumn::Id)
            .one(self.pool.read())
            .await?;
        Ok(revision.into())
    }
}

// ============================================================================
// Meta, interactions, ids
// ============================================================================

#[async_trait]
impl MetaService for SqlPlatform {
    async fn get_meta(&self, object_id: &str, key: &str) -> Result<Lookup<Meta>> {
        let meta = MetaEntity::find()
            .filter(MetaColumn::ObjectId.eq(object_id))
            .filter(MetaColumn::Key.eq(key))
            .one(self.pool.read())
            .await?;
        Ok(meta.into())
    }

    async fn upsert_meta(&self, object_id: &str, key: &str, value: &str) -> Result<()> {
        let db = self.pool.write();
        let at = now();
        let existing = MetaEntity::find()
            .filter(MetaColumn::ObjectId.eq(object_id))
            .filter(MetaColumn::Key.eq(key))
            .one(db)
            .await?;

        match existing {
            Some(meta) => {
                let mut active: MetaActiveModel = meta.into();
                active.value = Set(value.to_string());
                active.updated_at = Set(at);
                active.update(db).await?;
            }
            None => {
                MetaActiveModel {
                    id: NotSet,
                    object_id: Set(object_id.to_string()),
                    key: Set(key.to_string()),
                    value: Set(value.to_string()),
                    created_at: Set(at),
                    updated_at: Set(at),
                }
                .insert(db)
                .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VoteService for SqlPlatform {
    async fn vote_status(&self, kind: ContentKind, object_id: &str, user_id: &str) -> Result<String> {
        let up = format!("{}.vote_up", kind.object_type());
        let down = format!("{}.vote_down", kind.object_type());
        let row = ActivityTypeRow::find_by_statement(Self::stmt(
            "SELECT activity_type FROM activity WHERE object_id = $1 AND user_id = $2 AND cancelled = FALSE \
             AND activity_type IN ($3, $4) ORDER BY created_at DESC LIMIT 1",
            vec![object_id.into(), user_id.into(), up.into(), down.into()],
        ))
        .one(self.pool.read())
        .await?;
        Ok(row
            .and_then(|r| r.activity_type.rsplit('.').next().map(str::to_string))
            .unwrap_or_default())
    }
}

#[async_trait]
impl FollowService for SqlPlatform {
    async fn is_followed(&self, kind: ContentKind, user_id: &str, object_id: &str) -> Result<bool> {
        let ids = self.followed_object_ids(kind, user_id).await?;
        Ok(ids.iter().any(|id| id == object_id))
    }

    async fn followed_object_ids(&self, kind: ContentKind, user_id: &str) -> Result<Vec<String>> {
        self.activity_ids(user_id, &format!("{}.follow", kind.object_type()))
            .await
    }
}

#[async_trait]
impl CollectionService for SqlPlatform {
    async fn collected(&self, user_id: &str, object_ids: &[String]) -> Result<HashSet<String>> {
        if user_id.is_empty() || object_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = CollectionEntity::find()
            .filter(CollectionColumn::UserId.eq(user_id))
            .filter(CollectionColumn::ObjectId.is_in(object_ids.iter().cloned()))
            .all(self.pool.read())
            .await?;
        Ok(rows.into_iter().map(|c| c.object_id).collect())
    }

    async fn user_collections(
        &self,
        kind: ContentKind,
        user_id: &str,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<String>, u64)> {
        let paginator = CollectionEntity::find()
            .filter(CollectionColumn::UserId.eq(user_id))
            .filter(CollectionColumn::ObjectId.starts_with(kind.id_prefix()))
            .order_by_desc(CollectionColumn::CreatedAt)
            .paginate(self.pool.read(), page_size.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.max(1) - 1).await?;
        Ok((items.into_iter().map(|c| c.object_id).collect(), total))
    }
}

#[async_trait]
impl AnswerLookup for SqlPlatform {
    async fn answer_ids(&self, user_id: &str, object_id: &str) -> Result<Vec<String>> {
        let rows = IdRow::find_by_statement(Self::stmt(
            "SELECT id FROM answer WHERE question_id = $1 AND user_id = $2 AND status != $3 ORDER BY created_at ASC",
            vec![object_id.into(), user_id.into(), ANSWER_STATUS_DELETED.into()],
        ))
        .all(self.pool.read())
        .await?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }
}

#[async_trait]
impl IdGenerator for SqlPlatform {
    async fn next_id(&self, kind: ContentKind) -> Result<String> {
        let row = UniqidActiveModel {
            id: NotSet,
            uniqid_type: Set(i32::from(kind.type_code())),
        }
        .insert(self.pool.write())
        .await?;
        Ok(kind.unique_id(row.id))
    }
}
