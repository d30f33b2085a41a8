//! Repository for the content tables
//!
//! One generic implementation serves quotes, quote authors and quote pieces.
//! Statements are composed as raw Postgres SQL against `E::KIND.table()` and
//! decoded through the entity's `FromQueryResult`. Misses are reported as
//! `Lookup::NotFound`, never as errors.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, FromQueryResult, QueryFilter, QueryOrder, Select,
    Statement, TransactionTrait, Value,
};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error};

use crate::cache::{self, CacheStore};
use crate::config::ContentConfig;
use crate::content::{ContentEntity, ContentKind, ContentStatus, Lookup, ShowState};
use crate::db::query::{
    build_admin_query, build_page_query, build_recommend_query, page_offset, AdminPageQuery, BuiltQuery, PageQuery,
    RecommendQuery, SqlParams,
};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::platform::IdGenerator;
use crate::schema::SitemapEntry;
use crate::search::{SearchDocument, SearchIndexer};

/// Data access for one content kind
#[async_trait]
pub trait ContentRepo<E: ContentEntity>: Send + Sync {
    /// Insert a new row, assigning its id
    async fn add(&self, entity: &mut E) -> Result<()>;

    /// Hard delete
    async fn remove(&self, id: &str) -> Result<()>;

    /// Write only the listed columns
    async fn update(&self, entity: &E, cols: &[&str]) -> Result<()>;

    async fn update_pv_count(&self, id: &str) -> Result<()>;

    /// Recount collections of the row and store the result
    async fn update_collection_count(&self, id: &str) -> Result<i64>;

    async fn update_status(&self, id: &str, status: ContentStatus) -> Result<()>;

    /// Change the status without touching `updated_at`
    async fn update_status_keep_time(&self, id: &str, status: ContentStatus) -> Result<()>;

    /// Back to `Available`
    async fn recover(&self, id: &str) -> Result<()>;

    /// Persist pin and show
    async fn update_operation(&self, entity: &E) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Lookup<E>>;

    /// Fuzzy name match, excluding deleted rows
    async fn search_by_name(&self, name: &str, limit: u64) -> Result<Vec<E>>;

    /// Exact name match, excluding deleted rows; the oldest match wins
    async fn find_by_name(&self, name: &str) -> Result<Lookup<E>>;

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<E>>;

    /// Visible, non-deleted rows
    async fn count(&self) -> Result<u64>;

    /// Non-deleted rows of a user, optionally restricted to one show state
    async fn user_count(&self, user_id: &str, show: Option<ShowState>) -> Result<u64>;

    /// One sitemap page (1-based), ids encoded when `short_id` is set
    async fn sitemap(&self, page: u64, page_size: u64, short_id: bool) -> Result<Vec<SitemapEntry>>;

    async fn page(&self, query: &PageQuery) -> Result<(Vec<E>, u64)>;

    async fn recommend_page(&self, query: &RecommendQuery) -> Result<(Vec<E>, u64)>;

    async fn admin_page(&self, query: &AdminPageQuery) -> Result<(Vec<E>, u64)>;

    /// Soft delete every live row of a user, returning the affected ids
    async fn remove_all_by_user(&self, user_id: &str) -> Result<Vec<String>>;

    /// Push the row's current state to the search index
    async fn update_search(&self, id: &str) -> Result<()>;
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    count: i64,
}

#[derive(Debug, FromQueryResult)]
struct IdRow {
    id: String,
}

#[derive(Debug, FromQueryResult)]
struct SitemapRow {
    id: String,
    title: String,
    updated_at: DateTimeWithTimeZone,
}

#[derive(Debug, FromQueryResult)]
struct SlugRow {
    slug_name: String,
}

fn to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

/// Postgres implementation of [`ContentRepo`]
pub struct SeaContentRepo<E> {
    pool: DbPool,
    ids: Arc<dyn IdGenerator>,
    cache: Arc<dyn CacheStore>,
    search: Arc<dyn SearchIndexer>,
    config: Arc<ContentConfig>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: ContentEntity> SeaContentRepo<E> {
    pub fn new(
        pool: DbPool,
        ids: Arc<dyn IdGenerator>,
        cache: Arc<dyn CacheStore>,
        search: Arc<dyn SearchIndexer>,
        config: Arc<ContentConfig>,
    ) -> Self {
        Self {
            pool,
            ids,
            cache,
            search,
            config,
            _entity: PhantomData,
        }
    }

    fn kind(&self) -> ContentKind {
        E::KIND
    }

    fn table(&self) -> &'static str {
        E::KIND.table()
    }

    fn select_by_id(id: &str) -> Select<E::Entity> {
        E::Entity::find().filter(E::id_column().eq(id))
    }

    /// Oldest live row with exactly this name
    fn select_by_name(name: &str) -> Select<E::Entity> {
        E::Entity::find()
            .filter(E::name_column().eq(name))
            .filter(E::status_column().ne(ContentStatus::Deleted.as_i32()))
            .order_by_asc(E::created_at_column())
    }

    fn stmt(sql: impl Into<String>, values: Vec<Value>) -> Statement {
        Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
    }

    async fn execute(&self, sql: impl Into<String>, values: Vec<Value>) -> Result<u64> {
        let result = self.pool.write().execute(Self::stmt(sql, values)).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: impl Into<String>, values: Vec<Value>) -> Result<Vec<E>> {
        Ok(E::find_by_statement(Self::stmt(sql, values))
            .all(self.pool.read())
            .await?)
    }

    async fn fetch_count(&self, sql: impl Into<String>, values: Vec<Value>) -> Result<u64> {
        let row = CountRow::find_by_statement(Self::stmt(sql, values))
            .one(self.pool.read())
            .await?;
        Ok(row.map(|r| to_u64(r.count)).unwrap_or(0))
    }

    async fn fetch_page(&self, built: BuiltQuery) -> Result<(Vec<E>, u64)> {
        let rows = self.fetch_all(built.sql, built.values.clone()).await?;
        let total = self.fetch_count(built.count_sql, built.values).await?;
        Ok((rows, total))
    }

    /// Index refresh after a state change; failures are logged only
    async fn sync_search(&self, id: &str) {
        if let Err(e) = self.update_search(id).await {
            error!(kind = %self.kind(), id, error = %e, "Search index update failed");
        }
    }

    async fn object_tag_slugs(&self, id: &str) -> Result<Vec<String>> {
        let rows = SlugRow::find_by_statement(Self::stmt(
            "SELECT t.slug_name FROM tag_rel tr JOIN tag t ON t.id = tr.tag_id WHERE tr.object_id = $1 AND tr.status = $2",
            vec![id.into(), crate::db::models::TagRelStatus::Available.as_i32().into()],
        ))
        .all(self.pool.read())
        .await?;
        Ok(rows.into_iter().map(|r| r.slug_name).collect())
    }

    async fn load_sitemap(&self, page: u64, page_size: u64, short_id: bool) -> Result<Vec<SitemapEntry>> {
        let size = page_size.max(1);
        let offset = page_offset(page, size);
        let sql = format!(
            "SELECT id, {name} AS title, updated_at FROM {table} WHERE status < $1 AND show = $2 \
             ORDER BY created_at ASC LIMIT {size} OFFSET {offset}",
            name = self.kind().name_column(),
            table = self.table(),
        );
        let rows = SitemapRow::find_by_statement(Self::stmt(
            sql,
            vec![
                ContentStatus::Deleted.as_i32().into(),
                ShowState::Show.as_i32().into(),
            ],
        ))
        .all(self.pool.read())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| SitemapEntry {
                id: crate::short_id::encode_if(short_id, &row.id),
                url_title: crate::text::url_title(&row.title),
                title: row.title,
                updated_at: row.updated_at.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            })
            .collect())
    }
}

/// Search document for an entity and its tag slugs
pub fn search_document<E: ContentEntity>(entity: &E, tags: Vec<String>) -> SearchDocument {
    let counters = entity.counters();
    let active = entity
        .post_update_time()
        .unwrap_or_else(|| entity.updated_at())
        .timestamp();
    SearchDocument {
        object_id: entity.id().to_string(),
        title: entity.name().to_string(),
        object_type: E::KIND.object_type().to_string(),
        content: entity.original_text().to_string(),
        status: entity.status_code(),
        tags,
        user_id: entity.user_id().to_string(),
        views: counters.view_count,
        created: entity.created_at().timestamp(),
        active,
        score: counters.vote_count,
    }
}

#[async_trait]
impl<E: ContentEntity> ContentRepo<E> for SeaContentRepo<E> {
    async fn add(&self, entity: &mut E) -> Result<()> {
        let id = self.ids.next_id(self.kind()).await?;
        entity.set_id(id);

        let (names, values): (Vec<&str>, Vec<Value>) = entity.columns().into_iter().unzip();
        let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("${i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(),
            names.join(", "),
            placeholders.join(", ")
        );
        self.execute(sql, values).await?;
        debug!(kind = %self.kind(), id = entity.id(), "Content inserted");
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.execute(format!("DELETE FROM {} WHERE id = $1", self.table()), vec![id.into()])
            .await?;
        Ok(())
    }

    async fn update(&self, entity: &E, cols: &[&str]) -> Result<()> {
        if cols.is_empty() {
            return Ok(());
        }
        let mut params = SqlParams::default();
        let mut assignments = Vec::with_capacity(cols.len());
        for col in cols {
            let value = entity
                .column_value(col)
                .ok_or_else(|| AppError::internal(format!("unknown column {} on {}", col, self.table())))?;
            assignments.push(format!("{col} = {}", params.bind(value)));
        }
        let id = params.bind(entity.id().to_string());
        let sql = format!("UPDATE {} SET {} WHERE id = {id}", self.table(), assignments.join(", "));
        self.execute(sql, params.into_values()).await?;
        self.sync_search(entity.id()).await;
        Ok(())
    }

    async fn update_pv_count(&self, id: &str) -> Result<()> {
        self.execute(
            format!("UPDATE {} SET view_count = view_count + 1 WHERE id = $1", self.table()),
            vec![id.into()],
        )
        .await?;
        Ok(())
    }

    async fn update_collection_count(&self, id: &str) -> Result<i64> {
        let txn = self.pool.write().begin().await?;

        let count = CountRow::find_by_statement(Self::stmt(
            "SELECT COUNT(*) AS count FROM collection WHERE object_id = $1",
            vec![id.into()],
        ))
        .one(&txn)
        .await?
        .map(|r| r.count)
        .unwrap_or(0);

        txn.execute(Self::stmt(
            format!("UPDATE {} SET collection_count = $1 WHERE id = $2", self.table()),
            vec![i32::try_from(count).unwrap_or(i32::MAX).into(), id.into()],
        ))
        .await?;

        txn.commit().await?;
        Ok(count)
    }

    async fn update_status(&self, id: &str, status: ContentStatus) -> Result<()> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        self.execute(
            format!("UPDATE {} SET status = $1, updated_at = $2 WHERE id = $3", self.table()),
            vec![status.as_i32().into(), now.into(), id.into()],
        )
        .await?;
        self.sync_search(id).await;
        Ok(())
    }

    async fn update_status_keep_time(&self, id: &str, status: ContentStatus) -> Result<()> {
        self.execute(
            format!("UPDATE {} SET status = $1 WHERE id = $2", self.table()),
            vec![status.as_i32().into(), id.into()],
        )
        .await?;
        self.sync_search(id).await;
        Ok(())
    }

    async fn recover(&self, id: &str) -> Result<()> {
        self.execute(
            format!("UPDATE {} SET status = $1 WHERE id = $2", self.table()),
            vec![ContentStatus::Available.as_i32().into(), id.into()],
        )
        .await?;
        self.sync_search(id).await;
        Ok(())
    }

    async fn update_operation(&self, entity: &E) -> Result<()> {
        self.execute(
            format!("UPDATE {} SET pin = $1, show = $2 WHERE id = $3", self.table()),
            vec![
                entity.pin_code().into(),
                entity.show_code().into(),
                entity.id().into(),
            ],
        )
        .await?;
        self.sync_search(entity.id()).await;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Lookup<E>> {
        let row = Self::select_by_id(id).one(self.pool.read()).await?;
        Ok(row.into())
    }

    async fn search_by_name(&self, name: &str, limit: u64) -> Result<Vec<E>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} LIKE $1 AND status != $2 ORDER BY created_at DESC LIMIT {}",
            self.table(),
            self.kind().name_column(),
            limit.max(1)
        );
        self.fetch_all(
            sql,
            vec![format!("%{name}%").into(), ContentStatus::Deleted.as_i32().into()],
        )
        .await
    }

    async fn find_by_name(&self, name: &str) -> Result<Lookup<E>> {
        let row = Self::select_by_name(name).one(self.pool.read()).await?;
        Ok(row.into())
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<E>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut params = SqlParams::default();
        let filter = params.in_list("id", ids.iter().cloned());
        self.fetch_all(
            format!("SELECT * FROM {} WHERE {filter}", self.table()),
            params.into_values(),
        )
        .await
    }

    async fn count(&self) -> Result<u64> {
        self.fetch_count(
            format!("SELECT COUNT(*) AS count FROM {} WHERE status < $1 AND show = $2", self.table()),
            vec![
                ContentStatus::Deleted.as_i32().into(),
                ShowState::Show.as_i32().into(),
            ],
        )
        .await
    }

    async fn user_count(&self, user_id: &str, show: Option<ShowState>) -> Result<u64> {
        let mut params = SqlParams::default();
        let user = params.bind(user_id.to_string());
        let deleted = params.bind(ContentStatus::Deleted.as_i32());
        let mut sql = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE user_id = {user} AND status != {deleted}",
            self.table()
        );
        if let Some(show) = show {
            sql.push_str(&format!(" AND show = {}", params.bind(show.as_i32())));
        }
        self.fetch_count(sql, params.into_values()).await
    }

    async fn sitemap(&self, page: u64, page_size: u64, short_id: bool) -> Result<Vec<SitemapEntry>> {
        let key = cache::keys::sitemap_page(self.kind(), page);
        cache::get_or_load(
            self.cache.as_ref(),
            &key,
            self.config.sitemap_cache_ttl(),
            || self.load_sitemap(page, page_size, short_id),
        )
        .await
    }

    async fn page(&self, query: &PageQuery) -> Result<(Vec<E>, u64)> {
        let built = build_page_query(self.kind(), query, self.config.default_page_size, Utc::now());
        self.fetch_page(built).await
    }

    async fn recommend_page(&self, query: &RecommendQuery) -> Result<(Vec<E>, u64)> {
        match build_recommend_query(self.kind(), query, self.config.default_page_size) {
            Some(built) => self.fetch_page(built).await,
            None => Ok((Vec::new(), 0)),
        }
    }

    async fn admin_page(&self, query: &AdminPageQuery) -> Result<(Vec<E>, u64)> {
        let built = build_admin_query(self.kind(), query, self.config.default_page_size);
        self.fetch_page(built).await
    }

    async fn remove_all_by_user(&self, user_id: &str) -> Result<Vec<String>> {
        let sql = format!(
            "UPDATE {} SET status = $1 WHERE user_id = $2 AND status != $1 RETURNING id",
            self.table()
        );
        let rows = IdRow::find_by_statement(Self::stmt(
            sql,
            vec![ContentStatus::Deleted.as_i32().into(), user_id.into()],
        ))
        .all(self.pool.write())
        .await?;

        let ids: Vec<String> = rows.into_iter().map(|r| r.id).collect();
        for id in &ids {
            if let Err(e) = self.search.delete_content(id).await {
                error!(kind = %self.kind(), id = %id, error = %e, "Search index delete failed");
            }
        }
        Ok(ids)
    }

    async fn update_search(&self, id: &str) -> Result<()> {
        let Some(entity) = self.get(id).await?.found() else {
            return Ok(());
        };
        if entity.is_status(ContentStatus::Deleted) {
            return self.search.delete_content(id).await;
        }
        let tags = self.object_tag_slugs(id).await?;
        self.search.update_content(&search_document(&entity, tags)).await
    }
}
