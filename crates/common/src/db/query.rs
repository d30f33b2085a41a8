//! SQL composition for content listings
//!
//! Pure functions that turn listing filters into parameterized Postgres
//! statements. The repository executes them; tests inspect them directly.

use chrono::{DateTime, Duration, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::Value;

use crate::content::{ContentKind, ContentStatus, OrderCond, ShowState};
use crate::db::models::TagRelStatus;

/// `active` ordering only considers content created within this window
/// unless the caller supplies its own
pub const ACTIVE_CREATED_WITHIN_DAYS: i64 = 180;

/// `active` ordering only considers content touched within this window
pub const ACTIVE_UPDATED_WITHIN_DAYS: i64 = 90;

/// Largest page a listing returns
pub const MAX_PAGE_SIZE: u64 = 100;

/// `in_days` beyond this is treated as this
pub const MAX_IN_DAYS: i64 = 36_500;

/// Filters for the public listing
#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    /// 1-based page number
    pub page: u64,
    pub page_size: u64,
    /// Raw tag ids (main tag plus synonyms)
    pub tag_ids: Vec<String>,
    pub user_id: Option<String>,
    pub order: OrderCond,
    /// Restrict to content created within this many days (0 = no limit)
    pub in_days: i64,
    pub show_hidden: bool,
    pub show_pending: bool,
}

/// Filters for the personalised feed
#[derive(Debug, Clone, Default)]
pub struct RecommendQuery {
    pub page: u64,
    pub page_size: u64,
    pub user_id: String,
    pub tag_ids: Vec<String>,
    pub followed_ids: Vec<String>,
}

/// Filters for the admin listing
#[derive(Debug, Clone, Default)]
pub struct AdminPageQuery {
    pub page: u64,
    pub page_size: u64,
    pub status: Option<ContentStatus>,
    /// Free text: `<kind>:<id>` or a name fragment
    pub query: String,
}

/// How the admin free-text query is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminSearch {
    All,
    ById(String),
    ByName(String),
}

/// A statement plus its matching count statement; both share `values`
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub count_sql: String,
    pub values: Vec<Value>,
}

/// Positional parameter collector (`$1`, `$2`, ...)
#[derive(Debug, Default)]
pub struct SqlParams {
    values: Vec<Value>,
}

impl SqlParams {
    pub fn bind(&mut self, value: impl Into<Value>) -> String {
        self.values.push(value.into());
        format!("${}", self.values.len())
    }

    /// `column IN (...)`, or `FALSE` for an empty list
    pub fn in_list<V: Into<Value>>(&mut self, column: &str, items: impl IntoIterator<Item = V>) -> String {
        let placeholders: Vec<String> = items.into_iter().map(|v| self.bind(v)).collect();
        if placeholders.is_empty() {
            "FALSE".to_string()
        } else {
            format!("{column} IN ({})", placeholders.join(", "))
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// LIMIT / OFFSET for a 1-based page; the size is capped at [`MAX_PAGE_SIZE`]
pub fn limit_offset(page: u64, page_size: u64, default_page_size: u64) -> (u64, u64) {
    let size = if page_size == 0 { default_page_size } else { page_size };
    let size = size.clamp(1, MAX_PAGE_SIZE);
    (size, page_offset(page, size))
}

/// OFFSET for a 1-based page, saturating at what Postgres accepts
pub fn page_offset(page: u64, size: u64) -> u64 {
    (page.max(1) - 1).saturating_mul(size).min(i64::MAX as u64)
}

fn days_ago(now: DateTime<Utc>, days: i64) -> DateTimeWithTimeZone {
    let days = days.clamp(0, MAX_IN_DAYS);
    let since = Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    DateTimeWithTimeZone::from(since)
}

fn tag_ids_as_i64(tag_ids: &[String]) -> Vec<i64> {
    tag_ids.iter().filter_map(|id| id.trim().parse::<i64>().ok()).collect()
}

fn tag_exists(params: &mut SqlParams, tag_ids: &[String]) -> String {
    let status = params.bind(TagRelStatus::Available.as_i32());
    let tags = params.in_list("tr.tag_id", tag_ids_as_i64(tag_ids));
    format!("EXISTS (SELECT 1 FROM tag_rel tr WHERE tr.object_id = c.id AND tr.status = {status} AND {tags})")
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        "TRUE".to_string()
    } else {
        conditions.join(" AND ")
    }
}

/// Public listing: visibility, tag, author, recency and ordering rules
pub fn build_page_query(kind: ContentKind, q: &PageQuery, default_page_size: u64, now: DateTime<Utc>) -> BuiltQuery {
    let table = kind.table();
    let mut params = SqlParams::default();
    let mut conditions = Vec::new();

    let mut statuses = vec![ContentStatus::Available.as_i32(), ContentStatus::Closed.as_i32()];
    if q.show_pending {
        statuses.push(ContentStatus::Pending.as_i32());
    }
    conditions.push(params.in_list("c.status", statuses));

    if !q.tag_ids.is_empty() {
        conditions.push(tag_exists(&mut params, &q.tag_ids));
    }

    match q.user_id.as_deref().filter(|u| !u.is_empty()) {
        Some(user_id) => {
            conditions.push(format!("c.user_id = {}", params.bind(user_id.to_string())));
            if !q.show_hidden {
                conditions.push(format!("c.show = {}", params.bind(ShowState::Show.as_i32())));
            }
        }
        None => conditions.push(format!("c.show = {}", params.bind(ShowState::Show.as_i32()))),
    }

    if q.in_days > 0 {
        conditions.push(format!("c.created_at > {}", params.bind(days_ago(now, q.in_days))));
    }

    let order = match q.order {
        OrderCond::Newest | OrderCond::Frequent => "c.pin DESC, c.created_at DESC".to_string(),
        OrderCond::Active => {
            if q.in_days == 0 {
                conditions.push(format!(
                    "c.created_at > {}",
                    params.bind(days_ago(now, ACTIVE_CREATED_WITHIN_DAYS))
                ));
            }
            let active = kind.active_column();
            conditions.push(format!(
                "c.{active} > {}",
                params.bind(days_ago(now, ACTIVE_UPDATED_WITHIN_DAYS))
            ));
            format!("c.pin DESC, c.{active} DESC, c.updated_at DESC")
        }
        OrderCond::Hot => "c.pin DESC, c.hot_score DESC".to_string(),
        OrderCond::Score => "c.pin DESC, c.vote_count DESC, c.view_count DESC".to_string(),
        OrderCond::Unanswered => {
            if let Some(filter) = kind.unanswered_filter() {
                conditions.push(format!("c.{filter}"));
            }
            "c.pin DESC, c.created_at DESC".to_string()
        }
    };

    let (limit, offset) = limit_offset(q.page, q.page_size, default_page_size);
    let filter = where_clause(&conditions);
    BuiltQuery {
        sql: format!("SELECT c.* FROM {table} c WHERE {filter} ORDER BY {order} LIMIT {limit} OFFSET {offset}"),
        count_sql: format!("SELECT COUNT(*) AS count FROM {table} c WHERE {filter}"),
        values: params.into_values(),
    }
}

/// Feed of tag-matched content plus explicitly followed items, followed items first.
///
/// Returns `None` when there is nothing to match on.
pub fn build_recommend_query(kind: ContentKind, q: &RecommendQuery, default_page_size: u64) -> Option<BuiltQuery> {
    if q.tag_ids.is_empty() && q.followed_ids.is_empty() {
        return None;
    }
    let table = kind.table();
    let mut params = SqlParams::default();

    let mut select = "c.*".to_string();
    let mut order = "c.pin DESC, c.created_at DESC".to_string();
    if !q.followed_ids.is_empty() {
        let followed = params.in_list("c.id", q.followed_ids.iter().cloned());
        select.push_str(&format!(", CASE WHEN {followed} THEN 0 ELSE 1 END AS order_priority"));
        order = format!("order_priority, {order}");
    }

    let tag_match = (!q.tag_ids.is_empty()).then(|| {
        let user = params.bind(q.user_id.clone());
        let answered_by = params.bind(q.user_id.clone());
        let tags = tag_exists(&mut params, &q.tag_ids);
        format!(
            "(c.user_id != {user} AND c.id NOT IN (SELECT a.question_id FROM answer a WHERE a.user_id = {answered_by}) AND {tags})"
        )
    });
    let followed_match =
        (!q.followed_ids.is_empty()).then(|| params.in_list("c.id", q.followed_ids.iter().cloned()));

    let source = match (tag_match, followed_match) {
        (Some(tags), Some(followed)) => format!("({tags} OR {followed})"),
        (Some(tags), None) => tags,
        (None, Some(followed)) => followed,
        (None, None) => return None,
    };

    let conditions = vec![
        format!("c.show = {}", params.bind(ShowState::Show.as_i32())),
        format!("c.status = {}", params.bind(ContentStatus::Available.as_i32())),
        source,
    ];

    let (limit, offset) = limit_offset(q.page, q.page_size, default_page_size);
    let filter = where_clause(&conditions);
    Some(BuiltQuery {
        sql: format!("SELECT {select} FROM {table} c WHERE {filter} ORDER BY {order} LIMIT {limit} OFFSET {offset}"),
        // keeps every placeholder referenced
        count_sql: format!("SELECT COUNT(*) AS count FROM (SELECT {select} FROM {table} c WHERE {filter}) sub"),
        values: params.into_values(),
    })
}

/// Interpret the admin query: `<kind>:<id>` selects one id when the rest is numeric
pub fn parse_admin_search(kind: ContentKind, query: &str) -> AdminSearch {
    let query = query.trim();
    if query.is_empty() {
        return AdminSearch::All;
    }
    if let Some(rest) = query.strip_prefix(kind.admin_id_prefix().as_str()) {
        let id = crate::short_id::decode(rest.trim());
        if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
            return AdminSearch::ById(id);
        }
    }
    AdminSearch::ByName(query.to_string())
}

pub fn build_admin_query(kind: ContentKind, q: &AdminPageQuery, default_page_size: u64) -> BuiltQuery {
    let table = kind.table();
    let mut params = SqlParams::default();
    let mut conditions = Vec::new();

    if let Some(status) = q.status {
        conditions.push(format!("c.status = {}", params.bind(status.as_i32())));
    }
    match parse_admin_search(kind, &q.query) {
        AdminSearch::All => {}
        AdminSearch::ById(id) => conditions.push(format!("c.id = {}", params.bind(id))),
        AdminSearch::ByName(name) => conditions.push(format!(
            "c.{} LIKE {}",
            kind.name_column(),
            params.bind(format!("%{name}%"))
        )),
    }

    let (limit, offset) = limit_offset(q.page, q.page_size, default_page_size);
    let filter = where_clause(&conditions);
    BuiltQuery {
        sql: format!(
            "SELECT c.* FROM {table} c WHERE {filter} ORDER BY c.created_at DESC LIMIT {limit} OFFSET {offset}"
        ),
        count_sql: format!("SELECT COUNT(*) AS count FROM {table} c WHERE {filter}"),
        values: params.into_values(),
    }
}
