//! Handlers shared by every content kind
//!
//! Each handler is generic over the entity and picks its service out of the
//! application state through [`KindService`].

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::Ctx;
use crate::AppState;
use quotebook_common::{
    auth::{AuthContext, OptionalAuth},
    db::models::{Quote, QuoteAuthor, QuotePiece},
    errors::{AppError, Result},
    schema::{
        AddContentReq, AdminContentItem, AdminPageReq, AdminSetStatusReq, CloseReq, ContentBaseInfo,
        ContentInfo, ContentPageItem, ObjectReq, OperationReq, PageReq, Paginated, PersonalCollectionReq,
        PersonalPageReq, RecommendReq, RemoveReq, SitemapEntry, UpdateContentReq, UserContentInfo,
    },
    ContentEntity, ContentService, Viewer,
};

/// Maps an entity to its service in the application state
pub trait KindService: ContentEntity {
    fn service(state: &AppState) -> &Arc<ContentService<Self>>;
}

impl KindService for Quote {
    fn service(state: &AppState) -> &Arc<ContentService<Self>> {
        &state.quotes
    }
}

impl KindService for QuoteAuthor {
    fn service(state: &AppState) -> &Arc<ContentService<Self>> {
        &state.authors
    }
}

impl KindService for QuotePiece {
    fn service(state: &AppState) -> &Arc<ContentService<Self>> {
        &state.pieces
    }
}

fn viewer(auth: &OptionalAuth) -> Viewer {
    Viewer::new(auth.user_id(), auth.role())
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct SitemapParams {
    #[serde(default = "first_page")]
    pub page: u64,
}

fn first_page() -> u64 {
    1
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct CollectionCountResponse {
    pub collection_count: i64,
}

// ============================================================================
// Writes
// ============================================================================

/// Create an author or a piece
pub async fn add<E: KindService>(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    auth: AuthContext,
    Json(mut req): Json<AddContentReq>,
) -> Result<(StatusCode, Json<ContentInfo>)> {
    req.validate()?;
    req.user_id = auth.user_id.clone();
    req.role = auth.role;
    req.can_use_reserved_tag = auth.is_staff();

    let info = E::service(&state).add(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// Edit; owners and staff apply directly, anyone else files a revision
pub async fn update<E: KindService>(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(mut req): Json<UpdateContentReq>,
) -> Result<Json<ContentInfo>> {
    req.validate()?;
    let service = E::service(&state);
    let is_owner = service.is_owner(&id, &auth.user_id).await?;

    req.id = id.clone();
    req.user_id = auth.user_id.clone();
    req.role = auth.role;
    req.no_need_review = is_owner || auth.is_staff();
    req.can_use_reserved_tag = auth.is_staff();

    service
        .update(&ctx, req)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(E::KIND.object_type(), id))
}

pub async fn remove<E: KindService>(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    E::service(&state)
        .remove(RemoveReq {
            id,
            user_id: auth.user_id.clone(),
            is_admin: auth.is_admin(),
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn close<E: KindService>(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(mut req): Json<CloseReq>,
) -> Result<StatusCode> {
    auth.require_staff()?;
    req.id = id;
    req.user_id = auth.user_id.clone();
    E::service(&state).close(req).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reopen<E: KindService>(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    auth.require_staff()?;
    E::service(&state)
        .reopen(ObjectReq {
            id,
            user_id: auth.user_id.clone(),
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn recover<E: KindService>(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    auth.require_staff()?;
    E::service(&state)
        .recover(ObjectReq {
            id,
            user_id: auth.user_id.clone(),
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pin, unpin, hide or show
pub async fn operation<E: KindService>(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(mut req): Json<OperationReq>,
) -> Result<StatusCode> {
    auth.require_staff()?;
    req.id = id;
    req.user_id = auth.user_id.clone();
    E::service(&state).operation(req).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Recount an item's collections after a user collects or uncollects it
pub async fn collection_changed<E: KindService>(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(id): Path<String>,
) -> Result<Json<CollectionCountResponse>> {
    let collection_count = E::service(&state).collection_changed(&id).await?;
    Ok(Json(CollectionCountResponse { collection_count }))
}

// ============================================================================
// Reads
// ============================================================================

/// Detail; counts a page view
pub async fn get_item<E: KindService>(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    auth: OptionalAuth,
    Path(id): Path<String>,
) -> Result<Json<ContentInfo>> {
    let info = E::service(&state)
        .get_and_add_pv(&ctx, &id, &viewer(&auth))
        .await?;
    Ok(Json(info))
}

pub async fn page<E: KindService>(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    auth: OptionalAuth,
    Query(mut req): Query<PageReq>,
) -> Result<Json<Paginated<ContentPageItem>>> {
    req.login_user_id = auth.user_id();
    let page = E::service(&state).page(&ctx, req, &viewer(&auth)).await?;
    Ok(Json(page))
}

/// Items tagged with what the viewer follows
pub async fn recommend<E: KindService>(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    auth: OptionalAuth,
    Query(mut req): Query<RecommendReq>,
) -> Result<Json<Paginated<ContentPageItem>>> {
    req.login_user_id = auth.user_id();
    let page = E::service(&state).recommend_page(&ctx, req).await?;
    Ok(Json(page))
}

pub async fn search_by_name<E: KindService>(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ContentBaseInfo>>> {
    let found = E::service(&state).search_by_name(&ctx, &params.title).await?;
    Ok(Json(found))
}

pub async fn similar<E: KindService>(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    auth: OptionalAuth,
    Path(id): Path<String>,
) -> Result<Json<Paginated<ContentPageItem>>> {
    let page = E::service(&state).similar(&ctx, &id, &viewer(&auth)).await?;
    Ok(Json(page))
}

/// A user's items; pending and deleted ones only for the user and admins
pub async fn personal_page<E: KindService>(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    auth: OptionalAuth,
    Query(mut req): Query<PersonalPageReq>,
) -> Result<Json<Paginated<UserContentInfo>>> {
    req.login_user_id = auth.user_id();
    req.is_admin = auth.0.as_ref().is_some_and(AuthContext::is_admin);
    let page = E::service(&state).personal_page(&ctx, req).await?;
    Ok(Json(page))
}

pub async fn personal_count<E: KindService>(
    State(state): State<AppState>,
    auth: OptionalAuth,
    Query(mut req): Query<PersonalPageReq>,
) -> Result<Json<CountResponse>> {
    req.login_user_id = auth.user_id();
    req.is_admin = auth.0.as_ref().is_some_and(AuthContext::is_admin);
    let count = E::service(&state).personal_count(req).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn personal_collections<E: KindService>(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    auth: AuthContext,
    Query(mut req): Query<PersonalCollectionReq>,
) -> Result<Json<Paginated<ContentInfo>>> {
    req.user_id = auth.user_id.clone();
    let page = E::service(&state).personal_collection_page(&ctx, req).await?;
    Ok(Json(page))
}

pub async fn sitemap<E: KindService>(
    State(state): State<AppState>,
    Query(params): Query<SitemapParams>,
) -> Result<Json<Vec<SitemapEntry>>> {
    let entries = E::service(&state)
        .common()
        .sitemap(params.page.max(1), state.config.site.short_id_enabled)
        .await?;
    Ok(Json(entries))
}

// ============================================================================
// Admin
// ============================================================================

pub async fn admin_page<E: KindService>(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    auth: AuthContext,
    Query(req): Query<AdminPageReq>,
) -> Result<Json<Paginated<AdminContentItem>>> {
    auth.require_staff()?;
    let page = E::service(&state).admin_page(&ctx, req).await?;
    Ok(Json(page))
}

pub async fn admin_set_status<E: KindService>(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    Json(mut req): Json<AdminSetStatusReq>,
) -> Result<StatusCode> {
    auth.require_admin()?;
    req.id = id;
    req.user_id = auth.user_id.clone();
    E::service(&state).admin_set_status(req).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Soft delete every item a user posted of this kind
pub async fn admin_remove_user_content<E: KindService>(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    auth: AuthContext,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<String>>> {
    auth.require_admin()?;
    let removed = E::service(&state).remove_all_user_content(&ctx, &user_id).await?;
    tracing::info!(admin = %auth.user_id, user_id = %user_id, removed = removed.len(), "User content removed");
    Ok(Json(removed))
}
