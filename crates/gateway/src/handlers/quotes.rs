//! Quote creation

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use super::Ctx;
use crate::AppState;
use quotebook_common::{auth::AuthContext, errors::Result, schema::AddContentReq, schema::ContentInfo};

/// Create a quote; the author and piece are matched by name or created
pub async fn add_quote(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    auth: AuthContext,
    Json(mut req): Json<AddContentReq>,
) -> Result<(StatusCode, Json<ContentInfo>)> {
    req.validate()?;
    req.user_id = auth.user_id.clone();
    req.role = auth.role;
    req.can_use_reserved_tag = auth.is_staff();

    let info = state.quote_service.add_quote(&ctx, req).await?;
    tracing::info!(quote_id = %info.id, request_id = %auth.request_id, "Quote submitted");
    Ok((StatusCode::CREATED, Json(info)))
}
