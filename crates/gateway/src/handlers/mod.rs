//! API handlers module

pub mod content;
pub mod health;
pub mod quotes;

use axum::{extract::FromRequestParts, http::request::Parts};
use quotebook_common::{errors::AppError, RequestContext};

use crate::AppState;

/// Response shaping for the current request: short ids from the site
/// settings, language from `Accept-Language`
pub struct Ctx(pub RequestContext);

/// First language tag of an `Accept-Language` header, as `en_US`
fn preferred_lang(header: &str) -> Option<String> {
    header
        .split(',')
        .map(|part| part.split(';').next().unwrap_or_default().trim())
        .find(|tag| !tag.is_empty() && *tag != "*")
        .map(|tag| tag.replace('-', "_"))
}

impl FromRequestParts<AppState> for Ctx {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let lang = parts
            .headers
            .get("accept-language")
            .and_then(|v| v.to_str().ok())
            .and_then(preferred_lang)
            .unwrap_or_else(|| state.config.site.default_lang.clone());

        Ok(Ctx(RequestContext::new(state.config.site.short_id_enabled, lang)))
    }
}
