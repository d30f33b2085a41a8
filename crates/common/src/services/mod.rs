//! Content services
//!
//! Provides:
//! - `ContentCommon`: row to response formatting and batched lookups
//! - `ContentService`: lifecycle, listing and admin operations, generic over the kind
//! - `QuoteService`: quote creation with author/piece resolution
//! - `ContentPermission`: viewer permissions and member actions

mod common;
mod content;
mod permission;
mod quote;

pub use common::{show_format, ContentCommon};
pub use content::ContentService;
pub use permission::ContentPermission;
pub use quote::{QuoteService, DEFAULT_AUTHOR_NAME, DEFAULT_PIECE_TITLE};

use std::sync::Arc;

use crate::db::models::{QuoteAuthor, QuotePiece};
use crate::db::ContentRepo;
use crate::schema::Role;

/// Who is asking; anonymous callers have an empty user id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: String,
    pub role: Role,
}

impl Viewer {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_logged_in(&self) -> bool {
        !self.user_id.is_empty()
    }

    pub fn is(&self, user_id: &str) -> bool {
        self.is_logged_in() && self.user_id == user_id
    }
}

/// Author and piece repositories, used to decorate quotes
#[derive(Clone)]
pub struct RelatedRepos {
    pub authors: Arc<dyn ContentRepo<QuoteAuthor>>,
    pub pieces: Arc<dyn ContentRepo<QuotePiece>>,
}
