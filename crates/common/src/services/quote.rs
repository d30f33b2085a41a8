//! Quote creation with author and piece resolution
//!
//! A quote always links to one author and one piece. Submitted ids win;
//! otherwise the name is matched exactly and, failing that, a new row is
//! created through the sibling service. Rows created here are not rolled
//! back when a later step fails.

use std::sync::Arc;
use tracing::{debug, info};

use super::content::ContentService;
use crate::content::{ContentEntity, RequestContext};
use crate::db::models::{Quote, QuoteAuthor, QuotePiece};
use crate::errors::Result;
use crate::schema::{AddContentReq, ContentInfo};
use crate::short_id;

/// Author name used when none is submitted
pub const DEFAULT_AUTHOR_NAME: &str = "佚名";

/// Piece title used when none is submitted
pub const DEFAULT_PIECE_TITLE: &str = "未名";

pub struct QuoteService {
    pub quotes: Arc<ContentService<Quote>>,
    pub authors: Arc<ContentService<QuoteAuthor>>,
    pub pieces: Arc<ContentService<QuotePiece>>,
}

/// Request for a related row created on the fly
fn related_req(req: &AddContentReq, title: &str) -> AddContentReq {
    AddContentReq {
        title: title.to_string(),
        user_id: req.user_id.clone(),
        role: req.role,
        can_use_reserved_tag: req.can_use_reserved_tag,
        ..Default::default()
    }
}

fn name_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    match value.trim() {
        "" => fallback,
        trimmed => trimmed,
    }
}

impl QuoteService {
    pub fn new(
        quotes: Arc<ContentService<Quote>>,
        authors: Arc<ContentService<QuoteAuthor>>,
        pieces: Arc<ContentService<QuotePiece>>,
    ) -> Self {
        Self {
            quotes,
            authors,
            pieces,
        }
    }

    async fn resolve_author(&self, req: &AddContentReq) -> Result<String> {
        let author_id = req.author_id.trim();
        if !author_id.is_empty() {
            return Ok(short_id::decode(author_id));
        }

        let name = name_or(&req.author, DEFAULT_AUTHOR_NAME);
        if let Some(existing) = self.authors.find_by_name(name).await?.found() {
            debug!(author_id = %existing.id(), name, "Reusing quote author");
            return Ok(existing.id().to_string());
        }

        let sub = related_req(req, name);
        let input = ContentService::<QuoteAuthor>::new_content(&sub);
        let created = self.authors.create(&sub, input).await?;
        info!(author_id = %created.id(), name, "Quote author created for quote");
        Ok(created.id().to_string())
    }

    async fn resolve_piece(&self, req: &AddContentReq) -> Result<String> {
        let piece_id = req.piece_id.trim();
        if !piece_id.is_empty() {
            return Ok(short_id::decode(piece_id));
        }

        let title = name_or(&req.piece, DEFAULT_PIECE_TITLE);
        if let Some(existing) = self.pieces.find_by_name(title).await?.found() {
            debug!(piece_id = %existing.id(), title, "Reusing quote piece");
            return Ok(existing.id().to_string());
        }

        let sub = related_req(req, title);
        let input = ContentService::<QuotePiece>::new_content(&sub);
        let created = self.pieces.create(&sub, input).await?;
        info!(piece_id = %created.id(), title, "Quote piece created for quote");
        Ok(created.id().to_string())
    }

    /// Create a quote, resolving or creating its author and piece first.
    ///
    /// Tags are checked before either sibling is touched.
    pub async fn add_quote(&self, ctx: &RequestContext, req: AddContentReq) -> Result<ContentInfo> {
        let tags = self.quotes.check_new_tags(&req).await?;
        let quote_author_id = self.resolve_author(&req).await?;
        let quote_piece_id = self.resolve_piece(&req).await?;

        let mut input = ContentService::<Quote>::new_content(&req);
        input.quote_author_id = quote_author_id;
        input.quote_piece_id = quote_piece_id;
        self.quotes.add_checked(ctx, req, input, tags).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Role;

    #[test]
    fn test_name_fallbacks() {
        assert_eq!(name_or("  ", DEFAULT_AUTHOR_NAME), "佚名");
        assert_eq!(name_or(" Homer ", DEFAULT_AUTHOR_NAME), "Homer");
        assert_eq!(name_or("", DEFAULT_PIECE_TITLE), "未名");
    }

    #[test]
    fn test_related_req_carries_identity_only() {
        let req = AddContentReq {
            title: "quote".into(),
            content: "body".into(),
            user_id: "5".into(),
            role: Role::Moderator,
            can_use_reserved_tag: true,
            ..Default::default()
        };
        let sub = related_req(&req, "Plato");
        assert_eq!(sub.title, "Plato");
        assert_eq!(sub.user_id, "5");
        assert_eq!(sub.role, Role::Moderator);
        assert!(sub.content.is_empty() && sub.tags.is_empty());
    }

    use crate::content::ContentStatus;
    use crate::schema::TagItem;
    use crate::testing::Harness;

    fn ctx() -> RequestContext {
        RequestContext::new(false, "en_US")
    }

    fn quote(author: &str, piece: &str, role: Role) -> AddContentReq {
        AddContentReq {
            title: "Justice is the advantage of the stronger".into(),
            content: "Justice is nothing else than the interest of the stronger.".into(),
            tags: vec![TagItem {
                slug_name: "justice".into(),
                ..Default::default()
            }],
            author: author.into(),
            piece: piece.into(),
            user_id: "2".into(),
            role,
            ..Default::default()
        }
    }

    fn harness() -> Harness {
        let h = Harness::new();
        h.platform.seed_tag("justice", true, false);
        h
    }

    #[tokio::test]
    async fn test_existing_author_is_reused() {
        let h = harness();
        let homer = h
            .authors
            .add(
                &ctx(),
                AddContentReq {
                    title: "Homer".into(),
                    user_id: "1".into(),
                    role: Role::Admin,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let info = h
            .quote_service
            .add_quote(&ctx(), quote("Homer", "Iliad", Role::Moderator))
            .await
            .unwrap();
        assert_eq!(h.author_repo.rows().len(), 1);
        assert_eq!(info.extra.quote_author_id.as_deref(), Some(homer.id.as_str()));
        assert_eq!(
            info.quote_author_basic_info.map(|a| a.name),
            Some("Homer".to_string())
        );

        h.quote_service
            .add_quote(&ctx(), quote("Virgil", "Iliad", Role::Moderator))
            .await
            .unwrap();
        assert_eq!(h.author_repo.rows().len(), 2);
        assert_eq!(h.piece_repo.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_author_and_piece_are_created_and_linked() {
        let h = harness();
        let info = h
            .quote_service
            .add_quote(&ctx(), quote("Plato", "Republic", Role::User))
            .await
            .unwrap();

        let authors = h.author_repo.rows();
        let pieces = h.piece_repo.rows();
        let quotes = h.quote_repo.rows();
        assert_eq!((authors.len(), pieces.len(), quotes.len()), (1, 1, 1));
        assert_eq!(authors[0].author_name, "Plato");
        assert_eq!(pieces[0].title, "Republic");
        assert_eq!(quotes[0].quote_author_id, authors[0].id);
        assert_eq!(quotes[0].quote_piece_id, pieces[0].id);
        assert!(quotes[0].is_status(ContentStatus::Pending));
        assert_eq!(info.id, quotes[0].id);
    }

    #[tokio::test]
    async fn test_explicit_ids_and_default_names() {
        let h = harness();
        let first = h
            .quote_service
            .add_quote(&ctx(), quote("", "", Role::Moderator))
            .await
            .unwrap();
        let authors = h.author_repo.rows();
        assert_eq!(authors[0].author_name, DEFAULT_AUTHOR_NAME);
        assert_eq!(h.piece_repo.rows()[0].title, DEFAULT_PIECE_TITLE);

        let mut req = quote("Someone else", "Another piece", Role::Moderator);
        req.author_id = authors[0].id.clone();
        req.piece_id = h.piece_repo.rows()[0].id.clone();
        let second = h.quote_service.add_quote(&ctx(), req).await.unwrap();

        assert_eq!(h.author_repo.rows().len(), 1);
        assert_eq!(h.piece_repo.rows().len(), 1);
        assert_eq!(first.extra.quote_piece_id, second.extra.quote_piece_id);
    }

    #[tokio::test]
    async fn test_tag_failure_creates_no_author_or_piece() {
        let h = harness();
        h.platform.seed_tag("tyranny", true, true);

        let mut untagged = quote("Plato", "Republic", Role::User);
        untagged.tags.clear();
        assert!(h.quote_service.add_quote(&ctx(), untagged).await.is_err());

        let mut reserved = quote("Plato", "Republic", Role::User);
        reserved.tags = vec![TagItem {
            slug_name: "tyranny".into(),
            ..Default::default()
        }];
        assert!(h.quote_service.add_quote(&ctx(), reserved).await.is_err());

        assert!(h.author_repo.rows().is_empty());
        assert!(h.piece_repo.rows().is_empty());
        assert!(h.quote_repo.rows().is_empty());
    }
}
