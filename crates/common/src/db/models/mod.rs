//! SeaORM entity models
//!
//! Database entities for Quotebook

mod collection;
mod meta;
mod quote;
mod quote_author;
mod quote_piece;
mod revision;
mod tag;
mod tag_rel;
mod uniqid;

pub use quote::{
    Entity as QuoteEntity,
    Model as Quote,
    ActiveModel as QuoteActiveModel,
    Column as QuoteColumn,
};

pub use quote_author::{
    Entity as QuoteAuthorEntity,
    Model as QuoteAuthor,
    ActiveModel as QuoteAuthorActiveModel,
    Column as QuoteAuthorColumn,
};

pub use quote_piece::{
    Entity as QuotePieceEntity,
    Model as QuotePiece,
    ActiveModel as QuotePieceActiveModel,
    Column as QuotePieceColumn,
    PieceType,
};

pub use tag::{
    Entity as TagEntity,
    Model as Tag,
    ActiveModel as TagActiveModel,
    Column as TagColumn,
    TAG_STATUS_AVAILABLE,
    TAG_STATUS_DELETED,
};

pub use tag_rel::{
    Entity as TagRelEntity,
    Model as TagRel,
    ActiveModel as TagRelActiveModel,
    Column as TagRelColumn,
    TagRelStatus,
};

pub use meta::{
    Entity as MetaEntity,
    Model as Meta,
    ActiveModel as MetaActiveModel,
    Column as MetaColumn,
};

pub use collection::{
    Entity as CollectionEntity,
    Model as Collection,
    ActiveModel as CollectionActiveModel,
    Column as CollectionColumn,
};

pub use revision::{
    Entity as RevisionEntity,
    Model as Revision,
    ActiveModel as RevisionActiveModel,
    Column as RevisionColumn,
    RevisionStatus,
};

pub use uniqid::{
    Entity as UniqidEntity,
    Model as Uniqid,
    ActiveModel as UniqidActiveModel,
    Column as UniqidColumn,
};
