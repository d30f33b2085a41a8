//! Content domain shared by quotes, quote authors and quote pieces
//!
//! Provides:
//! - `ContentKind` metadata (tables, reason keys, activity keys)
//! - Status / pin / show states stored as integers
//! - `ContentEntity`, the seam every generic repository and service works through
//! - `Lookup`, the tagged result of single-row reads
//! - `RequestContext` carried through every service call

mod entity;
mod kind;
mod state;

pub use entity::{ContentEntity, ContentExtra, Counters, NewContent};
pub use kind::{ActivityType, ContentKind, EventType, TagPolicy};
pub use state::{ContentStatus, OperationKind, OrderCond, PinState, ShowState};

use crate::errors::{AppError, Result};

/// Outcome of a single-row read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn as_ref(&self) -> Lookup<&T> {
        match self {
            Lookup::Found(v) => Lookup::Found(v),
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    /// Turn a miss into `AppError::NotFound`
    pub fn require(self, resource_type: &str, id: &str) -> Result<T> {
        match self {
            Lookup::Found(v) => Ok(v),
            Lookup::NotFound => Err(AppError::not_found(resource_type, id)),
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::NotFound,
        }
    }
}

/// Per-request settings that shape responses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Encode ids in responses as short ids
    pub short_id: bool,
    pub lang: String,
}

impl RequestContext {
    pub fn new(short_id: bool, lang: impl Into<String>) -> Self {
        Self {
            short_id,
            lang: lang.into(),
        }
    }

    /// Encode an internal id for output
    pub fn encode(&self, id: &str) -> String {
        crate::short_id::encode_if(self.short_id, id)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            short_id: false,
            lang: "en_US".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_require() {
        let hit: Lookup<i32> = Some(3).into();
        assert_eq!(hit.require("quote", "1").ok(), Some(3));

        let miss: Lookup<i32> = None.into();
        let err = miss.require("quote", "1").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_lookup_map() {
        assert_eq!(Lookup::Found(2).map(|v| v * 2), Lookup::Found(4));
        assert_eq!(Lookup::<i32>::NotFound.map(|v| v * 2), Lookup::NotFound);
    }

    #[test]
    fn test_context_encode() {
        let ctx = RequestContext::new(true, "en_US");
        assert_eq!(crate::short_id::decode(&ctx.encode("10110000000000001")), "10110000000000001");
        assert_eq!(RequestContext::default().encode("1011"), "1011");
    }
}
