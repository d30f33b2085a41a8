use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status stored in the `status` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Available,
    Closed,
    Deleted,
    Pending,
}

impl ContentStatus {
    pub const fn as_i32(self) -> i32 {
        match self {
            ContentStatus::Available => 1,
            ContentStatus::Closed => 2,
            ContentStatus::Deleted => 10,
            ContentStatus::Pending => 11,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(ContentStatus::Available),
            2 => Some(ContentStatus::Closed),
            10 => Some(ContentStatus::Deleted),
            11 => Some(ContentStatus::Pending),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Available => "available",
            ContentStatus::Closed => "closed",
            ContentStatus::Deleted => "deleted",
            ContentStatus::Pending => "pending",
        }
    }

    /// Status string for a raw column value, empty when unknown
    pub fn label(value: i32) -> &'static str {
        Self::from_i32(value).map(Self::as_str).unwrap_or("")
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ContentStatus::Available),
            "closed" => Ok(ContentStatus::Closed),
            "deleted" => Ok(ContentStatus::Deleted),
            "pending" => Ok(ContentStatus::Pending),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinState {
    UnPin,
    Pin,
}

impl PinState {
    pub const fn as_i32(self) -> i32 {
        match self {
            PinState::UnPin => 1,
            PinState::Pin => 2,
        }
    }

    pub fn from_i32(value: i32) -> Self {
        if value == 2 {
            PinState::Pin
        } else {
            PinState::UnPin
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowState {
    Show,
    Hide,
}

impl ShowState {
    pub const fn as_i32(self) -> i32 {
        match self {
            ShowState::Show => 1,
            ShowState::Hide => 2,
        }
    }

    pub fn from_i32(value: i32) -> Self {
        if value == 2 {
            ShowState::Hide
        } else {
            ShowState::Show
        }
    }
}

/// Moderation operation applied through `operation`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Pin,
    Unpin,
    Hide,
    Show,
}

impl FromStr for OperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pin" => Ok(OperationKind::Pin),
            "unpin" => Ok(OperationKind::Unpin),
            "hide" => Ok(OperationKind::Hide),
            "show" => Ok(OperationKind::Show),
            other => Err(format!("unknown operation: {other}")),
        }
    }
}

/// Ordering of list pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderCond {
    #[default]
    Newest,
    Active,
    Hot,
    Score,
    Unanswered,
    /// Recommendation feed, followed items first
    Frequent,
}

impl OrderCond {
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderCond::Newest => "newest",
            OrderCond::Active => "active",
            OrderCond::Hot => "hot",
            OrderCond::Score => "score",
            OrderCond::Unanswered => "unanswered",
            OrderCond::Frequent => "frequent",
        }
    }

    /// Unknown values fall back to `newest`
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "active" => OrderCond::Active,
            "hot" => OrderCond::Hot,
            "score" => OrderCond::Score,
            "unanswered" => OrderCond::Unanswered,
            "frequent" => OrderCond::Frequent,
            _ => OrderCond::Newest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        for status in [
            ContentStatus::Available,
            ContentStatus::Closed,
            ContentStatus::Deleted,
            ContentStatus::Pending,
        ] {
            assert_eq!(ContentStatus::from_i32(status.as_i32()), Some(status));
            assert_eq!(status.as_str().parse::<ContentStatus>(), Ok(status));
        }
        assert_eq!(ContentStatus::label(99), "");
    }

    #[test]
    fn test_order_cond_fallback() {
        assert_eq!(OrderCond::parse("score"), OrderCond::Score);
        assert_eq!(OrderCond::parse("whatever"), OrderCond::Newest);
    }
}
