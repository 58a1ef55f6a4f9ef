//! Queue snapshot model and the queue source contract.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One report attached to a queued item.
///
/// `source` is the moderator's name for moderator reports and the report
/// count for user reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub source: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentItem {
    pub author: String,
    pub body: String,
    /// Site-relative permalink, e.g. `/r/sub/comments/abc/title/def/`.
    pub permalink: String,
    #[serde(default)]
    pub reports: Vec<Report>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostItem {
    /// Bare post id (without the `t3_` prefix), used for the short link.
    pub id: String,
    pub author: String,
    pub title: String,
    pub domain: String,
    pub is_self: bool,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub reports: Vec<Report>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemContent {
    Comment(CommentItem),
    Post(PostItem),
}

/// A queued item as returned by one poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    /// Stable identifier assigned by the queue source (a Reddit fullname).
    pub item_id: String,
    pub content: ItemContent,
}

impl ItemDescriptor {
    pub fn new(item_id: impl Into<String>, content: ItemContent) -> Self {
        Self {
            item_id: item_id.into(),
            content,
        }
    }
}

/// Source of queue snapshots.
///
/// Each call returns the complete current queue in queue order. Errors are
/// reported as [`crate::error::RelayError::QueueSource`].
pub trait QueueSource {
    fn list_queue_items(&mut self) -> Result<Vec<ItemDescriptor>>;
}
