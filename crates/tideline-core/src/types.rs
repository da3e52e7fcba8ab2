//! Records handed to the engine by the API and normalization layers.
//!
//! Only the fields the indices actually read are modeled; the full objects
//! live in the external object store keyed by the same ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::PostId;

/// Audience of a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Unlisted,
    Private,
    Direct,
    /// Posted into a group; only shown in that group's feed.
    Group,
}

/// A post as seen by the indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    /// Author.
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_id: Option<PostId>,
    /// For a reblog, the id of the reblogged post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reblog_id: Option<PostId>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl Post {
    /// A public top-level post.
    pub fn new(id: impl Into<PostId>, account_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            in_reply_to_id: None,
            reblog_id: None,
            visibility: Visibility::Public,
            group_id: None,
        }
    }

    pub fn reply_to(mut self, parent: impl Into<PostId>) -> Self {
        self.in_reply_to_id = Some(parent.into());
        self
    }

    pub fn reblog_of(mut self, original: impl Into<PostId>) -> Self {
        self.reblog_id = Some(original.into());
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Ids of every post in `posts` that reblogs `original`.
pub fn reblogs_of<'a>(posts: impl IntoIterator<Item = &'a Post>, original: &PostId) -> Vec<PostId> {
    posts
        .into_iter()
        .filter(|p| p.reblog_id.as_ref() == Some(original))
        .map(|p| p.id.clone())
        .collect()
}

/// A cluster of notifications displayed as one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationGroup {
    /// Deduplication key.
    pub group_key: String,
    pub most_recent_notification_id: String,
    /// Accounts shown as the group's avatars.
    #[serde(default)]
    pub sample_account_ids: Vec<String>,
    /// The post the notifications refer to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_id: Option<PostId>,
    /// Notification type (`favourite`, `reblog`, `mention`, ...).
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub notifications_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_page_notification_at: Option<DateTime<Utc>>,
}

impl NotificationGroup {
    pub fn new(group_key: impl Into<String>, most_recent_notification_id: impl Into<String>) -> Self {
        Self {
            group_key: group_key.into(),
            most_recent_notification_id: most_recent_notification_id.into(),
            sample_account_ids: Vec::new(),
            status_id: None,
            kind: String::new(),
            notifications_count: 1,
            latest_page_notification_at: None,
        }
    }

    pub fn with_accounts(mut self, accounts: &[&str]) -> Self {
        self.sample_account_ids = accounts.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_status(mut self, status_id: impl Into<PostId>) -> Self {
        self.status_id = Some(status_id.into());
        self
    }
}

/// Opaque pagination continuation.
///
/// Produced by the network client alongside a page; the engine only stores
/// and hands it back. Resolving it into a request is the client's business.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Continuation(String);

impl Continuation {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Where a fetched page lands relative to the ids already held.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Newer page: prepend.
    Start,
    /// Older page: append.
    #[default]
    End,
}

/// One page of results from the network client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<Continuation>,
    #[serde(default)]
    pub prev: Option<Continuation>,
    #[serde(default)]
    pub partial: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            next: None,
            prev: None,
            partial: false,
        }
    }

    pub fn with_next(mut self, next: Continuation) -> Self {
        self.next = Some(next);
        self
    }
}
