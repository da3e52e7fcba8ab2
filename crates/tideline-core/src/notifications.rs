//! Notification Group Index.
//!
//! Groups are kept newest first by `most_recent_notification_id`, one entry
//! per `group_key`. Unread counts are relative to a read marker that only
//! ever moves forward.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::id::{PostId, compare_id};
use crate::types::{Continuation, NotificationGroup, Page};

/// Last notification the user has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMarker {
    #[default]
    Unset,
    At(String),
}

impl ReadMarker {
    /// Whether `key` is newer than the marker. Everything is when unset.
    pub fn is_unread(&self, key: &str) -> bool {
        match self {
            Self::Unset => true,
            Self::At(marker) => compare_id(key, marker) == Ordering::Greater,
        }
    }
}

/// State of the notification column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationGroups {
    /// Groups, newest first.
    pub items: Vec<NotificationGroup>,
    pub unread: usize,
    pub top: bool,
    pub read_marker: ReadMarker,
    pub next: Option<Continuation>,
    pub has_more: bool,
    pub is_loading: bool,
    pub loading_failed: bool,
}

impl Default for NotificationGroups {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            unread: 0,
            top: true,
            read_marker: ReadMarker::Unset,
            next: None,
            has_more: true,
            is_loading: false,
            loading_failed: false,
        }
    }
}

impl NotificationGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, group_key: &str) -> Option<&NotificationGroup> {
        self.items.iter().find(|g| g.group_key == group_key)
    }

    /// Insert or replace a live group.
    pub fn upsert_group(&mut self, group: NotificationGroup) {
        trace!(key = %group.group_key, "upserting notification group");
        self.merge(std::iter::once(group));
        if !self.top {
            self.unread += 1;
        }
    }

    /// Merge a backfill page. Leaves `unread` alone.
    pub fn expand_page(&mut self, page: Page<NotificationGroup>) {
        self.is_loading = false;
        self.loading_failed = false;
        let count = page.items.len();
        self.merge(page.items);
        if page.next.is_none() {
            self.has_more = false;
        }
        self.next = page.next;
        debug!(count, total = self.items.len(), "merged notification page");
    }

    pub fn expand_request(&mut self) {
        self.is_loading = true;
    }

    pub fn expand_fail(&mut self) {
        self.is_loading = false;
        self.loading_failed = true;
    }

    /// Advance the read marker and recount unread groups.
    ///
    /// A marker older than the current one is ignored.
    pub fn apply_read_marker(&mut self, last_read_id: &str) {
        if self.read_marker.is_unread(last_read_id) {
            self.read_marker = ReadMarker::At(last_read_id.to_string());
        } else {
            debug!(last_read_id, "ignoring stale read marker");
        }
        let marker = &self.read_marker;
        self.unread = self
            .items
            .iter()
            .filter(|g| marker.is_unread(&g.group_key))
            .count();
    }

    pub fn set_top(&mut self, top: bool) {
        self.top = top;
        if top {
            self.unread = 0;
        }
    }

    /// Drop groups showing a blocked or muted account.
    pub fn filter_by_relationship(&mut self, account: &str) {
        self.items
            .retain(|g| !g.sample_account_ids.iter().any(|a| a == account));
    }

    /// Drop groups about a deleted post.
    pub fn remove_by_post(&mut self, post_id: &PostId) {
        self.items.retain(|g| g.status_id.as_ref() != Some(post_id));
    }

    /// Empty the column. The read marker survives.
    pub fn clear(&mut self) {
        let read_marker = std::mem::take(&mut self.read_marker);
        *self = Self {
            read_marker,
            ..Self::default()
        };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn merge(&mut self, groups: impl IntoIterator<Item = NotificationGroup>) {
        for group in groups {
            self.items.retain(|g| g.group_key != group.group_key);
            self.items.insert(0, group);
        }
        self.items.sort_by(|a, b| {
            compare_id(&b.most_recent_notification_id, &a.most_recent_notification_id)
        });
        let mut seen = HashSet::new();
        self.items.retain(|g| seen.insert(g.group_key.clone()));
    }
}
