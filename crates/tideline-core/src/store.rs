//! The session store: owns the three indices and applies events to them.
//!
//! Every transition takes `&mut self` and runs to completion before it
//! returns, so no event ever observes another half-applied.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{EngineConfig, OverflowPolicy};
use crate::event::{Event, LiveRoute};
use crate::feed::{FeedLimits, FeedState, Feeds};
use crate::id::PostId;
use crate::notifications::NotificationGroups;
use crate::pending::{Draft, PendingWrites};
use crate::tree::ConversationTree;
use crate::types::{Page, Position, Post};

/// The signed-in user's home feed.
pub const HOME_FEED: &str = "home";

/// Outcome of [`Store::catch_up`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchUp {
    /// Nothing was queued.
    Nothing,
    /// The queue was merged into the visible feed.
    Merged,
    /// The queue overflowed and the feed was cleared; fetch it again.
    Refetch,
}

/// Read-only view of the whole store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub feeds: BTreeMap<String, FeedState>,
    pub notifications: NotificationGroups,
    pub pending_writes: Vec<String>,
    pub tree_edges: usize,
}

impl StoreSnapshot {
    /// Keep only the named feeds.
    pub fn retain_feeds(&mut self, names: &[String]) {
        self.feeds.retain(|name, _| names.iter().any(|n| n == name));
    }
}

/// Client-held cache over the remote timeline, reply and notification data.
#[derive(Debug, Clone)]
pub struct Store {
    config: EngineConfig,
    feeds: Feeds,
    tree: ConversationTree,
    notifications: NotificationGroups,
    pending: PendingWrites,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Store {
    /// Create an empty store. `config` is expected to be validated.
    pub fn new(config: EngineConfig) -> Self {
        let feeds = Feeds::new(FeedLimits::from(&config));
        Self {
            config,
            feeds,
            tree: ConversationTree::new(),
            notifications: NotificationGroups::new(),
            pending: PendingWrites::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn feeds(&self) -> &Feeds {
        &self.feeds
    }

    pub fn tree(&self) -> &ConversationTree {
        &self.tree
    }

    pub fn notifications(&self) -> &NotificationGroups {
        &self.notifications
    }

    pub fn pending(&self) -> &PendingWrites {
        &self.pending
    }

    /// Apply one event.
    #[tracing::instrument(skip_all, fields(kind = event.kind()))]
    pub fn apply(&mut self, event: Event) {
        match event {
            Event::FeedExpandRequest { feed } => self.feeds.expand_request(&feed),
            Event::FeedExpanded {
                feed,
                page,
                loading_recent,
                position,
            } => self.expand_feed(&feed, page, loading_recent, position),
            Event::FeedExpandFailed { feed } => self.feeds.expand_fail(&feed),
            Event::LivePost { feed, post, route } => self.ingest_live(&feed, &post, route),
            Event::FeedDequeue { feed } => {
                self.catch_up(&feed);
            }
            Event::FeedClear { feed } => self.feeds.clear(&feed),
            Event::FeedScroll { feed, top } => self.feeds.set_top(&feed, top),
            Event::FeedConnected { feed } => self.feeds.connect(&feed),
            Event::FeedDisconnected { feed } => self.feeds.disconnect(&feed),
            Event::PostDeleted {
                id,
                references,
                account_id,
            } => self.delete_post(&id, &references, account_id.as_deref()),
            Event::ContextFetched {
                id,
                ancestors,
                descendants,
            } => self.tree.import_context(&id, &ancestors, &descendants),
            Event::PostsImported { posts } => self.tree.import_posts(&posts),
            Event::WriteSubmitted {
                idempotency_key,
                draft,
            } => {
                self.submit_write(&idempotency_key, draft);
            }
            Event::WriteConfirmed {
                idempotency_key,
                post,
            } => self.confirm_write(&idempotency_key, &post),
            Event::WriteFailed { idempotency_key } => self.fail_write(&idempotency_key),
            Event::AccountRestricted { account_id, posts } => {
                self.restrict_account(&account_id, &posts)
            }
            Event::AccountUnfollowed { account_id, posts } => {
                self.feeds
                    .filter_feed_by_author(HOME_FEED, &account_id, &posts)
            }
            Event::NotificationGroupReceived { group } => self.notifications.upsert_group(group),
            Event::NotificationsExpandRequest => self.notifications.expand_request(),
            Event::NotificationsExpanded { page } => self.notifications.expand_page(page),
            Event::NotificationsExpandFailed => self.notifications.expand_fail(),
            Event::NotificationsMarkRead { last_read_id } => {
                self.notifications.apply_read_marker(&last_read_id)
            }
            Event::NotificationsScroll { top } => self.notifications.set_top(top),
            Event::NotificationsClear => self.notifications.clear(),
            Event::Logout => self.reset(),
        }
    }

    /// Apply events in order.
    pub fn apply_all(&mut self, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.apply(event);
        }
    }

    /// Merge a fetched page of posts into a feed and the reply tree.
    pub fn expand_feed(
        &mut self,
        feed: &str,
        page: Page<Post>,
        loading_recent: bool,
        position: Position,
    ) {
        self.tree.import_posts(&page.items);
        let ids = Page {
            items: page.items.into_iter().map(|p| p.id).collect(),
            next: page.next,
            prev: page.prev,
            partial: page.partial,
        };
        self.feeds.expand(feed, ids, loading_recent, position);
    }

    /// Route a post from the push channel into a feed.
    ///
    /// The session's own posts are dropped while a write is outstanding:
    /// the push can beat the API response, and the confirmation will put
    /// the post in place of its pending id.
    pub fn ingest_live(&mut self, feed: &str, post: &Post, route: LiveRoute) {
        let own = self.config.session_account.as_deref() == Some(post.account_id.as_str());
        if own && !self.pending.is_empty() {
            debug!(feed, id = %post.id, "skipping own post while writes are pending");
            return;
        }
        self.tree.import_post(post);
        match route {
            LiveRoute::Append => self.feeds.append(feed, post.id.clone()),
            LiveRoute::Enqueue => self.feeds.enqueue(feed, post.id.clone()),
        }
    }

    /// Reserve a pending id for a submitted post and show it where the
    /// post will eventually appear.
    pub fn submit_write(&mut self, idempotency_key: &str, draft: Draft) -> PostId {
        let id = self.pending.reserve(idempotency_key, draft.clone());
        for feed in draft.target_feeds() {
            self.feeds.enqueue(&feed, id.clone());
        }
        if let Some(parent) = &draft.in_reply_to_id {
            self.tree.insert_pending(idempotency_key, parent);
        }
        debug!(key = idempotency_key, "write submitted");
        id
    }

    /// The server accepted a write: swap in the real post.
    ///
    /// The confirmed post also lands in every feed its own visibility
    /// targets, which covers an unknown key or a visibility the server
    /// changed.
    pub fn confirm_write(&mut self, idempotency_key: &str, post: &Post) {
        self.pending.promote(idempotency_key);
        self.feeds.replace_pending(idempotency_key, &post.id);
        for feed in Draft::from(post).target_feeds() {
            self.feeds.enqueue(&feed, post.id.clone());
        }
        self.tree.remove_pending(idempotency_key);
        self.tree.import_post(post);
        debug!(key = idempotency_key, id = %post.id, "write confirmed");
    }

    /// The server rejected a write: remove every trace of it.
    pub fn fail_write(&mut self, idempotency_key: &str) {
        self.pending.discard(idempotency_key);
        self.feeds.remove_pending(idempotency_key);
        self.tree.remove_pending(idempotency_key);
        debug!(key = idempotency_key, "write rolled back");
    }

    pub fn delete_post(&mut self, id: &PostId, references: &[PostId], account: Option<&str>) {
        self.feeds.delete_cascade(id, references, account);
        self.tree.delete(id);
        self.notifications.remove_by_post(id);
    }

    /// Block or mute: drop the account from feeds, threads and notifications.
    pub fn restrict_account(&mut self, account: &str, posts: &[Post]) {
        self.feeds.filter_by_relationship(account, posts);
        self.tree.filter_by_relationship(account, posts);
        self.notifications.filter_by_relationship(account);
        info!(account, "filtered restricted account");
    }

    /// Bring a feed's queued posts into view, following the feed's
    /// overflow policy.
    pub fn catch_up(&mut self, feed: &str) -> CatchUp {
        let queued = self
            .feeds
            .get(feed)
            .map_or(0, |state| state.total_queued_count);
        if queued == 0 {
            return CatchUp::Nothing;
        }
        if self.feeds.queue_overflowed(feed)
            && self.config.overflow.for_feed(feed) == OverflowPolicy::Refetch
        {
            debug!(feed, queued, "queue overflowed, clearing for refetch");
            self.feeds.clear(feed);
            return CatchUp::Refetch;
        }
        self.feeds.dequeue(feed);
        CatchUp::Merged
    }

    /// Drop all session state.
    pub fn reset(&mut self) {
        self.feeds.reset();
        self.tree.reset();
        self.notifications.reset();
        self.pending.reset();
        info!("store reset");
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let mut pending_writes: Vec<String> = self.pending.keys().map(str::to_string).collect();
        pending_writes.sort();
        StoreSnapshot {
            feeds: self
                .feeds
                .iter()
                .map(|(name, state)| (name.to_string(), state.clone()))
                .collect(),
            notifications: self.notifications.clone(),
            pending_writes,
            tree_edges: self.tree.edge_count(),
        }
    }
}
