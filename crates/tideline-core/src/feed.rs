//! Feed Index: one ordered id sequence per named feed.
//!
//! A feed only ever grows by set union. Ids disappear through explicit
//! deletion, relationship filtering, `clear`, or truncation of
//! already-seen history while the viewport sits at the top.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::id::{IdSet, PostId};
use crate::types::{Continuation, Page, Position, Post, reblogs_of};

/// Feeds with this suffix are replaced wholesale on every page.
pub const PINNED_SUFFIX: &str = ":pinned";

/// Prefix of an account's profile feeds (`account:<id>`, `account:<id>:media`).
pub const ACCOUNT_FEED_PREFIX: &str = "account:";

/// Whether `feed` is one of `account`'s own profile feeds.
pub fn is_account_feed(feed: &str, account: &str) -> bool {
    feed.strip_prefix(ACCOUNT_FEED_PREFIX)
        .and_then(|rest| rest.strip_prefix(account))
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(':'))
}

/// Size bounds applied to every feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedLimits {
    pub truncate_limit: usize,
    pub truncate_size: usize,
    pub max_queued_items: usize,
}

impl Default for FeedLimits {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for FeedLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            truncate_limit: config.truncate_limit,
            truncate_size: config.truncate_size,
            max_queued_items: config.max_queued_items,
        }
    }
}

/// State of a single feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedState {
    /// Visible ids, newest first.
    pub items: IdSet,
    /// Live arrivals held back from `items`, newest first.
    pub queued_items: IdSet,
    /// Exact number of held-back arrivals, including those past the cap.
    pub total_queued_count: usize,
    /// Continuation towards older posts.
    pub next: Option<Continuation>,
    /// Continuation towards newer posts.
    pub prev: Option<Continuation>,
    /// Arrivals since the user scrolled away from the top.
    pub unread: usize,
    /// Whether the viewport is at the newest item.
    pub top: bool,
    pub is_loading: bool,
    pub loading_failed: bool,
    pub is_partial: bool,
    pub has_more: bool,
    /// Whether the push channel for this feed is connected.
    pub online: bool,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            items: IdSet::new(),
            queued_items: IdSet::new(),
            total_queued_count: 0,
            next: None,
            prev: None,
            unread: 0,
            top: true,
            is_loading: false,
            loading_failed: false,
            is_partial: false,
            has_more: true,
            online: false,
        }
    }
}

impl FeedState {
    /// Whether more arrivals were queued than the queue could hold.
    pub fn queue_overflowed(&self, limits: &FeedLimits) -> bool {
        self.total_queued_count > limits.max_queued_items
    }

    fn truncate(&mut self, limits: &FeedLimits) {
        if self.items.len() > limits.truncate_limit {
            debug!(
                from = self.items.len(),
                to = limits.truncate_size,
                "truncating feed"
            );
            self.items.truncate(limits.truncate_size);
        }
    }

    /// Drop `id` from the queue, keeping the counter in step.
    fn unqueue(&mut self, id: &PostId) -> bool {
        if self.queued_items.remove(id) {
            self.total_queued_count = self.total_queued_count.saturating_sub(1);
            true
        } else {
            false
        }
    }

    fn remove(&mut self, id: &PostId) -> bool {
        let listed = self.items.remove(id);
        let queued = self.unqueue(id);
        listed || queued
    }
}

/// All feeds, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Feeds {
    feeds: HashMap<String, FeedState>,
    limits: FeedLimits,
}

impl Feeds {
    pub fn new(limits: FeedLimits) -> Self {
        Self {
            feeds: HashMap::new(),
            limits,
        }
    }

    pub fn limits(&self) -> &FeedLimits {
        &self.limits
    }

    pub fn get(&self, feed: &str) -> Option<&FeedState> {
        self.feeds.get(feed)
    }

    /// Visible ids of a feed; empty for a feed never touched.
    pub fn items(&self, feed: &str) -> &[PostId] {
        self.feeds
            .get(feed)
            .map(|state| state.items.as_slice())
            .unwrap_or(&[])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.feeds.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeedState)> {
        self.feeds.iter().map(|(name, state)| (name.as_str(), state))
    }

    fn entry(&mut self, feed: &str) -> &mut FeedState {
        self.feeds.entry(feed.to_string()).or_default()
    }

    pub fn expand_request(&mut self, feed: &str) {
        self.entry(feed).is_loading = true;
    }

    pub fn expand_fail(&mut self, feed: &str) {
        let state = self.entry(feed);
        state.is_loading = false;
        state.loading_failed = true;
    }

    /// Merge a fetched page into a feed.
    ///
    /// Pinned feeds are replaced by the page. Every other feed takes the set
    /// union: the page is prepended for [`Position::Start`] and appended for
    /// [`Position::End`], with ids already held absorbed.
    pub fn expand(
        &mut self,
        feed: &str,
        page: Page<PostId>,
        is_loading_recent: bool,
        position: Position,
    ) {
        let state = self.entry(feed);
        state.is_loading = false;
        state.loading_failed = false;
        state.is_partial = page.partial;
        if page.next.is_none() && !is_loading_recent {
            state.has_more = false;
        }
        state.next = page.next;
        state.prev = page.prev;

        for id in &page.items {
            state.unqueue(id);
        }

        if feed.ends_with(PINNED_SUFFIX) {
            state.items = page.items.into_iter().collect();
            debug!(feed, count = state.items.len(), "replaced pinned feed");
            return;
        }

        if page.items.is_empty() {
            return;
        }
        let before = state.items.len();
        match position {
            Position::Start => state.items.merge_front(page.items.iter()),
            Position::End => state.items.merge_back(page.items.iter()),
        }
        debug!(
            feed,
            page = page.items.len(),
            added = state.items.len() - before,
            ?position,
            "merged page"
        );
    }

    /// A live arrival that should show up immediately.
    ///
    /// At the top the feed is truncated afterwards; away from the top the id
    /// is kept and counted as unread.
    pub fn append(&mut self, feed: &str, id: PostId) {
        let limits = self.limits;
        let state = self.entry(feed);
        if state.items.contains(&id) {
            return;
        }
        state.unqueue(&id);
        trace!(feed, id = %id, top = state.top, "appending");
        state.items.push_front(id);
        if state.top {
            state.truncate(&limits);
        } else {
            state.unread += 1;
        }
    }

    /// A live arrival held back from the visible sequence.
    pub fn enqueue(&mut self, feed: &str, id: PostId) {
        let limits = self.limits;
        let state = self.entry(feed);
        if state.items.contains(&id) || state.queued_items.contains(&id) {
            return;
        }
        trace!(feed, id = %id, "queueing");
        state.total_queued_count += 1;
        state.queued_items.push_front(id);
        state.queued_items.truncate(limits.max_queued_items);
        if state.total_queued_count == limits.max_queued_items + 1 {
            debug!(feed, cap = limits.max_queued_items, "queue overflowed");
        }
    }

    /// Promote everything queued into the visible sequence.
    ///
    /// This only performs the bounded merge; whether an overflowed queue
    /// should be merged at all is the caller's call.
    pub fn dequeue(&mut self, feed: &str) {
        let limits = self.limits;
        let state = self.entry(feed);
        let queued = std::mem::take(&mut state.queued_items);
        debug!(
            feed,
            queued = queued.len(),
            total = state.total_queued_count,
            "dequeueing"
        );
        state.items.merge_front(queued.iter());
        if state.top {
            state.truncate(&limits);
        }
        state.total_queued_count = 0;
    }

    pub fn queue_overflowed(&self, feed: &str) -> bool {
        self.feeds
            .get(feed)
            .is_some_and(|state| state.queue_overflowed(&self.limits))
    }

    /// Reset a feed to its initial state.
    pub fn clear(&mut self, feed: &str) {
        debug!(feed, "clearing feed");
        *self.entry(feed) = FeedState::default();
    }

    pub fn set_top(&mut self, feed: &str, top: bool) {
        let state = self.entry(feed);
        state.top = top;
        if top {
            state.unread = 0;
        }
    }

    pub fn connect(&mut self, feed: &str) {
        self.entry(feed).online = true;
    }

    pub fn disconnect(&mut self, feed: &str) {
        self.entry(feed).online = false;
    }

    /// Remove a post and its reblogs from every feed.
    ///
    /// `exclude_account`'s own profile feeds are left alone.
    pub fn delete_cascade(
        &mut self,
        id: &PostId,
        references: &[PostId],
        exclude_account: Option<&str>,
    ) {
        for target in std::iter::once(id).chain(references) {
            for (name, state) in self.feeds.iter_mut() {
                if exclude_account.is_some_and(|account| is_account_feed(name, account)) {
                    continue;
                }
                if state.remove(target) {
                    trace!(feed = %name, id = %target, "removed deleted post");
                }
            }
        }
    }

    /// Swap a confirmed write's pending id for its real id, in place.
    pub fn replace_pending(&mut self, idempotency_key: &str, real_id: &PostId) {
        let pending = PostId::pending(idempotency_key);
        for (name, state) in self.feeds.iter_mut() {
            if state.items.replace(&pending, real_id.clone()) {
                state.unqueue(real_id);
                trace!(feed = %name, id = %real_id, "replaced pending id");
            }
            if state.items.contains(real_id) {
                state.unqueue(&pending);
            } else if state.queued_items.contains(&pending) {
                // The live copy and the pending id collapse into one entry.
                state.unqueue(real_id);
                state.queued_items.replace(&pending, real_id.clone());
            }
        }
    }

    /// Drop a rolled-back write's pending id everywhere.
    pub fn remove_pending(&mut self, idempotency_key: &str) {
        let pending = PostId::pending(idempotency_key);
        for state in self.feeds.values_mut() {
            state.remove(&pending);
        }
    }

    /// After a block or mute, drop everything `account` wrote or reblogged
    /// from every feed but the account's own.
    pub fn filter_by_relationship(&mut self, account: &str, posts: &[Post]) {
        for post in posts.iter().filter(|p| p.account_id == account) {
            let references = reblogs_of(posts, &post.id);
            self.delete_cascade(&post.id, &references, Some(account));
        }
    }

    /// After an unfollow, drop `account`'s posts from a single feed.
    pub fn filter_feed_by_author(&mut self, feed: &str, account: &str, posts: &[Post]) {
        let Some(state) = self.feeds.get_mut(feed) else {
            return;
        };
        for post in posts.iter().filter(|p| p.account_id == account) {
            state.remove(&post.id);
            for reblog in reblogs_of(posts, &post.id) {
                state.remove(&reblog);
            }
        }
    }

    /// Drop every feed.
    pub fn reset(&mut self) {
        self.feeds.clear();
    }
}
