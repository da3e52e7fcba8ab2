//! Live feed reconciliation engine for a Mastodon-compatible client.
//!
//! Keeps independently paginated feeds, a global reply tree and a grouped
//! notification column consistent while data arrives from page fetches, the
//! push channel and the user's own optimistic writes.
//!
//! ## Features
//!
//! - **Feed Index**: per-feed id sequences with queueing, truncation and
//!   deletion cascades
//! - **Conversation Tree**: cycle-safe reply index with tombstones for gaps
//! - **Notification Groups**: deduplicated groups with a forward-only read
//!   marker
//! - **Store**: applies [`Event`]s to all three, one at a time
//!
//! Every transition is synchronous and infallible; malformed input degrades
//! instead of erroring.

pub mod config;
mod error;
pub mod event;
pub mod feed;
pub mod id;
pub mod notifications;
pub mod pending;
pub mod store;
pub mod tree;
mod types;

pub use config::{EngineConfig, EngineConfigBuilder, OverflowPolicies, OverflowPolicy};
pub use error::TidelineError;
pub use event::{Event, LiveRoute, parse_event_log};
pub use feed::{FeedLimits, FeedState, Feeds};
pub use id::{IdError, IdSet, PostId, compare_id};
pub use notifications::{NotificationGroups, ReadMarker};
pub use pending::{Draft, PendingWrites};
pub use store::{CatchUp, HOME_FEED, Store, StoreSnapshot};
pub use tree::ConversationTree;
pub use types::*;
