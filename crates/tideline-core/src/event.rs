//! Inbound events.
//!
//! Every source that can change engine state (page fetches, the push
//! channel, optimistic writes, user interaction) is expressed as one of
//! these. They serialize as internally tagged JSON so sessions can be
//! recorded and replayed.

use serde::{Deserialize, Serialize};

use crate::error::TidelineError;
use crate::id::PostId;
use crate::pending::Draft;
use crate::types::{NotificationGroup, Page, Position, Post};

/// How a live post enters its feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveRoute {
    /// Show immediately.
    #[default]
    Append,
    /// Hold back until the user asks for new posts.
    Enqueue,
}

/// A single state transition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    FeedExpandRequest {
        feed: String,
    },
    FeedExpanded {
        feed: String,
        page: Page<Post>,
        #[serde(default)]
        loading_recent: bool,
        #[serde(default)]
        position: Position,
    },
    FeedExpandFailed {
        feed: String,
    },
    LivePost {
        feed: String,
        post: Post,
        #[serde(default)]
        route: LiveRoute,
    },
    /// The user asked for queued posts. Follows the feed's overflow policy.
    FeedDequeue {
        feed: String,
    },
    FeedClear {
        feed: String,
    },
    FeedScroll {
        feed: String,
        top: bool,
    },
    FeedConnected {
        feed: String,
    },
    FeedDisconnected {
        feed: String,
    },
    /// A post was deleted. `references` are its reblogs; `account_id` is the
    /// author, whose own profile feeds keep showing it.
    PostDeleted {
        id: PostId,
        #[serde(default)]
        references: Vec<PostId>,
        #[serde(default)]
        account_id: Option<String>,
    },
    ContextFetched {
        id: PostId,
        #[serde(default)]
        ancestors: Vec<Post>,
        #[serde(default)]
        descendants: Vec<Post>,
    },
    PostsImported {
        posts: Vec<Post>,
    },
    WriteSubmitted {
        idempotency_key: String,
        draft: Draft,
    },
    WriteConfirmed {
        idempotency_key: String,
        post: Post,
    },
    WriteFailed {
        idempotency_key: String,
    },
    /// The user blocked or muted an account. `posts` are the known posts to
    /// check authorship against.
    AccountRestricted {
        account_id: String,
        posts: Vec<Post>,
    },
    AccountUnfollowed {
        account_id: String,
        posts: Vec<Post>,
    },
    NotificationGroupReceived {
        group: NotificationGroup,
    },
    NotificationsExpandRequest,
    NotificationsExpanded {
        page: Page<NotificationGroup>,
    },
    NotificationsExpandFailed,
    NotificationsMarkRead {
        last_read_id: String,
    },
    NotificationsScroll {
        top: bool,
    },
    NotificationsClear,
    Logout,
}

impl Event {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FeedExpandRequest { .. } => "feed_expand_request",
            Self::FeedExpanded { .. } => "feed_expanded",
            Self::FeedExpandFailed { .. } => "feed_expand_failed",
            Self::LivePost { .. } => "live_post",
            Self::FeedDequeue { .. } => "feed_dequeue",
            Self::FeedClear { .. } => "feed_clear",
            Self::FeedScroll { .. } => "feed_scroll",
            Self::FeedConnected { .. } => "feed_connected",
            Self::FeedDisconnected { .. } => "feed_disconnected",
            Self::PostDeleted { .. } => "post_deleted",
            Self::ContextFetched { .. } => "context_fetched",
            Self::PostsImported { .. } => "posts_imported",
            Self::WriteSubmitted { .. } => "write_submitted",
            Self::WriteConfirmed { .. } => "write_confirmed",
            Self::WriteFailed { .. } => "write_failed",
            Self::AccountRestricted { .. } => "account_restricted",
            Self::AccountUnfollowed { .. } => "account_unfollowed",
            Self::NotificationGroupReceived { .. } => "notification_group_received",
            Self::NotificationsExpandRequest => "notifications_expand_request",
            Self::NotificationsExpanded { .. } => "notifications_expanded",
            Self::NotificationsExpandFailed => "notifications_expand_failed",
            Self::NotificationsMarkRead { .. } => "notifications_mark_read",
            Self::NotificationsScroll { .. } => "notifications_scroll",
            Self::NotificationsClear => "notifications_clear",
            Self::Logout => "logout",
        }
    }
}

/// Decode a JSON-lines event log.
///
/// Blank lines and lines starting with `#` are skipped. Line numbers in
/// errors are 1-based.
pub fn parse_event_log(raw: &str) -> Result<Vec<Event>, TidelineError> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| TidelineError::BadEvent {
                line: i + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_live_post() {
        let raw = r#"{"type":"live_post","feed":"home","post":{"id":"5","account_id":"1"}}"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            Event::LivePost {
                feed: "home".to_string(),
                post: Post::new("5", "1"),
                route: LiveRoute::Append,
            }
        );
        assert_eq!(event.kind(), "live_post");
    }

    #[test]
    fn test_decode_unit_variant() {
        let event: Event = serde_json::from_str(r#"{"type":"logout"}"#).unwrap();
        assert_eq!(event, Event::Logout);
    }

    #[test]
    fn test_decode_pending_ids() {
        let raw = r#"{"type":"post_deleted","id":"pending-k","references":["9"]}"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            Event::PostDeleted {
                id: PostId::pending("k"),
                references: vec![PostId::from("9")],
                account_id: None,
            }
        );
    }

    #[test]
    fn test_parse_event_log_skips_comments() {
        let raw = "# session start\n\n{\"type\":\"feed_clear\",\"feed\":\"home\"}\n";
        let events = parse_event_log(raw).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_parse_event_log_reports_line() {
        let raw = "{\"type\":\"logout\"}\n{\"type\":\"nope\"}\n";
        match parse_event_log(raw) {
            Err(TidelineError::BadEvent { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected bad event, got {other:?}"),
        }
    }
}
