//! Reservations for optimistic writes.
//!
//! Submitting a post reserves `Pending(key)` in the id space. The reservation
//! is later either promoted (the server confirmed the post under a real id)
//! or discarded (the write failed). Nothing else creates or clears pending
//! ids.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::id::PostId;
use crate::types::{Post, Visibility};

/// What the engine needs to know about a submitted post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_id: Option<PostId>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl Draft {
    /// Feeds the post would show up in once published.
    pub fn target_feeds(&self) -> Vec<String> {
        match self.visibility {
            Visibility::Group => match &self.group_id {
                Some(group) => vec![format!("group:{group}")],
                None => Vec::new(),
            },
            Visibility::Direct => vec!["direct".to_string()],
            Visibility::Public => vec![
                "home".to_string(),
                "public:local".to_string(),
                "public".to_string(),
            ],
            Visibility::Unlisted | Visibility::Private => vec!["home".to_string()],
        }
    }
}

impl From<&Post> for Draft {
    /// The draft a published post would have been submitted as.
    fn from(post: &Post) -> Self {
        Self {
            in_reply_to_id: post.in_reply_to_id.clone(),
            visibility: post.visibility,
            group_id: post.group_id.clone(),
        }
    }
}

/// Outstanding reservations keyed by idempotency key.
#[derive(Debug, Clone, Default)]
pub struct PendingWrites {
    drafts: HashMap<String, Draft>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    /// Idempotency keys of every outstanding reservation.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.drafts.keys().map(String::as_str)
    }

    pub fn get(&self, idempotency_key: &str) -> Option<&Draft> {
        self.drafts.get(idempotency_key)
    }

    /// Reserve the pending id for a submission.
    ///
    /// Resubmitting under the same key keeps the original reservation.
    pub fn reserve(&mut self, idempotency_key: &str, draft: Draft) -> PostId {
        if self.drafts.contains_key(idempotency_key) {
            debug!(key = idempotency_key, "write already reserved");
        } else {
            self.drafts.insert(idempotency_key.to_string(), draft);
        }
        PostId::pending(idempotency_key)
    }

    /// Confirm a reservation, handing back its draft.
    pub fn promote(&mut self, idempotency_key: &str) -> Option<Draft> {
        let draft = self.drafts.remove(idempotency_key);
        if draft.is_none() {
            warn!(key = idempotency_key, "confirmation for unknown write");
        }
        draft
    }

    /// Abandon a reservation, handing back its draft.
    pub fn discard(&mut self, idempotency_key: &str) -> Option<Draft> {
        let draft = self.drafts.remove(idempotency_key);
        if draft.is_none() {
            warn!(key = idempotency_key, "rollback for unknown write");
        }
        draft
    }

    pub fn reset(&mut self) {
        self.drafts.clear();
    }
}
