//! Conversation Tree: global reply index across every fetched post.
//!
//! Parent pointers come from federated servers and cannot be trusted to be
//! acyclic or complete. Gaps are bridged with tombstones and every upward
//! walk is bounded, so malformed data degrades the rendering instead of
//! hanging it.

use std::collections::{HashMap, HashSet};

use tracing::{trace, warn};

use crate::id::{IdSet, PostId};
use crate::types::Post;

/// Reply structure of every post the session has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationTree {
    parent_of: HashMap<PostId, PostId>,
    children_of: HashMap<PostId, IdSet>,
}

impl ConversationTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.parent_of.is_empty() && self.children_of.is_empty()
    }

    /// Number of child→parent edges.
    pub fn edge_count(&self) -> usize {
        self.parent_of.len()
    }

    pub fn parent(&self, id: &PostId) -> Option<&PostId> {
        self.parent_of.get(id)
    }

    /// Direct replies, sorted by id.
    pub fn children(&self, id: &PostId) -> &[PostId] {
        self.children_of
            .get(id)
            .map(IdSet::as_slice)
            .unwrap_or(&[])
    }

    /// Record that `child` replies to `parent`.
    ///
    /// A child re-parented by newer data leaves its old parent's list.
    pub fn import_edge(&mut self, child: PostId, parent: PostId) {
        if child == parent {
            warn!(id = %child, "ignoring post that replies to itself");
            return;
        }
        if let Some(previous) = self.parent_of.get(&child) {
            if previous == &parent {
                return;
            }
            let previous = previous.clone();
            self.detach_from(&child, &previous);
        }
        trace!(child = %child, parent = %parent, "importing edge");
        self.children_of
            .entry(parent.clone())
            .or_default()
            .insert_sorted(child.clone());
        self.parent_of.insert(child, parent);
    }

    /// Import the reply edge of a post, if it has one.
    pub fn import_post(&mut self, post: &Post) {
        if let Some(parent) = &post.in_reply_to_id {
            self.import_edge(post.id.clone(), parent.clone());
        }
    }

    pub fn import_posts<'a>(&mut self, posts: impl IntoIterator<Item = &'a Post>) {
        for post in posts {
            self.import_post(post);
        }
    }

    /// Topmost ancestor of `id`.
    pub fn find_root(&self, id: &PostId) -> PostId {
        self.find_root_guarded(id, id)
    }

    /// Walk up from `id` until a post without a parent.
    ///
    /// Stops and returns `guard` if the walk comes back to it. A loop that
    /// never reaches `guard` stops at the first repeated id.
    pub fn find_root_guarded(&self, id: &PostId, guard: &PostId) -> PostId {
        let mut seen = HashSet::new();
        let mut current = id;
        seen.insert(current);
        while let Some(parent) = self.parent_of.get(current) {
            if parent == guard {
                warn!(id = %id, guard = %guard, "reply cycle reached its starting post");
                return guard.clone();
            }
            if !seen.insert(parent) {
                warn!(id = %id, at = %parent, "reply cycle detected");
                return parent.clone();
            }
            current = parent;
        }
        current.clone()
    }

    /// Splice `<descendant>-tombstone` in between `ancestor` and `descendant`.
    pub fn insert_tombstone(&mut self, ancestor: &PostId, descendant: &PostId) {
        let tombstone = PostId::tombstone_for(descendant);
        trace!(ancestor = %ancestor, descendant = %descendant, "inserting tombstone");
        self.import_edge(tombstone.clone(), ancestor.clone());
        self.import_edge(descendant.clone(), tombstone);
    }

    /// Bridge `from` under `to` with a tombstone if they sit in separate
    /// fragments.
    pub fn connect(&mut self, from: &PostId, to: &PostId) {
        if self.find_root(from) != self.find_root(to) {
            self.insert_tombstone(to, from);
        }
    }

    /// Import an ordered list of ancestors or descendants.
    ///
    /// A post with a parent is imported and, when `anchor` is given, joined
    /// to the anchor's fragment. A post without one hangs from its
    /// predecessor in the list through a tombstone, since a missing parent
    /// usually means "not visible to you".
    pub fn import_branch(&mut self, posts: &[Post], anchor: Option<&PostId>) {
        for (i, post) in posts.iter().enumerate() {
            let previous = match i {
                0 => anchor,
                _ => Some(&posts[i - 1].id),
            };
            if post.in_reply_to_id.is_some() {
                self.import_post(post);
                if let Some(anchor) = anchor {
                    self.connect(&post.id, anchor);
                }
            } else if let Some(previous) = previous {
                self.insert_tombstone(previous, &post.id);
            }
        }
    }

    /// Import a fetched context around `id`.
    pub fn import_context(&mut self, id: &PostId, ancestors: &[Post], descendants: &[Post]) {
        self.import_branch(ancestors, None);
        self.import_branch(descendants, Some(id));
        if let Some(last) = ancestors.last() {
            if !self.parent_of.contains_key(id) {
                self.insert_tombstone(&last.id, id);
            }
        }
    }

    /// Remove `id` from the tree.
    ///
    /// Its replies lose their parent and become roots; they are not deleted.
    pub fn delete(&mut self, id: &PostId) {
        if let Some(parent) = self.parent_of.get(id).cloned() {
            self.detach_from(id, &parent);
        }
        if let Some(children) = self.children_of.remove(id) {
            for child in &children {
                self.parent_of.remove(child);
            }
        }
        trace!(id = %id, "deleted from tree");
    }

    pub fn delete_many<'a>(&mut self, ids: impl IntoIterator<Item = &'a PostId>) {
        for id in ids {
            self.delete(id);
        }
    }

    /// After a block or mute, drop every post `account` wrote.
    pub fn filter_by_relationship(&mut self, account: &str, posts: &[Post]) {
        let owned: Vec<&PostId> = posts
            .iter()
            .filter(|p| p.account_id == account)
            .map(|p| &p.id)
            .collect();
        self.delete_many(owned);
    }

    /// Show a just-submitted reply under its target before the server
    /// confirms it.
    pub fn insert_pending(&mut self, idempotency_key: &str, in_reply_to: &PostId) {
        self.import_edge(PostId::pending(idempotency_key), in_reply_to.clone());
    }

    /// Drop the stand-in edge of a confirmed or failed reply.
    pub fn remove_pending(&mut self, idempotency_key: &str) {
        let pending = PostId::pending(idempotency_key);
        if let Some(parent) = self.parent_of.get(&pending).cloned() {
            self.detach_from(&pending, &parent);
        }
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: &PostId) -> Vec<PostId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(id);
        let mut current = id;
        while let Some(parent) = self.parent_of.get(current) {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    /// Every reply below `id`, depth-first in rendering order.
    pub fn descendants(&self, id: &PostId) -> Vec<PostId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(id.clone());
        let mut stack: Vec<&PostId> = self.children(id).iter().rev().collect();
        while let Some(next) = stack.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            out.push(next.clone());
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    pub fn reset(&mut self) {
        self.parent_of.clear();
        self.children_of.clear();
    }

    fn detach_from(&mut self, child: &PostId, parent: &PostId) {
        self.parent_of.remove(child);
        if let Some(siblings) = self.children_of.get_mut(parent) {
            siblings.remove(child);
            if siblings.is_empty() {
                self.children_of.remove(parent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(raw: &str) -> PostId {
        raw.parse().unwrap()
    }

    fn rendered(ids: &[PostId]) -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_import_edge_keeps_children_sorted_and_unique() {
        let mut tree = ConversationTree::new();
        tree.import_edge(id("30"), id("1"));
        tree.import_edge(id("4"), id("1"));
        tree.import_edge(id("30"), id("1"));
        assert_eq!(rendered(tree.children(&id("1"))), vec!["4", "30"]);
        assert_eq!(tree.parent(&id("30")), Some(&id("1")));
    }

    #[test]
    fn test_reparenting_moves_child() {
        let mut tree = ConversationTree::new();
        tree.import_edge(id("3"), id("1"));
        tree.import_edge(id("3"), id("2"));
        assert!(tree.children(&id("1")).is_empty());
        assert_eq!(rendered(tree.children(&id("2"))), vec!["3"]);
    }

    #[test]
    fn test_self_edge_ignored() {
        let mut tree = ConversationTree::new();
        tree.import_edge(id("1"), id("1"));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_find_root() {
        let mut tree = ConversationTree::new();
        tree.import_edge(id("3"), id("2"));
        tree.import_edge(id("2"), id("1"));
        assert_eq!(tree.find_root(&id("3")), id("1"));
        assert_eq!(tree.find_root(&id("9")), id("9"));
    }

    #[test]
    fn test_find_root_breaks_two_cycle() {
        let mut tree = ConversationTree::new();
        tree.import_edge(id("x"), id("y"));
        tree.import_edge(id("y"), id("x"));
        let root = tree.find_root(&id("x"));
        assert!(root == id("x") || root == id("y"));
    }

    #[test]
    fn test_find_root_breaks_cycle_not_through_start() {
        let mut tree = ConversationTree::new();
        tree.import_edge(id("a"), id("b"));
        tree.import_edge(id("b"), id("c"));
        tree.import_edge(id("c"), id("b"));
        assert_eq!(tree.find_root(&id("a")), id("b"));
        assert_eq!(tree.ancestors(&id("a")), vec![id("b"), id("c")]);
    }

    #[test]
    fn test_connect_bridges_fragments() {
        let mut tree = ConversationTree::new();
        tree.import_edge(id("c"), id("b"));
        tree.connect(&id("d"), &id("c"));
        assert_eq!(tree.parent(&id("d")), Some(&id("d-tombstone")));
        assert_eq!(tree.parent(&id("d-tombstone")), Some(&id("c")));
        assert_eq!(tree.find_root(&id("d")), tree.find_root(&id("c")));
    }

    #[test]
    fn test_connect_same_fragment_is_noop() {
        let mut tree = ConversationTree::new();
        tree.import_edge(id("2"), id("1"));
        tree.connect(&id("2"), &id("1"));
        assert_eq!(tree.edge_count(), 1);
    }

    #[test]
    fn test_context_with_missing_parent() {
        // C replies to B, which was never fetched; D's own parent is unknown.
        let mut tree = ConversationTree::new();
        let ancestors = vec![Post::new("c", "u").reply_to("b")];
        tree.import_context(&id("d"), &ancestors, &[]);
        assert_eq!(tree.find_root(&id("d")), tree.find_root(&id("c")));
        assert_eq!(tree.ancestors(&id("d")), vec![id("d-tombstone"), id("c"), id("b")]);
    }

    #[test]
    fn test_branch_without_reply_ids_chains_tombstones() {
        let mut tree = ConversationTree::new();
        let descendants = vec![Post::new("2", "u"), Post::new("3", "u")];
        tree.import_branch(&descendants, Some(&id("1")));
        assert_eq!(tree.ancestors(&id("3")), vec![
            id("3-tombstone"),
            id("2"),
            id("2-tombstone"),
            id("1"),
        ]);
    }

    #[test]
    fn test_branch_descendants_joined_to_anchor() {
        let mut tree = ConversationTree::new();
        let descendants = vec![
            Post::new("2", "u").reply_to("1"),
            Post::new("4", "u").reply_to("3"),
        ];
        tree.import_branch(&descendants, Some(&id("1")));
        assert_eq!(tree.parent(&id("2")), Some(&id("1")));
        assert_eq!(tree.find_root(&id("4")), id("1"));
    }

    #[test]
    fn test_delete_orphans_children() {
        let mut tree = ConversationTree::new();
        tree.import_edge(id("2"), id("1"));
        tree.import_edge(id("3"), id("2"));
        tree.import_edge(id("4"), id("2"));
        tree.delete(&id("2"));
        assert!(tree.children(&id("1")).is_empty());
        assert_eq!(tree.find_root(&id("3")), id("3"));
        assert_eq!(tree.find_root(&id("4")), id("4"));
        assert!(tree.children(&id("2")).is_empty());
    }

    #[test]
    fn test_pending_reply_lifecycle() {
        let mut tree = ConversationTree::new();
        tree.insert_pending("k", &id("1"));
        assert_eq!(rendered(tree.children(&id("1"))), vec!["pending-k"]);
        tree.remove_pending("k");
        tree.import_post(&Post::new("5", "me").reply_to("1"));
        assert_eq!(rendered(tree.children(&id("1"))), vec!["5"]);
    }

    #[test]
    fn test_filter_by_relationship() {
        let posts = vec![
            Post::new("2", "blocked").reply_to("1"),
            Post::new("3", "friend").reply_to("2"),
        ];
        let mut tree = ConversationTree::new();
        tree.import_posts(&posts);
        tree.filter_by_relationship("blocked", &posts);
        assert!(tree.children(&id("1")).is_empty());
        assert_eq!(tree.find_root(&id("3")), id("3"));
    }

    #[test]
    fn test_descendants_depth_first() {
        let mut tree = ConversationTree::new();
        tree.import_edge(id("2"), id("1"));
        tree.import_edge(id("3"), id("2"));
        tree.import_edge(id("4"), id("1"));
        assert_eq!(tree.descendants(&id("1")), vec![id("2"), id("3"), id("4")]);
    }
}
