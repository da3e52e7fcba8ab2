//! Post identifiers and ordered id sets.
//!
//! Real server ids, client-side pending ids and synthetic tombstones share one
//! id space. Internally they are distinguished by variant; the string forms
//! `pending-<key>` and `<child>-tombstone` exist only at the serde boundary.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// String prefix of a pending id.
pub const PENDING_PREFIX: &str = "pending-";

/// String suffix of a tombstone id.
pub const TOMBSTONE_SUFFIX: &str = "-tombstone";

/// Error when parsing a post identifier.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid post id: {0:?}")]
pub struct IdError(String);

/// Compare two server ids.
///
/// Snowflake-style ids are numeric strings without leading zeros, so a longer
/// id is newer; ids of equal length compare lexicographically.
pub fn compare_id(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Identifier of a post held by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PostId {
    /// An id assigned by the server.
    Real(String),
    /// Stand-in for an unconfirmed write, keyed by its idempotency key.
    Pending(String),
    /// Placeholder bridging a reply to a parent that was never fetched.
    Tombstone(Box<PostId>),
}

impl PostId {
    /// Wrap a server id.
    pub fn real(id: impl Into<String>) -> Self {
        Self::Real(id.into())
    }

    /// The pending id reserved for an idempotency key.
    pub fn pending(key: impl Into<String>) -> Self {
        Self::Pending(key.into())
    }

    /// The tombstone placed directly above `child`.
    pub fn tombstone_for(child: &PostId) -> Self {
        Self::Tombstone(Box::new(child.clone()))
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Self::Real(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone(_))
    }

    /// The idempotency key, if this is a pending id.
    pub fn pending_key(&self) -> Option<&str> {
        match self {
            Self::Pending(key) => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real(id) => f.write_str(id),
            Self::Pending(key) => write!(f, "{PENDING_PREFIX}{key}"),
            Self::Tombstone(child) => write!(f, "{child}{TOMBSTONE_SUFFIX}"),
        }
    }
}

impl FromStr for PostId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(child) = s.strip_suffix(TOMBSTONE_SUFFIX) {
            if !child.is_empty() {
                return Ok(Self::tombstone_for(&child.parse()?));
            }
        }
        if let Some(key) = s.strip_prefix(PENDING_PREFIX) {
            if !key.is_empty() {
                return Ok(Self::Pending(key.to_string()));
            }
        }
        if s.is_empty() {
            return Err(IdError(s.to_string()));
        }
        Ok(Self::Real(s.to_string()))
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        Self::Real(s.to_string())
    }
}

impl Ord for PostId {
    /// Server order for real ids, a tombstone right after the post it
    /// precedes, pending ids after everything that has been confirmed.
    fn cmp(&self, other: &Self) -> Ordering {
        use PostId::*;
        match (self, other) {
            (Tombstone(a), Tombstone(b)) => a.cmp(b),
            (Tombstone(a), b) => a.as_ref().cmp(b).then(Ordering::Greater),
            (a, Tombstone(b)) => a.cmp(b.as_ref()).then(Ordering::Less),
            (Pending(a), Pending(b)) => compare_id(a, b),
            (Pending(_), Real(_)) => Ordering::Greater,
            (Real(_), Pending(_)) => Ordering::Less,
            (Real(a), Real(b)) => compare_id(a, b),
        }
    }
}

impl PartialOrd for PostId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for PostId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PostId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Insertion-ordered set of post ids.
///
/// Feed sequences and child lists are both this shape: order matters for
/// rendering, membership checks must be cheap, and duplicates are absorbed.
#[derive(Debug, Clone, Default)]
pub struct IdSet {
    order: Vec<PostId>,
    members: HashSet<PostId>,
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.members.contains(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PostId> {
        self.order.iter()
    }

    pub fn as_slice(&self) -> &[PostId] {
        &self.order
    }

    pub fn first(&self) -> Option<&PostId> {
        self.order.first()
    }

    pub fn position(&self, id: &PostId) -> Option<usize> {
        if !self.contains(id) {
            return None;
        }
        self.order.iter().position(|x| x == id)
    }

    /// Insert at the front. Returns false if already present.
    pub fn push_front(&mut self, id: PostId) -> bool {
        if !self.members.insert(id.clone()) {
            return false;
        }
        self.order.insert(0, id);
        true
    }

    /// Insert at the back. Returns false if already present.
    pub fn push_back(&mut self, id: PostId) -> bool {
        if !self.members.insert(id.clone()) {
            return false;
        }
        self.order.push(id);
        true
    }

    /// Insert keeping the set sorted by [`PostId`] order.
    ///
    /// Only meaningful on a set that has been kept sorted.
    pub fn insert_sorted(&mut self, id: PostId) -> bool {
        if self.contains(&id) {
            return false;
        }
        let at = self.order.partition_point(|x| x < &id);
        self.members.insert(id.clone());
        self.order.insert(at, id);
        true
    }

    pub fn remove(&mut self, id: &PostId) -> bool {
        if !self.members.remove(id) {
            return false;
        }
        self.order.retain(|x| x != id);
        true
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&PostId) -> bool) {
        let members = &mut self.members;
        self.order.retain(|id| {
            let kept = keep(id);
            if !kept {
                members.remove(id);
            }
            kept
        });
    }

    /// Keep only the first `len` ids.
    pub fn truncate(&mut self, len: usize) {
        if self.order.len() <= len {
            return;
        }
        for id in self.order.drain(len..) {
            self.members.remove(&id);
        }
    }

    /// `ids` followed by every current id not in `ids`.
    pub fn merge_front<'a>(&mut self, ids: impl IntoIterator<Item = &'a PostId>) {
        let mut merged = IdSet::new();
        for id in ids {
            merged.push_back(id.clone());
        }
        if merged.is_empty() {
            return;
        }
        for id in self.order.drain(..) {
            merged.push_back(id);
        }
        *self = merged;
    }

    /// Current ids followed by every id of `ids` not already present.
    pub fn merge_back<'a>(&mut self, ids: impl IntoIterator<Item = &'a PostId>) {
        for id in ids {
            self.push_back(id.clone());
        }
    }

    /// Swap `old` for `new` at the same position.
    ///
    /// If `new` is already present the earlier of the two occurrences wins
    /// and the later is dropped. Returns false if `old` was absent.
    pub fn replace(&mut self, old: &PostId, new: PostId) -> bool {
        let Some(at) = self.position(old) else {
            return false;
        };
        self.members.remove(old);
        match self.position(&new) {
            Some(existing) if existing < at => {
                self.order.remove(at);
            }
            Some(existing) => {
                self.order.remove(existing);
                self.order[at] = new;
            }
            None => {
                self.members.insert(new.clone());
                self.order[at] = new;
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub fn to_vec(&self) -> Vec<PostId> {
        self.order.clone()
    }
}

impl PartialEq for IdSet {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl Eq for IdSet {}

impl FromIterator<PostId> for IdSet {
    fn from_iter<I: IntoIterator<Item = PostId>>(iter: I) -> Self {
        let mut set = IdSet::new();
        for id in iter {
            set.push_back(id);
        }
        set
    }
}

impl<'a> IntoIterator for &'a IdSet {
    type Item = &'a PostId;
    type IntoIter = std::slice::Iter<'a, PostId>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

impl Serialize for IdSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.order.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IdSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Vec::<PostId>::deserialize(deserializer)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn ids(raw: &[&str]) -> IdSet {
        raw.iter().map(|s| PostId::from(*s)).collect()
    }

    fn strings(set: &IdSet) -> Vec<String> {
        set.iter().map(|id| id.to_string()).collect()
    }

    #[test_case("109", PostId::real("109") ; "real")]
    #[test_case("pending-abc", PostId::pending("abc") ; "pending")]
    #[test_case("109-tombstone", PostId::tombstone_for(&PostId::real("109")) ; "tombstone")]
    #[test_case(
        "pending-k-tombstone",
        PostId::tombstone_for(&PostId::pending("k"))
        ; "tombstone over pending"
    )]
    #[test_case("pending-", PostId::real("pending-") ; "bare pending prefix is a real id")]
    fn test_parse_and_display(raw: &str, expected: PostId) {
        let parsed: PostId = raw.parse().unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), raw);
    }

    #[test]
    fn test_parse_empty_rejected() {
        assert!("".parse::<PostId>().is_err());
    }

    #[test_case("9", "10", Ordering::Less ; "shorter is older")]
    #[test_case("110", "109", Ordering::Greater ; "same length lexicographic")]
    #[test_case("42", "42", Ordering::Equal ; "equal")]
    fn test_compare_id(a: &str, b: &str, expected: Ordering) {
        assert_eq!(compare_id(a, b), expected);
    }

    #[test]
    fn test_post_id_ordering() {
        let mut all = vec![
            PostId::pending("a"),
            PostId::tombstone_for(&PostId::real("5")),
            PostId::real("10"),
            PostId::real("5"),
            PostId::real("7"),
        ];
        all.sort();
        let rendered: Vec<String> = all.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["5", "5-tombstone", "7", "10", "pending-a"]);
    }

    #[test]
    fn test_serde_uses_string_form() {
        let id = PostId::tombstone_for(&PostId::real("3"));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"3-tombstone\"");
        let back: PostId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_idset_absorbs_duplicates() {
        let mut set = ids(&["3", "2"]);
        assert!(!set.push_front(PostId::from("2")));
        assert!(set.push_front(PostId::from("4")));
        assert_eq!(strings(&set), vec!["4", "3", "2"]);
    }

    #[test]
    fn test_merge_front_moves_shared_ids_forward() {
        let mut set = ids(&["3", "2", "1"]);
        set.merge_front(ids(&["5", "2"]).iter());
        assert_eq!(strings(&set), vec!["5", "2", "3", "1"]);
    }

    #[test]
    fn test_merge_back_keeps_existing_positions() {
        let mut set = ids(&["3", "2"]);
        set.merge_back(ids(&["2", "1"]).iter());
        assert_eq!(strings(&set), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_replace_in_place() {
        let mut set: IdSet = [PostId::pending("k"), "a".into(), "b".into()]
            .into_iter()
            .collect();
        assert!(set.replace(&PostId::pending("k"), PostId::real("r")));
        assert_eq!(strings(&set), vec!["r", "a", "b"]);
        assert!(!set.contains(&PostId::pending("k")));
    }

    #[test]
    fn test_replace_when_new_already_present_keeps_earlier() {
        let mut set: IdSet = ["r".into(), PostId::pending("k"), "a".into()]
            .into_iter()
            .collect();
        set.replace(&PostId::pending("k"), PostId::real("r"));
        assert_eq!(strings(&set), vec!["r", "a"]);

        let mut set: IdSet = [PostId::pending("k"), "a".into(), "r".into()]
            .into_iter()
            .collect();
        set.replace(&PostId::pending("k"), PostId::real("r"));
        assert_eq!(strings(&set), vec!["r", "a"]);
    }

    #[test]
    fn test_truncate_and_retain_keep_membership_in_sync() {
        let mut set = ids(&["5", "4", "3", "2", "1"]);
        set.truncate(3);
        assert!(!set.contains(&PostId::from("2")));
        set.retain(|id| id != &PostId::from("4"));
        assert_eq!(strings(&set), vec!["5", "3"]);
        assert!(!set.contains(&PostId::from("4")));
    }

    #[test]
    fn test_insert_sorted() {
        let mut set = IdSet::new();
        for raw in ["20", "3", "100", "7"] {
            set.insert_sorted(PostId::from(raw));
        }
        assert_eq!(strings(&set), vec!["3", "7", "20", "100"]);
    }
}
