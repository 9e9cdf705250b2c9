//! Duplicate suppression for transcript records.
//!
//! The chat client sometimes rewrites or repeats records; a short digest of
//! each record is remembered in a bounded window so the same message is not
//! narrated twice.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use sha2::{Digest, Sha256};

/// 16 hex chars of SHA-256. Collisions are possible but not worth guarding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Digest of the non-empty `parts`, joined with `_`.
    pub fn from_parts(parts: &[&str]) -> Self {
        let joined = parts
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("_");
        let digest = Sha256::digest(joined.as_bytes());
        Self(digest[..8].iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most-recently-seen fingerprints, oldest evicted first.
#[derive(Debug)]
pub struct SeenSet {
    capacity: usize,
    order: VecDeque<Fingerprint>,
    members: HashSet<Fingerprint>,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
        }
    }

    /// Returns `false` if the fingerprint was already in the window.
    pub fn insert(&mut self, fingerprint: Fingerprint) -> bool {
        if self.contains(&fingerprint) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        self.members.insert(fingerprint.clone());
        self.order.push_back(fingerprint);
        true
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.members.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(n: usize) -> Fingerprint {
        Fingerprint::from_parts(&[&n.to_string()])
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = Fingerprint::from_parts(&["[{\"type\":\"text\"}]", "assistant", "2025-01-01T00:00:00Z"]);
        let b = Fingerprint::from_parts(&["[{\"type\":\"text\"}]", "assistant", "2025-01-01T00:00:00Z"]);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));

        let c = Fingerprint::from_parts(&["[{\"type\":\"text\"}]", "user", "2025-01-01T00:00:00Z"]);
        assert_ne!(a, c);
    }

    #[test]
    fn empty_parts_are_skipped() {
        assert_eq!(
            Fingerprint::from_parts(&["x", "", "y"]),
            Fingerprint::from_parts(&["x", "y"])
        );
    }

    #[test]
    fn insert_reports_duplicates() {
        let mut seen = SeenSet::new(10);
        assert!(seen.insert(fp(1)));
        assert!(!seen.insert(fp(1)));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn bounded_to_capacity_keeping_most_recent() {
        let mut seen = SeenSet::new(100);
        for n in 0..250 {
            seen.insert(fp(n));
        }
        assert_eq!(seen.len(), 100);
        assert!(!seen.contains(&fp(0)));
        assert!(!seen.contains(&fp(149)));
        assert!((150..250).all(|n| seen.contains(&fp(n))));

        // Evicted entries count as new again.
        assert!(seen.insert(fp(0)));
        assert!(!seen.contains(&fp(150)));
    }

    #[test]
    fn clear_forgets_everything() {
        let mut seen = SeenSet::new(3);
        seen.insert(fp(1));
        seen.clear();
        assert!(seen.is_empty());
        assert!(seen.insert(fp(1)));
    }
}
