//! Priority tables and rank-based conflict resolution.
//!
//! Both conflicts in the pipeline have the same shape: several candidates
//! share a key, each candidate gets a rank from a small lookup table, and the
//! best-ranked candidate survives. Types missing from the table rank after
//! every listed type, and equal ranks keep the candidate seen first.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Position of a candidate in a priority table. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rank {
    Ranked(u32),
    /// Not in the table; sorts after every ranked value
    Unranked,
}

/// One `collection → rank` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRank {
    pub collection: u32,
    pub rank: u32,
}

/// Ranking of repository collection codes.
///
/// ```
/// use irismatch::priority::{PriorityTable, Rank};
///
/// let table = PriorityTable::from_pairs(&[(35, 1), (50, 2)]);
/// assert_eq!(table.rank(Some(35)), Rank::Ranked(1));
/// assert_eq!(table.rank(Some(99)), Rank::Unranked);
/// assert_eq!(table.rank(None), Rank::Unranked);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityTable {
    entries: Vec<CollectionRank>,
}

impl PriorityTable {
    #[must_use]
    pub fn from_pairs(pairs: &[(u32, u32)]) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|&(collection, rank)| CollectionRank { collection, rank })
                .collect(),
        }
    }

    pub fn rank(&self, collection: Option<u32>) -> Rank {
        collection
            .and_then(|code| self.entries.iter().find(|e| e.collection == code))
            .map_or(Rank::Unranked, |e| Rank::Ranked(e.rank))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One `(external type, collection) → rank` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePreference {
    pub external_type: String,
    pub collection: u32,
    pub rank: u32,
}

/// Ranking of external records by the pair of their own type label and the
/// collection of the repository record they matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceTable {
    entries: Vec<TypePreference>,
}

impl PreferenceTable {
    #[must_use]
    pub fn from_triples(triples: &[(&str, u32, u32)]) -> Self {
        Self {
            entries: triples
                .iter()
                .map(|&(external_type, collection, rank)| TypePreference {
                    external_type: external_type.to_string(),
                    collection,
                    rank,
                })
                .collect(),
        }
    }

    pub fn rank(&self, external_type: Option<&str>, collection: Option<u32>) -> Rank {
        let (Some(external_type), Some(collection)) = (external_type, collection) else {
            return Rank::Unranked;
        };
        self.entries
            .iter()
            .find(|e| e.collection == collection && e.external_type == external_type)
            .map_or(Rank::Unranked, |e| Rank::Ranked(e.rank))
    }
}

/// Candidates grouped by key, split into the winner of each group and the
/// rest.
#[derive(Debug)]
pub struct Selection<T> {
    pub kept: Vec<T>,
    pub dropped: Vec<T>,
}

/// Keeps the best-ranked candidate of every key.
///
/// Groups come out in order of their first candidate and ties go to the
/// earlier candidate, so the result only depends on input order and ranks.
pub fn select_preferred<T, K, R, KF, RF>(candidates: Vec<T>, key: KF, rank: RF) -> Selection<T>
where
    K: Eq + Hash,
    R: Ord,
    KF: Fn(&T) -> K,
    RF: Fn(&T) -> R,
{
    let mut group_of: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Vec<T>> = Vec::new();

    for candidate in candidates {
        let next = groups.len();
        let slot = *group_of.entry(key(&candidate)).or_insert(next);
        if slot == next {
            groups.push(Vec::new());
        }
        groups[slot].push(candidate);
    }

    let mut kept = Vec::with_capacity(groups.len());
    let mut dropped = Vec::new();
    for mut group in groups {
        // stable: equal ranks keep their input order
        group.sort_by_key(|c| rank(c));
        let mut members = group.into_iter();
        if let Some(best) = members.next() {
            kept.push(best);
        }
        dropped.extend(members);
    }

    Selection { kept, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rank_ordering() {
        assert!(Rank::Ranked(0) < Rank::Ranked(4));
        assert!(Rank::Ranked(u32::MAX) < Rank::Unranked);
    }

    #[test]
    fn test_select_preferred_by_rank() {
        let table = PriorityTable::from_pairs(&[(35, 1), (41, 3)]);
        let candidates = vec![("a", Some(41), 1), ("a", Some(35), 2), ("b", None, 3)];

        let selection = select_preferred(candidates, |c| c.0, |c| table.rank(c.1));

        assert_eq!(selection.kept, vec![("a", Some(35), 2), ("b", None, 3)]);
        assert_eq!(selection.dropped, vec![("a", Some(41), 1)]);
    }

    #[test]
    fn test_select_preferred_ties_keep_first() {
        let table = PriorityTable::default();
        let candidates = vec![("x", Some(1), 1), ("x", Some(2), 2), ("x", None, 3)];

        let selection = select_preferred(candidates, |c| c.0, |c| table.rank(c.1));

        assert_eq!(selection.kept, vec![("x", Some(1), 1)]);
        assert_eq!(selection.dropped.len(), 2);
    }

    #[test]
    fn test_preference_table_rank() {
        let table = PreferenceTable::from_triples(&[
            ("journal article", 35, 0),
            ("book chapter", 41, 1),
        ]);
        assert_eq!(table.rank(Some("journal article"), Some(35)), Rank::Ranked(0));
        assert_eq!(table.rank(Some("journal article"), Some(41)), Rank::Unranked);
        assert_eq!(table.rank(None, Some(35)), Rank::Unranked);
    }
}
