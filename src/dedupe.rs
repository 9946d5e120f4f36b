//! Source identifier deduplication.
//!
//! The repository holds genuine duplicates: two items describing the same
//! work, both carrying its DOI. The resolver turns repository records into a
//! table where every canonical identifier belongs to exactly one record.
//!
//! ## Algorithm
//!
//! 1. Normalize the DOI, PMID and ISBN fields of every record independently,
//!    tagging each row with the record's collection code.
//! 2. Concatenate the DOI, PMID and ISBN rows in that order and keep the first
//!    row of every record. Most records carry a single identifier, so this
//!    picks one without losing real duplicates.
//! 3. Find the canonical identifiers claimed by more than one record.
//! 4. For each such identifier, rank the claimants with the priority table of
//!    the identifier's scheme and keep the best one. Collection codes missing
//!    from the table rank last; equal ranks keep the earlier record.
//! 5. Remove every losing record.
//!
//! ## Usage
//!
//! ```rust
//! use irismatch::{SourceRecord, dedupe::Resolver};
//!
//! let records = vec![
//!     SourceRecord::new(10, Some(41)).with_doi("https://doi.org/10.1000/x"),
//!     SourceRecord::new(11, Some(35)).with_doi("10.1000/X"),
//!     SourceRecord::new(12, Some(49)).with_isbn("978-88-15-27341-5"),
//! ];
//!
//! let rows = Resolver::new().resolve(&records);
//! let ids: Vec<i64> = rows.iter().map(|r| r.source_id).collect();
//! assert_eq!(ids, vec![11, 12]);
//! ```

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::{DOI_PRIORITY, ISBN_PRIORITY, PMID_PRIORITY, default_run_in_parallel};
use crate::normalize::normalize;
use crate::priority::{PriorityTable, select_preferred};
use crate::{Scheme, SourceIdentifierRow, SourceRecord};

/// How contested identifiers of one scheme are settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPolicy {
    /// Collection ranking, best first
    pub priority: PriorityTable,
    /// Collections that never win a contested identifier. When only such
    /// records claim an identifier, none of them keeps it.
    #[serde(default)]
    pub excluded_types: Vec<u32>,
}

impl ConflictPolicy {
    #[must_use]
    pub fn new(priority: &[(u32, u32)]) -> Self {
        Self {
            priority: PriorityTable::from_pairs(priority),
            excluded_types: Vec::new(),
        }
    }

    fn is_excluded(&self, source_type: Option<u32>) -> bool {
        source_type.is_some_and(|t| self.excluded_types.contains(&t))
    }
}

/// Configuration options for the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Normalize records on the rayon pool. Output order is unaffected.
    #[serde(default = "default_run_in_parallel")]
    pub run_in_parallel: bool,
    #[serde(default = "default_doi_policy")]
    pub doi: ConflictPolicy,
    #[serde(default = "default_pmid_policy")]
    pub pmid: ConflictPolicy,
    #[serde(default = "default_isbn_policy")]
    pub isbn: ConflictPolicy,
}

fn default_doi_policy() -> ConflictPolicy {
    ConflictPolicy::new(DOI_PRIORITY)
}

fn default_pmid_policy() -> ConflictPolicy {
    ConflictPolicy::new(PMID_PRIORITY)
}

fn default_isbn_policy() -> ConflictPolicy {
    ConflictPolicy::new(ISBN_PRIORITY)
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            run_in_parallel: default_run_in_parallel(),
            doi: default_doi_policy(),
            pmid: default_pmid_policy(),
            isbn: default_isbn_policy(),
        }
    }
}

impl ResolverConfig {
    pub fn policy(&self, scheme: Scheme) -> &ConflictPolicy {
        match scheme {
            Scheme::Doi => &self.doi,
            Scheme::Pmid => &self.pmid,
            Scheme::Isbn => &self.isbn,
        }
    }
}

/// Builds the deduplicated source identifier table.
#[derive(Debug, Default, Clone)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs the whole resolution over `records`.
    ///
    /// The result holds at most one row per record and never two rows with
    /// the same canonical identifier. Rows keep their extraction order.
    pub fn resolve(&self, records: &[SourceRecord]) -> Vec<SourceIdentifierRow> {
        let rows = self.extract(records);
        let rows = first_row_per_source(rows);
        let resolved = self.settle_conflicts(rows);
        info!(
            "Resolved {} source identifiers from {} records",
            resolved.len(),
            records.len()
        );
        resolved
    }

    /// Normalizes every identifier field. DOI rows come first, then PMID,
    /// then ISBN, each in record order.
    pub fn extract(&self, records: &[SourceRecord]) -> Vec<SourceIdentifierRow> {
        let mut rows = Vec::new();
        for scheme in Scheme::ALL {
            let before = rows.len();
            rows.extend(self.extract_scheme(records, scheme));
            debug!("Extracted {} {} identifiers", rows.len() - before, scheme);
        }
        rows
    }

    fn extract_scheme(&self, records: &[SourceRecord], scheme: Scheme) -> Vec<SourceIdentifierRow> {
        let row_for = |record: &SourceRecord| {
            let raw = record.raw(scheme)?;
            let canonical_id = normalize(scheme, raw)?;
            Some(SourceIdentifierRow {
                source_id: record.item_id,
                canonical_id,
                source_type: record.owning_collection,
            })
        };

        #[cfg(feature = "parallel")]
        if self.config.run_in_parallel {
            use rayon::prelude::*;

            return records.par_iter().filter_map(row_for).collect();
        }

        records.iter().filter_map(row_for).collect()
    }

    /// Settles identifiers claimed by several records and removes the losing
    /// records.
    fn settle_conflicts(&self, rows: Vec<SourceIdentifierRow>) -> Vec<SourceIdentifierRow> {
        let counts = rows.iter().map(|r| &r.canonical_id).counts();
        let contested: Vec<&SourceIdentifierRow> = rows
            .iter()
            .filter(|r| counts[&r.canonical_id] > 1)
            .collect();

        if contested.is_empty() {
            return rows;
        }

        let mut losers: HashSet<i64> = HashSet::new();
        for scheme in Scheme::ALL {
            let policy = self.config.policy(scheme);
            let candidates: Vec<&SourceIdentifierRow> = contested
                .iter()
                .copied()
                .filter(|r| r.canonical_id.scheme() == Some(scheme))
                .collect();
            if candidates.is_empty() {
                continue;
            }

            // excluded collections sort behind unranked ones
            let selection = select_preferred(
                candidates,
                |r| r.canonical_id.clone(),
                |r| (policy.is_excluded(r.source_type), policy.priority.rank(r.source_type)),
            );
            losers.extend(selection.dropped.iter().map(|r| r.source_id));
            losers.extend(
                selection
                    .kept
                    .iter()
                    .filter(|r| policy.is_excluded(r.source_type))
                    .map(|r| r.source_id),
            );
            debug!(
                "{} conflicts: {} identifiers, {} records dropped",
                scheme,
                selection.kept.len(),
                selection.dropped.len()
            );
        }

        info!(
            "Dropping {} duplicate records over {} contested identifiers",
            losers.len(),
            counts.values().filter(|&&n| n > 1).count()
        );

        rows.into_iter()
            .filter(|r| !losers.contains(&r.source_id))
            .collect()
    }
}

/// Keeps the first row of every source id.
fn first_row_per_source(rows: Vec<SourceIdentifierRow>) -> Vec<SourceIdentifierRow> {
    rows.into_iter().unique_by(|r| r.source_id).collect()
}
