//! Filtering of the OpenCitations Index.
//!
//! The Index lists citations between Meta entities as `id,citing,cited`
//! rows, an oci followed by two omids. Only edges touching a matched repository record matter here, so
//! every shard is filtered on its own and the surviving edges are written to
//! one CSV per shard.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::shards::{ShardSource, shard_stem};
use crate::utils::{for_each_row, write_rows};
use crate::{CitationEdge, Result};

/// Columns of the filtered edge tables.
pub const EDGE_HEADER: [&str; 3] = ["id", "citing", "cited"];

/// Counts reported by [`IndexFilter::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub shards: usize,
    pub scanned: usize,
    pub kept: usize,
}

/// Keeps the citation edges with at least one endpoint in a set of omids.
#[derive(Debug, Clone, Copy)]
pub struct IndexFilter<'a> {
    omids: &'a HashSet<String>,
}

impl<'a> IndexFilter<'a> {
    pub fn new(omids: &'a HashSet<String>) -> Self {
        Self { omids }
    }

    pub fn touches(&self, edge: &CitationEdge) -> bool {
        self.omids.contains(&edge.citing_id) || self.omids.contains(&edge.cited_id)
    }

    /// Edges of one shard touching the omid set. Returns them with the
    /// number of rows read.
    pub(crate) fn filter_shard<R: Read>(
        &self,
        reader: R,
        shard: &str,
    ) -> Result<(Vec<CitationEdge>, usize)> {
        let mut kept = Vec::new();
        let scanned = for_each_row(reader, shard, |edge: CitationEdge| {
            if self.touches(&edge) {
                kept.push(edge);
            }
            Ok(())
        })?;
        Ok((kept, scanned))
    }

    /// Filters every shard of `source` into `out_dir`, one `<shard>.csv` per
    /// shard with at least one kept edge. Earlier CSV files in `out_dir` are
    /// removed first.
    pub fn run(&self, source: &ShardSource, out_dir: &Path) -> Result<IndexSummary> {
        std::fs::create_dir_all(out_dir)?;
        for entry in std::fs::read_dir(out_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
                std::fs::remove_file(&path)?;
            }
        }

        let mut used: HashSet<String> = HashSet::new();
        let mut scanned = 0;
        let mut kept = 0;
        let shards = source.for_each_csv(|shard, reader| {
            let (edges, rows) = self.filter_shard(reader, shard)?;
            scanned += rows;
            if edges.is_empty() {
                return Ok(());
            }

            // nested archives can repeat shard names
            let stem = shard_stem(shard);
            let mut name = stem.clone();
            let mut n = 1;
            while !used.insert(name.clone()) {
                n += 1;
                name = format!("{stem}-{n}");
            }

            kept += write_rows(&out_dir.join(format!("{name}.csv")), &EDGE_HEADER, &edges)?;
            debug!("Kept {} of {} edges from {}", edges.len(), rows, shard);
            Ok(())
        })?;

        info!(
            "Kept {} of {} citation edges from {} Index shards",
            kept, scanned, shards
        );
        Ok(IndexSummary {
            shards,
            scanned,
            kept,
        })
    }
}
