//! The datasets persisted under the data root.
//!
//! ```text
//! <root>/
//!   iris_in_meta/iris_in_meta.csv          matched records
//!   iris_not_in_meta/iris_not_in_meta.csv  deduplicated records Meta lacks
//!   iris_no_id/iris_no_id.csv              records without identifiers
//!   index_in_iris/<shard>.csv              citation edges touching a match
//! ```
//!
//! Later datasets and every research question read earlier ones from disk.
//! A missing input surfaces as [`ReconcileError::MissingPrerequisite`]
//! naming the command that produces it.

use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::dedupe::Resolver;
use crate::index::{IndexFilter, IndexSummary};
use crate::iris::{IrisDump, NoIdRecord};
use crate::meta::{MATCHED_FILE, MatchSummary, MatchedRow, MetaMatcher};
use crate::shards::ShardSource;
use crate::utils::{for_each_row, read_rows, write_rows};
use crate::{CitationEdge, Config, ReconcileError, Result, SourceIdentifierRow};

pub const IRIS_IN_META: &str = "iris_in_meta";
pub const IRIS_NOT_IN_META: &str = "iris_not_in_meta";
pub const IRIS_NO_ID: &str = "iris_no_id";
pub const INDEX_IN_IRIS: &str = "index_in_iris";

const IRIS_IN_META_STEP: &str = "irismatch create --iris-in-meta";
const INDEX_IN_IRIS_STEP: &str = "irismatch create --iris-in-index";

/// Columns of the unmatched table.
const NOT_IN_META_HEADER: [&str; 3] = ["iris_id", "id", "iris_type"];

/// Root folder of every dataset the pipeline writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRoot {
    root: PathBuf,
}

impl DataRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn iris_in_meta_dir(&self) -> PathBuf {
        self.root.join(IRIS_IN_META)
    }

    pub fn iris_in_meta_file(&self) -> PathBuf {
        self.iris_in_meta_dir().join(MATCHED_FILE)
    }

    pub fn iris_not_in_meta_file(&self) -> PathBuf {
        self.root
            .join(IRIS_NOT_IN_META)
            .join(format!("{IRIS_NOT_IN_META}.csv"))
    }

    pub fn iris_no_id_file(&self) -> PathBuf {
        self.root.join(IRIS_NO_ID).join(format!("{IRIS_NO_ID}.csv"))
    }

    pub fn index_in_iris_dir(&self) -> PathBuf {
        self.root.join(INDEX_IN_IRIS)
    }

    /// Path of the matched table, if `create --iris-in-meta` has run.
    pub fn require_matched(&self) -> Result<PathBuf> {
        let file = self.iris_in_meta_file();
        if file.is_file() {
            Ok(file)
        } else {
            Err(ReconcileError::MissingPrerequisite {
                path: self.iris_in_meta_dir(),
                step: IRIS_IN_META_STEP.to_string(),
            })
        }
    }

    /// Path of the filtered edge folder, if `create --iris-in-index` has run.
    pub fn require_index(&self) -> Result<PathBuf> {
        let dir = self.index_in_iris_dir();
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(ReconcileError::MissingPrerequisite {
                path: dir,
                step: INDEX_IN_IRIS_STEP.to_string(),
            })
        }
    }

    pub fn load_matched(&self) -> Result<Vec<MatchedRow>> {
        let path = self.require_matched()?;
        read_rows(BufReader::new(File::open(&path)?), MATCHED_FILE)
    }

    /// Omids of every matched Meta entity.
    pub fn matched_omids(&self) -> Result<HashSet<String>> {
        Ok(self
            .load_matched()?
            .into_iter()
            .map(|row| row.omid)
            .collect())
    }

    /// Streams every persisted citation edge, shard files in name order.
    pub fn for_each_edge<F>(&self, mut f: F) -> Result<usize>
    where
        F: FnMut(CitationEdge),
    {
        let dir = self.require_index()?;
        let source = ShardSource::Directory(dir);
        let mut total = 0;
        source.for_each_csv(|name, reader| {
            total += for_each_row(reader, name, |edge: CitationEdge| {
                f(edge);
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(total)
    }

    /// Resolves the repository identifiers and matches them against Meta.
    pub fn create_iris_in_meta(
        &self,
        iris: &IrisDump,
        meta: &ShardSource,
        config: &Config,
    ) -> Result<MatchSummary> {
        let rows = resolve(iris, config)?;
        let labels = iris.collection_labels()?;
        let summary = MetaMatcher::new(rows)
            .with_config(config.matcher.clone())
            .run(meta, &self.iris_in_meta_dir(), &labels)?;
        info!(
            "Iris In Meta saved to '{}'",
            self.iris_in_meta_file().display()
        );
        Ok(summary)
    }

    /// Writes the deduplicated identifiers whose record has no match.
    pub fn create_iris_not_in_meta(&self, iris: &IrisDump, config: &Config) -> Result<usize> {
        let matched: HashSet<i64> = self
            .load_matched()?
            .into_iter()
            .map(|row| row.iris_id)
            .collect();

        let unmatched: Vec<SourceIdentifierRow> = resolve(iris, config)?
            .into_iter()
            .filter(|row| !matched.contains(&row.source_id))
            .collect();

        let path = self.iris_not_in_meta_file();
        let written = write_rows(&path, &NOT_IN_META_HEADER, &unmatched)?;
        info!("Iris Not In Meta saved to '{}'", path.display());
        Ok(written)
    }

    pub fn create_iris_no_id(&self, iris: &IrisDump) -> Result<usize> {
        let records = iris.records_without_ids()?;
        let path = self.iris_no_id_file();
        let written = write_rows::<NoIdRecord, _>(&path, &NoIdRecord::HEADER, &records)?;
        info!("Iris No ID saved to '{}'", path.display());
        Ok(written)
    }

    /// Filters the Index down to the edges touching a matched entity.
    pub fn create_index_in_iris(&self, index: &ShardSource) -> Result<IndexSummary> {
        let omids = self.matched_omids()?;
        let summary = IndexFilter::new(&omids).run(index, &self.index_in_iris_dir())?;
        info!(
            "Index In Iris saved to '{}'",
            self.index_in_iris_dir().display()
        );
        Ok(summary)
    }
}

impl Default for DataRoot {
    fn default() -> Self {
        Self::new(crate::config::default_data_root())
    }
}

fn resolve(iris: &IrisDump, config: &Config) -> Result<Vec<SourceIdentifierRow>> {
    let records = iris.records()?;
    Ok(Resolver::new()
        .with_config(config.resolver.clone())
        .resolve(&records))
}
