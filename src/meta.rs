//! Matching against the OpenCitations Meta corpus.
//!
//! Meta is distributed as thousands of CSV shards. Each shard row describes
//! one entity; its `id` column lists every identifier of the entity,
//! space-separated, e.g. `omid:br/0601 doi:10.1000/xyz pmid:123`.
//!
//! Matching happens in two phases:
//!
//! 1. **Scan.** Each shard is joined on its own against the deduplicated
//!    repository identifiers, and the candidate matches are written to a
//!    `part-NNNNN.csv` file next to the final table.
//! 2. **Consolidate.** Once every shard is done, the part files are read back
//!    in scan order and the candidates of every canonical identifier are
//!    collapsed to one, ranked by the `(Meta type, collection)` preference
//!    table. The final table is written and the part files deleted.
//!
//! Identifiers in Meta are normalized again before the join, so both sides
//! compare canonical forms.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::config::META_TYPE_PREFERENCE;
use crate::normalize::normalize;
use crate::priority::{PreferenceTable, select_preferred};
use crate::regex::Regex;
use crate::shards::ShardSource;
use crate::utils::{for_each_row, non_blank, read_rows, write_rows};
use crate::{CanonicalId, ExternalRecord, Result, Scheme, SourceIdentifierRow};

/// File name of the consolidated table inside its dataset folder.
pub const MATCHED_FILE: &str = "iris_in_meta.csv";

/// Columns of the matched table, per-shard parts included.
pub const MATCHED_HEADER: [&str; 7] = [
    "id",
    "title",
    "meta_type",
    "pub_date",
    "omid",
    "iris_id",
    "iris_type",
];

/// `scheme:value` tokens of the Meta `id` column.
static ID_TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<scheme>omid|doi|pmid|isbn):(?P<value>[^\s"]+)"#).unwrap()
});

/// Configuration of the consolidation phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// `(Meta type, collection) → rank`, lower wins
    #[serde(default = "default_preferences")]
    pub preferences: PreferenceTable,
}

fn default_preferences() -> PreferenceTable {
    PreferenceTable::from_triples(META_TYPE_PREFERENCE)
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            preferences: default_preferences(),
        }
    }
}

/// The omid token of a Meta `id` value, prefix included.
///
/// ```
/// use irismatch::meta::omid;
///
/// assert_eq!(omid("doi:10.1000/x omid:br/0601"), Some("omid:br/0601"));
/// assert_eq!(omid("doi:10.1000/x"), None);
/// ```
pub fn omid(ids: &str) -> Option<&str> {
    ID_TOKEN_REGEX
        .captures_iter(ids)
        .find(|caps| caps.name("scheme").is_some_and(|m| m.as_str() == "omid"))
        .and_then(|caps| caps.get(0))
        .map(|m| m.as_str())
}

/// The canonical identifier a Meta entity is joined on: its DOI if it has
/// one, else its PMID, else its ISBN.
pub fn external_identifier(ids: &str) -> Option<CanonicalId> {
    let tokens: Vec<(&str, &str)> = ID_TOKEN_REGEX
        .captures_iter(ids)
        .filter_map(|caps| Some((caps.name("scheme")?.as_str(), caps.name("value")?.as_str())))
        .collect();

    Scheme::ALL.into_iter().find_map(|scheme| {
        tokens
            .iter()
            .filter(|(name, _)| *name == scheme.prefix().trim_end_matches(':'))
            .find_map(|(_, value)| normalize(scheme, value))
    })
}

/// A row of a Meta shard, restricted to the columns we use.
#[derive(Debug, Clone, Deserialize)]
struct MetaRow {
    id: String,
    #[serde(default, deserialize_with = "non_blank")]
    title: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "non_blank")]
    entity_type: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub_date: Option<String>,
}

impl MetaRow {
    fn into_record(self) -> Option<ExternalRecord> {
        let external_id = omid(&self.id)?.to_string();
        let external_identifier = external_identifier(&self.id)?;
        Some(ExternalRecord {
            external_identifier,
            external_id,
            external_type: self.entity_type,
            title: self.title,
            publication_date: self.pub_date,
        })
    }
}

/// A candidate match from one shard. The collection is still a code so it
/// can be ranked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PendingMatch {
    pub(crate) id: CanonicalId,
    pub(crate) title: Option<String>,
    pub(crate) meta_type: Option<String>,
    pub(crate) pub_date: Option<String>,
    pub(crate) omid: String,
    pub(crate) iris_id: i64,
    pub(crate) iris_type: Option<u32>,
}

/// One row of the consolidated matched table: a repository record and the
/// Meta entity chosen for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedRow {
    pub id: CanonicalId,
    #[serde(default, deserialize_with = "non_blank")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub meta_type: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub pub_date: Option<String>,
    pub omid: String,
    pub iris_id: i64,
    /// Collection label of the repository record
    #[serde(default, deserialize_with = "non_blank")]
    pub iris_type: Option<String>,
}

/// Counts reported by [`MetaMatcher::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSummary {
    pub shards: usize,
    pub candidates: usize,
    pub matched: usize,
}

/// Joins Meta shards against the deduplicated repository identifiers.
#[derive(Debug, Clone)]
pub struct MetaMatcher {
    by_id: HashMap<CanonicalId, SourceIdentifierRow>,
    config: MatcherConfig,
}

impl MetaMatcher {
    /// Builds a matcher over resolver output. Canonical identifiers are
    /// expected to be unique; a repeated one keeps its first row.
    #[must_use]
    pub fn new(rows: Vec<SourceIdentifierRow>) -> Self {
        let mut by_id = HashMap::with_capacity(rows.len());
        for row in rows {
            by_id.entry(row.canonical_id.clone()).or_insert(row);
        }
        Self {
            by_id,
            config: MatcherConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: MatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn match_record(&self, record: ExternalRecord) -> Option<PendingMatch> {
        let source = self.by_id.get(&record.external_identifier)?;
        Some(PendingMatch {
            id: record.external_identifier,
            title: record.title,
            meta_type: record.external_type,
            pub_date: record.publication_date,
            omid: record.external_id,
            iris_id: source.source_id,
            iris_type: source.source_type,
        })
    }

    /// Candidate matches of one shard, in row order.
    pub(crate) fn match_shard<R: Read>(&self, reader: R, shard: &str) -> Result<Vec<PendingMatch>> {
        let mut matches = Vec::new();
        let mut unparsed = 0usize;
        for_each_row(reader, shard, |row: MetaRow| {
            match row.into_record() {
                Some(record) => matches.extend(self.match_record(record)),
                None => unparsed += 1,
            }
            Ok(())
        })?;
        if unparsed > 0 {
            debug!("{} rows of {} carry no usable identifier", unparsed, shard);
        }
        Ok(matches)
    }

    /// Keeps one candidate per canonical identifier and renders the
    /// collection codes as labels.
    pub(crate) fn consolidate(
        &self,
        pending: Vec<PendingMatch>,
        labels: &BTreeMap<u32, String>,
    ) -> Vec<MatchedRow> {
        let preferences = &self.config.preferences;
        let selection = select_preferred(
            pending,
            |m| m.id.clone(),
            |m| preferences.rank(m.meta_type.as_deref(), m.iris_type),
        );
        debug!(
            "Dropped {} less preferred Meta entities",
            selection.dropped.len()
        );

        let mut unlabeled = BTreeSet::new();
        let rows = selection
            .kept
            .into_iter()
            .map(|m| {
                let iris_type = m.iris_type.map(|code| match labels.get(&code) {
                    Some(label) => label.clone(),
                    None => {
                        unlabeled.insert(code);
                        code.to_string()
                    }
                });
                MatchedRow {
                    id: m.id,
                    title: m.title,
                    meta_type: m.meta_type,
                    pub_date: m.pub_date,
                    omid: m.omid,
                    iris_id: m.iris_id,
                    iris_type,
                }
            })
            .collect();

        for code in unlabeled {
            warn!("Collection {} has no label, keeping the code", code);
        }
        rows
    }

    /// Scans every shard of `source`, then writes the consolidated table to
    /// `out_dir`/[`MATCHED_FILE`].
    ///
    /// Part files from an interrupted earlier run are removed first.
    pub fn run(
        &self,
        source: &ShardSource,
        out_dir: &Path,
        labels: &BTreeMap<u32, String>,
    ) -> Result<MatchSummary> {
        std::fs::create_dir_all(out_dir)?;
        remove_parts(out_dir)?;

        let mut parts: Vec<PathBuf> = Vec::new();
        let mut candidates = 0;
        let shards = source.for_each_csv(|shard, reader| {
            let matches = self.match_shard(reader, shard)?;
            if !matches.is_empty() {
                let part = out_dir.join(format!("part-{:05}.csv", parts.len() + 1));
                write_rows(&part, &MATCHED_HEADER, &matches)?;
                debug!("{} matches from {}", matches.len(), shard);
                candidates += matches.len();
                parts.push(part);
            }
            Ok(())
        })?;

        // every shard is on disk before any candidate is discarded
        let mut pending: Vec<PendingMatch> = Vec::with_capacity(candidates);
        for part in &parts {
            let name = part.to_string_lossy();
            let reader = BufReader::new(File::open(part)?);
            pending.extend(read_rows::<PendingMatch, _>(reader, &name)?);
        }

        let rows = self.consolidate(pending, labels);
        let matched = write_rows(&out_dir.join(MATCHED_FILE), &MATCHED_HEADER, &rows)?;
        remove_parts(out_dir)?;

        let summary = MatchSummary {
            shards,
            candidates,
            matched,
        };

        info!(
            "Matched {} repository records against {} Meta shards",
            summary.matched, summary.shards
        );
        Ok(summary)
    }
}

fn is_part(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .is_some_and(|name| name.starts_with("part-") && name.ends_with(".csv"))
}

fn remove_parts(dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_part(&path) {
            std::fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn row(source_id: i64, id: &str, source_type: Option<u32>) -> SourceIdentifierRow {
        SourceIdentifierRow {
            source_id,
            canonical_id: crate::normalize::normalize_prefixed(id).unwrap(),
            source_type,
        }
    }

    fn pending(id: &str, omid: &str, meta_type: &str, iris_type: u32) -> PendingMatch {
        PendingMatch {
            id: crate::normalize::normalize_prefixed(id).unwrap(),
            title: None,
            meta_type: Some(meta_type.to_string()),
            pub_date: None,
            omid: omid.to_string(),
            iris_id: 1,
            iris_type: Some(iris_type),
        }
    }

    #[rstest]
    #[case("omid:br/1 doi:10.1000/ABC pmid:42", Some("doi:10.1000/abc"))]
    #[case("omid:br/1 pmid:0042 isbn:9780134685991", Some("pmid:42"))]
    #[case("isbn:978-0-13-468599-1 omid:br/1", Some("isbn:9780134685991"))]
    #[case("pmid:77 doi:10.1000/late", Some("doi:10.1000/late"))]
    #[case("omid:br/1 issn:1234-5678", None)]
    #[case("", None)]
    fn test_external_identifier(#[case] ids: &str, #[case] expected: Option<&str>) {
        assert_eq!(
            external_identifier(ids).map(|id| id.to_string()).as_deref(),
            expected
        );
    }

    #[test]
    fn test_match_shard() {
        let matcher = MetaMatcher::new(vec![
            row(1, "doi:10.1000/a", Some(35)),
            row(2, "pmid:42", Some(35)),
        ]);
        let shard = "\
id,title,author,pub_date,type
omid:br/1 doi:10.1000/A,Alpha,,2020-01,journal article
omid:br/2 doi:10.1000/zzz,Unrelated,,,journal article
omid:br/3 pmid:42,Beta,,,
doi:10.1000/a,No omid,,,
";

        let matches = matcher.match_shard(shard.as_bytes(), "0001.csv").unwrap();

        assert_eq!(
            matches,
            vec![
                PendingMatch {
                    id: crate::normalize::normalize_doi("10.1000/a").unwrap(),
                    title: Some("Alpha".to_string()),
                    meta_type: Some("journal article".to_string()),
                    pub_date: Some("2020-01".to_string()),
                    omid: "omid:br/1".to_string(),
                    iris_id: 1,
                    iris_type: Some(35),
                },
                PendingMatch {
                    id: crate::normalize::normalize_pmid("42").unwrap(),
                    title: Some("Beta".to_string()),
                    meta_type: None,
                    pub_date: None,
                    omid: "omid:br/3".to_string(),
                    iris_id: 2,
                    iris_type: Some(35),
                },
            ]
        );
    }

    #[test]
    fn test_consolidate_prefers_ranked_pairs() {
        let matcher = MetaMatcher::new(Vec::new());
        let labels = BTreeMap::from([(35, "Articolo".to_string())]);

        let rows = matcher.consolidate(
            vec![
                pending("doi:10.1000/a", "omid:br/1", "book", 35),
                pending("doi:10.1000/a", "omid:br/2", "journal article", 35),
                pending("doi:10.1000/b", "omid:br/3", "book chapter", 42),
                pending("doi:10.1000/b", "omid:br/4", "book chapter", 41),
            ],
            &labels,
        );

        let chosen: Vec<(&str, Option<&str>)> = rows
            .iter()
            .map(|r| (r.omid.as_str(), r.iris_type.as_deref()))
            .collect();
        assert_eq!(chosen, vec![("omid:br/2", Some("Articolo")), ("omid:br/4", Some("41"))]);
    }

    #[test]
    fn test_consolidate_unranked_keeps_first() {
        let matcher = MetaMatcher::new(Vec::new());
        let rows = matcher.consolidate(
            vec![
                pending("isbn:9780134685991", "omid:br/7", "book", 49),
                pending("isbn:9780134685991", "omid:br/8", "edited book", 49),
            ],
            &BTreeMap::new(),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].omid, "omid:br/7");
    }

    #[test]
    fn test_run_writes_table_and_removes_parts() {
        let input = tempfile::tempdir().unwrap();
        std::fs::write(
            input.path().join("0001.csv"),
            "id,title,type\nomid:br/1 doi:10.1000/a,Alpha,book\n",
        )
        .unwrap();
        std::fs::write(input.path().join("0002.csv"), "id,title,type\nomid:br/9 doi:10.1000/x,X,\n")
            .unwrap();
        std::fs::write(
            input.path().join("0003.csv"),
            "id,title,type\nomid:br/2 doi:10.1000/a,Alpha,journal article\n",
        )
        .unwrap();

        let out = tempfile::tempdir().unwrap();
        std::fs::write(out.path().join("part-00042.csv"), "stale").unwrap();

        let matcher = MetaMatcher::new(vec![row(5, "doi:10.1000/a", Some(35))]);
        let source = ShardSource::open(input.path(), "").unwrap();
        let summary = matcher
            .run(&source, out.path(), &BTreeMap::from([(35, "Articolo".to_string())]))
            .unwrap();

        assert_eq!(
            summary,
            MatchSummary {
                shards: 3,
                candidates: 2,
                matched: 1
            }
        );
        let files: Vec<String> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(files, vec![MATCHED_FILE.to_string()]);
        assert_eq!(
            std::fs::read_to_string(out.path().join(MATCHED_FILE)).unwrap(),
            "id,title,meta_type,pub_date,omid,iris_id,iris_type\n\
             doi:10.1000/a,Alpha,journal article,,omid:br/2,5,Articolo\n"
        );
    }
}
