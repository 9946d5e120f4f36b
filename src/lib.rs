//! Reconcile institutional repository records against open citation corpora.
//!
//! `irismatch` takes the tabular dump of an institutional repository (IRIS),
//! pulls the DOI, ISBN and PMID identifiers out of its free-text identifier
//! columns, deduplicates records that claim the same identifier, and matches
//! the survivors against the OpenCitations Meta corpus and Index citation
//! edges.
//!
//! # Pipeline
//!
//! 1. [`iris::IrisDump`] loads and joins the repository tables.
//! 2. [`normalize`] turns raw identifier strings into [`CanonicalId`]s.
//! 3. [`dedupe::Resolver`] keeps one source record per canonical identifier.
//! 4. [`meta::MetaMatcher`] scans the Meta shards and keeps one external
//!    record per canonical identifier.
//! 5. [`queries`] answers the coverage and citation questions over the
//!    persisted tables.
//!
//! # Normalizing identifiers
//!
//! ```rust
//! use irismatch::{normalize, Scheme};
//!
//! let doi = normalize::normalize(Scheme::Doi, "https://doi.org/10.1234/ABC.2020;extra");
//! assert_eq!(doi.unwrap().as_str(), "doi:10.1234/abc.2020");
//!
//! // PubMed Central ids live in a different identifier space
//! assert!(normalize::normalize(Scheme::Pmid, "PMC123456").is_none());
//! ```
//!
//! # Resolving duplicates
//!
//! ```rust
//! use irismatch::{SourceRecord, dedupe::Resolver};
//!
//! let records = vec![
//!     SourceRecord::new(1, Some(41)).with_doi("10.1000/a"),
//!     SourceRecord::new(2, Some(35)).with_doi("10.1000/A"),
//! ];
//!
//! let rows = Resolver::new().resolve(&records);
//! assert_eq!(rows.len(), 1);
//! assert_eq!(rows[0].source_id, 2); // journal articles win DOI conflicts
//! ```
//!
//! # Error Handling
//!
//! Every fallible operation returns the crate [`Result`], wrapping
//! [`ReconcileError`]. Identifiers that fail to normalize are not errors: they
//! are dropped from the candidate set.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub mod config;
pub mod datasets;
pub mod dedupe;
pub mod index;
pub mod iris;
pub mod meta;
pub mod normalize;
pub mod priority;
pub mod queries;
pub mod report;
pub mod shards;
mod regex;
mod utils;

// Reexports
pub use config::Config;
pub use datasets::DataRoot;
pub use dedupe::Resolver;
pub use iris::IrisDump;
pub use meta::MetaMatcher;
pub use shards::ShardSource;

/// A specialized Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Errors that can occur while loading, matching or querying.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// An input dump is missing. Never retried.
    #[error("'{}' does not exist. {hint}", path.display())]
    NotFound { path: PathBuf, hint: String },

    /// A dataset produced by an earlier step is missing.
    #[error("Folder '{}' does not exist. Please run '{step}' first.", path.display())]
    MissingPrerequisite { path: PathBuf, step: String },

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),
}

impl From<zip::result::ZipError> for ReconcileError {
    fn from(err: zip::result::ZipError) -> Self {
        ReconcileError::Archive(err.to_string())
    }
}

/// Identifier families found in the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Doi,
    Isbn,
    Pmid,
}

impl Scheme {
    /// Union order of the per-scheme rows; earlier schemes win when one
    /// record carries several identifiers.
    pub const ALL: [Scheme; 3] = [Scheme::Doi, Scheme::Pmid, Scheme::Isbn];

    /// The prefix of canonical identifiers of this scheme, colon included.
    pub fn prefix(self) -> &'static str {
        match self {
            Scheme::Doi => "doi:",
            Scheme::Isbn => "isbn:",
            Scheme::Pmid => "pmid:",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches(':'))
    }
}

/// A scheme-prefixed, normalized identifier such as `doi:10.1234/abc`.
///
/// Only [`normalize`] builds these from raw text, so every value carries one
/// of the three scheme prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalId(CompactString);

impl CanonicalId {
    pub(crate) fn new(scheme: Scheme, value: &str) -> Self {
        let mut id = CompactString::from(scheme.prefix());
        id.push_str(value);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The scheme named by the prefix, if it is one of ours.
    pub fn scheme(&self) -> Option<Scheme> {
        Scheme::ALL
            .into_iter()
            .find(|scheme| self.0.starts_with(scheme.prefix()))
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One item of the institutional repository with its raw identifier fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub item_id: i64,
    /// Collection code, which doubles as the document type
    pub owning_collection: Option<u32>,
    pub doi_raw: Option<String>,
    pub isbn_raw: Option<String>,
    pub pmid_raw: Option<String>,
}

impl SourceRecord {
    #[must_use]
    pub fn new(item_id: i64, owning_collection: Option<u32>) -> Self {
        Self {
            item_id,
            owning_collection,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_doi(mut self, doi: &str) -> Self {
        self.doi_raw = Some(doi.to_string());
        self
    }

    #[must_use]
    pub fn with_isbn(mut self, isbn: &str) -> Self {
        self.isbn_raw = Some(isbn.to_string());
        self
    }

    #[must_use]
    pub fn with_pmid(mut self, pmid: &str) -> Self {
        self.pmid_raw = Some(pmid.to_string());
        self
    }

    /// The raw field holding identifiers of `scheme`.
    pub fn raw(&self, scheme: Scheme) -> Option<&str> {
        match scheme {
            Scheme::Doi => self.doi_raw.as_deref(),
            Scheme::Isbn => self.isbn_raw.as_deref(),
            Scheme::Pmid => self.pmid_raw.as_deref(),
        }
    }

    /// Whether any identifier field has non-blank content.
    pub fn has_identifier(&self) -> bool {
        Scheme::ALL
            .into_iter()
            .any(|scheme| self.raw(scheme).is_some_and(|v| !v.trim().is_empty()))
    }
}

/// A canonical identifier extracted from one source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIdentifierRow {
    #[serde(rename = "iris_id")]
    pub source_id: i64,
    #[serde(rename = "id")]
    pub canonical_id: CanonicalId,
    #[serde(rename = "iris_type")]
    pub source_type: Option<u32>,
}

/// One entity of the external corpus, keyed by the identifier it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRecord {
    pub external_identifier: CanonicalId,
    /// Opaque entity id, e.g. `omid:br/0601`
    pub external_id: String,
    pub external_type: Option<String>,
    pub title: Option<String>,
    pub publication_date: Option<String>,
}

/// A citation between two external entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEdge {
    /// Citation id, e.g. `oci:0601-0602`; absent in hand-built edge tables
    #[serde(
        rename = "id",
        default,
        deserialize_with = "crate::utils::non_blank"
    )]
    pub oci: Option<String>,
    #[serde(rename = "citing")]
    pub citing_id: String,
    #[serde(rename = "cited")]
    pub cited_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ReconcileError::MissingPrerequisite {
            path: PathBuf::from("data/iris_in_meta"),
            step: "irismatch create --iris-in-meta".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Folder 'data/iris_in_meta' does not exist. Please run 'irismatch create --iris-in-meta' first."
        );
    }

    #[test]
    fn test_canonical_id_scheme() {
        assert_eq!(
            CanonicalId::new(Scheme::Isbn, "9780134685991").scheme(),
            Some(Scheme::Isbn)
        );
        assert_eq!(CanonicalId::new(Scheme::Pmid, "12").to_string(), "pmid:12");
    }

    #[test]
    fn test_has_identifier_ignores_blank_fields() {
        let record = SourceRecord::new(1, None).with_doi("  ");
        assert!(!record.has_identifier());
        assert!(record.with_pmid("123").has_identifier());
    }
}
