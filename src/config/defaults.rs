//! Default values for configuration
//!
//! Collection codes are the repository's `OWNING_COLLECTION` values.

use std::path::PathBuf;

/// DOI conflicts: journal articles, then monographs, conference proceedings
/// and reports.
pub const DOI_PRIORITY: &[(u32, u32)] = &[(35, 1), (50, 2), (41, 3), (57, 4)];

/// PMID conflicts: journal articles first.
pub const PMID_PRIORITY: &[(u32, u32)] = &[(35, 1)];

/// ISBN conflicts: books before book chapters.
pub const ISBN_PRIORITY: &[(u32, u32)] = &[(49, 1), (35, 2)];

/// Which external record to keep when one identifier matched several Meta
/// entities: `(Meta type, collection, rank)`.
pub const META_TYPE_PREFERENCE: &[(&str, u32, u32)] = &[
    ("journal article", 35, 0),
    ("book chapter", 41, 1),
    ("book chapter", 42, 2),
];

/// Environment variable overriding the data root
pub const DATA_ROOT_ENV: &str = "IRISMATCH_DATA_ROOT";

/// Default data root, relative to the working directory
pub fn default_data_root() -> PathBuf {
    std::env::var(DATA_ROOT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

pub fn default_run_in_parallel() -> bool {
    cfg!(feature = "parallel")
}
