//! IRIS dump loader.
//!
//! The institutional repository is exported as a set of CSV tables keyed by
//! `ITEM_ID`. A dump is either a directory holding the tables or a zip
//! archive of it; in both cases the tables may sit in one subfolder, which is
//! found by file name.
//!
//! # Example
//!
//! ```no_run
//! use irismatch::IrisDump;
//!
//! let dump = IrisDump::open("data/iris.zip")?;
//! let records = dump.records()?;
//! let labels = dump.collection_labels()?;
//! println!("{} records in {} collections", records.len(), labels.len());
//! # Ok::<(), irismatch::ReconcileError>(())
//! ```

mod structure;

pub use structure::NoIdRecord;

use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::utils::read_rows;
use crate::{ReconcileError, Result, SourceRecord};
use structure::{
    DESCRIPTION_TABLE, DescriptionRow, IDENTIFIER_TABLE, IdentifierRow, LANGUAGE_TABLE,
    LanguageRow, MASTER_TABLE, MasterRow, PUBLISHER_TABLE, PublisherRow,
};

/// Shown when the dump or one of its tables is missing.
pub const MISSING_DUMP_HINT: &str =
    "Please download the IRIS dump and place it in the 'data/' folder.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Directory,
    Zip,
}

/// Read access to the tables of one IRIS export.
#[derive(Debug, Clone)]
pub struct IrisDump {
    path: PathBuf,
    layout: Layout,
}

impl IrisDump {
    /// Opens a dump directory or `.zip` archive. Tables are read lazily by
    /// the accessor methods.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReconcileError::NotFound {
                path: path.to_path_buf(),
                hint: MISSING_DUMP_HINT.to_string(),
            });
        }

        let layout = if path.is_dir() {
            Layout::Directory
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
        {
            Layout::Zip
        } else {
            return Err(ReconcileError::UnsupportedInput(format!(
                "{} is neither a directory nor a .zip archive",
                path.display()
            )));
        };

        Ok(Self {
            path: path.to_path_buf(),
            layout,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records with at least one non-blank identifier field, in identifier
    /// table order. Items missing from the master table are left out.
    pub fn records(&self) -> Result<Vec<SourceRecord>> {
        let records: Vec<SourceRecord> = self
            .joined()?
            .into_iter()
            .filter(SourceRecord::has_identifier)
            .collect();
        info!("Loaded {} IRIS records with identifiers", records.len());
        Ok(records)
    }

    /// Records without any identifier, enriched with their description,
    /// publisher and language. When an auxiliary table lists an item more
    /// than once, its first row is used.
    pub fn records_without_ids(&self) -> Result<Vec<NoIdRecord>> {
        let identifiers: Vec<IdentifierRow> = self.read_table(IDENTIFIER_TABLE)?;
        let masters: Vec<MasterRow> = self.read_table(MASTER_TABLE)?;
        let descriptions: Vec<DescriptionRow> = self.read_table(DESCRIPTION_TABLE)?;
        let publishers: Vec<PublisherRow> = self.read_table(PUBLISHER_TABLE)?;
        let languages: Vec<LanguageRow> = self.read_table(LANGUAGE_TABLE)?;

        let masters = first_per_item(masters, |r| r.item_id);
        let descriptions = first_per_item(descriptions, |r| r.item_id);
        let publishers = first_per_item(publishers, |r| r.item_id);
        let languages = first_per_item(languages, |r| r.item_id);

        let records: Vec<NoIdRecord> = identifiers
            .into_iter()
            .filter(|row| row.doi.is_none() && row.isbn.is_none() && row.pmid.is_none())
            .filter_map(|row| {
                let master = masters.get(&row.item_id)?;
                let description = descriptions.get(&row.item_id);
                let publisher = publishers.get(&row.item_id);
                Some(NoIdRecord {
                    iris_id: row.item_id,
                    iris_type: master.owning_collection,
                    title: master.title.clone(),
                    year: master.date_issued_year.clone(),
                    authors: description.and_then(|d| d.all_people.clone()),
                    number_of_authors: description.and_then(|d| d.number_of_authors),
                    publisher: publisher.and_then(|p| p.name.clone()),
                    publisher_place: publisher.and_then(|p| p.place.clone()),
                    publisher_country: publisher.and_then(|p| p.country.clone()),
                    language: languages.get(&row.item_id).and_then(|l| l.iso.clone()),
                })
            })
            .collect();

        info!("Loaded {} IRIS records without identifiers", records.len());
        Ok(records)
    }

    /// Human-readable name of every collection code in the master table.
    pub fn collection_labels(&self) -> Result<BTreeMap<u32, String>> {
        let mut labels = BTreeMap::new();
        for row in self.read_table::<MasterRow>(MASTER_TABLE)? {
            if let (Some(code), Some(label)) = (row.owning_collection, row.owning_collection_des) {
                labels.entry(code).or_insert(label);
            }
        }
        debug!("Found {} collection labels", labels.len());
        Ok(labels)
    }

    /// Identifier table inner-joined with the collection codes of the master
    /// table.
    fn joined(&self) -> Result<Vec<SourceRecord>> {
        let masters: Vec<MasterRow> = self.read_table(MASTER_TABLE)?;
        let masters = first_per_item(masters, |r| r.item_id);
        let identifiers: Vec<IdentifierRow> = self.read_table(IDENTIFIER_TABLE)?;

        let total = identifiers.len();
        let joined: Vec<SourceRecord> = identifiers
            .into_iter()
            .filter_map(|row| {
                let collection = masters.get(&row.item_id)?.owning_collection;
                Some(row.into_record(collection))
            })
            .collect();

        if joined.len() < total {
            warn!(
                "{} identifier rows have no master record",
                total - joined.len()
            );
        }
        Ok(joined)
    }

    fn read_table<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        match self.layout {
            Layout::Directory => {
                let path =
                    find_in_directory(&self.path, name)?.ok_or_else(|| self.missing(name))?;
                debug!("Reading {}", path.display());
                read_rows(BufReader::new(File::open(&path)?), name)
            }
            Layout::Zip => {
                let mut archive = zip::ZipArchive::new(BufReader::new(File::open(&self.path)?))?;
                let member = archive
                    .file_names()
                    .find(|member| is_table(member, name))
                    .map(str::to_string)
                    .ok_or_else(|| self.missing(name))?;
                debug!("Reading {} from {}", member, self.path.display());
                let reader = archive.by_name(&member)?;
                read_rows(reader, name)
            }
        }
    }

    fn missing(&self, table: &str) -> ReconcileError {
        ReconcileError::NotFound {
            path: self.path.join(table),
            hint: MISSING_DUMP_HINT.to_string(),
        }
    }
}

fn is_table(member: &str, name: &str) -> bool {
    member == name || member.ends_with(&format!("/{name}"))
}

/// Looks for `name` in `dir`, then in its immediate subdirectories.
fn find_in_directory(dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    let direct = dir.join(name);
    if direct.is_file() {
        return Ok(Some(direct));
    }

    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();

    Ok(subdirs
        .into_iter()
        .map(|sub| sub.join(name))
        .find(|path| path.is_file()))
}

fn first_per_item<T>(rows: Vec<T>, id: impl Fn(&T) -> i64) -> HashMap<i64, T> {
    let mut by_item = HashMap::with_capacity(rows.len());
    for row in rows {
        by_item.entry(id(&row)).or_insert(row);
    }
    by_item
}
