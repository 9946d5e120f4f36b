//! Shard-by-shard scanning of large CSV dumps.
//!
//! Meta and Index dumps are far larger than memory, but they come split into
//! many CSV files packed in archives. A [`ShardSource`] hands those files to a
//! visitor one at a time, so callers keep only what they extract from each
//! shard.
//!
//! Supported layouts:
//!
//! - a `.zip` archive of CSV files;
//! - a `.tar`, `.tar.gz` or `.tgz` archive of CSV files;
//! - a directory of CSV files and/or nested `.zip` / `.tar` archives, visited
//!   in file name order.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{ReconcileError, Result};

/// Where a dump lives and how it is packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardSource {
    Directory(PathBuf),
    Zip(PathBuf),
    Tar { path: PathBuf, gzip: bool },
}

impl ShardSource {
    /// Detects the layout of `path` from its type and extension.
    ///
    /// Fails with [`ReconcileError::NotFound`] when `path` does not exist.
    pub fn open(path: &Path, hint: &str) -> Result<Self> {
        if !path.exists() {
            return Err(ReconcileError::NotFound {
                path: path.to_path_buf(),
                hint: hint.to_string(),
            });
        }
        if path.is_dir() {
            return Ok(Self::Directory(path.to_path_buf()));
        }
        Self::archive(path).ok_or_else(|| {
            ReconcileError::UnsupportedInput(format!(
                "{} is neither a directory nor a .zip/.tar/.tar.gz archive",
                path.display()
            ))
        })
    }

    fn archive(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip(path.to_path_buf()))
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::Tar {
                path: path.to_path_buf(),
                gzip: true,
            })
        } else if name.ends_with(".tar") {
            Some(Self::Tar {
                path: path.to_path_buf(),
                gzip: false,
            })
        } else {
            None
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(path) | Self::Zip(path) => path,
            Self::Tar { path, .. } => path,
        }
    }

    /// Calls `visit` with the name and content of every CSV shard, in a
    /// stable order. Returns the number of shards visited.
    ///
    /// An error from `visit` stops the scan and is returned as is.
    pub fn for_each_csv<F>(&self, mut visit: F) -> Result<usize>
    where
        F: FnMut(&str, &mut dyn Read) -> Result<()>,
    {
        let count = self.scan(&mut visit)?;
        info!("Scanned {} CSV shards from {}", count, self.path().display());
        Ok(count)
    }

    fn scan(&self, visit: &mut dyn FnMut(&str, &mut dyn Read) -> Result<()>) -> Result<usize> {
        match self {
            Self::Directory(dir) => scan_directory(dir, visit),
            Self::Zip(path) => scan_zip(path, visit),
            Self::Tar { path, gzip } => {
                let file = BufReader::new(File::open(path)?);
                if *gzip {
                    scan_tar(GzDecoder::new(file), visit)
                } else {
                    scan_tar(file, visit)
                }
            }
        }
    }
}

fn is_csv(name: &str) -> bool {
    name.to_lowercase().ends_with(".csv")
}

fn scan_directory(
    dir: &Path,
    visit: &mut dyn FnMut(&str, &mut dyn Read) -> Result<()>,
) -> Result<usize> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    let mut count = 0;
    for path in entries {
        let name = path.to_string_lossy().into_owned();
        if path.is_file() && is_csv(&name) {
            debug!("Reading shard {}", name);
            let mut file = BufReader::new(File::open(&path)?);
            visit(&name, &mut file)?;
            count += 1;
        } else if let Some(nested) = ShardSource::archive(&path).filter(|_| path.is_file()) {
            count += nested.scan(visit)?;
        }
    }
    Ok(count)
}

fn scan_zip(path: &Path, visit: &mut dyn FnMut(&str, &mut dyn Read) -> Result<()>) -> Result<usize> {
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(path)?))?;
    let mut count = 0;
    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        if member.is_dir() || !is_csv(member.name()) {
            continue;
        }
        let name = format!("{}/{}", path.display(), member.name());
        debug!("Reading shard {}", name);
        visit(&name, &mut member)?;
        count += 1;
    }
    Ok(count)
}

fn scan_tar<R: Read>(
    reader: R,
    visit: &mut dyn FnMut(&str, &mut dyn Read) -> Result<()>,
) -> Result<usize> {
    let mut archive = tar::Archive::new(reader);
    let mut count = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().into_owned();
        if !is_csv(&name) {
            continue;
        }
        debug!("Reading shard {}", name);
        visit(&name, &mut entry)?;
        count += 1;
    }
    Ok(count)
}

/// File stem of a shard name, used to name per-shard outputs.
pub(crate) fn shard_stem(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.rsplit_once('.')
        .map_or(base, |(stem, _)| stem)
        .to_string()
}
