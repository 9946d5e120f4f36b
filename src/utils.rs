use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::Result;

/// Reads every row of a headed CSV table, skipping rows that do not
/// deserialize. Dumps are exported by hand and carry the odd broken line.
pub(crate) fn read_rows<T, R>(reader: R, table: &str) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut rows = Vec::new();
    for_each_row(reader, table, |row| {
        rows.push(row);
        Ok(())
    })?;
    Ok(rows)
}

/// Streams the rows of a headed CSV table into `f`, one at a time.
///
/// Returns the number of rows handed to `f`. Malformed rows are skipped and
/// reported once per table.
pub(crate) fn for_each_row<T, R, F>(reader: R, table: &str, mut f: F) -> Result<usize>
where
    T: DeserializeOwned,
    R: Read,
    F: FnMut(T) -> Result<()>,
{
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut seen = 0;
    let mut skipped = 0;

    for result in reader.deserialize::<T>() {
        match result {
            Ok(row) => {
                seen += 1;
                f(row)?;
            }
            Err(e) if is_row_error(&e) => {
                skipped += 1;
                debug!("Skipping malformed row in {}: {}", table, e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if skipped > 0 {
        warn!("Skipped {} malformed rows in {}", skipped, table);
    }
    Ok(seen)
}

/// Row-level problems are skipped; I/O failures abort the read.
fn is_row_error(err: &csv::Error) -> bool {
    matches!(
        err.kind(),
        csv::ErrorKind::Deserialize { .. }
            | csv::ErrorKind::UnequalLengths { .. }
            | csv::ErrorKind::Utf8 { .. }
    )
}

/// Writes `rows` as a headed CSV file, replacing any previous content.
///
/// The header is written even when there are no rows.
pub(crate) fn write_rows<'a, T, I>(path: &Path, header: &[&str], rows: I) -> Result<usize>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(File::create(path)?);
    writer.write_record(header)?;

    let mut written = 0;
    for row in rows {
        writer.serialize(row)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Parses integer codes leniently: blanks, junk and fractional exports such
/// as `35.0` all come out sensibly instead of failing the row.
pub(crate) fn lenient_code<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        let value = value.trim();
        value.parse::<u32>().ok().or_else(|| {
            value
                .parse::<f64>()
                .ok()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                .map(|f| f as u32)
        })
    }))
}

/// Treats blank and whitespace-only fields as missing.
pub(crate) fn non_blank<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|value| !value.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq, Deserialize, Serialize)]
    struct Row {
        id: i64,
        #[serde(default, deserialize_with = "lenient_code")]
        code: Option<u32>,
        #[serde(default, deserialize_with = "non_blank")]
        note: Option<String>,
    }

    #[test]
    fn test_read_rows_skips_malformed() {
        let input = "id,code,note\n1,35,hello\nnot-a-number,35,x\n2,35.0,  \n3,abc,\n";
        let rows: Vec<Row> = read_rows(input.as_bytes(), "test").unwrap();

        assert_eq!(
            rows,
            vec![
                Row { id: 1, code: Some(35), note: Some("hello".to_string()) },
                Row { id: 2, code: Some(35), note: None },
                Row { id: 3, code: None, note: None },
            ]
        );
    }

    #[test]
    fn test_read_rows_ignores_extra_columns() {
        let input = "extra,id,code\nx,5,41\n";
        let rows: Vec<Row> = read_rows(input.as_bytes(), "test").unwrap();
        assert_eq!(rows, vec![Row { id: 5, code: Some(41), note: None }]);
    }

    #[test]
    fn test_write_rows_writes_header_for_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("empty.csv");

        let written = write_rows::<Row, _>(&path, &["id", "code", "note"], &[]).unwrap();

        assert_eq!(written, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "id,code,note\n");
    }
}
