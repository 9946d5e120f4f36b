//! Row layouts of the IRIS export tables.
//!
//! Each struct reads only the columns the pipeline uses; the exports carry
//! many more, which the CSV reader ignores.

use serde::{Deserialize, Serialize};

use crate::SourceRecord;
use crate::utils::{lenient_code, non_blank};

pub(crate) const MASTER_TABLE: &str = "ODS_L1_IR_ITEM_MASTER_ALL.csv";
pub(crate) const IDENTIFIER_TABLE: &str = "ODS_L1_IR_ITEM_IDENTIFIER.csv";
pub(crate) const DESCRIPTION_TABLE: &str = "ODS_L1_IR_ITEM_DESCRIPTION.csv";
pub(crate) const PUBLISHER_TABLE: &str = "ODS_L1_IR_ITEM_PUBLISHER.csv";
pub(crate) const LANGUAGE_TABLE: &str = "ODS_L1_IR_ITEM_LANGUAGE.csv";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) struct MasterRow {
    pub(crate) item_id: i64,
    #[serde(default, deserialize_with = "lenient_code")]
    pub(crate) owning_collection: Option<u32>,
    #[serde(default, deserialize_with = "non_blank")]
    pub(crate) owning_collection_des: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub(crate) date_issued_year: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub(crate) title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IdentifierRow {
    #[serde(rename = "ITEM_ID")]
    pub(crate) item_id: i64,
    #[serde(rename = "IDE_DOI", default, deserialize_with = "non_blank")]
    pub(crate) doi: Option<String>,
    #[serde(rename = "IDE_ISBN", default, deserialize_with = "non_blank")]
    pub(crate) isbn: Option<String>,
    #[serde(rename = "IDE_PMID", default, deserialize_with = "non_blank")]
    pub(crate) pmid: Option<String>,
}

impl IdentifierRow {
    pub(crate) fn into_record(self, owning_collection: Option<u32>) -> SourceRecord {
        SourceRecord {
            item_id: self.item_id,
            owning_collection,
            doi_raw: self.doi,
            isbn_raw: self.isbn,
            pmid_raw: self.pmid,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DescriptionRow {
    #[serde(rename = "ITEM_ID")]
    pub(crate) item_id: i64,
    #[serde(rename = "DES_ALLPEOPLE", default, deserialize_with = "non_blank")]
    pub(crate) all_people: Option<String>,
    #[serde(rename = "DES_NUMBEROFAUTHORS", default, deserialize_with = "lenient_code")]
    pub(crate) number_of_authors: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PublisherRow {
    #[serde(rename = "ITEM_ID")]
    pub(crate) item_id: i64,
    #[serde(rename = "PUB_NAME", default, deserialize_with = "non_blank")]
    pub(crate) name: Option<String>,
    #[serde(rename = "PUB_PLACE", default, deserialize_with = "non_blank")]
    pub(crate) place: Option<String>,
    #[serde(rename = "PUB_COUNTRY", default, deserialize_with = "non_blank")]
    pub(crate) country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LanguageRow {
    #[serde(rename = "ITEM_ID")]
    pub(crate) item_id: i64,
    #[serde(rename = "LAN_ISO", default, deserialize_with = "non_blank")]
    pub(crate) iso: Option<String>,
}

/// A repository item without any external identifier, with the descriptive
/// fields a manual or title-based lookup would need.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoIdRecord {
    pub iris_id: i64,
    pub iris_type: Option<u32>,
    pub title: Option<String>,
    pub year: Option<String>,
    pub authors: Option<String>,
    pub number_of_authors: Option<u32>,
    pub publisher: Option<String>,
    pub publisher_place: Option<String>,
    pub publisher_country: Option<String>,
    pub language: Option<String>,
}

impl NoIdRecord {
    /// Column names in field order.
    pub const HEADER: [&'static str; 10] = [
        "iris_id",
        "iris_type",
        "title",
        "year",
        "authors",
        "number_of_authors",
        "publisher",
        "publisher_place",
        "publisher_country",
        "language",
    ];
}
