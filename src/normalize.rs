//! Identifier normalization.
//!
//! Repository identifier fields are free text: URLs, several values glued
//! together with separators, labels like `ISBN-13:` and trailing notes. Each
//! function here pulls the first identifier of its scheme out of such a string
//! and returns it as a [`CanonicalId`], or `None` when nothing usable is
//! found. A `None` is the normal outcome for noisy fields, never an error.
//!
//! All normalizers are idempotent: feeding a canonical identifier back in
//! yields the same identifier.

use std::sync::LazyLock;

use crate::regex::Regex;
use crate::{CanonicalId, Scheme};

/// `10.` + registrant of four or more digits + `/` + a non-empty suffix up
/// to the first whitespace, comma or semicolon.
static DOI_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"10\.[0-9]{4,}/[^,\s;]+").unwrap());

/// ISBN-13 is tried before ISBN-10. The optional `ISBN-13:` style label is
/// part of the match so its digits are never read as the identifier. The
/// digits must not touch other digits on either side.
static ISBN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|[^0-9])(?:[Ii][Ss][Bb][Nn][- ]*(?:1[03])?[ ]*(?:: ?)?)?(?P<isbn>(?:[0-9][- ]*){12}[0-9Xx]|(?:[0-9][- ]*){9}[0-9Xx])(?:[^0-9]|$)",
    )
    .unwrap()
});

/// A whole digit run of at most nine digits once its leading zeros are gone.
static PMID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])0*(?P<pmid>[1-9][0-9]{0,8})(?:[^0-9]|$)").unwrap()
});

/// Normalizes `raw` according to `scheme`.
pub fn normalize(scheme: Scheme, raw: &str) -> Option<CanonicalId> {
    match scheme {
        Scheme::Doi => normalize_doi(raw),
        Scheme::Isbn => normalize_isbn(raw),
        Scheme::Pmid => normalize_pmid(raw),
    }
}

/// Extracts the first DOI and lowercases it.
///
/// ```
/// use irismatch::normalize::normalize_doi;
///
/// let doi = normalize_doi("https://doi.org/10.1234/ABC.2020;extra").unwrap();
/// assert_eq!(doi.as_str(), "doi:10.1234/abc.2020");
/// ```
pub fn normalize_doi(raw: &str) -> Option<CanonicalId> {
    DOI_REGEX
        .find(raw)
        .map(|m| CanonicalId::new(Scheme::Doi, &m.as_str().to_lowercase()))
}

/// Extracts the first ISBN-13 or ISBN-10 and strips its separators.
pub fn normalize_isbn(raw: &str) -> Option<CanonicalId> {
    let caps = ISBN_REGEX.captures(raw)?;
    let isbn: String = caps["isbn"]
        .chars()
        .filter(|c| *c != '-' && *c != ' ')
        .collect::<String>()
        .to_lowercase();
    Some(CanonicalId::new(Scheme::Isbn, &isbn))
}

/// Extracts a PubMed id without its leading zeros.
///
/// Values mentioning `PMC` are PubMed Central ids, which look alike but
/// name different records, so they are rejected outright.
pub fn normalize_pmid(raw: &str) -> Option<CanonicalId> {
    if raw.contains("PMC") {
        return None;
    }
    let caps = PMID_REGEX.captures(raw)?;
    Some(CanonicalId::new(Scheme::Pmid, &caps["pmid"].to_lowercase()))
}

/// Normalizes an identifier already carrying a scheme prefix, as found in
/// the external corpus (`doi:10.1234/x`, `pmid:123`, ...).
pub fn normalize_prefixed(value: &str) -> Option<CanonicalId> {
    let scheme = Scheme::ALL.into_iter().find(|scheme| {
        value
            .get(..scheme.prefix().len())
            .is_some_and(|p| p.eq_ignore_ascii_case(scheme.prefix()))
    })?;
    normalize(scheme, &value[scheme.prefix().len()..])
}
