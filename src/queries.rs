//! Research questions over the persisted datasets.
//!
//! | # | Question                                                     | Needs                 |
//! |---|--------------------------------------------------------------|-----------------------|
//! | 1 | How many repository records are covered by Meta?             | matched table         |
//! | 2 | Which Meta types are best covered?                           | matched table         |
//! | 3 | How many citations involve a matched record?                 | matched table, edges  |
//! | 4 | How many of those come from / go to records outside the set? | matched table, edges  |
//! | 5 | How many have a matched record on both ends?                 | matched table, edges  |
//!
//! Edges are re-checked against the matched omids, so an edge folder built
//! from an older matched table cannot inflate the counts. For the edges of
//! question 3, `citing_outside + cited_outside + both_inside == involving`.

use itertools::Itertools;
use std::collections::HashSet;
use std::fmt;

use crate::datasets::DataRoot;
use crate::meta::MatchedRow;
use crate::{CitationEdge, ReconcileError, Result};

/// Label used for matched rows without a Meta type.
pub const NO_TYPE: &str = "no type";

/// One of the five research questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Question {
    Coverage,
    TypeCoverage,
    Citations,
    OutsideCitations,
    InternalCitations,
}

impl Question {
    pub const ALL: [Question; 5] = [
        Question::Coverage,
        Question::TypeCoverage,
        Question::Citations,
        Question::OutsideCitations,
        Question::InternalCitations,
    ];

    pub fn number(self) -> u8 {
        match self {
            Question::Coverage => 1,
            Question::TypeCoverage => 2,
            Question::Citations => 3,
            Question::OutsideCitations => 4,
            Question::InternalCitations => 5,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.number() == number)
    }

    pub fn text(self) -> &'static str {
        match self {
            Question::Coverage => {
                "What is the coverage of the publications available in IRIS (strictly concerning \
                 research conducted within the University of Bologna) in OpenCitations Meta?"
            }
            Question::TypeCoverage => {
                "Which are the types of publications that are better covered in OpenCitations Meta?"
            }
            Question::Citations => {
                "What is the amount of citations (according to OpenCitations Index) included in \
                 the IRIS publications that are involved in OpenCitations Meta (as citing entity \
                 and as cited entity)?"
            }
            Question::OutsideCitations => {
                "How many of these citations come from and go to publications that are not \
                 included in IRIS?"
            }
            Question::InternalCitations => {
                "How many of these citations involve publications in IRIS as both citing and \
                 cited entities?"
            }
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Research question n. {}", self.number())
    }
}

/// Number of matched records of one Meta type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCount {
    pub label: String,
    pub count: usize,
}

/// Citation edge tallies behind questions 3 to 5.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeCounts {
    /// At least one endpoint matched
    pub involving: usize,
    /// Citing endpoint not matched
    pub citing_outside: usize,
    /// Cited endpoint not matched
    pub cited_outside: usize,
    /// Both endpoints matched
    pub both_inside: usize,
}

impl EdgeCounts {
    pub fn add(&mut self, edge: &CitationEdge, omids: &HashSet<String>) {
        let citing = omids.contains(&edge.citing_id);
        let cited = omids.contains(&edge.cited_id);
        if !(citing || cited) {
            return;
        }
        self.involving += 1;
        match (citing, cited) {
            (true, true) => self.both_inside += 1,
            (false, _) => self.citing_outside += 1,
            (_, false) => self.cited_outside += 1,
        }
    }
}

/// The answer to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Count(usize),
    Types(Vec<TypeCount>),
    Outside { citing: usize, cited: usize },
}

/// Question 1.
pub fn coverage(rows: &[MatchedRow]) -> usize {
    rows.len()
}

/// Question 2: matched rows per Meta type, most frequent first, ties by
/// label.
pub fn type_counts(rows: &[MatchedRow]) -> Vec<TypeCount> {
    rows.iter()
        .map(|row| row.meta_type.as_deref().unwrap_or(NO_TYPE))
        .counts()
        .into_iter()
        .map(|(label, count)| TypeCount {
            label: label.to_string(),
            count,
        })
        .sorted_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)))
        .collect()
}

/// Tallies questions 3 to 5 over `edges`.
pub fn edge_counts<'a, I>(edges: I, omids: &HashSet<String>) -> EdgeCounts
where
    I: IntoIterator<Item = &'a CitationEdge>,
{
    let mut counts = EdgeCounts::default();
    for edge in edges {
        counts.add(edge, omids);
    }
    counts
}

/// Answers `question` from the datasets under `data`.
pub fn answer(question: Question, data: &DataRoot) -> Result<Answer> {
    match question {
        Question::Coverage => Ok(Answer::Count(coverage(&data.load_matched()?))),
        Question::TypeCoverage => Ok(Answer::Types(type_counts(&data.load_matched()?))),
        _ => {
            let counts = scan_edges(data)?;
            Ok(match question {
                Question::Citations => Answer::Count(counts.involving),
                Question::OutsideCitations => Answer::Outside {
                    citing: counts.citing_outside,
                    cited: counts.cited_outside,
                },
                _ => Answer::Count(counts.both_inside),
            })
        }
    }
}

fn scan_edges(data: &DataRoot) -> Result<EdgeCounts> {
    // both prerequisites are reported before any edge is read
    data.require_index()?;
    let omids = data.matched_omids()?;
    let mut counts = EdgeCounts::default();
    data.for_each_edge(|edge| counts.add(&edge, &omids))?;
    Ok(counts)
}

/// Whether `err` is a missing dataset rather than a real failure.
pub fn is_missing_prerequisite(err: &ReconcileError) -> bool {
    matches!(err, ReconcileError::MissingPrerequisite { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_doi;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn matched(iris_id: i64, omid: &str, meta_type: Option<&str>) -> MatchedRow {
        MatchedRow {
            id: normalize_doi(&format!("10.1000/{iris_id}")).unwrap(),
            title: None,
            meta_type: meta_type.map(str::to_string),
            pub_date: None,
            omid: omid.to_string(),
            iris_id,
            iris_type: None,
        }
    }

    fn edge(citing: &str, cited: &str) -> CitationEdge {
        CitationEdge {
            oci: None,
            citing_id: citing.to_string(),
            cited_id: cited.to_string(),
        }
    }

    #[test]
    fn test_type_counts() {
        let rows = vec![
            matched(1, "omid:br/1", Some("journal article")),
            matched(2, "omid:br/2", None),
            matched(3, "omid:br/3", Some("book")),
            matched(4, "omid:br/4", Some("journal article")),
            matched(5, "omid:br/5", Some("book chapter")),
        ];

        let counts: Vec<(String, usize)> = type_counts(&rows)
            .into_iter()
            .map(|t| (t.label, t.count))
            .collect();

        assert_eq!(
            counts,
            vec![
                ("journal article".to_string(), 2),
                ("book".to_string(), 1),
                ("book chapter".to_string(), 1),
                (NO_TYPE.to_string(), 1),
            ]
        );
        assert_eq!(coverage(&rows), 5);
    }

    #[test]
    fn test_edge_counts() {
        let omids: HashSet<String> = ["omid:br/1", "omid:br/2"]
            .into_iter()
            .map(String::from)
            .collect();
        let edges = vec![
            edge("omid:br/1", "omid:br/2"),
            edge("omid:br/1", "omid:br/9"),
            edge("omid:br/8", "omid:br/2"),
            edge("omid:br/8", "omid:br/1"),
            edge("omid:br/8", "omid:br/9"),
        ];

        assert_eq!(
            edge_counts(&edges, &omids),
            EdgeCounts {
                involving: 4,
                citing_outside: 2,
                cited_outside: 1,
                both_inside: 1,
            }
        );
    }

    #[test]
    fn test_question_numbers() {
        for question in Question::ALL {
            assert_eq!(Question::from_number(question.number()), Some(question));
        }
        assert_eq!(Question::from_number(6), None);
        assert_eq!(
            Question::OutsideCitations.to_string(),
            "Research question n. 4"
        );
    }

    #[test]
    fn test_answer_reports_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        let err = answer(Question::Citations, &DataRoot::new(dir.path())).unwrap_err();
        assert!(is_missing_prerequisite(&err));
    }

    proptest! {
        #[test]
        fn prop_outside_and_inside_partition_involving(
            pairs in prop::collection::vec((0u8..8, 0u8..8), 0..60),
            matched_ids in prop::collection::hash_set(0u8..8, 0..8),
        ) {
            let omids: HashSet<String> = matched_ids.iter().map(|n| format!("omid:br/{n}")).collect();
            let edges: Vec<CitationEdge> = pairs
                .iter()
                .map(|(a, b)| edge(&format!("omid:br/{a}"), &format!("omid:br/{b}")))
                .collect();

            let counts = edge_counts(&edges, &omids);
            prop_assert_eq!(
                counts.citing_outside + counts.cited_outside + counts.both_inside,
                counts.involving
            );
        }
    }
}
