//! Plain-text rendering of research question answers.

use std::fmt;

use crate::queries::{Answer, Question};
use crate::Result;

/// Layout of the printed report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportConfig {
    /// Line width of banners and rules
    pub width: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { width: 80 }
    }
}

impl ReportConfig {
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    /// `title` centered in a line of asterisks.
    pub fn banner(&self, title: &str) -> String {
        format!("{:*^width$}", format!(" {title} "), width = self.width)
    }

    pub fn rule(&self) -> String {
        "=".repeat(self.width)
    }

    /// Banner, question text and answer of one question. A missing
    /// prerequisite is rendered in place of the answer.
    pub fn section<'a>(&'a self, question: Question, answer: &'a Result<Answer>) -> Section<'a> {
        Section {
            config: self,
            question,
            answer,
        }
    }

    pub fn render(&self, question: Question, answer: &Result<Answer>) -> String {
        self.section(question, answer).to_string()
    }
}

/// One rendered question, see [`ReportConfig::section`].
pub struct Section<'a> {
    config: &'a ReportConfig,
    question: Question,
    answer: &'a Result<Answer>,
}

impl fmt::Display for Section<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.config.banner(&self.question.to_string()))?;
        writeln!(f, "{}", self.question.text())?;
        writeln!(f)?;
        match self.answer {
            Ok(answer) => write!(f, "{answer}"),
            Err(err) => writeln!(f, "{err}"),
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Count(count) => writeln!(f, "{count}"),
            Answer::Types(types) => {
                let label_width = types.iter().map(|t| t.label.len()).max().unwrap_or(0);
                for t in types {
                    writeln!(f, "{:<label_width$}  {}", t.label, t.count)?;
                }
                Ok(())
            }
            Answer::Outside { citing, cited } => {
                writeln!(f, "citing  cited")?;
                writeln!(f, "{citing:<6}  {cited}")
            }
        }
    }
}

pub fn render_answer(answer: &Answer) -> String {
    answer.to_string()
}
