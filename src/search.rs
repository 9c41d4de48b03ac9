//! Motif search over the stored alignment.

use regex::Regex;
use serde::Serialize;

use crate::error::Result;
use crate::model::Alignment;

/// How a search pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Plain substring
    #[default]
    Literal,
    /// Regular expression (`regex` crate syntax)
    Regex,
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "literal" => Ok(SearchMode::Literal),
            "regex" => Ok(SearchMode::Regex),
            other => Err(format!("unknown search mode '{}'", other)),
        }
    }
}

/// Tips whose stored sequence matches `pattern`, in alignment order.
///
/// Sequences are matched as loaded, gaps included, and case-sensitively.
pub fn search_motif<'a>(alignment: &'a Alignment, pattern: &str, mode: SearchMode) -> Result<Vec<&'a str>> {
    let matches: Vec<&str> = match mode {
        SearchMode::Literal => alignment
            .iter()
            .filter(|seq| seq.as_str().contains(pattern))
            .map(|seq| seq.id.as_str())
            .collect(),
        SearchMode::Regex => {
            let re = Regex::new(pattern)?;
            alignment
                .iter()
                .filter(|seq| re.is_match(seq.as_str()))
                .map(|seq| seq.id.as_str())
                .collect()
        }
    };
    Ok(matches)
}

/// Result of a motif query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotifMatches<'a> {
    pub pattern: &'a str,
    pub mode: SearchMode,
    pub matched_tips: Vec<&'a str>,
}
