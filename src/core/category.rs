use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The intent a query is routed by. Exactly one is assigned per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Ownership, purpose and other descriptive facts about a EUDA.
    Metadata,
    /// Formulas, macros and data connections.
    Technical,
    /// Metadata and technical detail, summarized together.
    Both,
    /// Python code replacing the EUDA, derived from its technical detail.
    Code,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Metadata,
        Category::Technical,
        Category::Both,
        Category::Code,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Metadata => "metadata",
            Category::Technical => "technical",
            Category::Both => "both",
            Category::Code => "code",
        }
    }

    /// Maps a raw classifier reply onto a category.
    ///
    /// Surrounding whitespace, quotes and full stops are ignored in any mix,
    /// case is folded and inner runs of whitespace collapse to one space.
    /// Anything that is still not one of the four labels yields `None`;
    /// there is no fallback category.
    pub fn normalize(raw: &str) -> Option<Category> {
        let trimmed =
            raw.trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '`' | '.'));
        let folded = trimmed
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == folded)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::normalize(s).ok_or_else(|| format!("'{}' is not a known category", s))
    }
}
