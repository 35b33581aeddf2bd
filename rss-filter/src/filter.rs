use crate::rules::Rule;
use crate::types::Post;
use serde::Serialize;
use std::fmt;

/// Why a post was kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reason {
    Included,
    Excluded,
    Default,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reason::Included => "included",
            Reason::Excluded => "excluded",
            Reason::Default => "default",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub kept: bool,
    pub reason: Reason,
}

/// Exclude and include rules of one output feed.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub exclude: Vec<Rule>,
    pub include: Vec<Rule>,
}

impl FilterSpec {
    pub fn new(exclude: Vec<Rule>, include: Vec<Rule>) -> Self {
        Self { exclude, include }
    }

    /// Include rules win over exclude rules; a post matching neither is kept.
    pub fn accept(&self, post: &Post) -> Verdict {
        if self.include.iter().any(|rule| rule.matches(post)) {
            return Verdict {
                kept: true,
                reason: Reason::Included,
            };
        }

        if self.exclude.iter().any(|rule| rule.matches(post)) {
            return Verdict {
                kept: false,
                reason: Reason::Excluded,
            };
        }

        Verdict {
            kept: true,
            reason: Reason::Default,
        }
    }
}
