use crate::types::{ConfigError, Post};
use regex::{Regex, RegexBuilder};
use std::fmt;

/// Post field a rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Creator,
    Category,
}

impl Field {
    /// Values of this field on `post`. Title and creator yield one value,
    /// category yields every category.
    pub fn values<'a>(&self, post: &'a Post) -> Box<dyn Iterator<Item = &'a str> + 'a> {
        match self {
            Field::Title => Box::new(std::iter::once(post.title.as_str())),
            Field::Creator => Box::new(std::iter::once(post.creator.as_str())),
            Field::Category => Box::new(post.categories.iter().map(String::as_str)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Creator => "creator",
            Field::Category => "category",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled, case-insensitive rule.
#[derive(Debug, Clone)]
pub struct Rule {
    field: Field,
    regex: Regex,
}

impl Rule {
    /// Compile `pattern` for `field`. `feed` is only used for error context.
    pub fn new(feed: &str, field: Field, pattern: &str) -> Result<Self, ConfigError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::InvalidRegex {
                feed: feed.to_string(),
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self { field, regex })
    }

    pub fn field(&self) -> Field {
        self.field
    }

    /// True if the regex matches anywhere in the selected field.
    pub fn matches(&self, post: &Post) -> bool {
        self.field.values(post).any(|value| self.regex.is_match(value))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.field, self.regex.as_str())
    }
}
