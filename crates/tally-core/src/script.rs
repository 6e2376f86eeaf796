//! Command scripts: the ordered lines written to a driven process's stdin.

use serde::{Deserialize, Serialize};

/// Immutable, ordered sequence of input lines.
///
/// An empty string is a valid line (it sends a bare newline, e.g. "press
/// ENTER to continue").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandScript {
    lines: Vec<String>,
}

impl CommandScript {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a script file: one input line per line.
    ///
    /// Lines starting with `#` are comments. Trailing `\r` is stripped so
    /// scripts written on Windows behave the same.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(|line| line.strip_suffix('\r').unwrap_or(line))
                .filter(|line| !line.starts_with('#')),
        )
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
