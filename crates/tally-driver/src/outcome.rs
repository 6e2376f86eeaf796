//! What came back from a driven process.

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    /// The process exited on its own. `code` is `None` when it was ended by
    /// a signal.
    Exited { code: Option<i32> },
    /// The timeout expired and the process was killed.
    TimedOut,
}

impl Termination {
    /// Exited on its own with status 0.
    #[must_use]
    pub const fn is_clean(self) -> bool {
        matches!(self, Self::Exited { code: Some(0) })
    }

    #[must_use]
    pub const fn is_timed_out(self) -> bool {
        matches!(self, Self::TimedOut)
    }

    #[must_use]
    pub const fn exit_code(self) -> Option<i32> {
        match self {
            Self::Exited { code } => code,
            Self::TimedOut => None,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited { code: Some(code) } => write!(f, "exited with code {code}"),
            Self::Exited { code: None } => f.write_str("terminated by signal"),
            Self::TimedOut => f.write_str("timed out (killed)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriveOutcome {
    /// Merged stdout and stderr, in arrival order.
    pub output: String,
    pub termination: Termination,
    /// Script lines written before the process stopped reading.
    pub lines_sent: usize,
    #[serde(rename = "elapsed_secs", serialize_with = "duration_secs")]
    pub elapsed: Duration,
    /// Output past the capture cap was discarded.
    pub truncated: bool,
}

impl DriveOutcome {
    /// The last `lines` lines of output.
    #[must_use]
    pub fn tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.output.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }

    /// First of `markers` found in the output.
    #[must_use]
    pub fn find_marker<'a>(&self, markers: &'a [String]) -> Option<&'a str> {
        markers
            .iter()
            .find(|m| !m.is_empty() && self.output.contains(m.as_str()))
            .map(String::as_str)
    }
}

fn duration_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
