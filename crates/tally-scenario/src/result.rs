//! Verdicts and per-scenario results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_driver::DriveOutcome;
use tally_store::{Inspection, IntegrityReport};

use crate::assertion::AssertionOutcome;
use crate::model::ExitExpectation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail { reason: String },
}

impl Verdict {
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Fail { reason } => Some(reason),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => f.write_str("PASS"),
            Self::Fail { .. } => f.write_str("FAIL"),
        }
    }
}

/// Everything observed while running one scenario. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub description: String,
    pub expect_exit: ExitExpectation,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `None` when the process never ran (setup or launch failure).
    pub drive: Option<DriveOutcome>,
    /// Crash marker found in the output, if any.
    pub crash_marker: Option<String>,
    /// `None` when inspection was skipped.
    pub inspection: Option<Inspection>,
    pub integrity: Option<IntegrityReport>,
    pub assertions: Vec<AssertionOutcome>,
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl ScenarioResult {
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.verdict.is_pass()
    }

    #[must_use]
    pub fn failed_assertions(&self) -> usize {
        self.assertions.iter().filter(|a| !a.passed).count()
    }
}

/// Totals over a batch of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl Summary {
    #[must_use]
    pub fn of(results: &[ScenarioResult]) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
        }
    }

    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failed == 0
    }
}
