//! # tally-scenario
//!
//! Scenarios tie the harness together: an optional store pre-step, one
//! scripted drive of the target program, a full post-run inspection, and an
//! evaluation of every assertion. The verdict is PASS only when the process
//! ended as expected, printed no crash marker, and every assertion held.
//!
//! Scenarios run strictly one at a time and are never retried.

pub mod assertion;
pub mod error;
pub mod model;
pub mod result;
pub mod runner;

pub use assertion::{Assertion, AssertionOutcome, Check, CustomCheck, MatchValue};
pub use error::ScenarioError;
pub use model::{DriverOverrides, ExitExpectation, Scenario, Setup};
pub use result::{ScenarioResult, Summary, Verdict};
pub use runner::{ScenarioRunner, collect_scenario_files};
