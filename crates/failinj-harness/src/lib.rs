//! Harness support for driving programs under failinj.
//!
//! The interesting state of a run lives in two places: the callsite
//! database (did it grow?) and stderr (was the injection banner printed?).
//! This crate turns both into a machine-readable cycle report for the
//! `failinj-cycle` driver and the end-to-end tests.

use std::path::Path;

use serde::{Deserialize, Serialize};

use failinj_core::database::RECORD_SIZE;

/// Exit code the fixture payloads use for "ran to completion without a
/// synthetic failure", distinguishable from both success-by-accident (0)
/// and their error paths (1).
pub const DONE_EXIT_CODE: i32 = 34;

/// One launch of the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunOutcome {
    pub run: usize,
    /// The payload's exit code, `None` when it died on a signal.
    pub exit_code: Option<i32>,
    /// Whether stderr carried the injection banner.
    pub injected: bool,
    /// Database records added by this run (0 or 1 by the engine contract).
    pub new_records: u64,
}

/// Everything observed while repeatedly launching one payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleReport {
    pub payload: String,
    pub database: String,
    /// True when a run completed without a new injection: every callsite
    /// the payload reaches has now been failed once.
    pub converged: bool,
    pub database_records: u64,
    pub runs: Vec<RunOutcome>,
}

impl CycleReport {
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

/// Whether `stderr` carries the injection banner for `tag`.
#[must_use]
pub fn mentions_injection(tag: &str, stderr: &str) -> bool {
    stderr.contains(&format!("{tag}: Injecting failure at:"))
}

/// Current size of the database in whole records; 0 when the file does
/// not exist yet.
#[must_use]
pub fn database_records(path: &Path) -> u64 {
    std::fs::metadata(path)
        .map(|meta| meta.len() / RECORD_SIZE as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_detection_is_tag_scoped() {
        let stderr = "\nFAILINJ: Injecting failure at:\n    malloc+0x10\n";
        assert!(mentions_injection("FAILINJ", stderr));
        assert!(!mentions_injection("FAILINJ2", stderr));
        assert!(!mentions_injection("FAILINJ", "It's OK!\n"));
    }

    #[test]
    fn report_json_round_trips() {
        let report = CycleReport {
            payload: "./fixture".into(),
            database: "/tmp/x.db".into(),
            converged: true,
            database_records: 3,
            runs: vec![RunOutcome {
                run: 0,
                exit_code: Some(1),
                injected: true,
                new_records: 1,
            }],
        };
        let parsed: CycleReport = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn missing_database_counts_zero_records() {
        assert_eq!(
            database_records(Path::new("/no/such/failinj/database")),
            0
        );
    }
}
