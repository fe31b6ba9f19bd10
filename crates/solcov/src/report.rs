// SPDX-License-Identifier: AGPL-3.0

//! Run summary

use serde::{Deserialize, Serialize};
use solcov_coverage::{Diagnostics, FileSummary};
use std::time::Duration;

/// Process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exitcode {
    Pass = 0,
    /// Some traces, files or contracts were dropped and `--strict` is set
    Incomplete = 1,
    /// Nothing could be reported
    Fatal = 2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainResult {
    pub exitcode: i32,
    pub total_contracts: usize,
    pub total_traces: usize,
    pub total_files: usize,
    pub skipped_traces: usize,
    pub skipped_files: usize,
    pub failed_contracts: usize,
    pub unresolved_pcs: usize,
    pub unmapped_pcs: usize,
    pub totals: FileSummary,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl MainResult {
    pub fn empty() -> Self {
        Self {
            exitcode: Exitcode::Pass as i32,
            total_contracts: 0,
            total_traces: 0,
            total_files: 0,
            skipped_traces: 0,
            skipped_files: 0,
            failed_contracts: 0,
            unresolved_pcs: 0,
            unmapped_pcs: 0,
            totals: FileSummary::default(),
            duration: Duration::from_secs(0),
        }
    }

    pub fn record_diagnostics(&mut self, diagnostics: &Diagnostics) {
        self.skipped_traces = diagnostics.skipped_traces.len();
        self.skipped_files = diagnostics.skipped_files.len();
        self.failed_contracts = diagnostics.failed_contracts.len();
        self.unresolved_pcs = diagnostics.unresolved_pcs;
        self.unmapped_pcs = diagnostics.unmapped_pcs;
    }

    pub fn is_complete(&self) -> bool {
        self.skipped_traces == 0 && self.skipped_files == 0 && self.failed_contracts == 0
    }
}

/// Exit code for a finished run
pub fn exitcode_for(result: &MainResult, strict: bool) -> Exitcode {
    if strict && !result.is_complete() {
        Exitcode::Incomplete
    } else {
        Exitcode::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exitcode_values() {
        assert_eq!(Exitcode::Pass as i32, 0);
        assert_eq!(Exitcode::Incomplete as i32, 1);
        assert_eq!(Exitcode::Fatal as i32, 2);
    }

    #[test]
    fn test_strict_exitcode() {
        let mut result = MainResult::empty();
        assert_eq!(exitcode_for(&result, true), Exitcode::Pass);

        result.skipped_traces = 1;
        assert_eq!(exitcode_for(&result, false), Exitcode::Pass);
        assert_eq!(exitcode_for(&result, true), Exitcode::Incomplete);
    }

    #[test]
    fn test_skipped_file_is_incomplete() {
        let mut result = MainResult::empty();
        result.skipped_files = 1;
        assert!(!result.is_complete());
        assert_eq!(exitcode_for(&result, true), Exitcode::Incomplete);
    }

    #[test]
    fn test_duration_is_human_readable() {
        let mut result = MainResult::empty();
        result.duration = Duration::from_millis(1500);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["duration"], "1s 500ms");
    }
}
