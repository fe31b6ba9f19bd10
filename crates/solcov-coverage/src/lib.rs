// SPDX-License-Identifier: AGPL-3.0

//! Coverage aggregation
//!
//! Turns executed program counters into Istanbul-style hit counts against
//! the instrumentation maps, and merges them across transactions and
//! contracts.

mod aggregate;
mod contract;
mod report;
mod session;

pub use aggregate::{covered_ranges, single_file_coverage, SingleFileCoverage};
pub use contract::{
    normalize_hex, select_contract, CodeKind, CodeSource, ContractData, SourceFile, Trace,
    TraceInfo, TraceTarget,
};
pub use report::{FileCoverage, FileSummary, FinalCoverage, HitCount, Ratio};
pub use session::{
    CoverageOutcome, CoverageSession, Diagnostics, FailedContract, InstrumentationCache,
    SkippedFile, SkippedTrace,
};
