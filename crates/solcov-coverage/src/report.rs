// SPDX-License-Identifier: AGPL-3.0

//! Istanbul-compatible coverage report

use serde::{Deserialize, Serialize};
use solcov_instrument::{
    BranchDescription, BranchId, FunctionDescription, FunctionId, InstrumentedSource,
    StatementDescription, StatementId,
};
use std::collections::BTreeMap;

pub type HitCount = u64;

/// Coverage of one file. Field names follow the Istanbul `coverage.json`
/// layout so the report can be fed to existing reporters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverage {
    pub path: String,
    pub statement_map: BTreeMap<StatementId, StatementDescription>,
    pub branch_map: BTreeMap<BranchId, BranchDescription>,
    pub fn_map: BTreeMap<FunctionId, FunctionDescription>,
    pub s: BTreeMap<StatementId, HitCount>,
    pub b: BTreeMap<BranchId, [HitCount; 2]>,
    pub f: BTreeMap<FunctionId, HitCount>,
    pub l: BTreeMap<usize, HitCount>,
}

impl FileCoverage {
    /// Zero-hit coverage for every id of an instrumented file.
    pub fn empty(instrumented: &InstrumentedSource) -> Self {
        let mut coverage = Self {
            path: instrumented.file_name.clone(),
            statement_map: instrumented.statement_map.clone(),
            branch_map: instrumented.branch_map.clone(),
            fn_map: instrumented.fn_map.clone(),
            s: instrumented.statement_map.keys().map(|id| (*id, 0)).collect(),
            b: instrumented.branch_map.keys().map(|id| (*id, [0, 0])).collect(),
            f: instrumented.fn_map.keys().map(|id| (*id, 0)).collect(),
            l: BTreeMap::new(),
        };
        coverage.recompute_lines();
        coverage
    }

    /// Adds `other`'s hit counts to this file. Maps are adopted when this
    /// side has none yet.
    pub fn merge(&mut self, other: &FileCoverage) {
        if self.path.is_empty() {
            self.path = other.path.clone();
        }
        if self.statement_map.is_empty() {
            self.statement_map = other.statement_map.clone();
        }
        if self.branch_map.is_empty() {
            self.branch_map = other.branch_map.clone();
        }
        if self.fn_map.is_empty() {
            self.fn_map = other.fn_map.clone();
        }

        for (id, hits) in &other.s {
            *self.s.entry(*id).or_insert(0) += hits;
        }
        for (id, hits) in &other.b {
            let entry = self.b.entry(*id).or_insert([0, 0]);
            entry[0] += hits[0];
            entry[1] += hits[1];
        }
        for (id, hits) in &other.f {
            *self.f.entry(*id).or_insert(0) += hits;
        }

        self.recompute_lines();
    }

    /// Line hits: for each line a statement starts on, the highest count of
    /// the statements starting there.
    pub fn recompute_lines(&mut self) {
        let mut lines = BTreeMap::new();
        for (id, loc) in &self.statement_map {
            let hits = self.s.get(id).copied().unwrap_or(0);
            let line = lines.entry(loc.start.line).or_insert(0);
            *line = (*line).max(hits);
        }
        self.l = lines;
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            statements: Ratio::of(self.s.values().map(|hits| *hits > 0)),
            branches: Ratio::of(self.b.values().flat_map(|hits| hits.iter().map(|h| *h > 0))),
            functions: Ratio::of(self.f.values().map(|hits| *hits > 0)),
            lines: Ratio::of(self.l.values().map(|hits| *hits > 0)),
        }
    }
}

/// Coverage of every file, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinalCoverage {
    pub files: BTreeMap<String, FileCoverage>,
}

impl FinalCoverage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn get(&self, file_name: &str) -> Option<&FileCoverage> {
        self.files.get(file_name)
    }

    /// Merges one file's partial coverage.
    pub fn add_file(&mut self, coverage: &FileCoverage) {
        self.files
            .entry(coverage.path.clone())
            .or_default()
            .merge(coverage);
    }

    /// Sums `other` into `self`. Merging is commutative and associative, so
    /// any fold order over the same partial reports gives the same result.
    pub fn merge(&mut self, other: &FinalCoverage) {
        for coverage in other.files.values() {
            self.add_file(coverage);
        }
    }

    pub fn retain_files<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.files.retain(|name, _| keep(name));
    }

    pub fn summary(&self) -> BTreeMap<String, FileSummary> {
        self.files
            .iter()
            .map(|(name, coverage)| (name.clone(), coverage.summary()))
            .collect()
    }

    pub fn total_summary(&self) -> FileSummary {
        self.files
            .values()
            .map(FileCoverage::summary)
            .fold(FileSummary::default(), |acc, s| acc.combined(&s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    pub covered: usize,
    pub total: usize,
}

impl Ratio {
    fn of(hits: impl Iterator<Item = bool>) -> Self {
        hits.fold(Self::default(), |acc, hit| Self {
            covered: acc.covered + usize::from(hit),
            total: acc.total + 1,
        })
    }

    /// Percentage covered; an empty set counts as fully covered.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.covered as f64 * 100.0 / self.total as f64
        }
    }

    fn combined(&self, other: &Ratio) -> Ratio {
        Ratio {
            covered: self.covered + other.covered,
            total: self.total + other.total,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub statements: Ratio,
    pub branches: Ratio,
    pub functions: Ratio,
    pub lines: Ratio,
}

impl FileSummary {
    fn combined(&self, other: &FileSummary) -> FileSummary {
        FileSummary {
            statements: self.statements.combined(&other.statements),
            branches: self.branches.combined(&other.branches),
            functions: self.functions.combined(&other.functions),
            lines: self.lines.combined(&other.lines),
        }
    }
}
