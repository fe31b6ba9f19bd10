// SPDX-License-Identifier: AGPL-3.0

//! Coverage session
//!
//! Owns the loaded contracts for its lifetime. Decoding and instrumentation
//! run in parallel per contract, partial reports run in parallel per trace,
//! and the partial reports are folded serially with [`FinalCoverage::merge`].

use rayon::prelude::*;
use sha3::{Digest, Keccak256};
use solcov_exceptions::{CoverageError, CoverageResult, Severity};
use solcov_instrument::{instrument_source, InstrumentedSource, SourceParser};
use solcov_mapper::{decode_bytecode_hex, decode_source_map, PcToSourceRange};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::{
    covered_ranges, select_contract, single_file_coverage, CodeKind, CodeSource, ContractData,
    FinalCoverage, SourceFile, Trace,
};

type CacheKey = (String, [u8; 32]);

fn source_hash(text: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(text.as_bytes());
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Instrumentation results keyed by file name and source hash. A file
/// shared by several contracts is parsed and instrumented once.
pub struct InstrumentationCache {
    parser: Arc<dyn SourceParser>,
    entries: Mutex<HashMap<CacheKey, Arc<InstrumentedSource>>>,
}

impl InstrumentationCache {
    pub fn new(parser: Arc<dyn SourceParser>) -> Self {
        Self {
            parser,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_or_instrument(&self, source: &SourceFile) -> CoverageResult<Arc<InstrumentedSource>> {
        let key = (source.file_name.clone(), source_hash(&source.text));
        if let Some(hit) = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Ok(Arc::clone(hit));
        }

        // instrumentation is pure; a concurrent miss just computes the same maps twice
        let instrumented = Arc::new(instrument_source(
            self.parser.as_ref(),
            &source.file_name,
            &source.text,
        )?);
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key)
            .or_insert_with(|| Arc::clone(&instrumented));
        Ok(instrumented)
    }
}

/// A contract whose source maps decoded and whose files instrumented.
#[derive(Debug)]
struct PreparedContract {
    creation: PcToSourceRange,
    runtime: PcToSourceRange,
    creation_unresolved: HashSet<usize>,
    runtime_unresolved: HashSet<usize>,
    instrumented: Vec<Arc<InstrumentedSource>>,
    skipped_files: Vec<SkippedFile>,
}

impl PreparedContract {
    fn code(&self, kind: CodeKind) -> (&PcToSourceRange, &HashSet<usize>) {
        match kind {
            CodeKind::Creation => (&self.creation, &self.creation_unresolved),
            CodeKind::Runtime => (&self.runtime, &self.runtime_unresolved),
        }
    }
}

/// A contract dropped because its inputs could not be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedContract {
    pub name: String,
    pub error: CoverageError,
}

/// A source file left out of its contract's report. The rest of the
/// contract is still counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub contract: String,
    pub file_name: String,
    pub error: CoverageError,
}

/// A trace whose program counters contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTrace {
    pub tx_hash: String,
    pub target: String,
    pub reason: String,
}

/// What the run could not attribute. Keeps "never executed" apart from
/// "executed but unattributable".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    pub failed_contracts: Vec<FailedContract>,
    pub skipped_files: Vec<SkippedFile>,
    pub skipped_traces: Vec<SkippedTrace>,
    /// Executed counters whose source map entry named no usable range
    pub unresolved_pcs: usize,
    /// Executed counters with no source map entry at all
    pub unmapped_pcs: usize,
    /// Executed ranges not inside any statement
    pub ranges_outside_statements: usize,
}

impl Diagnostics {
    /// True when no contract, file or trace was dropped.
    pub fn is_clean(&self) -> bool {
        self.failed_contracts.is_empty()
            && self.skipped_files.is_empty()
            && self.skipped_traces.is_empty()
    }

    fn absorb(&mut self, other: Diagnostics) {
        self.failed_contracts.extend(other.failed_contracts);
        self.skipped_files.extend(other.skipped_files);
        self.skipped_traces.extend(other.skipped_traces);
        self.unresolved_pcs += other.unresolved_pcs;
        self.unmapped_pcs += other.unmapped_pcs;
        self.ranges_outside_statements += other.ranges_outside_statements;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageOutcome {
    pub coverage: FinalCoverage,
    pub diagnostics: Diagnostics,
}

pub struct CoverageSession {
    contracts: Vec<ContractData>,
    cache: InstrumentationCache,
}

impl CoverageSession {
    pub fn new(contracts: Vec<ContractData>, parser: Arc<dyn SourceParser>) -> Self {
        Self {
            contracts,
            cache: InstrumentationCache::new(parser),
        }
    }

    pub fn contracts(&self) -> &[ContractData] {
        &self.contracts
    }

    pub fn cache(&self) -> &InstrumentationCache {
        &self.cache
    }

    fn prepare(&self, contract: &ContractData) -> CoverageResult<PreparedContract> {
        let sources = contract.indexed_sources();
        let creation = decode_source_map(
            &contract.creation_source_map,
            &decode_bytecode_hex(&contract.creation_bytecode)?,
            &sources,
        )?;
        let runtime = decode_source_map(
            &contract.runtime_source_map,
            &decode_bytecode_hex(&contract.runtime_bytecode)?,
            &sources,
        )?;
        let mut instrumented = Vec::with_capacity(contract.sources.len());
        let mut skipped_files = Vec::new();
        for source in &contract.sources {
            match self.cache.get_or_instrument(source) {
                Ok(result) => instrumented.push(result),
                Err(e) if e.severity() == Severity::Isolated => skipped_files.push(SkippedFile {
                    contract: contract.name.clone(),
                    file_name: source.file_name.clone(),
                    error: e,
                }),
                Err(e) => return Err(e),
            }
        }

        debug!(
            contract = %contract.name,
            creation_pcs = creation.len(),
            runtime_pcs = runtime.len(),
            unresolved = creation.unresolved.len() + runtime.unresolved.len(),
            "prepared contract"
        );

        Ok(PreparedContract {
            creation_unresolved: creation.unresolved.iter().map(|u| u.pc).collect(),
            runtime_unresolved: runtime.unresolved.iter().map(|u| u.pc).collect(),
            creation,
            runtime,
            instrumented,
            skipped_files,
        })
    }

    fn trace_coverage(
        &self,
        prepared: &[Result<PreparedContract, CoverageError>],
        trace: &Trace,
        codes: &dyn CodeSource,
    ) -> CoverageOutcome {
        let mut outcome = CoverageOutcome::default();

        let skip = |reason: String| SkippedTrace {
            tx_hash: trace.info.tx_hash.clone(),
            target: trace.target.to_string(),
            reason,
        };

        let (idx, kind) = match select_contract(&self.contracts, trace, codes) {
            Ok(selected) => selected,
            Err(e) => {
                debug_assert_eq!(e.severity(), Severity::Isolated);
                warn!(tx = %trace.info.tx_hash, "skipping trace: {}", e);
                outcome.diagnostics.skipped_traces.push(skip(e.to_string()));
                return outcome;
            }
        };

        let contract = match &prepared[idx] {
            Ok(contract) => contract,
            Err(e) => {
                outcome.diagnostics.skipped_traces.push(skip(format!(
                    "contract {} failed: {}",
                    self.contracts[idx].name, e
                )));
                return outcome;
            }
        };

        let (pc_map, unresolved) = contract.code(kind);
        for pc in &trace.info.covered_pcs {
            if pc_map.get(*pc).is_none() {
                if unresolved.contains(pc) {
                    outcome.diagnostics.unresolved_pcs += 1;
                } else {
                    outcome.diagnostics.unmapped_pcs += 1;
                }
            }
        }

        let ranges = covered_ranges(&trace.info.covered_pcs, pc_map);
        for instrumented in &contract.instrumented {
            let single = single_file_coverage(instrumented, ranges.iter().copied());
            outcome.diagnostics.ranges_outside_statements += single.ranges_outside_statements.len();
            outcome.coverage.add_file(&single.coverage);
        }

        outcome
    }

    /// Aggregates every trace into one report. Traces may come in any
    /// order; failures of one trace or contract never stop the others.
    pub fn compute_coverage(&self, traces: &[Trace], codes: &dyn CodeSource) -> CoverageOutcome {
        let prepared: Vec<Result<PreparedContract, CoverageError>> = self
            .contracts
            .par_iter()
            .map(|contract| self.prepare(contract))
            .collect();

        let mut outcome = CoverageOutcome::default();
        for (contract, result) in self.contracts.iter().zip(&prepared) {
            match result {
                Ok(ready) => {
                    for skipped in &ready.skipped_files {
                        warn!(contract = %contract.name, file = %skipped.file_name, "skipping file: {}", skipped.error);
                    }
                    outcome
                        .diagnostics
                        .skipped_files
                        .extend(ready.skipped_files.iter().cloned());
                }
                Err(e) => {
                    warn!(contract = %contract.name, "skipping contract: {}", e);
                    outcome.diagnostics.failed_contracts.push(FailedContract {
                        name: contract.name.clone(),
                        error: e.clone(),
                    });
                }
            }
        }

        let partials: Vec<CoverageOutcome> = traces
            .par_iter()
            .map(|trace| self.trace_coverage(&prepared, trace, codes))
            .collect();

        for partial in partials {
            outcome.coverage.merge(&partial.coverage);
            outcome.diagnostics.absorb(partial.diagnostics);
        }

        debug!(
            files = outcome.coverage.len(),
            traces = traces.len(),
            cached_sources = self.cache.len(),
            "coverage computed"
        );
        outcome
    }
}
