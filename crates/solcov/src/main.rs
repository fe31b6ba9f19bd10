// SPDX-License-Identifier: AGPL-3.0

//! solcov: coverage reports for Solidity contracts from collected traces

use anyhow::Result;
use colored::Colorize;
use solcov_build::{load_contracts, load_traces, write_json, write_report, JsonAstParser};
use solcov_config::Config;
use solcov_coverage::{CoverageSession, Diagnostics, FinalCoverage, Ratio};
use solcov_exceptions::CoverageError;
use solcov_logs::{warn_code, ErrorCode};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

mod report;

use report::{exitcode_for, Exitcode, MainResult};

fn main() {
    let exitcode = match _main() {
        Ok(result) => result.exitcode,
        Err(e) => {
            solcov_logs::error(&format!("Error: {:#}", e), true);
            Exitcode::Fatal as i32
        }
    };
    std::process::exit(exitcode)
}

fn _main() -> Result<MainResult> {
    let start_time = Instant::now();
    let config = Config::load()?;
    solcov_logs::init_tracing(config.verbose);
    debug!(?config, "configuration");

    let file_regex = config.file_regex()?;
    let contracts = load_contracts(&config.sources_dir(), &config.artifacts_dir(), config.network_id)?;
    let (traces, codes) = load_traces(&config.traces_path())?;
    info!(contracts = contracts.len(), traces = traces.len(), "loaded inputs");

    let mut result = MainResult::empty();
    result.total_contracts = contracts.len();
    result.total_traces = traces.len();

    let parser = Arc::new(JsonAstParser::new(config.asts_dir()));
    let session = CoverageSession::new(contracts, parser);
    let mut outcome = session.compute_coverage(&traces, &codes);
    outcome
        .coverage
        .retain_files(|file_name| file_regex.is_match(file_name));

    report_diagnostics(&outcome.diagnostics);

    let output = config.output_path();
    write_report(&output, &outcome.coverage)?;
    println!("Coverage report written to {}", output.display());

    print_summary(&outcome.coverage, &config.root);

    result.record_diagnostics(&outcome.diagnostics);
    result.total_files = outcome.coverage.len();
    result.totals = outcome.coverage.total_summary();
    result.exitcode = exitcode_for(&result, config.strict) as i32;
    result.duration = start_time.elapsed();

    if let Some(path) = &config.json_summary {
        write_json(path, &result)?;
    }

    Ok(result)
}

fn error_code_for(error: &CoverageError) -> ErrorCode {
    match error {
        CoverageError::UnsupportedAssignmentTarget { .. } => ErrorCode::UnsupportedAssignment,
        CoverageError::MalformedSourceMapEntry { .. }
        | CoverageError::MalformedAst(_)
        | CoverageError::InvalidBytecode(_) => ErrorCode::ParsingError,
        CoverageError::UnknownSourceFile { .. } => ErrorCode::UnknownSourceFile,
        CoverageError::UnknownContractAddress(_) | CoverageError::UnknownCreationTransaction(_) => {
            ErrorCode::UnattributedTrace
        }
        CoverageError::OutOfRangeOffset { .. } => ErrorCode::InternalError,
    }
}

/// Everything that was executed but could not be counted.
fn report_diagnostics(diagnostics: &Diagnostics) {
    for failed in &diagnostics.failed_contracts {
        warn_code(
            error_code_for(&failed.error),
            &format!("Skipped contract {}: {}", failed.name, failed.error),
            true,
        );
    }
    for skipped in &diagnostics.skipped_files {
        warn_code(
            error_code_for(&skipped.error),
            &format!(
                "Skipped file {} of contract {}: {}",
                skipped.file_name, skipped.contract, skipped.error
            ),
            true,
        );
    }
    for skipped in &diagnostics.skipped_traces {
        warn_code(
            ErrorCode::UnattributedTrace,
            &format!(
                "Skipped trace {} to {}: {}",
                skipped.tx_hash, skipped.target, skipped.reason
            ),
            true,
        );
    }
    if diagnostics.unresolved_pcs + diagnostics.unmapped_pcs > 0 {
        solcov_logs::debug(
            &format!(
                "{} executed instructions had no source range ({} unresolved, {} unmapped)",
                diagnostics.unresolved_pcs + diagnostics.unmapped_pcs,
                diagnostics.unresolved_pcs,
                diagnostics.unmapped_pcs
            ),
            false,
        );
    }
    if diagnostics.ranges_outside_statements > 0 {
        debug!(
            ranges = diagnostics.ranges_outside_statements,
            "executed ranges outside any statement"
        );
    }
}

fn colored_percent(ratio: &Ratio) -> String {
    let text = format!("{:>7.2}%", ratio.percent());
    if ratio.percent() >= 80.0 {
        text.green().to_string()
    } else if ratio.percent() >= 50.0 {
        text.yellow().to_string()
    } else {
        text.red().to_string()
    }
}

/// Per-file coverage table
fn print_summary(coverage: &FinalCoverage, root: &Path) {
    println!(
        "\n{:<48} {:>8} {:>8} {:>8} {:>8}",
        "File".bold(),
        "Stmts".bold(),
        "Branch".bold(),
        "Funcs".bold(),
        "Lines".bold()
    );
    for (file_name, summary) in coverage.summary() {
        let display = Path::new(&file_name)
            .strip_prefix(root)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| file_name.clone());
        println!(
            "{:<48} {} {} {} {}",
            display,
            colored_percent(&summary.statements),
            colored_percent(&summary.branches),
            colored_percent(&summary.functions),
            colored_percent(&summary.lines)
        );
    }

    let totals = coverage.total_summary();
    println!(
        "{:<48} {} {} {} {}",
        "All files".yellow().bold(),
        colored_percent(&totals.statements),
        colored_percent(&totals.branches),
        colored_percent(&totals.functions),
        colored_percent(&totals.lines)
    );
}
