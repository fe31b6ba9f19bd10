// SPDX-License-Identifier: AGPL-3.0

//! Build artifact parsing and contract loading
//!
//! Reads Truffle-style artifacts, the Solidity sources they were compiled
//! from, pre-parsed source ASTs and collected transaction traces, and writes
//! the final coverage report.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use solcov_coverage::{ContractData, FinalCoverage, SourceFile, Trace, TraceInfo, TraceTarget};
use solcov_exceptions::{CoverageError, CoverageResult};
use solcov_instrument::{AstNode, SourceParser};
use solcov_logs::{warn_code, ErrorCode};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SOLIDITY_EXTENSION: &str = "sol";

/// Truffle build artifact, `<artifacts>/<Base>.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildArtifact {
    #[serde(default, alias = "contractName")]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub networks: HashMap<String, NetworkArtifact>,
}

/// Compiler output recorded for one network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkArtifact {
    pub bytecode: String,
    pub runtime_bytecode: String,
    #[serde(default)]
    pub source_map: String,
    #[serde(default)]
    pub source_map_runtime: String,
    /// Source files in compiler file-index order
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Every file under `dir` with the given extension, sorted.
pub fn find_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)
            .with_context(|| format!("Failed to read directory: {}", current.display()))?
        {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

/// The file under the sources directory whose path ends with `name`.
fn resolve_source<'a>(source_files: &'a [PathBuf], name: &str) -> Option<&'a PathBuf> {
    source_files
        .iter()
        .find(|path| path.ends_with(Path::new(name)))
}

/// Parse a single artifact JSON file
pub fn parse_artifact(path: &Path) -> Result<BuildArtifact> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse build artifact: {:?}", path))
}

/// Loads every contract compiled from a source under `sources_dir`.
///
/// Sources without an artifact of their own are only ever imported by
/// other contracts and are skipped; they are still loaded as part of the
/// contracts importing them.
pub fn load_contracts(
    sources_dir: &Path,
    artifacts_dir: &Path,
    network_id: u64,
) -> Result<Vec<ContractData>> {
    if !artifacts_dir.exists() {
        return Err(anyhow::anyhow!(
            "The build output directory `{}` does not exist",
            artifacts_dir.display()
        ));
    }

    let source_files = find_files(sources_dir, SOLIDITY_EXTENSION)?;
    let network_key = network_id.to_string();
    let mut contracts = Vec::new();

    for source_file in &source_files {
        let base_name = match source_file.file_stem().and_then(|s| s.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        let artifact_path = artifacts_dir.join(format!("{}.json", base_name));
        if !artifact_path.exists() {
            debug!(source = %source_file.display(), "no artifact, imported only");
            continue;
        }

        let artifact = parse_artifact(&artifact_path)?;
        let network = match artifact.networks.get(&network_key) {
            Some(network) => network,
            None => {
                warn_code(
                    ErrorCode::MissingArtifact,
                    &format!(
                        "Skipped {}: artifact has no build for network {}",
                        base_name, network_id
                    ),
                    false,
                );
                continue;
            }
        };

        if network.bytecode.contains("__") || network.runtime_bytecode.contains("__") {
            warn_code(
                ErrorCode::LibraryPlaceholder,
                &format!("{} has unlinked library references", base_name),
                false,
            );
        }

        let sources = network
            .sources
            .iter()
            .map(|name| -> Result<SourceFile> {
                let path = resolve_source(&source_files, name).ok_or_else(|| {
                    anyhow::anyhow!(
                        "Source `{}` of {} not found under {}",
                        name,
                        base_name,
                        sources_dir.display()
                    )
                })?;
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read source: {}", path.display()))?;
                Ok(SourceFile::new(path.display().to_string(), text))
            })
            .collect::<Result<Vec<_>>>()?;

        contracts.push(ContractData {
            name: artifact.contract_name.clone().unwrap_or(base_name),
            creation_bytecode: network.bytecode.clone(),
            runtime_bytecode: network.runtime_bytecode.clone(),
            creation_source_map: network.source_map.clone(),
            runtime_source_map: network.source_map_runtime.clone(),
            sources,
        });
    }

    debug!(contracts = contracts.len(), "loaded contracts");
    Ok(contracts)
}

/// Reads pre-parsed ASTs from `<dir>/<file stem>.json`.
#[derive(Debug, Clone)]
pub struct JsonAstParser {
    dir: PathBuf,
}

impl JsonAstParser {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn ast_path(&self, file_name: &str) -> PathBuf {
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        self.dir.join(format!("{}.json", stem))
    }
}

impl SourceParser for JsonAstParser {
    fn parse(&self, file_name: &str, _source: &str) -> CoverageResult<AstNode> {
        let path = self.ast_path(file_name);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CoverageError::MalformedAst(format!("cannot read {}: {}", path.display(), e))
        })?;
        let json: JsonValue = serde_json::from_str(&content).map_err(|e| {
            CoverageError::MalformedAst(format!("cannot parse {}: {}", path.display(), e))
        })?;
        AstNode::from_json(&json)
    }
}

/// One transaction as recorded by the trace collector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedTrace {
    /// Called address; `null` for contract creation
    #[serde(default)]
    pub to: Option<String>,
    pub tx_hash: String,
    #[serde(default)]
    pub input: String,
    pub covered_pcs: Vec<usize>,
}

impl RecordedTrace {
    pub fn into_trace(self) -> Trace {
        let target = match self.to {
            Some(address) => TraceTarget::Call {
                address: address.to_ascii_lowercase(),
            },
            None => TraceTarget::Creation { input: self.input },
        };
        Trace {
            target,
            info: TraceInfo {
                covered_pcs: self.covered_pcs,
                tx_hash: self.tx_hash,
            },
        }
    }
}

/// Trace collector hand-off file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceFile {
    /// Deployed code by address
    #[serde(default)]
    pub codes: BTreeMap<String, String>,
    #[serde(default)]
    pub traces: Vec<RecordedTrace>,
}

/// Traces plus deployed code by lowercased address
pub fn load_traces(path: &Path) -> Result<(Vec<Trace>, BTreeMap<String, String>)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace file: {}", path.display()))?;
    let file: TraceFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse trace file: {}", path.display()))?;

    let codes = file
        .codes
        .into_iter()
        .map(|(address, code)| (address.to_ascii_lowercase(), code))
        .collect();
    let traces = file.traces.into_iter().map(RecordedTrace::into_trace).collect();
    Ok((traces, codes))
}

/// Write `value` as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn write_report(path: &Path, coverage: &FinalCoverage) -> Result<()> {
    write_json(path, coverage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_source_by_suffix() {
        let files = vec![
            PathBuf::from("/p/contracts/lib/Math.sol"),
            PathBuf::from("/p/contracts/Token.sol"),
        ];
        assert_eq!(
            resolve_source(&files, "lib/Math.sol"),
            Some(&PathBuf::from("/p/contracts/lib/Math.sol"))
        );
        assert_eq!(
            resolve_source(&files, "Token.sol"),
            Some(&PathBuf::from("/p/contracts/Token.sol"))
        );
        // component-wise, not string suffix
        assert_eq!(resolve_source(&files, "ken.sol"), None);
    }

    #[test]
    fn test_recorded_trace_targets() {
        let call: RecordedTrace = serde_json::from_value(serde_json::json!({
            "to": "0xABCD",
            "txHash": "0x01",
            "coveredPcs": [0, 2]
        }))
        .unwrap();
        let trace = call.into_trace();
        assert_eq!(
            trace.target,
            TraceTarget::Call {
                address: "0xabcd".to_string()
            }
        );
        assert_eq!(trace.info.covered_pcs, vec![0, 2]);

        let create: RecordedTrace = serde_json::from_value(serde_json::json!({
            "to": null,
            "txHash": "0x02",
            "input": "0x6080",
            "coveredPcs": []
        }))
        .unwrap();
        assert_eq!(
            create.into_trace().target,
            TraceTarget::Creation {
                input: "0x6080".to_string()
            }
        );
    }

    #[test]
    fn test_ast_path_uses_stem() {
        let parser = JsonAstParser::new("/p/build/asts");
        assert_eq!(
            parser.ast_path("/p/contracts/Token.sol"),
            PathBuf::from("/p/build/asts/Token.json")
        );
    }

    #[test]
    fn test_artifact_aliases() {
        let artifact: BuildArtifact = serde_json::from_value(serde_json::json!({
            "contractName": "Token",
            "networks": {
                "50": {
                    "bytecode": "0x6080",
                    "runtime_bytecode": "0x6081",
                    "source_map": "0:1:0",
                    "source_map_runtime": "0:1:0",
                    "sources": ["Token.sol"]
                }
            }
        }))
        .unwrap();
        assert_eq!(artifact.contract_name.as_deref(), Some("Token"));
        assert_eq!(artifact.networks["50"].sources, vec!["Token.sol"]);
    }
}
