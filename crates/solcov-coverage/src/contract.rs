// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use solcov_exceptions::{CoverageError, CoverageResult};
use solcov_mapper::IndexedSource;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A source file as compiled, in compiler file-index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub file_name: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            text: text.into(),
        }
    }
}

/// Everything known about one compiled contract. Loaded once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractData {
    pub name: String,
    pub creation_bytecode: String,
    pub runtime_bytecode: String,
    pub creation_source_map: String,
    pub runtime_source_map: String,
    pub sources: Vec<SourceFile>,
}

impl ContractData {
    pub fn indexed_sources(&self) -> Vec<IndexedSource> {
        self.sources
            .iter()
            .map(|source| IndexedSource::new(source.file_name.clone(), &source.text))
            .collect()
    }

    /// True when the deployed code at an address is this contract's
    /// runtime bytecode.
    pub fn matches_runtime_code(&self, code: &str) -> bool {
        let runtime = normalize_hex(&self.runtime_bytecode);
        !runtime.is_empty() && runtime == normalize_hex(code)
    }

    /// True when a creation transaction's input starts with this contract's
    /// creation bytecode. Constructor arguments follow the code.
    pub fn matches_creation_input(&self, input: &str) -> bool {
        let creation = normalize_hex(&self.creation_bytecode);
        !creation.is_empty() && normalize_hex(input).starts_with(&creation)
    }
}

/// Lowercase hex without `0x`
pub fn normalize_hex(hex: &str) -> String {
    hex.strip_prefix("0x")
        .or_else(|| hex.strip_prefix("0X"))
        .unwrap_or(hex)
        .to_ascii_lowercase()
}

/// Where a transaction went
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceTarget {
    /// A call to deployed code
    Call { address: String },
    /// A contract creation with its full input data
    Creation { input: String },
}

impl fmt::Display for TraceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceTarget::Call { address } => write!(f, "{}", address),
            TraceTarget::Creation { .. } => write!(f, "{}", solcov_constants::NEW_CONTRACT),
        }
    }
}

/// Program counters executed by one transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceInfo {
    pub covered_pcs: Vec<usize>,
    pub tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub target: TraceTarget,
    pub info: TraceInfo,
}

/// On-chain code lookup, supplied by whoever collected the traces.
pub trait CodeSource: Sync {
    fn code_at(&self, address: &str) -> Option<&str>;
}

impl CodeSource for HashMap<String, String> {
    fn code_at(&self, address: &str) -> Option<&str> {
        self.get(address)
            .or_else(|| self.get(&address.to_ascii_lowercase()))
            .map(String::as_str)
    }
}

impl CodeSource for BTreeMap<String, String> {
    fn code_at(&self, address: &str) -> Option<&str> {
        self.get(address)
            .or_else(|| self.get(&address.to_ascii_lowercase()))
            .map(String::as_str)
    }
}

/// Which bytecode of a contract a trace ran against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeKind {
    Creation,
    Runtime,
}

/// Index of the contract a trace ran against, and which of its codes.
pub fn select_contract(
    contracts: &[ContractData],
    trace: &Trace,
    codes: &dyn CodeSource,
) -> CoverageResult<(usize, CodeKind)> {
    match &trace.target {
        TraceTarget::Call { address } => {
            let code = codes
                .code_at(address)
                .ok_or_else(|| CoverageError::UnknownContractAddress(address.clone()))?;
            contracts
                .iter()
                .position(|contract| contract.matches_runtime_code(code))
                .map(|idx| (idx, CodeKind::Runtime))
                .ok_or_else(|| CoverageError::UnknownContractAddress(address.clone()))
        }
        TraceTarget::Creation { input } => contracts
            .iter()
            .position(|contract| contract.matches_creation_input(input))
            .map(|idx| (idx, CodeKind::Creation))
            .ok_or_else(|| CoverageError::UnknownCreationTransaction(trace.info.tx_hash.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(name: &str, creation: &str, runtime: &str) -> ContractData {
        ContractData {
            name: name.to_string(),
            creation_bytecode: creation.to_string(),
            runtime_bytecode: runtime.to_string(),
            creation_source_map: String::new(),
            runtime_source_map: String::new(),
            sources: vec![],
        }
    }

    fn trace(target: TraceTarget) -> Trace {
        Trace {
            target,
            info: TraceInfo {
                covered_pcs: vec![0],
                tx_hash: "0xabc".to_string(),
            },
        }
    }

    #[test]
    fn test_select_runtime_by_code() {
        let contracts = vec![
            contract("Interface", "0x", "0x"),
            contract("Token", "0x6080aa", "0x6080BB"),
        ];
        let codes: HashMap<String, String> =
            HashMap::from([("0x01".to_string(), "0x6080bb".to_string())]);

        let selected = select_contract(
            &contracts,
            &trace(TraceTarget::Call {
                address: "0x01".to_string(),
            }),
            &codes,
        )
        .unwrap();
        assert_eq!(selected, (1, CodeKind::Runtime));
    }

    #[test]
    fn test_unknown_address() {
        let contracts = vec![contract("Token", "0x6080aa", "0x6080bb")];
        let codes: HashMap<String, String> =
            HashMap::from([("0x02".to_string(), "0x00".to_string())]);

        for address in ["0x02", "0x03"] {
            let err = select_contract(
                &contracts,
                &trace(TraceTarget::Call {
                    address: address.to_string(),
                }),
                &codes,
            )
            .unwrap_err();
            assert_eq!(err, CoverageError::UnknownContractAddress(address.to_string()));
        }
    }

    #[test]
    fn test_select_creation_by_prefix() {
        let contracts = vec![
            contract("Empty", "0x", "0x"),
            contract("Token", "0x6080aa", "0x6080bb"),
        ];
        let codes: HashMap<String, String> = HashMap::new();

        // constructor arguments appended
        let selected = select_contract(
            &contracts,
            &trace(TraceTarget::Creation {
                input: "0x6080aa0000000000000000000000000000000000000000000000000000000000000001"
                    .to_string(),
            }),
            &codes,
        )
        .unwrap();
        assert_eq!(selected, (1, CodeKind::Creation));

        let err = select_contract(
            &contracts,
            &trace(TraceTarget::Creation {
                input: "0x6080ff".to_string(),
            }),
            &codes,
        )
        .unwrap_err();
        assert_eq!(err, CoverageError::UnknownCreationTransaction("0xabc".to_string()));
    }

    #[test]
    fn test_target_display() {
        let creation = TraceTarget::Creation {
            input: "0x00".to_string(),
        };
        assert_eq!(creation.to_string(), "NEW_CONTRACT");
    }
}
