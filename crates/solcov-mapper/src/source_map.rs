// SPDX-License-Identifier: AGPL-3.0

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use solcov_constants::{mnemonic, OPCODE_WIDTHS};
use solcov_exceptions::{CoverageError, CoverageResult};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::{CrossFileSourceRange, OffsetIndex};

/// Unlinked library references, `__Lib____...` or `__$hash$__`, always 40
/// hex characters wide.
static LIBRARY_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__[0-9A-Za-z_$:./-]{38}").expect("valid placeholder regex"));

const FIELDS_PER_ENTRY: usize = 4;

/// Jump annotation of a source map entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpType {
    /// `i`: jump into a function
    Into,
    /// `o`: return from a function
    Out,
    /// `-`: ordinary jump or no jump
    Regular,
}

impl JumpType {
    fn parse(field: &str) -> Option<Self> {
        match field {
            "i" => Some(JumpType::Into),
            "o" => Some(JumpType::Out),
            "-" => Some(JumpType::Regular),
            _ => None,
        }
    }
}

/// One decoded `start:length:fileIndex:jumpType` entry, inheritance applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapEntry {
    pub start: i64,
    pub length: i64,
    pub file_index: i64,
    pub jump: JumpType,
}

impl Default for SourceMapEntry {
    fn default() -> Self {
        Self {
            start: 0,
            length: 0,
            file_index: 0,
            jump: JumpType::Regular,
        }
    }
}

/// Expands the compressed source map. Omitted or empty fields repeat the
/// previous entry's value.
pub fn parse_source_map(source_map: &str) -> CoverageResult<Vec<SourceMapEntry>> {
    if source_map.is_empty() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let mut previous = SourceMapEntry::default();

    for (index, raw) in source_map.split(';').enumerate() {
        let fields: Vec<&str> = if raw.is_empty() {
            Vec::new()
        } else {
            raw.split(':').collect()
        };

        if fields.len() > FIELDS_PER_ENTRY {
            return Err(CoverageError::malformed_entry(
                index,
                raw,
                format!("expected at most {} fields, got {}", FIELDS_PER_ENTRY, fields.len()),
            ));
        }

        let mut entry = previous;
        for (position, field) in fields.iter().enumerate() {
            if field.is_empty() {
                continue;
            }
            match position {
                0 => entry.start = parse_number(index, raw, "start", field)?,
                1 => entry.length = parse_number(index, raw, "length", field)?,
                2 => entry.file_index = parse_number(index, raw, "file index", field)?,
                _ => {
                    entry.jump = JumpType::parse(field).ok_or_else(|| {
                        CoverageError::malformed_entry(
                            index,
                            raw,
                            format!("invalid jump type `{}`", field),
                        )
                    })?
                }
            }
        }

        entries.push(entry);
        previous = entry;
    }

    Ok(entries)
}

fn parse_number(index: usize, raw: &str, name: &str, field: &str) -> CoverageResult<i64> {
    field.parse::<i64>().map_err(|_| {
        CoverageError::malformed_entry(index, raw, format!("non-numeric {} `{}`", name, field))
    })
}

/// Program counter of every instruction, in order. A truncated push at the
/// end still counts as one instruction.
pub fn instruction_offsets(bytecode: &[u8]) -> Vec<usize> {
    let mut offsets = Vec::new();
    let mut pc = 0;
    while pc < bytecode.len() {
        offsets.push(pc);
        pc += OPCODE_WIDTHS[bytecode[pc] as usize] as usize;
    }
    offsets
}

/// Hex-decodes bytecode, tolerating a `0x` prefix and unlinked library
/// placeholders (zeroed; they only ever sit inside PUSH20 immediates).
pub fn decode_bytecode_hex(bytecode_hex: &str) -> CoverageResult<Vec<u8>> {
    let stripped = bytecode_hex.strip_prefix("0x").unwrap_or(bytecode_hex);
    let linked = LIBRARY_PLACEHOLDER.replace_all(stripped, "0".repeat(40).as_str());
    if stripped.contains("__") {
        debug!("zeroed library placeholders in bytecode");
    }
    hex::decode(linked.as_ref()).map_err(|e| CoverageError::InvalidBytecode(e.to_string()))
}

/// A source file a contract was compiled from, ready for offset lookups.
#[derive(Debug, Clone)]
pub struct IndexedSource {
    pub file_name: String,
    pub offsets: OffsetIndex,
}

impl IndexedSource {
    pub fn new(file_name: impl Into<String>, source_text: &str) -> Self {
        Self {
            file_name: file_name.into(),
            offsets: OffsetIndex::new(source_text),
        }
    }
}

/// An instruction whose source map entry could not be resolved to a range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedInstruction {
    pub pc: usize,
    pub entry: SourceMapEntry,
    pub error: CoverageError,
}

/// Decoder output: ranges by program counter, plus the instructions that
/// could not be attributed to a known file.
#[derive(Debug, Clone, Default)]
pub struct PcToSourceRange {
    pub ranges: BTreeMap<usize, CrossFileSourceRange>,
    pub unresolved: Vec<UnresolvedInstruction>,
}

impl PcToSourceRange {
    pub fn get(&self, pc: usize) -> Option<&CrossFileSourceRange> {
        self.ranges.get(&pc)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Walks `bytecode` instruction by instruction, pairing instruction `i`
/// with source map entry `i`. Grammar errors abort; entries pointing at an
/// unknown file or outside a file are collected in `unresolved`.
pub fn decode_source_map(
    source_map: &str,
    bytecode: &[u8],
    sources: &[IndexedSource],
) -> CoverageResult<PcToSourceRange> {
    let entries = parse_source_map(source_map)?;
    let pcs = instruction_offsets(bytecode);

    if entries.len() != pcs.len() {
        debug!(
            entries = entries.len(),
            instructions = pcs.len(),
            "source map and bytecode lengths differ; pairing the common prefix"
        );
    }

    let mut decoded = PcToSourceRange::default();
    for (pc, entry) in pcs.into_iter().zip(entries) {
        trace!(pc, op = %mnemonic(bytecode[pc]), ?entry, "instruction");
        match resolve_entry(&entry, sources) {
            Ok(range) => {
                decoded.ranges.insert(pc, range);
            }
            Err(error) => decoded
                .unresolved
                .push(UnresolvedInstruction { pc, entry, error }),
        }
    }

    Ok(decoded)
}

fn resolve_entry(
    entry: &SourceMapEntry,
    sources: &[IndexedSource],
) -> CoverageResult<CrossFileSourceRange> {
    let source = usize::try_from(entry.file_index)
        .ok()
        .and_then(|idx| sources.get(idx))
        .ok_or(CoverageError::UnknownSourceFile {
            file_index: entry.file_index,
            num_files: sources.len(),
        })?;

    let location = source
        .offsets
        .range_from_source_map(entry.start, entry.length)?;

    Ok(CrossFileSourceRange {
        file_index: entry.file_index as usize,
        file_name: source.file_name.clone(),
        location,
    })
}
