// SPDX-License-Identifier: AGPL-3.0

//! Opcode table and shared constants

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Line numbers in reports start at 1.
pub const FIRST_LINE: usize = 1;
/// Columns in reports start at 0.
pub const FIRST_COLUMN: usize = 0;

/// Characters prepended to an assignment whose target is a member access
/// and whose value is a ternary. The parser reports the node start two
/// characters too late in that shape.
pub const MEMBER_TERNARY_START_CORRECTION: usize = 2;

/// Placeholder key for traces of contract-creation transactions.
pub const NEW_CONTRACT: &str = "NEW_CONTRACT";

pub const OP_STOP: u8 = 0x00;
pub const OP_ADD: u8 = 0x01;
pub const OP_JUMP: u8 = 0x56;
pub const OP_JUMPI: u8 = 0x57;
pub const OP_JUMPDEST: u8 = 0x5B;
pub const OP_PUSH0: u8 = 0x5F;
pub const OP_PUSH1: u8 = 0x60;
pub const OP_PUSH32: u8 = 0x7F;
pub const OP_DUP1: u8 = 0x80;
pub const OP_DUP16: u8 = 0x8F;
pub const OP_SWAP1: u8 = 0x90;
pub const OP_SWAP16: u8 = 0x9F;
pub const OP_LOG0: u8 = 0xA0;
pub const OP_LOG4: u8 = 0xA4;
pub const OP_INVALID: u8 = 0xFE;

/// Number of immediate bytes following `opcode` in the instruction stream.
pub const fn immediate_size(opcode: u8) -> usize {
    if opcode >= OP_PUSH1 && opcode <= OP_PUSH32 {
        (opcode - OP_PUSH0) as usize
    } else {
        0
    }
}

/// Total width in bytes of the instruction starting with `opcode`.
pub const fn opcode_width(opcode: u8) -> usize {
    1 + immediate_size(opcode)
}

const fn build_width_table() -> [u8; 256] {
    let mut table = [1u8; 256];
    let mut op = 0usize;
    while op < 256 {
        table[op] = opcode_width(op as u8) as u8;
        op += 1;
    }
    table
}

/// Opcode byte -> instruction width
pub static OPCODE_WIDTHS: [u8; 256] = build_width_table();

const OPCODE_NAMES: &[(u8, &str)] = &[
    (OP_STOP, "STOP"),
    (OP_ADD, "ADD"),
    (0x02, "MUL"),
    (0x03, "SUB"),
    (0x04, "DIV"),
    (0x05, "SDIV"),
    (0x06, "MOD"),
    (0x07, "SMOD"),
    (0x08, "ADDMOD"),
    (0x09, "MULMOD"),
    (0x0A, "EXP"),
    (0x0B, "SIGNEXTEND"),
    (0x10, "LT"),
    (0x11, "GT"),
    (0x12, "SLT"),
    (0x13, "SGT"),
    (0x14, "EQ"),
    (0x15, "ISZERO"),
    (0x16, "AND"),
    (0x17, "OR"),
    (0x18, "XOR"),
    (0x19, "NOT"),
    (0x1A, "BYTE"),
    (0x1B, "SHL"),
    (0x1C, "SHR"),
    (0x1D, "SAR"),
    (0x20, "SHA3"),
    (0x30, "ADDRESS"),
    (0x31, "BALANCE"),
    (0x32, "ORIGIN"),
    (0x33, "CALLER"),
    (0x34, "CALLVALUE"),
    (0x35, "CALLDATALOAD"),
    (0x36, "CALLDATASIZE"),
    (0x37, "CALLDATACOPY"),
    (0x38, "CODESIZE"),
    (0x39, "CODECOPY"),
    (0x3A, "GASPRICE"),
    (0x3B, "EXTCODESIZE"),
    (0x3C, "EXTCODECOPY"),
    (0x3D, "RETURNDATASIZE"),
    (0x3E, "RETURNDATACOPY"),
    (0x3F, "EXTCODEHASH"),
    (0x40, "BLOCKHASH"),
    (0x41, "COINBASE"),
    (0x42, "TIMESTAMP"),
    (0x43, "NUMBER"),
    (0x44, "DIFFICULTY"),
    (0x45, "GASLIMIT"),
    (0x46, "CHAINID"),
    (0x47, "SELFBALANCE"),
    (0x48, "BASEFEE"),
    (0x50, "POP"),
    (0x51, "MLOAD"),
    (0x52, "MSTORE"),
    (0x53, "MSTORE8"),
    (0x54, "SLOAD"),
    (0x55, "SSTORE"),
    (OP_JUMP, "JUMP"),
    (OP_JUMPI, "JUMPI"),
    (0x58, "PC"),
    (0x59, "MSIZE"),
    (0x5A, "GAS"),
    (OP_JUMPDEST, "JUMPDEST"),
    (0x5C, "TLOAD"),
    (0x5D, "TSTORE"),
    (0x5E, "MCOPY"),
    (OP_PUSH0, "PUSH0"),
    (0xF0, "CREATE"),
    (0xF1, "CALL"),
    (0xF2, "CALLCODE"),
    (0xF3, "RETURN"),
    (0xF4, "DELEGATECALL"),
    (0xF5, "CREATE2"),
    (0xFA, "STATICCALL"),
    (0xFD, "REVERT"),
    (OP_INVALID, "INVALID"),
    (0xFF, "SELFDESTRUCT"),
];

static NAMES_BY_OPCODE: Lazy<HashMap<u8, &'static str>> =
    Lazy::new(|| OPCODE_NAMES.iter().copied().collect());

/// Human readable name of an opcode, used in debug output.
pub fn mnemonic(opcode: u8) -> String {
    match opcode {
        n @ OP_PUSH1..=OP_PUSH32 => format!("PUSH{}", n - OP_PUSH0),
        n @ OP_DUP1..=OP_DUP16 => format!("DUP{}", n - OP_DUP1 + 1),
        n @ OP_SWAP1..=OP_SWAP16 => format!("SWAP{}", n - OP_SWAP1 + 1),
        n @ OP_LOG0..=OP_LOG4 => format!("LOG{}", n - OP_LOG0),
        n => NAMES_BY_OPCODE
            .get(&n)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("0x{:02x}", n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_widths() {
        assert_eq!(opcode_width(OP_PUSH1), 2);
        assert_eq!(opcode_width(0x61), 3);
        assert_eq!(opcode_width(OP_PUSH32), 33);
    }

    #[test]
    fn test_ordinary_widths() {
        assert_eq!(opcode_width(OP_STOP), 1);
        assert_eq!(opcode_width(OP_ADD), 1);
        assert_eq!(opcode_width(OP_PUSH0), 1);
        assert_eq!(opcode_width(OP_DUP1), 1);
        assert_eq!(opcode_width(0xFF), 1);
    }

    #[test]
    fn test_width_table_matches_function() {
        for op in 0..=255u8 {
            assert_eq!(OPCODE_WIDTHS[op as usize] as usize, opcode_width(op));
        }
        let push_total: usize = (OP_PUSH1..=OP_PUSH32)
            .map(|op| OPCODE_WIDTHS[op as usize] as usize)
            .sum();
        assert_eq!(push_total, (2..=33).sum());
    }

    #[test]
    fn test_mnemonic() {
        assert_eq!(mnemonic(OP_PUSH1), "PUSH1");
        assert_eq!(mnemonic(OP_PUSH32), "PUSH32");
        assert_eq!(mnemonic(0x82), "DUP3");
        assert_eq!(mnemonic(OP_SWAP16), "SWAP16");
        assert_eq!(mnemonic(0xA2), "LOG2");
        assert_eq!(mnemonic(OP_JUMPI), "JUMPI");
        assert_eq!(mnemonic(0x0C), "0x0c");
    }

    #[test]
    fn test_line_column_base() {
        assert_eq!(FIRST_LINE, 1);
        assert_eq!(FIRST_COLUMN, 0);
    }
}
