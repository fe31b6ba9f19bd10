// SPDX-License-Identifier: AGPL-3.0

#[cfg(test)]
mod tests {
    use solcov_exceptions::CoverageError;
    use solcov_mapper::{
        decode_bytecode_hex, decode_source_map, IndexedSource, LineColumn, SourceRange,
    };

    const TOKEN: &str = "contract Token {\n    uint total;\n}\n";
    const MATH: &str = "library Math {\n    function add() {}\n}\n";

    fn sources() -> Vec<IndexedSource> {
        vec![
            IndexedSource::new("Token.sol", TOKEN),
            IndexedSource::new("Math.sol", MATH),
        ]
    }

    #[test]
    fn test_decode_across_files() {
        // PUSH2 0x0102, PUSH0, JUMPDEST, STOP
        let bytecode = decode_bytecode_hex("0x6101025f5b00").unwrap();
        let decoded = decode_source_map("0:35:0;21:10;19:17:1:i;::-1", &bytecode, &sources()).unwrap();

        let pcs: Vec<usize> = decoded.ranges.keys().copied().collect();
        assert_eq!(pcs, vec![0, 3, 4]);

        let total = decoded.get(3).unwrap();
        assert_eq!(total.file_name, "Token.sol");
        assert_eq!(
            total.location,
            SourceRange::new(LineColumn::new(2, 4), LineColumn::new(2, 13))
        );

        let add = decoded.get(4).unwrap();
        assert_eq!(add.file_name, "Math.sol");
        assert_eq!(add.file_index, 1);
        assert_eq!(add.location.start, LineColumn::new(2, 4));

        // compiler-generated code
        assert!(decoded.get(5).is_none());
        assert_eq!(decoded.unresolved[0].pc, 5);
        assert!(matches!(
            decoded.unresolved[0].error,
            CoverageError::UnknownSourceFile { file_index: -1, num_files: 2 }
        ));
    }

    #[test]
    fn test_metadata_trailer_is_ignored() {
        // STOP followed by bytes the source map does not describe
        let bytecode = decode_bytecode_hex("00a165627a7a72").unwrap();
        let decoded = decode_source_map("0:10:0", &bytecode, &sources()).unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(decoded.unresolved.is_empty());
    }

    #[test]
    fn test_range_past_file_end_is_isolated() {
        let bytecode = decode_bytecode_hex("5b5b").unwrap();
        let decoded = decode_source_map("0:5:0;900:5:0", &bytecode, &sources()).unwrap();
        assert!(decoded.get(0).is_some());
        assert!(matches!(
            decoded.unresolved[0].error,
            CoverageError::OutOfRangeOffset { .. }
        ));
    }

    #[test]
    fn test_malformed_entry_names_index() {
        let bytecode = decode_bytecode_hex("5b5b5b").unwrap();
        let err = decode_source_map("0:1:0;x:1:0;2:1:0", &bytecode, &sources()).unwrap_err();
        match err {
            CoverageError::MalformedSourceMapEntry { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(
            decode_bytecode_hex("0x6g"),
            Err(CoverageError::InvalidBytecode(_))
        ));
    }
}
