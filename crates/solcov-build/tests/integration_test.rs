// SPDX-License-Identifier: AGPL-3.0

#[cfg(test)]
mod tests {
    use serde_json::json;
    use solcov_build::{
        find_files, load_contracts, load_traces, write_report, JsonAstParser,
    };
    use solcov_coverage::{CoverageSession, FinalCoverage, TraceTarget};
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    const TOKEN: &str = "contract Token {\n    function f() {\n        x = 1;\n    }\n}\n";
    const MATH: &str = "library Math {\n}\n";

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn token_ast() -> serde_json::Value {
        let stmt = TOKEN.find("x = 1;").unwrap();
        let func = TOKEN.find("function").unwrap();
        let func_end = TOKEN.rfind("}\n}").unwrap() + 1;
        let body = TOKEN.find("{\n        x").unwrap();
        json!({
            "type": "Program", "start": 0, "end": TOKEN.len(),
            "body": [{
                "type": "ContractStatement", "name": "Token", "start": 0, "end": TOKEN.len() - 1,
                "body": [{
                    "type": "FunctionDeclaration", "name": "f", "start": func, "end": func_end,
                    "modifiers": [],
                    "body": {
                        "type": "BlockStatement", "start": body, "end": func_end,
                        "body": [{
                            "type": "ExpressionStatement", "start": stmt, "end": stmt + 6,
                            "expression": {
                                "type": "AssignmentExpression", "start": stmt, "end": stmt + 5,
                                "left": {"type": "Identifier", "name": "x", "start": stmt, "end": stmt + 1},
                                "right": {"type": "Literal", "start": stmt + 4, "end": stmt + 5}
                            }
                        }]
                    }
                }]
            }]
        })
    }

    /// contracts/, build/contracts/, build/asts/ and coverage/traces.json
    fn project(root: &Path) {
        write(&root.join("contracts/Token.sol"), TOKEN);
        write(&root.join("contracts/lib/Math.sol"), MATH);

        let stmt = TOKEN.find("x = 1;").unwrap();
        let func = TOKEN.find("function").unwrap();
        let func_len = TOKEN.rfind("}\n}").unwrap() + 1 - func;
        let artifact = json!({
            "contract_name": "Token",
            "networks": {
                "50": {
                    "bytecode": "0x6080",
                    "runtime_bytecode": "0x600100",
                    "source_map": "0:1:0",
                    "source_map_runtime": format!("{}:5:0;{}:{}", stmt, func, func_len),
                    "sources": ["Token.sol", "lib/Math.sol"]
                }
            }
        });
        write(&root.join("build/contracts/Token.json"), &artifact.to_string());

        write(&root.join("build/asts/Token.json"), &token_ast().to_string());
        let math_ast = json!({
            "type": "Program", "start": 0, "end": MATH.len(),
            "body": [{"type": "LibraryStatement", "name": "Math", "start": 0, "end": MATH.len() - 1, "body": []}]
        });
        write(&root.join("build/asts/Math.json"), &math_ast.to_string());

        let traces = json!({
            "codes": {"0xAB": "0x600100"},
            "traces": [
                {"to": "0xab", "txHash": "0x01", "coveredPcs": [0, 2]},
                {"to": null, "txHash": "0x02", "input": "0x6080ff", "coveredPcs": [0]}
            ]
        });
        write(&root.join("coverage/traces.json"), &traces.to_string());
    }

    #[test]
    fn test_find_files_recurses() {
        let dir = tempfile::tempdir().unwrap();
        project(dir.path());
        let files = find_files(&dir.path().join("contracts"), "sol").unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("Token.sol") || files[1].ends_with("Token.sol"));
    }

    #[test]
    fn test_load_contracts_skips_imported_only() {
        let dir = tempfile::tempdir().unwrap();
        project(dir.path());

        let contracts = load_contracts(
            &dir.path().join("contracts"),
            &dir.path().join("build/contracts"),
            50,
        )
        .unwrap();

        assert_eq!(contracts.len(), 1);
        let token = &contracts[0];
        assert_eq!(token.name, "Token");
        assert_eq!(token.sources.len(), 2);
        assert!(token.sources[0].file_name.ends_with("Token.sol"));
        assert!(token.sources[1].file_name.ends_with("Math.sol"));
        assert_eq!(token.sources[1].text, MATH);
    }

    #[test]
    fn test_other_network_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        project(dir.path());

        let contracts = load_contracts(
            &dir.path().join("contracts"),
            &dir.path().join("build/contracts"),
            1,
        )
        .unwrap();
        assert!(contracts.is_empty());
    }

    #[test]
    fn test_missing_artifacts_dir() {
        let dir = tempfile::tempdir().unwrap();
        project(dir.path());
        assert!(load_contracts(&dir.path().join("contracts"), &dir.path().join("out"), 50).is_err());
    }

    #[test]
    fn test_load_traces() {
        let dir = tempfile::tempdir().unwrap();
        project(dir.path());

        let (traces, codes) = load_traces(&dir.path().join("coverage/traces.json")).unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(codes.get("0xab").map(String::as_str), Some("0x600100"));
        assert!(matches!(traces[1].target, TraceTarget::Creation { .. }));
    }

    #[test]
    fn test_end_to_end_report() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        project(root);

        let contracts = load_contracts(&root.join("contracts"), &root.join("build/contracts"), 50).unwrap();
        let (traces, codes) = load_traces(&root.join("coverage/traces.json")).unwrap();
        let session = CoverageSession::new(contracts, Arc::new(JsonAstParser::new(root.join("build/asts"))));
        let outcome = session.compute_coverage(&traces, &codes);
        assert!(outcome.diagnostics.is_clean());

        let output = root.join("coverage/out/coverage.json");
        write_report(&output, &outcome.coverage).unwrap();

        let written: FinalCoverage =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written, outcome.coverage);
        assert_eq!(written.len(), 2);

        let token = written
            .files
            .values()
            .find(|file| file.path.ends_with("Token.sol"))
            .unwrap();
        assert_eq!(token.s[&1], 1);
        assert_eq!(token.f[&1], 1);
        assert_eq!(token.l[&3], 1);
    }

    #[test]
    fn test_missing_ast_fails_contract() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        project(root);
        fs::remove_file(root.join("build/asts/Math.json")).unwrap();

        let contracts = load_contracts(&root.join("contracts"), &root.join("build/contracts"), 50).unwrap();
        let (traces, codes) = load_traces(&root.join("coverage/traces.json")).unwrap();
        let session = CoverageSession::new(contracts, Arc::new(JsonAstParser::new(root.join("build/asts"))));
        let outcome = session.compute_coverage(&traces, &codes);

        assert_eq!(outcome.diagnostics.failed_contracts.len(), 1);
        assert_eq!(outcome.diagnostics.skipped_traces.len(), 2);
    }
}
