// SPDX-License-Identifier: AGPL-3.0

use indexmap::IndexSet;
use solcov_instrument::InstrumentedSource;
use solcov_mapper::{CrossFileSourceRange, PcToSourceRange, SourceRange};
use tracing::debug;

use crate::FileCoverage;

/// Hits of one trace against one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleFileCoverage {
    pub coverage: FileCoverage,
    /// Executed ranges of this file that lie inside no statement
    pub ranges_outside_statements: Vec<SourceRange>,
}

/// Distinct ranges executed by `covered_pcs`, in first-seen order. Counters
/// without a resolved range are dropped.
pub fn covered_ranges<'a>(
    covered_pcs: &[usize],
    pc_map: &'a PcToSourceRange,
) -> IndexSet<&'a CrossFileSourceRange> {
    covered_pcs.iter().filter_map(|pc| pc_map.get(*pc)).collect()
}

/// Marks every statement, branch arm and function of `instrumented` that
/// contains one of the executed ranges. Each id is hit at most once per
/// trace.
pub fn single_file_coverage<'a, I>(instrumented: &InstrumentedSource, ranges: I) -> SingleFileCoverage
where
    I: IntoIterator<Item = &'a CrossFileSourceRange>,
{
    let ranges: Vec<&SourceRange> = ranges
        .into_iter()
        .filter(|range| range.file_name == instrumented.file_name)
        .map(|range| &range.location)
        .collect();

    let is_hit = |parent: &SourceRange| -> u64 {
        u64::from(ranges.iter().any(|range| parent.contains(range)))
    };

    let mut coverage = FileCoverage::empty(instrumented);
    for (id, description) in &instrumented.branch_map {
        let [consequent, alternate] = &description.locations;
        let alternate_hit = if description.implicit_alternate {
            u64::from(
                ranges
                    .iter()
                    .any(|range| alternate.contains(range) && !consequent.contains(range)),
            )
        } else {
            is_hit(alternate)
        };
        coverage.b.insert(*id, [is_hit(consequent), alternate_hit]);
    }
    for (id, description) in &instrumented.statement_map {
        coverage.s.insert(*id, is_hit(description));
    }
    for (id, description) in &instrumented.fn_map {
        coverage.f.insert(*id, is_hit(&description.loc));
    }
    coverage.recompute_lines();

    let ranges_outside_statements: Vec<SourceRange> = ranges
        .iter()
        .filter(|range| {
            !instrumented
                .statement_map
                .values()
                .any(|statement| statement.contains(range))
        })
        .map(|range| **range)
        .collect();
    for range in &ranges_outside_statements {
        debug!(file = %instrumented.file_name, ?range, "executed range outside any statement");
    }

    SingleFileCoverage {
        coverage,
        ranges_outside_statements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solcov_instrument::{BranchDescription, BranchType, FunctionDescription};
    use solcov_mapper::LineColumn;
    use std::collections::BTreeMap;

    fn range(sl: usize, sc: usize, el: usize, ec: usize) -> SourceRange {
        SourceRange::new(LineColumn::new(sl, sc), LineColumn::new(el, ec))
    }

    fn cross(file: &str, location: SourceRange) -> CrossFileSourceRange {
        CrossFileSourceRange {
            file_index: 0,
            file_name: file.to_string(),
            location,
        }
    }

    fn instrumented() -> InstrumentedSource {
        InstrumentedSource {
            file_name: "A.sol".to_string(),
            statement_map: [(1, range(3, 4, 3, 10)), (2, range(5, 4, 5, 10))]
                .into_iter()
                .collect(),
            branch_map: [(
                1,
                BranchDescription {
                    line: 2,
                    branch_type: BranchType::If,
                    locations: [range(2, 10, 4, 4), range(4, 11, 6, 4)],
                    implicit_alternate: false,
                },
            )]
            .into_iter()
            .collect(),
            fn_map: [(
                1,
                FunctionDescription {
                    name: "f".to_string(),
                    line: 1,
                    loc: range(1, 0, 7, 0),
                    skip: None,
                },
            )]
            .into_iter()
            .collect(),
            untracked: vec![],
        }
    }

    #[test]
    fn test_exact_range_is_covered() {
        let hit = cross("A.sol", range(3, 4, 3, 10));
        let result = single_file_coverage(&instrumented(), [&hit]);
        assert_eq!(result.coverage.s[&1], 1);
        assert_eq!(result.coverage.s[&2], 0);
        assert_eq!(result.coverage.b[&1], [1, 0]);
        assert_eq!(result.coverage.f[&1], 1);
        assert!(result.ranges_outside_statements.is_empty());
    }

    #[test]
    fn test_other_files_are_ignored() {
        let hit = cross("B.sol", range(3, 4, 3, 10));
        let result = single_file_coverage(&instrumented(), [&hit]);
        assert_eq!(result.coverage.s.values().sum::<u64>(), 0);
        assert_eq!(result.coverage.f[&1], 0);
    }

    #[test]
    fn test_enclosing_range_reported_outside() {
        // the whole function body is not inside any single statement
        let hit = cross("A.sol", range(1, 0, 7, 0));
        let result = single_file_coverage(&instrumented(), [&hit]);
        assert_eq!(result.coverage.s[&1], 0);
        assert_eq!(result.coverage.f[&1], 1);
        assert_eq!(result.ranges_outside_statements, vec![range(1, 0, 7, 0)]);
    }

    #[test]
    fn test_implicit_alternate_ignores_consequent() {
        let mut source = instrumented();
        let branch = source.branch_map.get_mut(&1).unwrap();
        branch.locations = [range(2, 10, 4, 4), range(2, 4, 4, 4)];
        branch.implicit_alternate = true;

        let inner = cross("A.sol", range(3, 4, 3, 10));
        let result = single_file_coverage(&source, [&inner]);
        assert_eq!(result.coverage.b[&1], [1, 0]);

        // the condition lies in the `if` but outside the consequent
        let condition = cross("A.sol", range(2, 8, 2, 8));
        let result = single_file_coverage(&source, [&inner, &condition]);
        assert_eq!(result.coverage.b[&1], [1, 1]);
    }

    #[test]
    fn test_covered_ranges_dedup_and_drop_unknown() {
        let mut pc_map = PcToSourceRange::default();
        pc_map.ranges.insert(0, cross("A.sol", range(3, 4, 3, 10)));
        pc_map.ranges.insert(2, cross("A.sol", range(3, 4, 3, 10)));
        pc_map.ranges.insert(4, cross("A.sol", range(5, 4, 5, 10)));

        let ranges = covered_ranges(&[0, 2, 2, 4, 99], &pc_map);
        assert_eq!(ranges.len(), 2);

        let result = single_file_coverage(&instrumented(), ranges);
        assert_eq!(result.coverage.s, BTreeMap::from([(1, 1), (2, 1)]));
        assert_eq!(result.coverage.l[&3], 1);
    }
}
