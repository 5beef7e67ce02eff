//! Register test synthesis.
//!
//! [`synthesize_suite`] maps one [`RegisterAnalysis`] to one [`TestSuite`]. It is
//! a pure function: no I/O, no clock, no randomness, and it never fails. Three
//! independent rules contribute cases, always in this order:
//!
//! 1. reset value, when a reset value is known
//! 2. two read/write pattern checks, when the register is writable
//! 3. one boundary check per reported boundary condition
//!
//! Suites are compared position by position downstream, so the order above is
//! part of the output contract.

use crate::analysis::RegisterAnalysis;
use crate::test_models::{AsilLevel, LogicalTestCase, SourceRef, TestSuite, TestType};

/// Alternating-bit pattern written first.
pub const PRIMARY_PATTERN: &str = "0x55555555";

/// Bitwise complement of [`PRIMARY_PATTERN`]; together they drive every bit
/// to both polarities.
pub const COMPLEMENT_PATTERN: &str = "0xAAAAAAAA";

/// Safety level for nominal reset and read/write checks.
pub const NOMINAL_ASIL: AsilLevel = AsilLevel::B;

/// Safety level for boundary checks.
pub const BOUNDARY_ASIL: AsilLevel = AsilLevel::C;

/// Build the test suite for a single register.
pub fn synthesize_suite(analysis: &RegisterAnalysis, source: &SourceRef) -> TestSuite {
    let mut test_cases = Vec::new();

    if let Some(reset_value) = analysis.known_reset_value() {
        test_cases.push(reset_value_case(analysis, reset_value));
    }

    if analysis.access_type().is_writable() {
        test_cases.extend(read_write_cases(analysis));
    }

    test_cases.extend(boundary_cases(analysis));

    TestSuite::new(analysis.register_name(), source, test_cases)
}

fn tags(analysis: &RegisterAnalysis, extra: &[&str]) -> Vec<String> {
    std::iter::once(analysis.register_name().to_lowercase())
        .chain(extra.iter().map(|tag| tag.to_string()))
        .collect()
}

fn reset_value_case(analysis: &RegisterAnalysis, reset_value: &str) -> LogicalTestCase {
    let name = analysis.register_name();
    LogicalTestCase {
        name: format!("Verify Reset Value of {}", name),
        description: format!(
            "Checks that the {} register at address {} defaults to its specified reset value of {} after a power-on reset.",
            name,
            analysis.address(),
            reset_value
        ),
        test_type: TestType::ResetValue,
        register_name: name.to_string(),
        register_address: analysis.address().to_string(),
        write_value: None,
        expected_value: Some(reset_value.to_string()),
        tags: tags(analysis, &["reset", "power_on"]),
        iso_26262_asil: Some(NOMINAL_ASIL),
    }
}

fn read_write_cases(analysis: &RegisterAnalysis) -> [LogicalTestCase; 2] {
    let name = analysis.register_name();
    let pattern_case = |case_name: String, description: String, tag_set: &[&str], pattern: &str| {
        LogicalTestCase {
            name: case_name,
            description,
            test_type: TestType::ReadWrite,
            register_name: name.to_string(),
            register_address: analysis.address().to_string(),
            write_value: Some(pattern.to_string()),
            expected_value: Some(pattern.to_string()),
            tags: tags(analysis, tag_set),
            iso_26262_asil: Some(NOMINAL_ASIL),
        }
    };

    [
        pattern_case(
            format!("Write/Read Test for {}", name),
            format!(
                "Writes a pattern ({}) to {} and verifies it can be read back correctly.",
                PRIMARY_PATTERN, name
            ),
            &["read_write"],
            PRIMARY_PATTERN,
        ),
        pattern_case(
            format!("Alternate Pattern Write/Read Test for {}", name),
            format!(
                "Writes an alternate pattern ({}) to {} to ensure no bit is stuck at either level.",
                COMPLEMENT_PATTERN, name
            ),
            &["read_write", "stuck_at"],
            COMPLEMENT_PATTERN,
        ),
    ]
}

fn boundary_cases(analysis: &RegisterAnalysis) -> impl Iterator<Item = LogicalTestCase> + '_ {
    let name = analysis.register_name();
    analysis
        .boundary_conditions()
        .iter()
        .enumerate()
        .map(move |(index, condition)| LogicalTestCase {
            name: format!("Boundary Test {} for {}", index + 1, name),
            description: format!(
                "Boundary condition test for {} based on the analysis suggestion: '{}'",
                name, condition
            ),
            test_type: TestType::BoundaryValue,
            register_name: name.to_string(),
            register_address: analysis.address().to_string(),
            write_value: None,
            expected_value: None,
            tags: tags(analysis, &["boundary"]),
            iso_26262_asil: Some(BOUNDARY_ASIL),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AccessType;

    fn source() -> SourceRef {
        SourceRef::new("tle9189.pdf", 42)
    }

    #[test]
    fn test_reset_case_fields() {
        let analysis = RegisterAnalysis::new("CTRL1")
            .with_address("0x20")
            .with_access_type(AccessType::ReadOnly)
            .with_reset_value("0x00");

        let suite = synthesize_suite(&analysis, &source());
        assert_eq!(suite.len(), 1);

        let case = &suite.test_cases[0];
        assert_eq!(case.name, "Verify Reset Value of CTRL1");
        assert_eq!(case.test_type, TestType::ResetValue);
        assert_eq!(case.expected_value.as_deref(), Some("0x00"));
        assert!(case.write_value.is_none());
        assert_eq!(case.tags, vec!["ctrl1", "reset", "power_on"]);
        assert_eq!(case.iso_26262_asil, Some(AsilLevel::B));
        assert!(case.description.contains("CTRL1"));
        assert!(case.description.contains("0x20"));
        assert!(case.description.contains("0x00"));
    }

    #[test]
    fn test_read_write_cases_in_pattern_order() {
        let analysis = RegisterAnalysis::new("Cfg_Reg").with_access_type(AccessType::WriteOnly);
        let suite = synthesize_suite(&analysis, &source());

        assert_eq!(suite.len(), 2);
        let first = &suite.test_cases[0];
        let second = &suite.test_cases[1];

        assert_eq!(first.name, "Write/Read Test for Cfg_Reg");
        assert_eq!(first.write_value.as_deref(), Some(PRIMARY_PATTERN));
        assert_eq!(first.expected_value.as_deref(), Some(PRIMARY_PATTERN));
        assert_eq!(first.tags, vec!["cfg_reg", "read_write"]);

        assert_eq!(second.name, "Alternate Pattern Write/Read Test for Cfg_Reg");
        assert_eq!(second.write_value.as_deref(), Some(COMPLEMENT_PATTERN));
        assert_eq!(second.expected_value.as_deref(), Some(COMPLEMENT_PATTERN));
        assert_eq!(second.tags, vec!["cfg_reg", "read_write", "stuck_at"]);

        for case in &suite.test_cases {
            assert_eq!(case.test_type, TestType::ReadWrite);
            assert_eq!(case.iso_26262_asil, Some(NOMINAL_ASIL));
        }
    }

    #[test]
    fn test_boundary_cases_quote_conditions() {
        let analysis = RegisterAnalysis::new("STATUS")
            .with_access_type(AccessType::ReadOnly)
            .with_boundary_conditions(vec![
                "bit 7 reserved".to_string(),
                "OVF set when count exceeds 0xFF".to_string(),
            ]);

        let suite = synthesize_suite(&analysis, &source());
        assert_eq!(suite.len(), 2);
        assert_eq!(suite.test_cases[0].name, "Boundary Test 1 for STATUS");
        assert_eq!(suite.test_cases[1].name, "Boundary Test 2 for STATUS");
        assert!(suite.test_cases[0].description.contains("bit 7 reserved"));
        assert!(suite.test_cases[1]
            .description
            .contains("OVF set when count exceeds 0xFF"));
        for case in &suite.test_cases {
            assert!(case.write_value.is_none());
            assert!(case.expected_value.is_none());
            assert_eq!(case.tags, vec!["status", "boundary"]);
            assert_eq!(case.iso_26262_asil, Some(BOUNDARY_ASIL));
        }
    }

    #[test]
    fn test_rule_order_is_reset_then_read_write_then_boundary() {
        let analysis = RegisterAnalysis::new("MODE")
            .with_reset_value("0x1")
            .with_boundary_conditions(vec!["field MODE[1:0] = 0b11 is reserved".to_string()]);

        let types: Vec<TestType> = synthesize_suite(&analysis, &source())
            .test_cases
            .iter()
            .map(|case| case.test_type)
            .collect();

        assert_eq!(
            types,
            vec![
                TestType::ResetValue,
                TestType::ReadWrite,
                TestType::ReadWrite,
                TestType::BoundaryValue
            ]
        );
    }

    #[test]
    fn test_nothing_fires_yields_empty_suite() {
        let analysis = RegisterAnalysis::new("ID")
            .with_access_type(AccessType::ReadOnly)
            .with_reset_value("unknown");
        let suite = synthesize_suite(&analysis, &source());
        assert!(suite.is_empty());
        assert_eq!(suite.suite_name, "Tests for ID");
    }

    #[test]
    fn test_provenance_copied_to_every_case() {
        let analysis = RegisterAnalysis::new("CTRL1")
            .with_address("0x20")
            .with_reset_value("0x00")
            .with_boundary_conditions(vec!["x".to_string()]);
        let suite = synthesize_suite(&analysis, &source());

        assert_eq!(suite.source_file, "tle9189.pdf");
        assert_eq!(suite.source_page, 42);
        for case in &suite.test_cases {
            assert_eq!(case.register_name, "CTRL1");
            assert_eq!(case.register_address, "0x20");
        }
    }

    #[test]
    fn test_case_names_unique_within_suite() {
        let analysis = RegisterAnalysis::new("CTRL1")
            .with_reset_value("0x00")
            .with_boundary_conditions(vec!["same".to_string(), "same".to_string()]);
        let suite = synthesize_suite(&analysis, &source());
        let mut names: Vec<&str> = suite.test_cases.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), suite.len());
    }
}
