//! Framework-agnostic test intent.
//!
//! A [`LogicalTestCase`] says *what* to check on a register; turning it into a
//! concrete automation script is left to a [`crate::render::Renderer`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a logical test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    ResetValue,
    ReadWrite,
    BoundaryValue,
    InvalidWrite,
    StateTransition,
    ErrorInjection,
    TimingCheck,
}

impl TestType {
    pub const ALL: [TestType; 7] = [
        TestType::ResetValue,
        TestType::ReadWrite,
        TestType::BoundaryValue,
        TestType::InvalidWrite,
        TestType::StateTransition,
        TestType::ErrorInjection,
        TestType::TimingCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::ResetValue => "reset_value",
            TestType::ReadWrite => "read_write",
            TestType::BoundaryValue => "boundary_value",
            TestType::InvalidWrite => "invalid_write",
            TestType::StateTransition => "state_transition",
            TestType::ErrorInjection => "error_injection",
            TestType::TimingCheck => "timing_check",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISO 26262 automotive safety integrity level. Ordered from `QM` (lowest)
/// to `D` (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AsilLevel {
    QM,
    A,
    B,
    C,
    D,
}

impl AsilLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AsilLevel::QM => "QM",
            AsilLevel::A => "A",
            AsilLevel::B => "B",
            AsilLevel::C => "C",
            AsilLevel::D => "D",
        }
    }
}

impl fmt::Display for AsilLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AsilLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QM" => Ok(AsilLevel::QM),
            "A" => Ok(AsilLevel::A),
            "B" => Ok(AsilLevel::B),
            "C" => Ok(AsilLevel::C),
            "D" => Ok(AsilLevel::D),
            other => Err(format!("Unknown ASIL level: {}", other)),
        }
    }
}

/// Where a suite's source table was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub file: String,
    pub page: usize,
}

impl SourceRef {
    pub fn new(file: impl Into<String>, page: usize) -> Self {
        Self {
            file: file.into(),
            page,
        }
    }
}

/// One atomic test intent against a register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalTestCase {
    /// Human-readable name, unique within its suite
    pub name: String,
    /// Rationale for the check
    pub description: String,
    pub test_type: TestType,
    pub register_name: String,
    pub register_address: String,
    /// Opaque value token to write, if the test writes
    pub write_value: Option<String>,
    /// Opaque value token expected on read-back
    pub expected_value: Option<String>,
    /// Lowercase filter tags; always includes the lowercased register name
    pub tags: Vec<String>,
    pub iso_26262_asil: Option<AsilLevel>,
}

impl LogicalTestCase {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Ordered test cases generated for one register table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSuite {
    pub suite_name: String,
    pub source_file: String,
    pub source_page: usize,
    pub test_cases: Vec<LogicalTestCase>,
}

impl TestSuite {
    pub fn new(register_name: &str, source: &SourceRef, test_cases: Vec<LogicalTestCase>) -> Self {
        Self {
            suite_name: suite_name_for(register_name),
            source_file: source.file.clone(),
            source_page: source.page,
            test_cases,
        }
    }

    pub fn len(&self) -> usize {
        self.test_cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test_cases.is_empty()
    }

    pub fn cases_of_type(&self, test_type: TestType) -> impl Iterator<Item = &LogicalTestCase> {
        self.test_cases
            .iter()
            .filter(move |case| case.test_type == test_type)
    }

    /// Cases carrying `tag`, in suite order.
    pub fn filter_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a LogicalTestCase> {
        self.test_cases.iter().filter(move |case| case.has_tag(tag))
    }

    pub fn highest_asil(&self) -> Option<AsilLevel> {
        self.test_cases
            .iter()
            .filter_map(|case| case.iso_26262_asil)
            .max()
    }
}

pub fn suite_name_for(register_name: &str) -> String {
    format!("Tests for {}", register_name)
}
