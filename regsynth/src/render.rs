//! Text rendering of test suites.
//!
//! Renderers sit downstream of synthesis and never change suite content. Only a
//! framework-neutral outline ships here; automation syntaxes plug in through
//! [`Renderer`].

use crate::test_models::{LogicalTestCase, TestSuite};
use std::fmt::{self, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Formatting error: {0}")]
    Format(#[from] fmt::Error),

    #[error("Renderer {renderer} cannot render suite {suite}: {reason}")]
    Unsupported {
        renderer: String,
        suite: String,
        reason: String,
    },
}

pub trait Renderer: Send + Sync {
    fn render(&self, suite: &TestSuite) -> Result<String, RenderError>;

    fn name(&self) -> &'static str;
}

/// Indented plain-text outline, one block per case.
#[derive(Debug, Clone)]
pub struct OutlineRenderer {
    include_descriptions: bool,
}

impl Default for OutlineRenderer {
    fn default() -> Self {
        Self {
            include_descriptions: true,
        }
    }
}

impl OutlineRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_descriptions(mut self, include_descriptions: bool) -> Self {
        self.include_descriptions = include_descriptions;
        self
    }

    fn render_case(&self, out: &mut String, index: usize, case: &LogicalTestCase) -> fmt::Result {
        let asil = case
            .iso_26262_asil
            .map(|level| level.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "  {}. {} [{}, ASIL {}]",
            index + 1,
            case.name,
            case.test_type,
            asil
        )?;

        if self.include_descriptions {
            writeln!(out, "     {}", case.description)?;
        }
        if let Some(write_value) = &case.write_value {
            writeln!(out, "     write:    {} <- {}", case.register_address, write_value)?;
        }
        if let Some(expected_value) = &case.expected_value {
            writeln!(out, "     expect:   {} == {}", case.register_address, expected_value)?;
        }
        writeln!(out, "     tags:     {}", case.tags.join(", "))
    }
}

impl Renderer for OutlineRenderer {
    fn render(&self, suite: &TestSuite) -> Result<String, RenderError> {
        let mut out = String::new();
        writeln!(
            out,
            "{} ({}, page {})",
            suite.suite_name, suite.source_file, suite.source_page
        )?;

        if suite.is_empty() {
            writeln!(out, "  (no test cases)")?;
        }
        for (index, case) in suite.test_cases.iter().enumerate() {
            self.render_case(&mut out, index, case)?;
        }

        Ok(out)
    }

    fn name(&self) -> &'static str {
        "outline"
    }
}
