//! Table analyzers
//!
//! An analyzer turns the raw content of one datasheet table into a
//! [`RegisterAnalysis`]. Two implementations ship with the crate:
//!
//! - [`HeuristicAnalyzer`]: header matching, no external calls
//! - [`LlmAnalyzer`]: asks a language model through [`model::ModelProvider`]

pub mod heuristic;
pub mod llm;

use crate::analysis::{AnalysisError, RegisterAnalysis};
use crate::document::{Table, TableKind};
use async_trait::async_trait;

pub use heuristic::HeuristicAnalyzer;
pub use llm::{extract_json_object, parse_analysis_response, LlmAnalyzer};

/// Table content handed to an analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct TableInput {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub kind: TableKind,
}

impl TableInput {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let kind = TableKind::classify(&headers);
        Self {
            headers,
            rows,
            kind,
        }
    }

    pub fn context(&self) -> &'static str {
        self.kind.context()
    }
}

impl From<&Table> for TableInput {
    fn from(table: &Table) -> Self {
        Self::new(table.headers.clone(), table.rows.clone())
    }
}

#[async_trait]
pub trait RegisterAnalyzer: Send + Sync {
    async fn analyze(&self, input: &TableInput) -> Result<RegisterAnalysis, AnalysisError>;

    fn name(&self) -> &'static str;
}
