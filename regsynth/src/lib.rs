pub mod analysis;
pub mod analyzer;
pub mod batch;
pub mod config;
pub mod document;
pub mod engine;
pub mod render;
pub mod selection;
pub mod test_models;

pub use analysis::{AccessType, AnalysisError, RegisterAnalysis, DEFAULT_ADDRESS, UNKNOWN_REGISTER};
pub use analyzer::{
    extract_json_object, parse_analysis_response, HeuristicAnalyzer, LlmAnalyzer,
    RegisterAnalyzer, TableInput,
};
pub use batch::{
    AnalysisRecord, BatchConfig, BatchError, BatchReport, BatchResult, BatchRunner, CancelHandle,
    DocumentIdentity, FailureRecord, FailureStage, RenderedRecord, RetryPolicy,
};
pub use config::{ConfigError, PipelineConfig};
pub use document::{
    is_register_page, BoundingBox, DatasheetDocument, DocumentError, DocumentMetadata,
    DocumentResult, ExtractedDocument, PageContent, Table, TableKind, REGISTER_KEYWORDS,
};
pub use engine::synthesize_suite;
pub use render::{OutlineRenderer, RenderError, Renderer};
pub use selection::{
    find_register_pages, select_tables, PageRange, PageScope, PageSelection, Selection,
    SelectionError, TableRef,
};
pub use test_models::{AsilLevel, LogicalTestCase, SourceRef, TestSuite, TestType};

pub mod prelude {
    pub use crate::analysis::*;
    pub use crate::analyzer::*;
    pub use crate::batch::*;
    pub use crate::document::*;
    pub use crate::engine::*;
    pub use crate::render::*;
    pub use crate::selection::*;
    pub use crate::test_models::*;
}
