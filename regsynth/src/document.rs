//! Extracted datasheet content.
//!
//! PDF parsing and table detection happen in an external extractor; this module
//! only consumes its JSON export and exposes it through [`DatasheetDocument`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Case-insensitive substrings that mark a page as describing registers.
pub const REGISTER_KEYWORDS: [&str; 11] = [
    "register",
    "bit field",
    "address",
    "offset",
    "read/write",
    "reset value",
    "0x",
    "bit[",
    "configuration",
    "status register",
    "control register",
];

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid document export: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Whether page text looks like part of a register map.
pub fn is_register_page(text: &str) -> bool {
    let text = text.to_lowercase();
    REGISTER_KEYWORDS.iter().any(|keyword| text.contains(keyword))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub filename: String,
    #[serde(default)]
    pub page_count: usize,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub subject: String,
}

/// Table bounding box in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from([x0, y0, x1, y1]: [f64; 4]) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// A detected table. Cells are text; non-string cells in the export are
/// stringified and nulls become empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub table_id: usize,
    #[serde(default, deserialize_with = "deserialize_cells")]
    pub headers: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_rows")]
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            table_id: 0,
            headers,
            rows,
            bbox: None,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    pub fn kind(&self) -> TableKind {
        TableKind::classify(&self.headers)
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn deserialize_cells<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let cells = Vec::<Value>::deserialize(deserializer)?;
    Ok(cells.into_iter().map(cell_text).collect())
}

fn deserialize_rows<'de, D>(deserializer: D) -> Result<Vec<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Vec::<Vec<Value>>::deserialize(deserializer)?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect())
}

/// What a table most likely holds, judged from its headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    RegisterMap,
    BitField,
    Timing,
    Specification,
}

impl TableKind {
    pub fn classify(headers: &[String]) -> Self {
        let joined = headers
            .iter()
            .map(|h| h.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let mentions = |words: &[&str]| words.iter().any(|w| joined.contains(w));

        if mentions(&["register", "address", "offset"]) {
            TableKind::RegisterMap
        } else if mentions(&["bit", "field"]) {
            TableKind::BitField
        } else if mentions(&["timing", "delay"]) {
            TableKind::Timing
        } else {
            TableKind::Specification
        }
    }

    /// One-line description handed to analyzers as context.
    pub fn context(&self) -> &'static str {
        match self {
            TableKind::RegisterMap => "This appears to be a register map table",
            TableKind::BitField => "This appears to be a bit field definition table",
            TableKind::Timing => "This appears to be a timing specification table",
            TableKind::Specification => "This is a technical specification table",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub page_number: usize,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl PageContent {
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn is_register_page(&self) -> bool {
        is_register_page(&self.text)
    }

    /// True if the text contains any of `keywords`, ignoring case.
    pub fn mentions_any(&self, keywords: &[String]) -> bool {
        let text = self.text.to_lowercase();
        keywords
            .iter()
            .any(|keyword| text.contains(&keyword.to_lowercase()))
    }
}

/// Read access to an extracted datasheet.
pub trait DatasheetDocument: Send + Sync {
    fn metadata(&self) -> &DocumentMetadata;

    fn page_count(&self) -> usize;

    /// Content of page `index` (0-based).
    fn page(&self, index: usize) -> DocumentResult<PageContent>;
}

/// A document loaded from the extractor's JSON export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedDocument {
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pages: Vec<PageContent>,
}

impl ExtractedDocument {
    pub fn new(metadata: DocumentMetadata, mut pages: Vec<PageContent>) -> Self {
        pages.sort_by_key(|page| page.page_number);
        Self { metadata, pages }
    }

    pub fn from_json_str(json: &str) -> DocumentResult<Self> {
        let document: ExtractedDocument = serde_json::from_str(json)?;
        Ok(Self::new(document.metadata, document.pages))
    }

    pub fn load(path: impl AsRef<Path>) -> DocumentResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Pages included in the export, in page order.
    pub fn pages(&self) -> &[PageContent] {
        &self.pages
    }
}

impl DatasheetDocument for ExtractedDocument {
    fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    /// The larger of the declared page count and the pages actually exported.
    fn page_count(&self) -> usize {
        let exported = self
            .pages
            .last()
            .map(|page| page.page_number + 1)
            .unwrap_or(0);
        self.metadata.page_count.max(exported)
    }

    /// Pages that exist but were not exported come back empty.
    fn page(&self, index: usize) -> DocumentResult<PageContent> {
        let page_count = self.page_count();
        if index >= page_count {
            return Err(DocumentError::PageOutOfRange {
                page: index,
                page_count,
            });
        }

        Ok(self
            .pages
            .binary_search_by_key(&index, |page| page.page_number)
            .map(|pos| self.pages[pos].clone())
            .unwrap_or_else(|_| PageContent {
                page_number: index,
                ..Default::default()
            }))
    }
}
