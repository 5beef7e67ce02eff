//! Page and table selection.
//!
//! Decides which `(page, table)` pairs of a document are sent for analysis.
//! Range problems are reported here, before any analyzer is called.

use crate::document::{DatasheetDocument, DocumentError, Table};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Document has no pages")]
    EmptyDocument,

    #[error("start_page ({start}) must be <= end_page ({end})")]
    InvalidRange { start: usize, end: usize },

    #[error("Page {page} out of range (max: {max})")]
    PageOutOfRange { page: usize, max: usize },

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}

/// Inclusive, 0-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Which pages are candidates before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageScope {
    All,
    Range(PageRange),
    Pages(Vec<usize>),
}

/// Filters applied to candidate pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    pub scope: PageScope,
    /// Keep only pages whose text matches the register keyword vocabulary
    pub register_only: bool,
    /// Keep only pages with at least this many tables
    pub min_tables: usize,
    /// When non-empty, keep only pages mentioning at least one of these
    pub keywords: Vec<String>,
}

impl Default for PageSelection {
    fn default() -> Self {
        Self {
            scope: PageScope::All,
            register_only: true,
            min_tables: 1,
            keywords: Vec::new(),
        }
    }
}

impl PageSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn range(start: usize, end: usize) -> Self {
        Self {
            scope: PageScope::Range(PageRange::new(start, end)),
            ..Self::default()
        }
    }

    pub fn pages(pages: Vec<usize>) -> Self {
        Self {
            scope: PageScope::Pages(pages),
            ..Self::default()
        }
    }

    pub fn with_register_only(mut self, register_only: bool) -> Self {
        self.register_only = register_only;
        self
    }

    pub fn with_min_tables(mut self, min_tables: usize) -> Self {
        self.min_tables = min_tables;
        self
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }
}

/// One table picked for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub page: usize,
    pub table: usize,
    pub content: Table,
}

/// Outcome of applying a [`PageSelection`] to a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Range actually scanned, after clamping; `None` for explicit page lists
    pub range: Option<PageRange>,
    /// Explicit pages requested, sorted and de-duplicated
    pub explicit_pages: Vec<usize>,
    /// Pages that passed every filter, ascending
    pub pages: Vec<usize>,
    /// Tables on those pages, ordered by page then table index
    pub tables: Vec<TableRef>,
}

fn resolve_scope(
    scope: &PageScope,
    page_count: usize,
) -> Result<(Vec<usize>, Option<PageRange>), SelectionError> {
    let last_page = page_count - 1;

    match scope {
        PageScope::All => Ok(((0..page_count).collect(), Some(PageRange::new(0, last_page)))),
        PageScope::Range(range) => {
            let mut end = range.end;
            if end > last_page {
                warn!(
                    "end_page {} exceeds document length, setting to {}",
                    end, last_page
                );
                end = last_page;
            }
            if range.start > end {
                return Err(SelectionError::InvalidRange {
                    start: range.start,
                    end,
                });
            }
            Ok(((range.start..=end).collect(), Some(PageRange::new(range.start, end))))
        }
        PageScope::Pages(pages) => {
            if let Some(&page) = pages.iter().find(|&&page| page > last_page) {
                return Err(SelectionError::PageOutOfRange {
                    page,
                    max: last_page,
                });
            }
            let mut pages = pages.clone();
            pages.sort_unstable();
            pages.dedup();
            Ok((pages, None))
        }
    }
}

/// Select the tables of `document` matching `selection`.
pub fn select_tables(
    document: &dyn DatasheetDocument,
    selection: &PageSelection,
) -> Result<Selection, SelectionError> {
    let page_count = document.page_count();
    if page_count == 0 {
        return Err(SelectionError::EmptyDocument);
    }

    let (candidates, range) = resolve_scope(&selection.scope, page_count)?;
    let explicit_pages = if matches!(selection.scope, PageScope::Pages(_)) {
        candidates.clone()
    } else {
        Vec::new()
    };

    let mut pages = Vec::new();
    let mut tables = Vec::new();

    for page_number in candidates {
        let page = document.page(page_number)?;

        if selection.register_only && !page.is_register_page() {
            debug!("Page {}: no register keywords, skipped", page_number);
            continue;
        }
        if page.table_count() < selection.min_tables {
            debug!(
                "Page {}: {} tables (< {}), skipped",
                page_number,
                page.table_count(),
                selection.min_tables
            );
            continue;
        }
        if !selection.keywords.is_empty() && !page.mentions_any(&selection.keywords) {
            debug!("Page {}: no requested keyword, skipped", page_number);
            continue;
        }

        debug!("Page {}: {} tables selected", page_number, page.table_count());
        pages.push(page_number);
        tables.extend(
            page.tables
                .into_iter()
                .enumerate()
                .map(|(table, content)| TableRef {
                    page: page_number,
                    table,
                    content,
                }),
        );
    }

    info!(
        "Selected {} tables on {} pages of {}",
        tables.len(),
        pages.len(),
        document.metadata().filename
    );

    Ok(Selection {
        range,
        explicit_pages,
        pages,
        tables,
    })
}

/// Page numbers in `start..=end` that hold register tables.
///
/// `end` defaults to the last page and is clamped like any other range.
pub fn find_register_pages(
    document: &dyn DatasheetDocument,
    start: usize,
    end: Option<usize>,
    min_tables: usize,
    keywords: Vec<String>,
) -> Result<Vec<usize>, SelectionError> {
    let end = end.unwrap_or_else(|| document.page_count().saturating_sub(1));
    let selection = PageSelection::range(start, end)
        .with_register_only(true)
        .with_min_tables(min_tables)
        .with_keywords(keywords);
    Ok(select_tables(document, &selection)?.pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentMetadata, ExtractedDocument, PageContent};

    fn table(name: &str) -> Table {
        Table::new(
            vec!["Register".to_string(), "Offset".to_string()],
            vec![vec![name.to_string(), "0x00".to_string()]],
        )
    }

    fn page(page_number: usize, text: &str, tables: Vec<Table>) -> PageContent {
        PageContent {
            page_number,
            text: text.to_string(),
            tables,
        }
    }

    fn document() -> ExtractedDocument {
        ExtractedDocument::new(
            DocumentMetadata {
                filename: "mcu.pdf".to_string(),
                page_count: 6,
                ..Default::default()
            },
            vec![
                page(0, "Introduction", vec![table("NOT_A_REG")]),
                page(1, "Control register CTRL", vec![table("CTRL"), table("CTRL_B")]),
                page(2, "Status register", vec![]),
                page(3, "SPI configuration", vec![table("SPI_CFG")]),
                page(4, "Electrical characteristics", vec![table("VDD")]),
                page(5, "I2C address map", vec![table("I2C_ADDR")]),
            ],
        )
    }

    fn coords(selection: &Selection) -> Vec<(usize, usize)> {
        selection.tables.iter().map(|t| (t.page, t.table)).collect()
    }

    #[test]
    fn test_select_all_default_filters() {
        let selection = select_tables(&document(), &PageSelection::all()).unwrap();
        assert_eq!(selection.pages, vec![1, 3, 5]);
        assert_eq!(coords(&selection), vec![(1, 0), (1, 1), (3, 0), (5, 0)]);
        assert_eq!(selection.range, Some(PageRange::new(0, 5)));
        assert_eq!(selection.tables[1].content.rows[0][0], "CTRL_B");
    }

    #[test]
    fn test_filters_can_be_disabled() {
        let selection = select_tables(
            &document(),
            &PageSelection::range(0, 2)
                .with_register_only(false)
                .with_min_tables(0),
        )
        .unwrap();
        assert_eq!(selection.pages, vec![0, 1, 2]);
        assert_eq!(coords(&selection), vec![(0, 0), (1, 0), (1, 1)]);
    }

    #[test]
    fn test_min_tables_threshold() {
        let selection =
            select_tables(&document(), &PageSelection::all().with_min_tables(2)).unwrap();
        assert_eq!(selection.pages, vec![1]);
    }

    #[test]
    fn test_range_end_is_clamped() {
        let selection = select_tables(&document(), &PageSelection::range(3, 99)).unwrap();
        assert_eq!(selection.range, Some(PageRange::new(3, 5)));
        assert_eq!(selection.pages, vec![3, 5]);
    }

    #[test]
    fn test_start_after_end_is_rejected() {
        assert!(matches!(
            select_tables(&document(), &PageSelection::range(4, 2)),
            Err(SelectionError::InvalidRange { start: 4, end: 2 })
        ));
        assert!(matches!(
            select_tables(&document(), &PageSelection::range(10, 20)),
            Err(SelectionError::InvalidRange { start: 10, end: 5 })
        ));
    }

    #[test]
    fn test_explicit_pages_sorted_and_validated() {
        let selection = select_tables(&document(), &PageSelection::pages(vec![5, 1, 5])).unwrap();
        assert_eq!(selection.explicit_pages, vec![1, 5]);
        assert_eq!(selection.range, None);
        assert_eq!(coords(&selection), vec![(1, 0), (1, 1), (5, 0)]);

        assert!(matches!(
            select_tables(&document(), &PageSelection::pages(vec![1, 6])),
            Err(SelectionError::PageOutOfRange { page: 6, max: 5 })
        ));
    }

    #[test]
    fn test_keyword_filter() {
        let selection = select_tables(
            &document(),
            &PageSelection::all().with_keywords(vec!["spi".to_string(), "I2C".to_string()]),
        )
        .unwrap();
        assert_eq!(selection.pages, vec![3, 5]);
    }

    #[test]
    fn test_empty_document() {
        let empty = ExtractedDocument::new(DocumentMetadata::default(), vec![]);
        assert!(matches!(
            select_tables(&empty, &PageSelection::all()),
            Err(SelectionError::EmptyDocument)
        ));
    }

    #[test]
    fn test_find_register_pages() {
        assert_eq!(
            find_register_pages(&document(), 0, None, 1, vec![]).unwrap(),
            vec![1, 3, 5]
        );
        assert_eq!(
            find_register_pages(&document(), 2, Some(4), 1, vec![]).unwrap(),
            vec![3]
        );
    }
}
