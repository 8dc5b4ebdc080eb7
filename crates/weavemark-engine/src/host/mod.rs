//! Primitive surface of the hosting document engine.
//!
//! The engine core never talks to a concrete document implementation; it only
//! sees the position-addressed primitives below. `MemoryDocument` is the
//! reference implementation backed by an `xi_rope` buffer; a production
//! integration wraps the real host application behind the same trait.

pub mod memory;

pub use memory::MemoryDocument;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::Span;

/// Paragraph boundary character of the reference text encoding.
pub const PARAGRAPH_BREAK: char = '\n';

/// Transient break used to escape a table context during a structured splice.
pub const ESCAPE_BREAK: char = '\u{0C}';

/// Body of a building block: flow paragraphs, or the rows of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockBody {
    Flow(String),
    Table(Vec<String>),
}

/// Template for a nested content control carried by a building block. Offsets
/// are relative to the block's start and resolve once the block materializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlTemplate {
    pub tag: String,
    pub start: usize,
    pub end: usize,
}

/// A named, reusable, opaque unit of structured content. Immutable once
/// obtained from a catalog; the engine only ever inserts copies of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContent {
    pub name: String,
    pub body: BlockBody,
    pub controls: Vec<ControlTemplate>,
}

impl BlockContent {
    pub fn flow(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: BlockBody::Flow(text.into()),
            controls: Vec::new(),
        }
    }

    pub fn table(name: impl Into<String>, rows: Vec<String>) -> Self {
        Self {
            name: name.into(),
            body: BlockBody::Table(rows),
            controls: Vec::new(),
        }
    }

    pub fn with_control(mut self, tag: impl Into<String>, start: usize, end: usize) -> Self {
        self.controls.push(ControlTemplate {
            tag: tag.into(),
            start,
            end,
        });
        self
    }

    /// The cell text when this block is usable as a single table row.
    pub fn single_row_text(&self) -> Option<&str> {
        match &self.body {
            BlockBody::Flow(text) => Some(text),
            BlockBody::Table(rows) if rows.len() == 1 => Some(&rows[0]),
            BlockBody::Table(_) => None,
        }
    }
}

/// A content control materialized in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub tag: String,
    pub span: Span,
}

/// A table and its ordered rows. Rows are contiguous, never overlap, and
/// partition the table span; each row span includes its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableShape {
    pub span: Span,
    pub rows: Vec<Span>,
}

impl TableShape {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn last_row(&self) -> Option<Span> {
        self.rows.last().copied()
    }
}

/// Host environment switches that would otherwise prompt the user or
/// silently "smart-fix" content during a structural edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostToggles {
    pub autoformat: bool,
    pub smart_quotes: bool,
    pub paste_adjustment: bool,
}

impl HostToggles {
    /// Everything off, the state a guarded edit runs under.
    pub fn suspended() -> Self {
        Self {
            autoformat: false,
            smart_quotes: false,
            paste_adjustment: false,
        }
    }
}

impl Default for HostToggles {
    fn default() -> Self {
        Self {
            autoformat: true,
            smart_quotes: true,
            paste_adjustment: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("position {position} is outside the document (length {len})")]
    OutOfBounds { position: usize, len: usize },
    #[error("no table at position {0}")]
    NoTableAt(usize),
    #[error("table at {table_start} has no row {row}")]
    NoSuchRow { table_start: usize, row: usize },
    #[error("position {0} is not a row boundary")]
    NotAtRowBoundary(usize),
    #[error("table content cannot nest inside the table at {0}")]
    NestedTable(usize),
    #[error("content is not usable as a single row")]
    NotRowContent,
    #[error("table content must have at least one row")]
    EmptyTableContent,
    #[error("control {tag} extends past the inserted content")]
    ControlOutOfBounds { tag: String },
    #[error("native marker already exists: {0}")]
    MarkerExists(String),
    #[error("no native marker named {0}")]
    NoSuchMarker(String),
    #[error("cannot undo {requested} operations, only {available} recorded")]
    UndoExhausted { requested: usize, available: usize },
}

/// Position-addressed primitives of the hosting document.
///
/// Structural operations are the content mutations (`insert_text`,
/// `insert_content`, `insert_break`, `insert_row`, `delete_rows`,
/// `delete_span`); each one is individually revertible through `undo`.
/// Marker and toggle changes are not structural operations, but `undo`
/// restores the whole document state, marker store included, from the
/// recorded point.
pub trait DocumentHost {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the text covered by `span`, clamped to the document bounds.
    fn text_of(&self, span: Span) -> String;

    fn text(&self) -> String {
        self.text_of(Span::new(0, self.len()))
    }

    /// Splice plain text at `at`. Returns the span it occupies.
    fn insert_text(&mut self, at: usize, text: &str) -> Result<Span, HostError>;

    /// Splice block content at `at`. Flow text joins whatever structure the
    /// position falls in; table content refuses to nest inside an existing
    /// table and pushes structure at the point aside.
    fn insert_content(&mut self, at: usize, content: &BlockContent) -> Result<Span, HostError>;

    /// Delete a character range. Characters of a row can be deleted this way,
    /// but the row slot itself survives as a zero-width artifact; use
    /// `delete_rows` to remove rows structurally.
    fn delete_span(&mut self, span: Span) -> Result<(), HostError>;

    /// Insert a transient escape break at `at`. When `at` is an interior row
    /// boundary the containing table splits there first.
    fn insert_break(&mut self, at: usize) -> Result<Span, HostError>;

    /// Insert a single row into the table starting at `table_start`, before
    /// the row at `index` (`index == row count` appends).
    fn insert_row(
        &mut self,
        table_start: usize,
        index: usize,
        content: &BlockContent,
    ) -> Result<Span, HostError>;

    /// Structurally remove the given rows, slots included. A table whose last
    /// row is removed disappears entirely.
    fn delete_rows(
        &mut self,
        table_start: usize,
        rows: std::ops::Range<usize>,
    ) -> Result<(), HostError>;

    /// The table whose span covers `pos`, if any.
    fn table_at(&self, pos: usize) -> Option<TableShape>;

    /// The table whose span ends exactly at `pos`, if any.
    fn table_ending_at(&self, pos: usize) -> Option<TableShape>;

    fn tables(&self) -> Vec<TableShape>;

    fn marker_span(&self, name: &str) -> Option<Span>;

    fn create_marker(&mut self, name: &str, span: Span) -> Result<(), HostError>;

    fn remove_marker(&mut self, name: &str) -> Result<(), HostError>;

    fn marker_names(&self) -> Vec<String>;

    /// Content controls fully contained in `span`.
    fn controls_in(&self, span: Span) -> Vec<Control>;

    fn controls(&self) -> Vec<Control>;

    fn toggles(&self) -> HostToggles;

    fn set_toggles(&mut self, toggles: HostToggles);

    /// Number of structural operations recorded since document creation.
    fn undo_depth(&self) -> usize;

    /// Revert the last `count` structural operations.
    fn undo(&mut self, count: usize) -> Result<(), HostError>;
}
