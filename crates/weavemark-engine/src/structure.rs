//! Read-only structural queries over the document.
//!
//! The locator answers the questions the edit engine needs before it touches
//! anything: which row a position aligns with, whether a span is a dedicated
//! table rather than a shared row, which bookmark sits exactly on a boundary,
//! and whether an insertion point is usable at all. None of these mutate the
//! document.

use crate::bookmarks::BookmarkRegistry;
use crate::error::EngineError;
use crate::geometry::Span;
use crate::host::{Control, DocumentHost, TableShape};

/// The two structural representations a materialized block can take, plus
/// plain flow content. Inferred from the content's shape after a scratch
/// materialization, never declared up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockShape {
    Flow,
    Row,
    Table,
}

/// A row located inside its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRef {
    pub table: TableShape,
    pub index: usize,
}

impl RowRef {
    pub fn span(&self) -> Span {
        self.table.rows[self.index]
    }
}

/// Classification of an insertion destination, computed once and consumed
/// exhaustively by the edit engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Plain splice into flow content (or into the cell the position falls in).
    Flow,
    /// A new row of an existing table, inserted before `index` (`index ==
    /// row count` appends after the last row).
    SharedRow { table: TableShape, index: usize },
    /// A table of its own. `inside` carries the table context that must be
    /// escaped first, when the anchor sits strictly inside one.
    DedicatedTable { inside: Option<TableShape> },
}

/// The row whose span starts exactly at `span.start`, if any.
///
/// The candidate table's last row is compared first: appending at the end of
/// a shared table is the common case and stays O(1).
pub fn row_containing<H: DocumentHost>(host: &H, span: Span) -> Option<RowRef> {
    let table = host.table_at(span.start)?;
    if let Some(last) = table.last_row()
        && last.start == span.start
    {
        let index = table.rows.len() - 1;
        return Some(RowRef { table, index });
    }
    let index = table.rows.iter().position(|row| row.start == span.start)?;
    Some(RowRef { table, index })
}

/// True when `span` extends beyond the single row containing its start, or
/// is not row-aligned at all: the item occupies more than one row and must be
/// treated as a dedicated table rather than a shared row.
pub fn is_whole_table_item<H: DocumentHost>(host: &H, span: Span) -> bool {
    let Some(table) = host.table_at(span.start) else {
        return false;
    };
    let Some(row) = table.rows.iter().copied().find(|r| r.contains(span.start)) else {
        return true;
    };
    span.start != row.start || span.end > row.end
}

/// The bookmark whose span starts exactly at `at`, if any.
pub fn bookmark_starting_at(registry: &BookmarkRegistry, at: usize) -> Option<(String, Span)> {
    registry
        .iter()
        .find(|(_, span)| span.start == at)
        .map(|(name, span)| (name.to_string(), span))
}

/// The bookmark whose span ends exactly at `at`, if any.
pub fn bookmark_ending_at(registry: &BookmarkRegistry, at: usize) -> Option<(String, Span)> {
    registry
        .iter()
        .find(|(_, span)| span.end == at)
        .map(|(name, span)| (name.to_string(), span))
}

/// Any nested content control whose extent fully or partially contains
/// `span`. A hit means the location is not insertable.
pub fn control_containing<H: DocumentHost>(host: &H, span: Span) -> Option<Control> {
    host.controls().into_iter().find(|control| {
        if span.is_empty() {
            control.span.strictly_contains(span.start)
        } else {
            control.span.overlaps(span)
        }
    })
}

/// The whole rows exactly covered by `span`, when it is row-aligned on both
/// ends. A span that starts inside a table but reaches past its end violates
/// the single-table assumption.
pub fn rows_covered<H: DocumentHost>(
    host: &H,
    span: Span,
) -> Result<Option<(TableShape, std::ops::Range<usize>)>, EngineError> {
    let Some(table) = host.table_at(span.start) else {
        return Ok(None);
    };
    if span.end > table.span.end {
        return Err(EngineError::InvariantViolation(format!(
            "range {span} crosses the table boundary at {}",
            table.span.end
        )));
    }
    let Some(first) = table.rows.iter().position(|r| r.start == span.start) else {
        return Ok(None);
    };
    let Some(last) = table.rows.iter().position(|r| r.end == span.end) else {
        return Ok(None);
    };
    if last < first {
        return Ok(None);
    }
    Ok(Some((table, first..last + 1)))
}

/// Classify the destination at `at` for content of the given shape.
pub fn destination_for<H: DocumentHost>(host: &H, at: usize, shape: BlockShape) -> Destination {
    match shape {
        BlockShape::Flow => Destination::Flow,
        BlockShape::Row => {
            if let Some(table) = host.table_ending_at(at) {
                let index = table.rows.len();
                Destination::SharedRow { table, index }
            } else if let Some(row) = row_containing(host, Span::caret(at)) {
                Destination::SharedRow {
                    index: row.index,
                    table: row.table,
                }
            } else {
                Destination::DedicatedTable {
                    inside: host.table_at(at),
                }
            }
        }
        BlockShape::Table => Destination::DedicatedTable {
            inside: host.table_at(at),
        },
    }
}
