use std::collections::BTreeMap;

use log::trace;
use xi_rope::delta::{Builder, Transformer};
use xi_rope::{Delta, Rope, RopeInfo};

use crate::geometry::Span;

use super::{
    BlockBody, BlockContent, Control, ControlTemplate, DocumentHost, HostError, HostToggles,
    PARAGRAPH_BREAK, TableShape,
};

/// How an insertion interacts with structure spans sitting exactly at the
/// insertion point: flow text joins the row/cell it lands in, while table
/// content (and the escape break) pushes structure past itself.
#[derive(Clone, Copy, PartialEq, Eq)]
enum InsertBias {
    Joining,
    Pushing,
}

#[derive(Clone)]
struct UndoRecord {
    buffer: Rope,
    tables: Vec<TableShape>,
    controls: Vec<Control>,
    markers: BTreeMap<String, Span>,
}

/// In-memory reference implementation of [`DocumentHost`].
///
/// The content stream is an `xi_rope::Rope`; every edit is compiled to a
/// `Delta` and all structure, control, and marker spans are carried through
/// it with `Transformer`. Markers use the asymmetric bias that keeps them
/// from swallowing neighbouring insertions: an insertion exactly at a
/// marker's start shifts the marker forward, an insertion exactly at its end
/// does not extend it.
///
/// Each structural operation snapshots the document first (the rope is a
/// persistent structure, so snapshots are cheap); `undo(n)` restores the
/// state from n operations ago, marker store included.
pub struct MemoryDocument {
    buffer: Rope,
    tables: Vec<TableShape>,
    controls: Vec<Control>,
    markers: BTreeMap<String, Span>,
    toggles: HostToggles,
    undo: Vec<UndoRecord>,
    version: u64,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            buffer: Rope::from(""),
            tables: Vec::new(),
            controls: Vec::new(),
            markers: BTreeMap::new(),
            toggles: HostToggles::default(),
            undo: Vec::new(),
            version: 0,
        }
    }

    /// A document holding plain flow text, no tables.
    pub fn from_text(text: &str) -> Self {
        Self {
            buffer: Rope::from(text),
            ..Self::new()
        }
    }

    /// Version counter, incremented on every mutation including undo.
    pub fn version(&self) -> u64 {
        self.version
    }

    fn check_position(&self, at: usize) -> Result<(), HostError> {
        if at > self.buffer.len() {
            return Err(HostError::OutOfBounds {
                position: at,
                len: self.buffer.len(),
            });
        }
        Ok(())
    }

    fn check_span(&self, span: Span) -> Result<(), HostError> {
        self.check_position(span.end)
    }

    fn begin_op(&mut self) {
        self.undo.push(UndoRecord {
            buffer: self.buffer.clone(),
            tables: self.tables.clone(),
            controls: self.controls.clone(),
            markers: self.markers.clone(),
        });
        self.version += 1;
    }

    fn insert_delta(&self, at: usize, text: &str) -> Delta<RopeInfo> {
        let mut builder = Builder::new(self.buffer.len());
        builder.replace(at..at, Rope::from(text));
        builder.build()
    }

    fn delete_delta(&self, span: Span) -> Delta<RopeInfo> {
        let mut builder = Builder::new(self.buffer.len());
        builder.delete(span.to_range());
        builder.build()
    }

    /// Carry every tracked span through the delta, then apply it to the rope.
    fn apply_delta(&mut self, delta: &Delta<RopeInfo>, bias: InsertBias) {
        let mut tx = Transformer::new(delta);
        let push = bias == InsertBias::Pushing;
        for table in &mut self.tables {
            for row in table.rows.iter_mut() {
                *row = transform_structure(&mut tx, *row, push);
            }
            rebuild_table_span(table);
        }
        for control in &mut self.controls {
            control.span = transform_marker(&mut tx, control.span);
        }
        for span in self.markers.values_mut() {
            *span = transform_marker(&mut tx, *span);
        }
        self.buffer = delta.apply(&self.buffer);
    }

    fn attach_controls(&mut self, base: usize, controls: &[ControlTemplate]) {
        for control in controls {
            self.controls.push(Control {
                tag: control.tag.clone(),
                span: Span::new(base + control.start, base + control.end),
            });
        }
    }

    fn prune_controls(&mut self) {
        self.controls.retain(|c| !c.span.is_empty());
    }

    fn table_index(&self, table_start: usize) -> Result<usize, HostError> {
        self.tables
            .iter()
            .position(|t| t.span.start == table_start)
            .ok_or(HostError::NoTableAt(table_start))
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentHost for MemoryDocument {
    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn text_of(&self, span: Span) -> String {
        let doc_len = self.buffer.len();
        let start = span.start.min(doc_len);
        let end = span.end.min(doc_len).max(start);
        self.buffer.slice_to_cow(start..end).into_owned()
    }

    fn insert_text(&mut self, at: usize, text: &str) -> Result<Span, HostError> {
        self.check_position(at)?;
        if text.is_empty() {
            return Ok(Span::caret(at));
        }
        trace!("insert_text at={at} len={}", text.len());
        let delta = self.insert_delta(at, text);
        self.begin_op();
        self.apply_delta(&delta, InsertBias::Joining);
        Ok(Span::new(at, at + text.len()))
    }

    fn insert_content(&mut self, at: usize, content: &BlockContent) -> Result<Span, HostError> {
        self.check_position(at)?;
        match &content.body {
            BlockBody::Flow(text) => {
                if text.is_empty() {
                    return Ok(Span::caret(at));
                }
                validate_controls(&content.controls, text.len())?;
                trace!("insert_content flow at={at} len={}", text.len());
                let delta = self.insert_delta(at, text);
                self.begin_op();
                self.apply_delta(&delta, InsertBias::Joining);
                self.attach_controls(at, &content.controls);
                Ok(Span::new(at, at + text.len()))
            }
            BlockBody::Table(rows) => {
                if rows.is_empty() {
                    return Err(HostError::EmptyTableContent);
                }
                if let Some(table) = self.tables.iter().find(|t| t.span.strictly_contains(at)) {
                    return Err(HostError::NestedTable(table.span.start));
                }
                let text = table_text(rows);
                validate_controls(&content.controls, text.len())?;
                trace!("insert_content table at={at} rows={}", rows.len());
                let delta = self.insert_delta(at, &text);
                self.begin_op();
                self.apply_delta(&delta, InsertBias::Pushing);
                let mut row_spans = Vec::with_capacity(rows.len());
                let mut cursor = at;
                for row in rows {
                    let end = cursor + row.len() + PARAGRAPH_BREAK.len_utf8();
                    row_spans.push(Span::new(cursor, end));
                    cursor = end;
                }
                let span = Span::new(at, cursor);
                let index = self.tables.partition_point(|t| t.span.start < at);
                self.tables.insert(
                    index,
                    TableShape {
                        span,
                        rows: row_spans,
                    },
                );
                self.attach_controls(at, &content.controls);
                Ok(span)
            }
        }
    }

    fn delete_span(&mut self, span: Span) -> Result<(), HostError> {
        self.check_span(span)?;
        if span.is_empty() {
            return Ok(());
        }
        trace!("delete_span {span}");
        let delta = self.delete_delta(span);
        self.begin_op();
        self.apply_delta(&delta, InsertBias::Joining);
        self.tables.retain(|t| !t.span.is_empty());
        self.prune_controls();
        Ok(())
    }

    fn insert_break(&mut self, at: usize) -> Result<Span, HostError> {
        self.check_position(at)?;
        let mut split = None;
        if let Some(ti) = self
            .tables
            .iter()
            .position(|t| t.span.strictly_contains(at))
        {
            let table = &self.tables[ti];
            let Some(row_index) = table.rows.iter().position(|r| r.start == at) else {
                return Err(HostError::NotAtRowBoundary(at));
            };
            split = Some((ti, row_index));
        }
        trace!("insert_break at={at} split={split:?}");
        let delta = self.insert_delta(at, &super::ESCAPE_BREAK.to_string());
        self.begin_op();
        if let Some((ti, row_index)) = split {
            let table = self.tables.remove(ti);
            let mut head = table.rows;
            let tail = head.split_off(row_index);
            let head_span = Span::new(head[0].start, head[head.len() - 1].end);
            let tail_span = Span::new(tail[0].start, tail[tail.len() - 1].end);
            self.tables.insert(
                ti,
                TableShape {
                    span: head_span,
                    rows: head,
                },
            );
            self.tables.insert(
                ti + 1,
                TableShape {
                    span: tail_span,
                    rows: tail,
                },
            );
        }
        self.apply_delta(&delta, InsertBias::Pushing);
        Ok(Span::new(at, at + super::ESCAPE_BREAK.len_utf8()))
    }

    fn insert_row(
        &mut self,
        table_start: usize,
        index: usize,
        content: &BlockContent,
    ) -> Result<Span, HostError> {
        let ti = self.table_index(table_start)?;
        let Some(row_text) = content.single_row_text() else {
            return Err(HostError::NotRowContent);
        };
        let table = &self.tables[ti];
        if index > table.rows.len() {
            return Err(HostError::NoSuchRow {
                table_start,
                row: index,
            });
        }
        let at = if index < table.rows.len() {
            table.rows[index].start
        } else {
            table.span.end
        };
        trace!("insert_row table_start={table_start} index={index} at={at}");
        let text = format!("{row_text}{PARAGRAPH_BREAK}");
        validate_controls(&content.controls, text.len())?;
        let delta = self.insert_delta(at, &text);
        self.begin_op();
        self.apply_delta(&delta, InsertBias::Pushing);
        let span = Span::new(at, at + text.len());
        let table = &mut self.tables[ti];
        table.rows.insert(index, span);
        rebuild_table_span(table);
        self.attach_controls(at, &content.controls);
        Ok(span)
    }

    fn delete_rows(
        &mut self,
        table_start: usize,
        rows: std::ops::Range<usize>,
    ) -> Result<(), HostError> {
        let ti = self.table_index(table_start)?;
        let table = &self.tables[ti];
        if rows.start >= rows.end || rows.end > table.rows.len() {
            return Err(HostError::NoSuchRow {
                table_start,
                row: rows.end.saturating_sub(1),
            });
        }
        let span = Span::new(table.rows[rows.start].start, table.rows[rows.end - 1].end);
        trace!("delete_rows table_start={table_start} rows={rows:?} span={span}");
        let delta = self.delete_delta(span);
        self.begin_op();
        self.apply_delta(&delta, InsertBias::Joining);
        self.tables[ti].rows.drain(rows);
        if self.tables[ti].rows.is_empty() {
            self.tables.remove(ti);
        } else {
            rebuild_table_span(&mut self.tables[ti]);
        }
        self.prune_controls();
        Ok(())
    }

    fn table_at(&self, pos: usize) -> Option<TableShape> {
        self.tables.iter().find(|t| t.span.contains(pos)).cloned()
    }

    fn table_ending_at(&self, pos: usize) -> Option<TableShape> {
        self.tables.iter().find(|t| t.span.end == pos).cloned()
    }

    fn tables(&self) -> Vec<TableShape> {
        self.tables.clone()
    }

    fn marker_span(&self, name: &str) -> Option<Span> {
        self.markers.get(name).copied()
    }

    fn create_marker(&mut self, name: &str, span: Span) -> Result<(), HostError> {
        self.check_span(span)?;
        if self.markers.contains_key(name) {
            return Err(HostError::MarkerExists(name.to_string()));
        }
        self.markers.insert(name.to_string(), span);
        Ok(())
    }

    fn remove_marker(&mut self, name: &str) -> Result<(), HostError> {
        if self.markers.remove(name).is_none() {
            return Err(HostError::NoSuchMarker(name.to_string()));
        }
        Ok(())
    }

    fn marker_names(&self) -> Vec<String> {
        self.markers.keys().cloned().collect()
    }

    fn controls_in(&self, span: Span) -> Vec<Control> {
        self.controls
            .iter()
            .filter(|c| span.contains_span(c.span))
            .cloned()
            .collect()
    }

    fn controls(&self) -> Vec<Control> {
        self.controls.clone()
    }

    fn toggles(&self) -> HostToggles {
        self.toggles
    }

    fn set_toggles(&mut self, toggles: HostToggles) {
        self.toggles = toggles;
    }

    fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    fn undo(&mut self, count: usize) -> Result<(), HostError> {
        if count == 0 {
            return Ok(());
        }
        if count > self.undo.len() {
            return Err(HostError::UndoExhausted {
                requested: count,
                available: self.undo.len(),
            });
        }
        trace!("undo count={count}");
        let target = self.undo.len() - count;
        self.undo.truncate(target + 1);
        if let Some(record) = self.undo.pop() {
            self.buffer = record.buffer;
            self.tables = record.tables;
            self.controls = record.controls;
            self.markers = record.markers;
        }
        self.version += 1;
        Ok(())
    }
}

fn transform_marker(tx: &mut Transformer<'_, RopeInfo>, span: Span) -> Span {
    let start = tx.transform(span.start, true);
    let end = tx.transform(span.end, false);
    if end < start {
        Span::caret(start)
    } else {
        Span::new(start, end)
    }
}

fn transform_structure(tx: &mut Transformer<'_, RopeInfo>, span: Span, push: bool) -> Span {
    let start = tx.transform(span.start, push);
    let end = tx.transform(span.end, false);
    if end < start {
        Span::caret(start)
    } else {
        Span::new(start, end)
    }
}

fn rebuild_table_span(table: &mut TableShape) {
    let first = table.rows.first().copied();
    let last = table.rows.last().copied();
    if let (Some(first), Some(last)) = (first, last) {
        table.span = Span::new(first.start, last.end);
    } else {
        table.span = Span::caret(table.span.start);
    }
}

fn table_text(rows: &[String]) -> String {
    let mut text = String::new();
    for row in rows {
        text.push_str(row);
        text.push(PARAGRAPH_BREAK);
    }
    text
}

fn validate_controls(controls: &[ControlTemplate], len: usize) -> Result<(), HostError> {
    for control in controls {
        if control.start > control.end || control.end > len {
            return Err(HostError::ControlOutOfBounds {
                tag: control.tag.clone(),
            });
        }
    }
    Ok(())
}
