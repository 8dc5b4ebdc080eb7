//! The edit engine: every mutation of the document flows through here.
//!
//! Each public operation is a complete transaction. It classifies its
//! destination through the structural locator, performs the underlying host
//! primitives, then brings the bookmark registry back in line with the
//! document — including bookmarks whose boundaries were disturbed by the
//! edit. There is no cross-call state beyond the registry cache.
//!
//! A block's structural representation is never declared up front: the block
//! is materialized into a scratch range first to learn its real shape (plain
//! flow, a single row, or a whole table), and the scratch range is reverted
//! through the host's undo primitive before any real placement happens.
//!
//! All operations run with the host's smart-editing toggles suspended (see
//! [`guard`]) so the host cannot reformat content mid-edit.

pub mod guard;
pub mod scratch;

use log::debug;

use crate::bookmarks::BookmarkRegistry;
use crate::error::EngineError;
use crate::geometry::Span;
use crate::host::{
    BlockBody, BlockContent, ControlTemplate, DocumentHost, HostError, PARAGRAPH_BREAK,
};
use crate::structure::{self, BlockShape, Destination};

use guard::run_guarded;
use scratch::{ScratchNamer, UuidNamer, with_scratch};

/// Shape and content summary of a block, read without permanent document
/// change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub shape: BlockShape,
    pub control_tags: Vec<String>,
    pub preview: String,
}

/// Stateful editor over a host document and its bookmark registry.
///
/// The engine is the sole mutator of the document; the registry is the sole
/// authority on bookmark identity. Single-threaded by design.
pub struct BlockEngine<H: DocumentHost, N: ScratchNamer = UuidNamer> {
    host: H,
    bookmarks: BookmarkRegistry,
    namer: N,
}

impl<H: DocumentHost> BlockEngine<H> {
    pub fn new(host: H) -> Self {
        Self::with_namer(host, UuidNamer)
    }
}

impl<H: DocumentHost, N: ScratchNamer> BlockEngine<H, N> {
    pub fn with_namer(host: H, namer: N) -> Self {
        let bookmarks = BookmarkRegistry::from_host(&host);
        Self {
            host,
            bookmarks,
            namer,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn bookmarks(&self) -> &BookmarkRegistry {
        &self.bookmarks
    }

    pub fn contains_bookmark(&self, name: &str) -> bool {
        self.bookmarks.exists(name)
    }

    pub fn bookmark_span(&self, name: &str) -> Option<Span> {
        self.bookmarks.lookup(name)
    }

    pub fn bookmark_names(&self) -> Vec<String> {
        self.bookmarks.names()
    }

    pub fn bookmark_count(&self) -> usize {
        self.bookmarks.len()
    }

    /// Rebuild the bookmark cache from the host, after structural changes
    /// this engine did not perform itself.
    pub fn refresh_bookmarks(&mut self) {
        self.bookmarks.refresh(&self.host);
    }

    /// Insert `block` at `anchor` and point the bookmark `name` at the
    /// result. A non-empty anchor range is cleared first (replace-by-typing).
    /// Returns the tags of the nested controls now present inside the new
    /// bookmark's span.
    pub fn insert_block(
        &mut self,
        block: &BlockContent,
        name: &str,
        anchor: Span,
    ) -> Result<Vec<String>, EngineError> {
        debug!("insert_block name={name} block={} anchor={anchor}", block.name);
        let bookmarks = &mut self.bookmarks;
        run_guarded(&mut self.host, |host| {
            insert_block_inner(host, bookmarks, block, name, anchor)
        })
    }

    /// [`Self::insert_block`] at a zero-width anchor.
    pub fn insert_block_at(
        &mut self,
        block: &BlockContent,
        name: &str,
        at: usize,
    ) -> Result<Vec<String>, EngineError> {
        self.insert_block(block, name, Span::caret(at))
    }

    pub fn insert_block_before_bookmark(
        &mut self,
        block: &BlockContent,
        name: &str,
        relative: &str,
    ) -> Result<Vec<String>, EngineError> {
        self.bookmarks.refresh(&self.host);
        let span = self
            .bookmarks
            .lookup(relative)
            .ok_or_else(|| EngineError::BookmarkNotFound(relative.to_string()))?;
        self.insert_block(block, name, span.collapse_to_start())
    }

    pub fn insert_block_after_bookmark(
        &mut self,
        block: &BlockContent,
        name: &str,
        relative: &str,
    ) -> Result<Vec<String>, EngineError> {
        self.bookmarks.refresh(&self.host);
        let span = self
            .bookmarks
            .lookup(relative)
            .ok_or_else(|| EngineError::BookmarkNotFound(relative.to_string()))?;
        self.insert_block(block, name, span.collapse_to_end())
    }

    /// Remove the bookmark and the content it covers. A whole-row bookmark
    /// takes its row slot with it; a missing bookmark is a no-op by contract.
    pub fn delete_bookmark_and_content(&mut self, name: &str) -> Result<(), EngineError> {
        debug!("delete_bookmark_and_content name={name}");
        let bookmarks = &mut self.bookmarks;
        run_guarded(&mut self.host, |host| delete_inner(host, bookmarks, name))
    }

    /// Relocate `moving`'s content to just before `relative`. The insertion
    /// at the destination completes, bookmark-consistent, before the source
    /// content is deleted; a failure in between leaves the content
    /// duplicated rather than lost.
    pub fn move_bookmark_and_content_to_before(
        &mut self,
        moving: &str,
        relative: &str,
    ) -> Result<(), EngineError> {
        debug!("move_bookmark_and_content_to_before moving={moving} relative={relative}");
        let scratch_name = self.namer.next_name();
        let bookmarks = &mut self.bookmarks;
        run_guarded(&mut self.host, |host| {
            move_inner(host, bookmarks, &scratch_name, moving, relative)
        })
    }

    /// Non-destructive probe: materialize `block` at a scratch range, read
    /// its shape, control tags, and a rendered preview, then revert the
    /// scratch operations. The document is unchanged afterwards.
    pub fn read_block_info(&mut self, block: &BlockContent) -> Result<BlockInfo, EngineError> {
        debug!("read_block_info block={}", block.name);
        run_guarded(&mut self.host, |host| {
            let block = normalized(block);
            with_scratch(host, &block, |_, info| {
                Ok(BlockInfo {
                    shape: info.shape,
                    control_tags: info.control_tags.clone(),
                    preview: info.preview.clone(),
                })
            })
        })
    }
}

fn insert_block_inner<H: DocumentHost>(
    host: &mut H,
    bookmarks: &mut BookmarkRegistry,
    block: &BlockContent,
    name: &str,
    anchor: Span,
) -> Result<Vec<String>, EngineError> {
    if anchor.end > host.len() {
        return Err(EngineError::Host(HostError::OutOfBounds {
            position: anchor.end,
            len: host.len(),
        }));
    }
    bookmarks.refresh(host);
    let at = anchor.start;
    if !anchor.is_empty() {
        // replace-by-typing: clear the selected range, collapse to its start
        host.delete_span(anchor)?;
        bookmarks.refresh(host);
    }
    if let Some(control) = structure::control_containing(host, Span::caret(at)) {
        return Err(EngineError::InvariantViolation(format!(
            "insertion point {at} lies inside content control \"{}\"",
            control.tag
        )));
    }
    let block = normalized(block);
    let info = with_scratch(host, &block, |_, info| Ok(info.clone()))?;
    let span = place_block(host, bookmarks, &block, name, at, info.shape)?;
    Ok(host
        .controls_in(span)
        .into_iter()
        .map(|control| control.tag)
        .collect())
}

/// Splice `block` at `at` according to the destination classification and
/// point `name` at the result, re-pinning any bookmark that shared the
/// destination boundary.
fn place_block<H: DocumentHost>(
    host: &mut H,
    bookmarks: &mut BookmarkRegistry,
    block: &BlockContent,
    name: &str,
    at: usize,
    shape: BlockShape,
) -> Result<Span, EngineError> {
    let destination = structure::destination_for(host, at, shape);
    debug!("placing {shape:?} content at {at} as {destination:?}");
    let span = match destination {
        Destination::Flow => {
            let following = structure::bookmark_starting_at(bookmarks, at)
                .map(|(n, _)| n)
                .filter(|n| n.as_str() != name);
            let span = host.insert_content(at, block)?;
            bookmarks.refresh(host);
            if let Some(following) = following
                && let Some(current) = bookmarks.lookup(&following)
            {
                // the bookmark that started here now starts right after the
                // new content
                let end = current.end.max(span.end);
                bookmarks.redefine(host, &following, Span::new(span.end, end))?;
            }
            span
        }
        Destination::SharedRow { table, index } => {
            let span = host.insert_row(table.span.start, index, block)?;
            bookmarks.refresh(host);
            span
        }
        Destination::DedicatedTable { inside } => {
            let preceding = structure::bookmark_ending_at(bookmarks, at)
                .map(|(n, _)| n)
                .filter(|n| n.as_str() != name);
            let span = match inside {
                Some(context) if context.span.strictly_contains(at) => {
                    if !context.rows.iter().any(|row| row.start == at) {
                        return Err(EngineError::InvariantViolation(format!(
                            "structured content cannot be spliced mid-row at position {at}"
                        )));
                    }
                    // escape the surrounding table with a transient break,
                    // splice the table, then drop the break again
                    let brk = host.insert_break(at)?;
                    let span = host.insert_content(at, block)?;
                    let stale = Span::new(brk.start + span.len(), brk.end + span.len());
                    host.delete_span(stale)?;
                    span
                }
                _ => host.insert_content(at, block)?,
            };
            bookmarks.refresh(host);
            if let Some(preceding) = preceding
                && let Some(current) = bookmarks.lookup(&preceding)
            {
                let start = current.start.min(span.start);
                bookmarks.redefine(host, &preceding, Span::new(start, span.start))?;
            }
            span
        }
    };
    bookmarks.redefine(host, name, span)?;
    Ok(span)
}

fn delete_inner<H: DocumentHost>(
    host: &mut H,
    bookmarks: &mut BookmarkRegistry,
    name: &str,
) -> Result<(), EngineError> {
    bookmarks.refresh(host);
    let Some(span) = bookmarks.lookup(name) else {
        debug!("delete_bookmark_and_content: {name} absent, nothing to do");
        return Ok(());
    };
    // registry entry goes first so no lookup ever sees soon-invalid content
    bookmarks.delete(host, name)?;
    if span.is_empty() {
        return Ok(());
    }
    match structure::rows_covered(host, span)? {
        Some((table, rows)) => host.delete_rows(table.span.start, rows)?,
        None => host.delete_span(span)?,
    }
    bookmarks.refresh(host);
    Ok(())
}

fn move_inner<H: DocumentHost>(
    host: &mut H,
    bookmarks: &mut BookmarkRegistry,
    scratch_name: &str,
    moving: &str,
    relative: &str,
) -> Result<(), EngineError> {
    if moving == relative {
        return Err(EngineError::InvariantViolation(
            "cannot move a bookmark relative to itself".to_string(),
        ));
    }
    bookmarks.refresh(host);
    let moving_span = bookmarks
        .lookup(moving)
        .ok_or_else(|| EngineError::BookmarkNotFound(moving.to_string()))?;
    let relative_span = bookmarks
        .lookup(relative)
        .ok_or_else(|| EngineError::BookmarkNotFound(relative.to_string()))?;
    if moving_span.overlaps(relative_span) || moving_span.strictly_contains(relative_span.start) {
        return Err(EngineError::InvariantViolation(format!(
            "ranges of {moving} {moving_span} and {relative} {relative_span} must be disjoint before a move"
        )));
    }
    let at = relative_span.start;
    if moving_span.is_empty() {
        bookmarks.redefine(host, moving, Span::caret(at))?;
        return Ok(());
    }
    let (block, shape) = capture_content(host, moving_span)?;
    // pin the source range through the destination insertion; the marker is
    // hidden from the registry by its name prefix
    host.create_marker(scratch_name, moving_span)?;
    let placed = place_block(host, bookmarks, &block, moving, at, shape);
    let source = host.marker_span(scratch_name);
    if source.is_some() {
        host.remove_marker(scratch_name)?;
    }
    placed?;
    let source = source.unwrap_or(moving_span);
    match structure::rows_covered(host, source)? {
        Some((table, rows)) => host.delete_rows(table.span.start, rows)?,
        None => host.delete_span(source)?,
    }
    bookmarks.refresh(host);
    Ok(())
}

/// Rebuild an insertable block from content already in the document.
fn capture_content<H: DocumentHost>(
    host: &H,
    span: Span,
) -> Result<(BlockContent, BlockShape), EngineError> {
    let controls: Vec<ControlTemplate> = host
        .controls_in(span)
        .into_iter()
        .map(|control| ControlTemplate {
            tag: control.tag,
            start: control.span.start - span.start,
            end: control.span.end - span.start,
        })
        .collect();
    match structure::rows_covered(host, span)? {
        Some((table, rows)) => {
            let texts: Vec<String> = table.rows[rows]
                .iter()
                .map(|row| {
                    let mut text = host.text_of(*row);
                    if text.ends_with(PARAGRAPH_BREAK) {
                        text.pop();
                    }
                    text
                })
                .collect();
            let shape = if texts.len() == 1 {
                BlockShape::Row
            } else {
                BlockShape::Table
            };
            let mut block = BlockContent::table("captured", texts);
            block.controls = controls;
            Ok((block, shape))
        }
        None => {
            let mut block = BlockContent::flow("captured", host.text_of(span));
            block.controls = controls;
            Ok((block, BlockShape::Flow))
        }
    }
}

/// Flow content always carries its own trailing paragraph boundary, so
/// sibling blocks stay exactly adjacent.
fn normalized(block: &BlockContent) -> BlockContent {
    match &block.body {
        BlockBody::Flow(text) if !text.ends_with(PARAGRAPH_BREAK) => {
            let mut block = block.clone();
            block.body = BlockBody::Flow(format!("{text}{PARAGRAPH_BREAK}"));
            block
        }
        _ => block.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::scratch::SequenceNamer;
    use super::*;
    use crate::host::MemoryDocument;

    fn engine() -> BlockEngine<MemoryDocument, SequenceNamer> {
        BlockEngine::with_namer(MemoryDocument::new(), SequenceNamer::default())
    }

    #[test]
    fn test_normalized_appends_paragraph_boundary() {
        let block = BlockContent::flow("f", "text");
        let normalized = normalized(&block);
        assert_eq!(normalized.body, BlockBody::Flow("text\n".to_string()));
    }

    #[test]
    fn test_normalized_leaves_terminated_flow_alone() {
        let block = BlockContent::flow("f", "text\n");
        assert_eq!(normalized(&block), block);
    }

    #[test]
    fn test_insert_flow_block_reports_control_tags() {
        let mut engine = engine();
        let block = BlockContent::flow("note", "status here\n").with_control("Status", 0, 6);

        let tags = engine.insert_block_at(&block, "n1", 0).unwrap();

        assert_eq!(tags, vec!["Status".to_string()]);
        assert_eq!(engine.bookmark_span("n1"), Some(Span::new(0, 12)));
    }

    #[test]
    fn test_insert_rejects_anchor_past_end() {
        let mut engine = engine();
        let block = BlockContent::flow("f", "x\n");

        let err = engine.insert_block_at(&block, "n", 5).unwrap_err();
        assert!(matches!(err, EngineError::Host(HostError::OutOfBounds { .. })));
    }

    #[test]
    fn test_insert_inside_control_rejected() {
        let mut engine = engine();
        let block = BlockContent::flow("f", "abcdef\n").with_control("Field", 1, 5);
        engine.insert_block_at(&block, "n1", 0).unwrap();

        let plain = BlockContent::flow("g", "oops\n");
        let err = engine.insert_block_at(&plain, "n2", 3).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
    }

    #[test]
    fn test_replace_by_typing_clears_anchor_range() {
        let mut engine = engine();
        engine
            .insert_block_at(&BlockContent::flow("f", "old content\n"), "n1", 0)
            .unwrap();

        let span = engine.bookmark_span("n1").unwrap();
        engine
            .insert_block(&BlockContent::flow("g", "new\n"), "n1", span)
            .unwrap();

        assert_eq!(engine.host().text(), "new\n");
        assert_eq!(engine.bookmark_span("n1"), Some(Span::new(0, 4)));
    }

    #[test]
    fn test_capture_content_round_trips_rows() {
        let mut engine = engine();
        let block = BlockContent::table("t", vec!["a\tb".to_string()]);
        engine.insert_block_at(&block, "item", 0).unwrap();

        let span = engine.bookmark_span("item").unwrap();
        let (captured, shape) = capture_content(engine.host(), span).unwrap();

        assert_eq!(shape, BlockShape::Row);
        assert_eq!(captured.body, BlockBody::Table(vec!["a\tb".to_string()]));
    }
}
