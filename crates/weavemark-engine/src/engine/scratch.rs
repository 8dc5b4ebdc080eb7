use uuid::Uuid;

use crate::error::EngineError;
use crate::geometry::Span;
use crate::host::{BlockContent, DocumentHost, PARAGRAPH_BREAK};
use crate::structure::{self, BlockShape};

/// Source of names for engine-internal markers. Injected rather than global
/// so tests can run with a deterministic sequence.
pub trait ScratchNamer {
    fn next_name(&mut self) -> String;
}

/// Default namer; every name is unique across sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidNamer;

impl ScratchNamer for UuidNamer {
    fn next_name(&mut self) -> String {
        format!("_wm_{}", Uuid::new_v4().simple())
    }
}

/// Deterministic namer for tests and benchmarks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceNamer {
    next: u64,
}

impl ScratchNamer for SequenceNamer {
    fn next_name(&mut self) -> String {
        let name = format!("_scratch_{}", self.next);
        self.next += 1;
        name
    }
}

/// What a scratch materialization revealed about a block.
#[derive(Debug, Clone)]
pub(crate) struct ScratchInfo {
    pub shape: BlockShape,
    pub control_tags: Vec<String>,
    pub preview: String,
}

impl ScratchInfo {
    fn collect<H: DocumentHost>(host: &H, span: Span) -> Self {
        let shape = if structure::is_whole_table_item(host, span) {
            BlockShape::Table
        } else if structure::row_containing(host, span).is_some() {
            BlockShape::Row
        } else {
            BlockShape::Flow
        };
        let control_tags = host
            .controls_in(span)
            .into_iter()
            .map(|control| control.tag)
            .collect();
        let preview = host.text_of(span).trim_end().to_string();
        Self {
            shape,
            control_tags,
            preview,
        }
    }
}

/// Materialize `block` at the end of the document, hand the result to
/// `inspect`, and revert the scratch operations before returning.
///
/// The materialization is exactly two structural operations: the paragraph
/// scaffold separating the scratch range from real content, and the content
/// splice itself. Both are reverted through the host's undo primitive on
/// every exit path, including when `inspect` fails.
pub(crate) fn with_scratch<H: DocumentHost, T>(
    host: &mut H,
    block: &BlockContent,
    inspect: impl FnOnce(&H, &ScratchInfo) -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let depth_before = host.undo_depth();
    let result = materialize(host, block).and_then(|info| inspect(host, &info));
    let performed = host.undo_depth().saturating_sub(depth_before);
    let cleanup = if performed > 0 {
        host.undo(performed).map_err(EngineError::Host)
    } else {
        Ok(())
    };
    match (result, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), _) => Err(err),
    }
}

fn materialize<H: DocumentHost>(
    host: &mut H,
    block: &BlockContent,
) -> Result<ScratchInfo, EngineError> {
    host.insert_text(host.len(), &PARAGRAPH_BREAK.to_string())?;
    let span = host.insert_content(host.len(), block)?;
    Ok(ScratchInfo::collect(host, span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryDocument;

    #[test]
    fn test_scratch_reverts_document_completely() {
        let mut host = MemoryDocument::from_text("existing content\n");
        host.create_marker("keep", Span::new(0, 8)).unwrap();
        let len_before = host.len();
        let block = BlockContent::table("t", vec!["a".to_string(), "b".to_string()]);

        let shape = with_scratch(&mut host, &block, |_, info| Ok(info.shape)).unwrap();

        assert_eq!(shape, BlockShape::Table);
        assert_eq!(host.len(), len_before);
        assert_eq!(host.text(), "existing content\n");
        assert!(host.tables().is_empty());
        assert_eq!(host.marker_span("keep"), Some(Span::new(0, 8)));
        assert_eq!(host.undo_depth(), 0);
    }

    #[test]
    fn test_scratch_reverts_on_inspect_failure() {
        let mut host = MemoryDocument::from_text("text\n");
        let len_before = host.len();
        let block = BlockContent::flow("f", "scratch\n");

        let result: Result<(), _> = with_scratch(&mut host, &block, |_, _| {
            Err(EngineError::InvariantViolation("inspection failed".into()))
        });

        assert!(result.is_err());
        assert_eq!(host.len(), len_before);
        assert_eq!(host.undo_depth(), 0);
    }

    #[test]
    fn test_scratch_classifies_single_row_block() {
        let mut host = MemoryDocument::new();
        let block = BlockContent::table("t", vec!["only row".to_string()]);

        let shape = with_scratch(&mut host, &block, |_, info| Ok(info.shape)).unwrap();
        assert_eq!(shape, BlockShape::Row);
    }

    #[test]
    fn test_scratch_reports_controls_and_preview() {
        let mut host = MemoryDocument::new();
        let block = BlockContent::flow("f", "hello world\n").with_control("Greeting", 0, 5);

        let (tags, preview) = with_scratch(&mut host, &block, |_, info| {
            Ok((info.control_tags.clone(), info.preview.clone()))
        })
        .unwrap();

        assert_eq!(tags, vec!["Greeting".to_string()]);
        assert_eq!(preview, "hello world");
    }

    #[test]
    fn test_sequence_namer_is_deterministic() {
        let mut namer = SequenceNamer::default();
        assert_eq!(namer.next_name(), "_scratch_0");
        assert_eq!(namer.next_name(), "_scratch_1");
    }

    #[test]
    fn test_uuid_namer_yields_hidden_unique_names() {
        let mut namer = UuidNamer;
        let a = namer.next_name();
        let b = namer.next_name();
        assert_ne!(a, b);
        assert!(a.starts_with('_'));
    }
}
