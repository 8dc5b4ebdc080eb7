//! End-to-end lifecycle of work-item blocks: insert, order, delete, and the
//! bookmark bookkeeping that has to survive all of it.

use weavemark_engine::naming::bookmark_name;
use weavemark_engine::{
    BlockContent, BlockEngine, DocumentHost, EngineError, HostToggles, MemoryDocument,
    ScratchNamer, SequenceNamer, Span,
};

fn engine() -> BlockEngine<MemoryDocument, SequenceNamer> {
    BlockEngine::with_namer(MemoryDocument::new(), SequenceNamer::default())
}

fn item_block() -> BlockContent {
    // A single-row building block, the row-per-item representation.
    BlockContent::table("ItemTemplate", vec!["Title\tState".to_string()])
        .with_control("Title", 0, 5)
}

fn assert_disjoint<H: DocumentHost, N: ScratchNamer>(engine: &BlockEngine<H, N>) {
    let marks: Vec<(&str, Span)> = engine.bookmarks().iter().collect();
    for (i, (name_a, span_a)) in marks.iter().enumerate() {
        for (name_b, span_b) in marks.iter().skip(i + 1) {
            assert!(
                !span_a.overlaps(*span_b),
                "bookmarks {name_a} {span_a} and {name_b} {span_b} overlap"
            );
        }
    }
}

#[test]
fn test_work_item_scenario() {
    let mut engine = engine();
    let n100 = bookmark_name(0, 100);
    let n101 = bookmark_name(0, 101);

    // First item into the empty document.
    let tags = engine.insert_block_at(&item_block(), &n100, 0).unwrap();
    assert_eq!(tags, vec!["Title".to_string()]);
    assert_eq!(engine.bookmark_count(), 1);
    let span_100 = engine.bookmark_span(&n100).unwrap();
    assert_eq!(span_100, Span::new(0, 12));

    // Second item positioned after the first.
    engine
        .insert_block_after_bookmark(&item_block(), &n101, &n100)
        .unwrap();
    assert_eq!(engine.bookmark_count(), 2);
    let span_100 = engine.bookmark_span(&n100).unwrap();
    let span_101 = engine.bookmark_span(&n101).unwrap();
    assert!(
        span_100.end <= span_101.start,
        "items must sit in document order: {span_100} then {span_101}"
    );
    assert_disjoint(&engine);

    // Deleting the first item pulls the second back to the document start.
    engine.delete_bookmark_and_content(&n100).unwrap();
    assert_eq!(engine.bookmark_names(), vec![n101.clone()]);
    assert_eq!(engine.bookmark_span(&n101), Some(Span::new(0, 12)));

    // Moving relative to the deleted bookmark fails loudly.
    let err = engine
        .move_bookmark_and_content_to_before(&n101, &n100)
        .unwrap_err();
    assert!(matches!(err, EngineError::BookmarkNotFound(name) if name == n100));
}

#[test]
fn test_bookmark_count_conservation() {
    let mut engine = engine();
    let names: Vec<String> = (0..5).map(|i| bookmark_name(0, 100 + i)).collect();

    for name in &names {
        let at = engine.host().len();
        engine.insert_block_at(&item_block(), name, at).unwrap();
    }
    assert_eq!(engine.bookmark_count(), 5);
    assert_eq!(engine.host().tables().len(), 1, "siblings share one table");
    assert_disjoint(&engine);

    for name in &names {
        engine.delete_bookmark_and_content(name).unwrap();
    }

    assert_eq!(engine.bookmark_count(), 0);
    assert!(engine.host().tables().is_empty());
    assert!(engine.host().is_empty(), "matching deletes leave nothing behind");
}

#[test]
fn test_insert_before_bookmark_lands_ahead() {
    let mut engine = engine();
    let first = bookmark_name(0, 100);
    let earlier = bookmark_name(0, 99);

    engine.insert_block_at(&item_block(), &first, 0).unwrap();
    engine
        .insert_block_before_bookmark(&item_block(), &earlier, &first)
        .unwrap();

    let span_earlier = engine.bookmark_span(&earlier).unwrap();
    let span_first = engine.bookmark_span(&first).unwrap();
    assert_eq!(span_earlier, Span::new(0, 12));
    assert_eq!(span_first, Span::new(12, 24));
    assert_disjoint(&engine);
}

#[test]
fn test_insert_relative_to_missing_bookmark() {
    let mut engine = engine();
    let err = engine
        .insert_block_after_bookmark(&item_block(), "Q 0 W 1", "Q 0 W 0")
        .unwrap_err();
    assert!(matches!(err, EngineError::BookmarkNotFound(_)));
}

#[test]
fn test_delete_missing_bookmark_is_noop() {
    let mut engine = engine();
    engine.insert_block_at(&item_block(), "Q 0 W 1", 0).unwrap();

    engine.delete_bookmark_and_content("Q 0 W 999").unwrap();

    assert_eq!(engine.bookmark_count(), 1);
    assert_eq!(engine.host().tables().len(), 1);
}

#[test]
fn test_failed_insert_restores_toggles() {
    let mut engine = BlockEngine::with_namer(MemoryDocument::new(), SequenceNamer::default());
    // host toggles start at their defaults, all enabled
    let err = engine
        .insert_block_at(&item_block(), "Q 0 W 1", 42)
        .unwrap_err();

    assert!(matches!(err, EngineError::Host(_)));
    assert_eq!(engine.host().toggles(), HostToggles::default());
}

#[test]
fn test_mixed_flow_and_row_items_stay_disjoint() {
    let mut engine = engine();
    let summary = BlockContent::flow("Summary", "overview of the sprint\n");

    engine.insert_block_at(&item_block(), "Q 0 W 1", 0).unwrap();
    engine
        .insert_block_after_bookmark(&summary, "Q 0 W 2", "Q 0 W 1")
        .unwrap();
    engine
        .insert_block_after_bookmark(&item_block(), "Q 0 W 3", "Q 0 W 2")
        .unwrap();

    assert_eq!(engine.bookmark_count(), 3);
    assert_disjoint(&engine);

    // The flow item sits between the two row items.
    let row_1 = engine.bookmark_span("Q 0 W 1").unwrap();
    let flow = engine.bookmark_span("Q 0 W 2").unwrap();
    let row_3 = engine.bookmark_span("Q 0 W 3").unwrap();
    assert!(row_1.end <= flow.start);
    assert!(flow.end <= row_3.start);
}
