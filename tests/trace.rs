//! Full pipeline: instrument concurrent work, collect the spans,
//! rebuild the forest and query it.
use rayon::prelude::*;
use serial_test::serial;
use std::sync::Arc;
use tracetree::{
    add_receiver, remove_receiver, resume_span, start_span, traced, wrap, AlwaysSampler,
    InMemoryReceiver, NeverSampler, Span, TraceTree, NO_PARENT,
};

fn collect_into<R>(op: impl FnOnce() -> R) -> Vec<Span> {
    let collector = Arc::new(InMemoryReceiver::new());
    add_receiver(collector.clone());
    op();
    let spans = collector.spans();
    assert!(remove_receiver(collector.as_ref()));
    spans
}

#[test]
#[serial]
fn two_operations_give_two_roots() {
    let spans = collect_into(|| {
        traced("creating table", &AlwaysSampler, || {
            let mut span = start_span("allocating regions", &AlwaysSampler);
            span.stop();
        });
        traced("doing put", &AlwaysSampler, || {});
    });
    assert_eq!(spans.len(), 3);

    let tree = TraceTree::build(spans);
    let mut roots: Vec<&str> = tree.roots().iter().map(|s| s.description()).collect();
    roots.sort_unstable();
    assert_eq!(roots, vec!["creating table", "doing put"]);

    // the two operations carry distinct trace ids
    let create = tree
        .roots()
        .iter()
        .find(|s| s.description() == "creating table")
        .unwrap();
    let put = tree
        .roots()
        .iter()
        .find(|s| s.description() == "doing put")
        .unwrap();
    assert_ne!(create.trace_id(), put.trace_id());
    assert_eq!(tree.children_of(create.span_id()).len(), 1);
    assert_eq!(
        tree.children_of(create.span_id())[0].trace_id(),
        create.trace_id()
    );
    assert!(tree.children_of(put.span_id()).is_empty());
}

#[test]
#[serial]
fn thread_fanout_keeps_one_root_and_m_children() {
    const WORKERS: usize = 8;
    let spans = collect_into(|| {
        let mut root = start_span("creating table", &AlwaysSampler);
        let handles: Vec<_> = (0..WORKERS)
            .map(|region| {
                // capture the scope while the root is current, then let
                // the workers interleave however they like
                let task = wrap(move || {
                    let mut span =
                        start_span(&format!("handling region {}", region), &AlwaysSampler);
                    span.stop();
                });
                std::thread::spawn(task)
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        root.stop();
    });
    assert_eq!(spans.len(), WORKERS + 1);

    let tree = TraceTree::build(spans);
    assert_eq!(tree.roots().len(), 1);
    let root = &tree.roots()[0];
    assert_eq!(root.description(), "creating table");
    assert_eq!(root.parent_id(), NO_PARENT);

    let children = tree.children_of(root.span_id());
    assert_eq!(children.len(), WORKERS);
    for child in children {
        assert!(child.description().starts_with("handling"));
        assert_eq!(child.trace_id(), root.trace_id());
        assert!(child.stop_time() >= child.start_time());
    }
    assert_eq!(tree.descendant_count(root.span_id()), WORKERS);
}

#[test]
#[serial]
fn pool_fanout_resumes_the_captured_root() {
    let spans = collect_into(|| {
        let mut root = start_span("bulk load", &AlwaysSampler);
        let root_context = root.context().unwrap();
        (0..16u64).into_par_iter().for_each(|batch| {
            let _parent = resume_span(&root_context);
            let mut span = start_span("handling batch", &AlwaysSampler);
            span.add_kv_annotation("batch", &batch.to_string());
            span.stop();
        });
        root.stop();
    });

    let tree = TraceTree::build(spans);
    assert_eq!(tree.roots().len(), 1);
    let root_id = tree.roots()[0].span_id();
    assert_eq!(tree.children_of(root_id).len(), 16);

    let mut batches: Vec<String> = tree
        .children_of(root_id)
        .iter()
        .map(|span| span.annotations()[0].value.clone())
        .collect();
    batches.sort_by_key(|value| value.parse::<u64>().unwrap());
    let expected: Vec<String> = (0..16u64).map(|batch| batch.to_string()).collect();
    assert_eq!(batches, expected);
}

#[test]
#[serial]
fn unsampled_operation_reports_nothing_anywhere() {
    let spans = collect_into(|| {
        let mut root = start_span("invisible op", &NeverSampler);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let task = wrap(|| {
                    let mut span = start_span("invisible worker", &AlwaysSampler);
                    span.add_timeline_annotation("still fine to call");
                    span.stop();
                });
                std::thread::spawn(task)
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        root.stop();
    });
    assert!(spans.is_empty());
    assert!(TraceTree::build(spans).is_empty());
}

#[test]
#[serial]
fn annotations_survive_collection_and_rebuild() {
    let spans = collect_into(|| {
        let mut span = start_span("doing put", &AlwaysSampler);
        span.add_kv_annotation("row", "r1");
        span.add_kv_annotation("family", "f");
        span.add_timeline_annotation("acquired row lock");
        span.stop();
    });

    let tree = TraceTree::build(spans);
    let root = &tree.roots()[0];
    assert_eq!(root.annotations().len(), 2);
    assert_eq!(root.annotations()[0].key, "row");
    assert_eq!(root.annotations()[0].value, "r1");
    assert_eq!(root.timeline().len(), 1);
    assert_eq!(root.timeline()[0].message, "acquired row lock");
    assert!(root.timeline()[0].time >= root.start_time());
    assert!(root.timeline()[0].time <= root.stop_time());
    assert!(root.duration_ns() > 0);
}
