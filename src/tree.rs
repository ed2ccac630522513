//! Offline reconstruction of the span forest.
//!
//! Building is a single flat classification pass, not a graph walk: a
//! span whose parent id matches some span id in the input becomes that
//! parent's child, every other span is a root. "Root" therefore covers
//! both spans started with no parent and spans whose parent was dropped,
//! unsampled or lost in transit; the builder has no way to tell these
//! apart. Cycles between distinct ids are not
//! detected at build time: such spans end up in children lists only,
//! reachable through [`TraceTree::children_by_parent`] but absent from
//! [`TraceTree::roots`].
use super::spans::Span;
use either::Either;
use itertools::Itertools;
use std::collections::{HashMap, HashSet};

/// Queryable forest built from a flat collection of spans.
#[derive(Debug, Default)]
pub struct TraceTree {
    roots: Vec<Span>,
    children: HashMap<u64, Vec<Span>>,
}

impl TraceTree {
    /// Classify a snapshot of spans into roots and per-parent children
    /// lists. O(n) time and space.
    ///
    /// Every input span lands in exactly one place, so
    /// `roots().len() + children list sizes` always equals the input
    /// size. Per-parent lists keep the order spans had in the input;
    /// there is no ordering between different parents' lists. Feeding
    /// several spans with the same id is a caller error: all of them are
    /// kept, but which one wins any classification is undefined.
    pub fn build<I>(spans: I) -> TraceTree
    where
        I: IntoIterator<Item = Span>,
    {
        let spans: Vec<Span> = spans.into_iter().collect();
        let ids: HashSet<u64> = spans.iter().map(|span| span.span_id()).collect();
        let (roots, descendants): (Vec<Span>, Vec<Span>) =
            spans.into_iter().partition_map(|span| {
                if ids.contains(&span.parent_id()) {
                    Either::Right(span)
                } else {
                    Either::Left(span)
                }
            });
        let mut children: HashMap<u64, Vec<Span>> = HashMap::new();
        for span in descendants {
            children
                .entry(span.parent_id())
                .or_insert_with(Vec::new)
                .push(span);
        }
        TraceTree { roots, children }
    }

    /// Spans with no parent in the collection, in input order.
    pub fn roots(&self) -> &[Span] {
        &self.roots
    }

    /// Direct children of the given span, in input order. Empty for
    /// unknown ids and for leaves.
    pub fn children_of(&self, parent_id: u64) -> &[Span] {
        self.children
            .get(&parent_id)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    /// All non-empty `(parent id, children)` entries, in no particular
    /// order.
    pub fn children_by_parent(&self) -> impl Iterator<Item = (u64, &[Span])> + '_ {
        self.children
            .iter()
            .map(|(parent_id, list)| (*parent_id, list.as_slice()))
    }

    /// Every span reachable below the given id, computed on demand.
    /// Already-visited ids are skipped, so malformed cyclic input
    /// terminates instead of hanging.
    pub fn descendants_of(&self, span_id: u64) -> Vec<&Span> {
        let mut seen = HashSet::new();
        seen.insert(span_id);
        let mut pending = vec![span_id];
        let mut found = Vec::new();
        while let Some(id) = pending.pop() {
            for child in self.children_of(id) {
                if seen.insert(child.span_id()) {
                    pending.push(child.span_id());
                    found.push(child);
                }
            }
        }
        found
    }

    pub fn descendant_count(&self, span_id: u64) -> usize {
        self.descendants_of(span_id).len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.children.is_empty()
    }
}

impl std::iter::FromIterator<Span> for TraceTree {
    fn from_iter<I: IntoIterator<Item = Span>>(spans: I) -> Self {
        TraceTree::build(spans)
    }
}
