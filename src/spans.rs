use lazy_static::lazy_static;
use std::sync::Arc;
use std::time::Instant;

/// `parent_id` value marking a span with no parent.
/// Span ids are never 0 so the sentinel can never collide.
pub const NO_PARENT: u64 = 0;

lazy_static! {
    // all timestamps count from here
    static ref EPOCH: Instant = Instant::now();
}

/// Nanoseconds elapsed on the process-local monotonic clock.
pub(crate) fn now_ns() -> u128 {
    EPOCH.elapsed().as_nanos()
}

/// Draw a random span or trace id from the nonzero 64 bit space.
pub(crate) fn fresh_id() -> u64 {
    loop {
        let id = rand::random::<u64>();
        if id != NO_PARENT {
            return id;
        }
    }
}

/// A key/value pair attached to a span while it was open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub key: String,
    pub value: String,
}

/// A timestamped message attached to a span while it was open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineAnnotation {
    pub time: u128,
    pub message: String,
}

/// One timed unit of work. Spans only escape the handle that owns them
/// once stopped; everything a receiver sees is immutable.
#[derive(Debug, Clone)]
pub struct Span {
    span_id: u64,
    parent_id: u64,
    trace_id: u64,
    description: Arc<str>,
    start_time: u128,
    stop_time: u128,
    annotations: Vec<Annotation>,
    timeline: Vec<TimelineAnnotation>,
}

impl Span {
    pub(crate) fn new(span_id: u64, parent_id: u64, trace_id: u64, description: &str) -> Self {
        Span {
            span_id,
            parent_id,
            trace_id,
            description: Arc::from(description),
            start_time: now_ns(),
            stop_time: 0,
            annotations: Vec::new(),
            timeline: Vec::new(),
        }
    }

    /// Fix the stop time. Only the first call has any effect.
    pub(crate) fn finish(&mut self) {
        if self.stop_time == 0 {
            self.stop_time = now_ns();
        }
    }

    pub(crate) fn annotate(&mut self, key: &str, value: &str) {
        self.annotations.push(Annotation {
            key: key.to_owned(),
            value: value.to_owned(),
        });
    }

    pub(crate) fn mark(&mut self, message: &str) {
        self.timeline.push(TimelineAnnotation {
            time: now_ns(),
            message: message.to_owned(),
        });
    }

    pub fn span_id(&self) -> u64 {
        self.span_id
    }

    /// Id of the span that was current when this one started,
    /// or [`NO_PARENT`].
    pub fn parent_id(&self) -> u64 {
        self.parent_id
    }

    /// Grouping id shared by every span of one logical operation.
    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn shared_description(&self) -> Arc<str> {
        self.description.clone()
    }

    /// Start timestamp, in nanoseconds on the process clock.
    pub fn start_time(&self) -> u128 {
        self.start_time
    }

    /// Stop timestamp; 0 while the span is still running.
    pub fn stop_time(&self) -> u128 {
        self.stop_time
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == NO_PARENT
    }

    /// Wall time covered by the span, 0 while still running.
    pub fn duration_ns(&self) -> u128 {
        self.stop_time.saturating_sub(self.start_time)
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn timeline(&self) -> &[TimelineAnnotation] {
        &self.timeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_nonzero() {
        for _ in 0..1000 {
            assert_ne!(fresh_id(), NO_PARENT);
        }
    }

    #[test]
    fn finish_is_write_once() {
        let mut span = Span::new(1, NO_PARENT, 7, "work");
        assert_eq!(span.stop_time(), 0);
        assert_eq!(span.duration_ns(), 0);
        span.finish();
        let stopped_at = span.stop_time();
        assert!(stopped_at >= span.start_time());
        span.finish();
        assert_eq!(span.stop_time(), stopped_at);
    }

    #[test]
    fn annotations_accumulate_in_order() {
        let mut span = Span::new(2, NO_PARENT, 7, "work");
        span.annotate("table", "users");
        span.annotate("rows", "3");
        span.mark("flushing");
        assert_eq!(span.annotations()[0].key, "table");
        assert_eq!(span.annotations()[1].value, "3");
        assert_eq!(span.timeline()[0].message, "flushing");
        assert!(span.timeline()[0].time >= span.start_time());
    }

    #[test]
    fn root_detection_uses_sentinel() {
        assert!(Span::new(3, NO_PARENT, 7, "root").is_root());
        assert!(!Span::new(4, 3, 7, "child").is_root());
    }
}
