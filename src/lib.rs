// span records, ids, annotations
mod spans;
pub use spans::{Annotation, Span, TimelineAnnotation, NO_PARENT};
// should a new trace be recorded at all
mod sampler;
pub use sampler::{
    default_sampler, set_default_sampler, AlwaysSampler, NeverSampler, ProbabilitySampler,
    Sampler, SamplerError,
};
// per-thread propagation of the current span
mod context;
pub use context::{
    current_span, is_tracing, resume_span, start_span, wrap, ResumedSpan, SpanContext,
    SpanHandle,
};
// sinks collecting completed spans
mod receiver;
pub use receiver::{add_receiver, remove_receiver, InMemoryReceiver, SpanReceiver};
// offline reconstruction of the span forest
mod tree;
pub use tree::TraceTree;

/// Run `op` inside a root span stopped (and reported) when `op`
/// returns.
pub fn traced<R, F: FnOnce() -> R>(description: &str, sampler: &dyn Sampler, op: F) -> R {
    let mut span = start_span(description, sampler);
    let result = op();
    span.stop();
    result
}
