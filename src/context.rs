//! Per-thread propagation of the current span.
//!
//! Every thread carries its own scope: either no operation is in
//! progress, or a sampled span is current, or an unsampled operation is
//! in progress and everything under it stays unrecorded. Work hopping to
//! another thread must carry the scope explicitly, through
//! [`SpanContext`] + [`resume_span`] or through [`wrap`].
use super::receiver;
use super::spans::{fresh_id, Span, NO_PARENT};
use super::Sampler;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;

thread_local! {
    /// this thread's propagation state
    static SCOPE: RefCell<Scope> = RefCell::new(Scope::Idle);
}

#[derive(Debug, Clone)]
enum Scope {
    /// no operation in progress
    Idle,
    /// a sampled span is current
    Active(SpanContext),
    /// an unsampled operation is in progress
    Suppressed,
}

/// Cheap cloneable capture of an active span, used for read-only peeks
/// and for re-establishing the span as current on another thread.
#[derive(Debug, Clone)]
pub struct SpanContext {
    span_id: u64,
    trace_id: u64,
    description: Arc<str>,
}

impl SpanContext {
    fn of(span: &Span) -> Self {
        SpanContext {
            span_id: span.span_id(),
            trace_id: span.trace_id(),
            description: span.shared_description(),
        }
    }

    pub fn span_id(&self) -> u64 {
        self.span_id
    }

    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

enum HandleState {
    /// live span owned by this handle, not yet stopped
    Open { span: Span, saved: Scope },
    /// sampling declined; nothing allocated, nothing ever reported
    Suppressed { saved: Scope },
    Stopped,
}

/// Handle on one unit of work, returned by [`start_span`].
///
/// Stopping fixes the stop time, reports the span to every registered
/// receiver and restores whatever scope was current immediately before
/// the corresponding start, in that handle's thread. The handle stops
/// itself when dropped; extra [`stop`](SpanHandle::stop) calls are
/// no-ops. Handles are not `Send`: to follow work onto
/// another thread, capture [`context`](SpanHandle::context) and resume
/// it there.
pub struct SpanHandle {
    state: HandleState,
    _thread_bound: PhantomData<*const ()>,
}

/// Start a span in this thread's scope.
///
/// With a span already current the new one is its child and `sampler` is
/// not consulted (the decision was made at the root). With an idle scope
/// `sampler` decides between a fresh root and a suppressed handle. Under
/// a suppressed scope the handle is suppressed as well, so instrumented
/// code never needs to check whether tracing is on.
pub fn start_span(description: &str, sampler: &dyn Sampler) -> SpanHandle {
    let previous = SCOPE.with(|scope| scope.borrow().clone());
    let state = match previous {
        Scope::Active(parent) => {
            let span = Span::new(fresh_id(), parent.span_id, parent.trace_id, description);
            HandleState::Open {
                span,
                saved: Scope::Active(parent),
            }
        }
        Scope::Idle => {
            if sampler.should_sample() {
                let trace_id = fresh_id();
                let span = Span::new(fresh_id(), NO_PARENT, trace_id, description);
                HandleState::Open {
                    span,
                    saved: Scope::Idle,
                }
            } else {
                HandleState::Suppressed { saved: Scope::Idle }
            }
        }
        Scope::Suppressed => HandleState::Suppressed {
            saved: Scope::Suppressed,
        },
    };
    SCOPE.with(|scope| {
        *scope.borrow_mut() = match &state {
            HandleState::Open { span, .. } => Scope::Active(SpanContext::of(span)),
            _ => Scope::Suppressed,
        }
    });
    SpanHandle {
        state,
        _thread_bound: PhantomData,
    }
}

/// Read-only peek at this thread's current span, if a sampled one is
/// active.
pub fn current_span() -> Option<SpanContext> {
    SCOPE.with(|scope| match &*scope.borrow() {
        Scope::Active(context) => Some(context.clone()),
        _ => None,
    })
}

/// Is a sampled span current in this thread?
pub fn is_tracing() -> bool {
    SCOPE.with(|scope| matches!(&*scope.borrow(), Scope::Active(_)))
}

impl SpanHandle {
    /// Stop the span: fix its stop time, restore the scope saved at
    /// start and report to every registered receiver. Idempotent.
    pub fn stop(&mut self) {
        match mem::replace(&mut self.state, HandleState::Stopped) {
            HandleState::Open { mut span, saved } => {
                span.finish();
                SCOPE.with(|scope| *scope.borrow_mut() = saved);
                receiver::report(&span);
            }
            HandleState::Suppressed { saved } => {
                SCOPE.with(|scope| *scope.borrow_mut() = saved);
            }
            HandleState::Stopped => {}
        }
    }

    /// Capture the span for a cross-thread hop. `None` once stopped and
    /// for suppressed handles.
    pub fn context(&self) -> Option<SpanContext> {
        match &self.state {
            HandleState::Open { span, .. } => Some(SpanContext::of(span)),
            _ => None,
        }
    }

    /// Does this handle carry a span that will be reported?
    pub fn is_recording(&self) -> bool {
        matches!(&self.state, HandleState::Open { .. })
    }

    /// Attach a key/value annotation. Ignored on suppressed or stopped
    /// handles.
    pub fn add_kv_annotation(&mut self, key: &str, value: &str) {
        if let HandleState::Open { span, .. } = &mut self.state {
            span.annotate(key, value);
        }
    }

    /// Attach a timestamped message. Ignored on suppressed or stopped
    /// handles.
    pub fn add_timeline_annotation(&mut self, message: &str) {
        if let HandleState::Open { span, .. } = &mut self.state {
            span.mark(message);
        }
    }
}

impl Drop for SpanHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Guard established by [`resume_span`]. Closing restores whatever scope
/// this thread had before the resume; the span itself still belongs to
/// the handle on its originating thread and is never reported from here.
pub struct ResumedSpan {
    saved: Option<Scope>,
    _thread_bound: PhantomData<*const ()>,
}

/// Re-establish a captured span as current in this thread, so work
/// dispatched across a thread or task boundary parents correctly.
pub fn resume_span(parent: &SpanContext) -> ResumedSpan {
    let saved = SCOPE.with(|scope| {
        mem::replace(&mut *scope.borrow_mut(), Scope::Active(parent.clone()))
    });
    ResumedSpan {
        saved: Some(saved),
        _thread_bound: PhantomData,
    }
}

impl ResumedSpan {
    /// Restore the pre-resume scope. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if let Some(saved) = self.saved.take() {
            SCOPE.with(|scope| *scope.borrow_mut() = saved);
        }
    }
}

impl Drop for ResumedSpan {
    fn drop(&mut self) {
        self.close();
    }
}

/// Capture this thread's entire scope, suppression included, and
/// re-establish it around `f` wherever `f` later runs. This is the
/// convenient form of [`resume_span`] for handing closures to thread
/// pools, and the only form that also carries a "do not sample"
/// decision across threads.
pub fn wrap<F, R>(f: F) -> impl FnOnce() -> R
where
    F: FnOnce() -> R,
{
    let captured = SCOPE.with(|scope| scope.borrow().clone());
    move || {
        let saved = SCOPE.with(|scope| mem::replace(&mut *scope.borrow_mut(), captured));
        let result = f();
        SCOPE.with(|scope| *scope.borrow_mut() = saved);
        result
    }
}
