//! The current trace context.
//!
//! Each logical execution has a stack of contexts; the top of the stack is
//! the context new local work is parented to. The default realization keys
//! the stack off the OS thread, but the tracer only speaks to the
//! [`CurrentContext`] trait, so task-local or explicit-passing realizations
//! can be substituted.
use crate::TraceContext;
use log::warn;
use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

thread_local! {
    static STACK: RefCell<Vec<Option<TraceContext>>> = RefCell::new(Vec::new());
}

/// A pluggable slot tracking the context the executing code works in.
pub trait CurrentContext {
    /// Returns the context at the top of the stack, if any.
    ///
    /// A `None` may mean the stack is empty or that the top entry is a clear
    /// scope.
    fn get(&self) -> Option<TraceContext>;

    /// Pushes an entry onto the stack, returning a guard which restores the
    /// predecessor when closed.
    ///
    /// A `None` entry is a valid "clear" scope under which no context is
    /// current.
    fn new_scope(&self, context: Option<TraceContext>) -> Scope;
}

/// A guard object for an entry on the current-context stack.
///
/// The entry is popped and its predecessor restored when the guard drops.
/// Scopes must close in the reverse of the order they were opened; a scope
/// closed out of order is logged and the stack restored best-effort.
pub struct Scope {
    closer: Option<Box<dyn FnOnce()>>,
    // make sure this type is !Send since it pokes at thread locals
    _p: PhantomData<*const ()>,
}

unsafe impl Sync for Scope {}

impl Scope {
    /// Creates a scope from the callback which closes it.
    ///
    /// This is intended for use by custom `CurrentContext` realizations.
    pub fn new<F>(closer: F) -> Scope
    where
        F: FnOnce() + 'static,
    {
        Scope {
            closer: Some(Box::new(closer)),
            _p: PhantomData,
        }
    }

    /// Closes the scope, restoring the previous entry.
    ///
    /// This is equivalent to dropping the scope.
    pub fn close(self) {}
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
    }
}

/// The default `CurrentContext` realization, tracking a stack per OS thread.
pub struct ThreadLocalCurrent;

impl CurrentContext for ThreadLocalCurrent {
    fn get(&self) -> Option<TraceContext> {
        STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    fn new_scope(&self, context: Option<TraceContext>) -> Scope {
        let depth = STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(context);
            stack.len()
        });

        Scope::new(move || {
            STACK.with(|stack| {
                let mut stack = stack.borrow_mut();
                if stack.len() != depth {
                    warn!("trace scopes closed out of order");
                }
                stack.truncate(depth - 1);
            })
        })
    }
}

pin_project_lite::pin_project! {
    /// A future which makes a trace context current every time it is polled.
    ///
    /// This bridges the current-context stack into nonblocking runtimes,
    /// where many tasks interleave on one OS thread and a computation can
    /// migrate between threads across polls.
    pub struct Bind<F> {
        #[pin]
        future: F,
        context: TraceContext,
        current: Arc<dyn CurrentContext + Send + Sync>,
    }
}

impl<F> Bind<F> {
    pub(crate) fn new(
        current: Arc<dyn CurrentContext + Send + Sync>,
        context: TraceContext,
        future: F,
    ) -> Bind<F> {
        Bind {
            future,
            context,
            current,
        }
    }
}

impl<F> Future for Bind<F>
where
    F: Future,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = self.project();
        let _scope = this.current.new_scope(Some(this.context.clone()));
        this.future.poll(cx)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{SpanId, TraceId};

    fn context(span_id: u64) -> TraceContext {
        TraceContext::builder()
            .trace_id(TraceId::from(1))
            .span_id(SpanId::from(span_id))
            .build()
            .unwrap()
    }

    #[test]
    fn scopes_nest_lifo() {
        let current = ThreadLocalCurrent;
        assert_eq!(current.get(), None);

        let a = context(2);
        let b = context(3);

        let outer = current.new_scope(Some(a.clone()));
        assert_eq!(current.get(), Some(a.clone()));

        let inner = current.new_scope(Some(b.clone()));
        assert_eq!(current.get(), Some(b));

        inner.close();
        assert_eq!(current.get(), Some(a));

        outer.close();
        assert_eq!(current.get(), None);
    }

    #[test]
    fn clear_scope_masks_context() {
        let current = ThreadLocalCurrent;

        let a = context(2);
        let _outer = current.new_scope(Some(a.clone()));

        let clear = current.new_scope(None);
        assert_eq!(current.get(), None);

        clear.close();
        assert_eq!(current.get(), Some(a));
    }

    #[test]
    fn out_of_order_close_restores_best_effort() {
        let current = ThreadLocalCurrent;

        let a = context(2);
        let b = context(3);

        let outer = current.new_scope(Some(a));
        let inner = current.new_scope(Some(b));

        outer.close();
        assert_eq!(current.get(), None);

        inner.close();
        assert_eq!(current.get(), None);
    }
}
