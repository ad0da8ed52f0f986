//! Reactive values
//!
//! A [`ReactiveValue`] runs its producer once, on a later turn, and fans the
//! outcome out to its subscribers:
//!
//! ```text
//! (scheduled) --producer runs--> RUNNING
//! RUNNING --settle--> RUNNING    handlers.on_value, registration order
//! RUNNING --fail----> FAILING -> FAILED   handlers.on_error, reverse order
//! RUNNING --cancel--> CANCELED   handlers canceled, reverse order
//! ```
//!
//! Settled values pass through a dependency resolver first: nested reactive
//! values are subscribed to and only their plain results reach handlers.
//! Notifications are deferred through the [`Scheduler`](crate::Scheduler), and
//! several settlements within one turn collapse into the last one.

mod handler;
mod producer;


pub use producer::{Cleanup, Fail, Producer, Settle};

use crate::error::Operation;
use crate::resolve::{DependencyResolver, Sink};
use crate::scheduler::{SchedulerRef, TaskId};
use crate::{Error, Result, Value};
use handler::{Handler, OnError, OnValue};
use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, trace, warn};

/// Lifecycle state of a reactive value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// Producer is queued but has not run yet
    Scheduled,
    /// Producer ran; settlements are accepted
    Running,
    /// Failed; handlers are about to be notified
    Failing,
    /// Failed and handlers were notified
    Failed,
    /// Canceled
    Canceled,
}

impl State {
    /// Check if no further settlement can happen
    ///
    /// A failing value is terminal but can still be canceled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Failing | State::Failed | State::Canceled)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Scheduled => "scheduled",
            State::Running => "running",
            State::Failing => "failing",
            State::Failed => "failed",
            State::Canceled => "canceled",
        };
        f.write_str(name)
    }
}

/// A value computed once, asynchronously, by a producer
///
/// Cloning is cheap and yields another handle to the same instance. Dropping
/// the last handle of a value nobody subscribes to cancels it.
///
/// # Example
///
/// ```
/// use rivulet_core::{Producer, ReactiveValue, TaskQueue, Value};
/// use std::rc::Rc;
///
/// let queue = Rc::new(TaskQueue::new());
/// let five = ReactiveValue::new(
///     queue.clone(),
///     Producer::new(|settle, _fail, _args| {
///         settle.call(5)?;
///         Ok(None)
///     }),
///     Vec::new(),
/// );
/// let doubled = five.subscribe(
///     |value| Ok(Value::from(value.as_int().unwrap_or(0) * 2)),
///     |_error| Ok(()),
/// );
///
/// queue.run_pending().unwrap();
/// assert_eq!(doubled.last_value(), Some(Value::Int(10)));
/// ```
#[derive(Clone)]
pub struct ReactiveValue {
    shared: Rc<Shared>,
}

pub(crate) struct Shared {
    producer: Producer,
    args: Vec<Value>,
    scheduler: SchedulerRef,
    inner: RefCell<Inner>,
}

struct Inner {
    state: State,
    /// Queued start, notification or failure task
    pending: Option<TaskId>,
    last_value: Option<Value>,
    last_error: Option<Error>,
    handlers: Vec<Rc<Handler>>,
    next_handler_id: u64,
    cleanup: Option<Cleanup>,
    resolver: Option<Rc<DependencyResolver>>,
}

enum Replay {
    Nothing,
    Value(Value),
    Error(Error),
    Cancel,
}

impl ReactiveValue {
    /// Create a reactive value and queue its producer
    ///
    /// The producer runs on a later turn of `scheduler`, never inside `new`.
    pub fn new(scheduler: SchedulerRef, producer: Producer, args: Vec<Value>) -> Self {
        let shared = Rc::new_cyclic(|owner: &Weak<Shared>| Shared {
            producer,
            args,
            scheduler,
            inner: RefCell::new(Inner {
                state: State::Scheduled,
                pending: None,
                last_value: None,
                last_error: None,
                handlers: Vec::new(),
                next_handler_id: 0,
                cleanup: None,
                resolver: Some(Rc::new(DependencyResolver::new(owner_sink(owner)))),
            }),
        });
        let this = Self { shared };

        let starter = this.clone();
        let id = this.shared.scheduler.schedule(Box::new(move || starter.start()));
        this.inner_mut().pending = Some(id);
        this
    }

    pub(crate) fn from_shared(shared: Rc<Shared>) -> Self {
        Self { shared }
    }

    /// The producer this value was built from
    pub fn producer(&self) -> &Producer {
        &self.shared.producer
    }

    /// The construction arguments
    pub fn args(&self) -> &[Value] {
        &self.shared.args
    }

    /// The scheduler deferring this value's work
    pub fn scheduler(&self) -> &SchedulerRef {
        &self.shared.scheduler
    }

    /// Current lifecycle state
    pub fn state(&self) -> State {
        self.inner().state
    }

    /// Last value delivered to handlers
    pub fn last_value(&self) -> Option<Value> {
        self.inner().last_value.clone()
    }

    /// Error delivered to handlers, once failed
    pub fn last_error(&self) -> Option<Error> {
        let inner = self.inner();
        match inner.state {
            State::Failed => inner.last_error.clone(),
            _ => None,
        }
    }

    /// Check if a value was delivered at least once
    pub fn is_settled(&self) -> bool {
        self.inner().last_value.is_some()
    }

    /// Check if both handles refer to the same instance
    pub fn ptr_eq(&self, other: &ReactiveValue) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Subscribe to outcomes
    ///
    /// Returns a derived reactive value settling with whatever `on_value`
    /// returns for each delivered value. The derived value fails when either
    /// callback returns `Err`, and is canceled once `on_error` handled a
    /// failure or this value is canceled.
    ///
    /// A subscriber joining after a settlement receives the last value on a
    /// later turn; one joining after a failure receives the error.
    ///
    /// While the derived value runs it keeps this value alive, so a chain like
    /// `factory.create(args).subscribe(..)` needs no other handle.
    pub fn subscribe<V, E>(&self, on_value: V, on_error: E) -> ReactiveValue
    where
        V: Fn(Value) -> Result<Value> + 'static,
        E: Fn(Error) -> Result<()> + 'static,
    {
        self.register(Box::new(on_value), Box::new(on_error), true)
    }

    /// Subscribe without settling the derived value on each delivery
    pub(crate) fn observe<V, E>(&self, on_value: V, on_error: E) -> ReactiveValue
    where
        V: Fn(Value) + 'static,
        E: Fn(Error) + 'static,
    {
        self.register(
            Box::new(move |value| -> Result<Value> {
                on_value(value);
                Ok(Value::Null)
            }),
            Box::new(move |error| -> Result<()> {
                on_error(error);
                Ok(())
            }),
            false,
        )
    }

    fn register(
        &self,
        on_value: OnValue,
        on_error: OnError,
        forwards_values: bool,
    ) -> ReactiveValue {
        let id = {
            let mut inner = self.inner_mut();
            inner.next_handler_id += 1;
            inner.next_handler_id
        };
        let handler = Handler::new(id, self, on_value, on_error, forwards_values);
        let derived = handler.derived().clone();

        if self.state() == State::Canceled {
            handler.cancel();
            return derived;
        }

        let parent = self.clone();
        self.shared
            .scheduler
            .schedule(Box::new(move || parent.attach(handler)));
        derived
    }

    /// Cancel this value
    ///
    /// Teardown (dependency disposal and cleanup) runs before this returns,
    /// then every handler is canceled, most recent first. A failing cleanup
    /// turns the cancellation into a failure with the cleanup's error.
    /// Calling `cancel` again has no effect.
    pub fn cancel(&self) {
        if self.state() == State::Canceled {
            return;
        }
        if let Err(error) = self.teardown() {
            debug!(%error, "cleanup failed during cancel");
            self.fail_or_warn(error);
            return;
        }

        let handlers = {
            let mut inner = self.inner_mut();
            if inner.state == State::Canceled {
                return;
            }
            inner.state = State::Canceled;
            inner.handlers.clone()
        };
        debug!(handlers = handlers.len(), "canceled");
        for handler in handlers.iter().rev() {
            handler.cancel();
        }
    }

    fn start(&self) {
        {
            let mut inner = self.inner_mut();
            if inner.state != State::Scheduled {
                return;
            }
            inner.state = State::Running;
            inner.pending = None;
        }
        trace!(args = self.args().len(), "producer started");

        let owner = Rc::downgrade(&self.shared);
        let outcome = self
            .shared
            .producer
            .call(Settle::new(owner.clone()), Fail::new(owner), self.args());
        match outcome {
            Ok(cleanup) => self.install_cleanup(cleanup),
            Err(error) => self.fail_or_warn(error),
        }
    }

    fn install_cleanup(&self, cleanup: Option<Cleanup>) {
        let Some(cleanup) = cleanup else {
            return;
        };
        let state = self.state();
        if state == State::Running {
            self.inner_mut().cleanup = Some(cleanup);
            return;
        }

        // The producer stopped this value before returning its cleanup.
        debug!(%state, "running cleanup of a stopped producer");
        if let Err(error) = cleanup.run() {
            let mut inner = self.inner_mut();
            if inner.state == State::Failing {
                inner.last_error = Some(error);
            } else {
                drop(inner);
                warn!(%error, %state, "cleanup failed after producer stopped");
            }
        }
    }

    pub(crate) fn settle(&self, value: Value) -> Result<()> {
        let resolver = {
            let inner = self.inner();
            if inner.state != State::Running {
                return Err(Error::NotRunning {
                    op: Operation::Settle,
                    state: inner.state,
                });
            }
            inner.resolver.clone()
        };
        if let Some(resolver) = resolver {
            resolver.resolve(value);
        }
        Ok(())
    }

    pub(crate) fn fail(&self, error: Error) -> Result<()> {
        let state = self.state();
        if state != State::Running {
            return Err(Error::NotRunning {
                op: Operation::Fail,
                state,
            });
        }
        if let Err(cleanup_error) = self.teardown() {
            debug!(%error, %cleanup_error, "cleanup failed while failing");
            return self.fail(cleanup_error);
        }
        if self.state() != State::Running {
            // Cleanup stopped this value on its own.
            debug!(%error, "value stopped during teardown");
            return Ok(());
        }

        debug!(%error, "failing");
        let notifier = self.clone();
        let id = self
            .shared
            .scheduler
            .schedule(Box::new(move || notifier.notify_error()));
        let mut inner = self.inner_mut();
        inner.state = State::Failing;
        inner.last_error = Some(error);
        inner.pending = Some(id);
        Ok(())
    }

    fn fail_or_warn(&self, error: Error) {
        if let Err(misuse) = self.fail(error.clone()) {
            warn!(%error, %misuse, "failure dropped");
        }
    }

    /// Queue delivery of a fully resolved value, replacing any queued one
    fn deliver(&self, value: Value) {
        let previous = {
            let mut inner = self.inner_mut();
            if inner.state != State::Running {
                trace!(state = %inner.state, "resolved value dropped");
                return;
            }
            inner.pending.take()
        };
        if let Some(previous) = previous {
            self.shared.scheduler.cancel(previous);
        }

        let notifier = self.clone();
        let id = self
            .shared
            .scheduler
            .schedule(Box::new(move || notifier.notify_value(value)));
        self.inner_mut().pending = Some(id);
    }

    fn notify_value(&self, value: Value) {
        let handlers = {
            let mut inner = self.inner_mut();
            inner.pending = None;
            if inner.state != State::Running {
                return;
            }
            inner.last_value = Some(value.clone());
            inner.handlers.clone()
        };
        trace!(handlers = handlers.len(), "notifying value");
        for handler in &handlers {
            handler.on_value(value.clone());
        }
    }

    fn notify_error(&self) {
        let (handlers, error) = {
            let mut inner = self.inner_mut();
            inner.pending = None;
            if inner.state != State::Failing {
                return;
            }
            inner.state = State::Failed;
            (inner.handlers.clone(), inner.last_error.clone())
        };
        let Some(error) = error else {
            return;
        };
        trace!(handlers = handlers.len(), "notifying error");
        for handler in handlers.iter().rev() {
            handler.on_error(error.clone());
        }
    }

    /// Dispose dependencies and run the cleanup, leaving the state untouched
    fn teardown(&self) -> Result<()> {
        let (pending, resolver, cleanup) = {
            let mut inner = self.inner_mut();
            (
                inner.pending.take(),
                inner.resolver.take(),
                inner.cleanup.take(),
            )
        };
        if let Some(id) = pending {
            self.shared.scheduler.cancel(id);
        }
        if let Some(resolver) = resolver {
            resolver.dispose();
        }
        match cleanup {
            Some(cleanup) => cleanup.run(),
            None => Ok(()),
        }
    }

    fn attach(&self, handler: Rc<Handler>) {
        if !handler.is_live() {
            return;
        }
        let replay = {
            let mut inner = self.inner_mut();
            let state = inner.state;
            match state {
                State::Canceled => Replay::Cancel,
                _ => {
                    inner.handlers.push(handler.clone());
                    match state {
                        State::Running => inner
                            .last_value
                            .clone()
                            .map_or(Replay::Nothing, Replay::Value),
                        State::Failed => inner
                            .last_error
                            .clone()
                            .map_or(Replay::Nothing, Replay::Error),
                        _ => Replay::Nothing,
                    }
                }
            }
        };
        match replay {
            Replay::Nothing => {}
            Replay::Value(value) => handler.on_value(value),
            Replay::Error(error) => handler.on_error(error),
            Replay::Cancel => handler.cancel(),
        }
    }

    fn detach(&self, id: u64) {
        let detached = {
            let mut inner = self.inner_mut();
            inner
                .handlers
                .iter()
                .position(|handler| handler.id() == id)
                .map(|index| inner.handlers.remove(index))
        };
        drop(detached);
    }

    fn inner(&self) -> Ref<'_, Inner> {
        self.shared.inner.borrow()
    }

    fn inner_mut(&self) -> RefMut<'_, Inner> {
        self.shared.inner.borrow_mut()
    }
}

/// Resolver output routed back into the owning value
fn owner_sink(owner: &Weak<Shared>) -> Sink {
    let on_value = owner.clone();
    let on_error = owner.clone();
    Sink::new(
        move |value| {
            if let Some(shared) = on_value.upgrade() {
                ReactiveValue::from_shared(shared).deliver(value);
            }
        },
        move |error| {
            if let Some(shared) = on_error.upgrade() {
                ReactiveValue::from_shared(shared).fail_or_warn(error);
            }
        },
    )
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.state == State::Canceled {
            return;
        }
        inner.state = State::Canceled;
        let pending = inner.pending.take();
        let resolver = inner.resolver.take();
        let cleanup = inner.cleanup.take();
        let handlers = std::mem::take(&mut inner.handlers);

        if let Some(id) = pending {
            self.scheduler.cancel(id);
        }
        if let Some(resolver) = resolver {
            resolver.dispose();
        }
        if let Some(cleanup) = cleanup {
            debug!("running cleanup of a dropped value");
            if let Err(error) = cleanup.run() {
                warn!(%error, "cleanup failed while dropping");
            }
        }
        for handler in handlers.iter().rev() {
            handler.cancel();
        }
    }
}

impl PartialEq for ReactiveValue {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ReactiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ReactiveValue");
        debug.field("producer", &self.shared.producer);
        match self.shared.inner.try_borrow() {
            Ok(inner) => debug.field("state", &inner.state),
            Err(_) => debug.field("state", &"<borrowed>"),
        };
        debug.field("args", &self.shared.args.len()).finish()
    }
}
