//! Producer calling convention
//!
//! A producer is invoked once, on a later turn, as `producer(settle, fail, args)`.
//! It may settle any number of times while running, fail once, and return a
//! [`Cleanup`] that runs when the reactive value stops running.

use super::{ReactiveValue, Shared};
use crate::{Error, Result, Value};
use std::fmt;
use std::rc::{Rc, Weak};

type ProducerFn = dyn Fn(Settle, Fail, &[Value]) -> Result<Option<Cleanup>>;

/// The function computing a reactive value
///
/// Producers are compared by identity: two reactive values built from clones
/// of the same `Producer` share a producer, two `Producer::new` calls never do.
#[derive(Clone)]
pub struct Producer(Rc<ProducerFn>);

impl Producer {
    /// Wrap a producer function
    ///
    /// Returning `Err` is equivalent to calling `fail` with that error.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Settle, Fail, &[Value]) -> Result<Option<Cleanup>> + 'static,
    {
        Self(Rc::new(f))
    }

    /// Check if both handles refer to the same producer function
    pub fn same(&self, other: &Producer) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }

    pub(crate) fn call(&self, settle: Settle, fail: Fail, args: &[Value]) -> Result<Option<Cleanup>> {
        (self.0)(settle, fail, args)
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Producer({:p})", self.addr())
    }
}

/// Teardown returned by a producer, run at most once
pub struct Cleanup(Box<dyn FnOnce() -> Result<()>>);

impl Cleanup {
    /// Wrap a teardown function
    pub fn new(f: impl FnOnce() -> Result<()> + 'static) -> Self {
        Self(Box::new(f))
    }

    pub(crate) fn run(self) -> Result<()> {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

/// Handle used by a producer to settle its reactive value
#[derive(Clone)]
pub struct Settle(Weak<Shared>);

impl Settle {
    pub(crate) fn new(shared: Weak<Shared>) -> Self {
        Self(shared)
    }

    /// Settle with a value
    ///
    /// Nested reactive values (directly, or at the top level of a list or
    /// map) are resolved before handlers are notified. Ownership of any
    /// nested reactive value passes to the settled instance, which may cancel
    /// it when it is a duplicate of a dependency it already tracks.
    ///
    /// Fails with [`Error::NotRunning`] once the value failed or was canceled.
    pub fn call(&self, value: impl Into<Value>) -> Result<()> {
        let shared = self.0.upgrade().ok_or(Error::Detached)?;
        ReactiveValue::from_shared(shared).settle(value.into())
    }
}

impl fmt::Debug for Settle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Settle")
    }
}

/// Handle used by a producer to fail its reactive value
#[derive(Clone)]
pub struct Fail(Weak<Shared>);

impl Fail {
    pub(crate) fn new(shared: Weak<Shared>) -> Self {
        Self(shared)
    }

    /// Fail with an error
    ///
    /// Runs teardown synchronously; handlers are notified on a later turn.
    /// Fails with [`Error::NotRunning`] once the value failed or was canceled.
    pub fn call(&self, error: Error) -> Result<()> {
        let shared = self.0.upgrade().ok_or(Error::Detached)?;
        ReactiveValue::from_shared(shared).fail(error)
    }
}

impl fmt::Debug for Fail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fail")
    }
}
