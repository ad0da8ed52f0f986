//! Dependency resolution
//!
//! Every value passed to `settle` goes through its owner's
//! [`DependencyResolver`], which picks one of three strategies:
//!
//! - plain values are forwarded as they are
//! - a reactive value is handed to a [`SingleResolver`], which subscribes to
//!   it and forwards its results
//! - a list or map holding reactive values at its top level is handed to a
//!   [`ContainerResolver`], which resolves each entry and forwards the plain
//!   snapshot once every entry settled
//!
//! Resolvers keep their subscriptions across settlements, so settling again
//! with a structurally equal dependency reuses the running computation instead
//! of restarting it.

mod container;
mod single;

pub(crate) use container::ContainerResolver;
pub(crate) use single::SingleResolver;

use crate::{Error, ReactiveValue, Value};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Callbacks receiving a resolver's output
#[derive(Clone)]
pub(crate) struct Sink {
    on_value: Rc<dyn Fn(Value)>,
    on_error: Rc<dyn Fn(Error)>,
}

impl Sink {
    pub(crate) fn new(on_value: impl Fn(Value) + 'static, on_error: impl Fn(Error) + 'static) -> Self {
        Self {
            on_value: Rc::new(on_value),
            on_error: Rc::new(on_error),
        }
    }

    pub(crate) fn value(&self, value: Value) {
        (self.on_value)(value)
    }

    pub(crate) fn error(&self, error: Error) {
        (self.on_error)(error)
    }
}

/// Shape of a settled value, deciding the resolution strategy
#[derive(Debug)]
pub(crate) enum Dependency {
    Plain(Value),
    Single(ReactiveValue),
    Container(Value),
}

impl Dependency {
    fn kind(&self) -> &'static str {
        match self {
            Dependency::Plain(_) => "plain",
            Dependency::Single(_) => "single",
            Dependency::Container(_) => "container",
        }
    }
}

/// Classify a settled value
pub(crate) fn classify(value: Value) -> Dependency {
    match value {
        Value::Reactive(reactive) => Dependency::Single(reactive),
        value if value.has_reactive_entry() => Dependency::Container(value),
        value => Dependency::Plain(value),
    }
}

enum Strategy {
    Plain,
    Single(Rc<SingleResolver>),
    Container(Rc<ContainerResolver>),
}

impl Strategy {
    fn kind(&self) -> &'static str {
        match self {
            Strategy::Plain => "plain",
            Strategy::Single(_) => "single",
            Strategy::Container(_) => "container",
        }
    }

    fn dispose(self) {
        match self {
            Strategy::Plain => {}
            Strategy::Single(resolver) => resolver.dispose(),
            Strategy::Container(resolver) => resolver.dispose(),
        }
    }
}

/// Dispatcher owned by each reactive value
pub(crate) struct DependencyResolver {
    sink: Sink,
    strategy: RefCell<Strategy>,
}

impl DependencyResolver {
    pub(crate) fn new(sink: Sink) -> Self {
        Self {
            sink,
            strategy: RefCell::new(Strategy::Plain),
        }
    }

    pub(crate) fn resolve(&self, value: Value) {
        let dependency = classify(value);
        let current = self.strategy.borrow().kind();
        if current != dependency.kind() {
            debug!(from = current, to = dependency.kind(), "switching resolution strategy");
        }

        match dependency {
            Dependency::Plain(value) => {
                self.dispose();
                self.sink.value(value);
            }
            Dependency::Single(reactive) => self.single().resolve(reactive),
            Dependency::Container(container) => self.container().resolve(container),
        }
    }

    pub(crate) fn dispose(&self) {
        let strategy = std::mem::replace(&mut *self.strategy.borrow_mut(), Strategy::Plain);
        strategy.dispose();
    }

    fn single(&self) -> Rc<SingleResolver> {
        if let Strategy::Single(resolver) = &*self.strategy.borrow() {
            return resolver.clone();
        }
        self.dispose();
        let resolver = SingleResolver::new(self.sink.clone());
        *self.strategy.borrow_mut() = Strategy::Single(resolver.clone());
        resolver
    }

    fn container(&self) -> Rc<ContainerResolver> {
        if let Strategy::Container(resolver) = &*self.strategy.borrow() {
            return resolver.clone();
        }
        self.dispose();
        let resolver = ContainerResolver::new(self.sink.clone());
        *self.strategy.borrow_mut() = Strategy::Container(resolver.clone());
        resolver
    }
}
