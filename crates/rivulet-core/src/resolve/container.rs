//! Resolution of lists and maps holding nested reactive values

use super::{SingleResolver, Sink};
use crate::{ReactiveValue, Value, ValueMap};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::trace;

/// Position of an entry in a list or map
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Key {
    Index(usize),
    Field(String),
}

/// Working copy of the container being resolved
#[derive(Debug)]
enum Snapshot {
    List(Vec<Value>),
    Map(ValueMap),
}

impl Snapshot {
    fn of(container: &Value) -> Option<Self> {
        match container {
            Value::List(list) => Some(Snapshot::List(list.as_ref().clone())),
            Value::Map(map) => Some(Snapshot::Map(map.as_ref().clone())),
            _ => None,
        }
    }

    fn reactive_entries(&self) -> Vec<(Key, ReactiveValue)> {
        match self {
            Snapshot::List(list) => list
                .iter()
                .enumerate()
                .filter_map(|(i, v)| v.as_reactive().map(|r| (Key::Index(i), r.clone())))
                .collect(),
            Snapshot::Map(map) => map
                .iter()
                .filter_map(|(k, v)| v.as_reactive().map(|r| (Key::Field(k.clone()), r.clone())))
                .collect(),
        }
    }

    fn set(&mut self, key: &Key, value: Value) {
        let slot = match (self, key) {
            (Snapshot::List(list), Key::Index(i)) => list.get_mut(*i),
            (Snapshot::Map(map), Key::Field(k)) => map.get_mut(k),
            _ => None,
        };
        if let Some(slot) = slot {
            *slot = value;
        }
    }

    fn is_settled(&self) -> bool {
        match self {
            Snapshot::List(list) => !list.iter().any(Value::is_reactive),
            Snapshot::Map(map) => !map.values().any(Value::is_reactive),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Snapshot::List(list) => Value::List(Rc::new(list.clone())),
            Snapshot::Map(map) => Value::Map(Rc::new(map.clone())),
        }
    }
}

#[derive(Default)]
struct ContainerState {
    resolvers: IndexMap<Key, Rc<SingleResolver>>,
    snapshot: Option<Snapshot>,
    /// Set while `resolve` walks the entries; delivery waits until it is done
    resolving: bool,
}

/// Fans a container out into one [`SingleResolver`] per reactive entry
pub(crate) struct ContainerResolver {
    sink: Sink,
    this: Weak<ContainerResolver>,
    state: RefCell<ContainerState>,
}

impl ContainerResolver {
    pub(crate) fn new(sink: Sink) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            sink,
            this: this.clone(),
            state: RefCell::new(ContainerState::default()),
        })
    }

    pub(crate) fn resolve(&self, container: Value) {
        let Some(snapshot) = Snapshot::of(&container) else {
            return;
        };
        let entries = snapshot.reactive_entries();
        let mut previous = {
            let mut state = self.state.borrow_mut();
            state.snapshot = Some(snapshot);
            state.resolving = true;
            std::mem::take(&mut state.resolvers)
        };

        let mut resolvers = IndexMap::with_capacity(entries.len());
        for (key, candidate) in entries {
            let resolver = match previous.shift_remove(&key) {
                Some(resolver) => resolver,
                None => self.entry_resolver(key.clone()),
            };
            resolvers.insert(key, resolver.clone());
            resolver.resolve(candidate);
        }

        for (key, stale) in previous {
            trace!(?key, "disposing resolver of removed entry");
            stale.dispose();
        }

        {
            let mut state = self.state.borrow_mut();
            state.resolvers = resolvers;
            state.resolving = false;
        }
        self.deliver_if_settled();
    }

    /// Cancel every nested dependency
    pub(crate) fn dispose(&self) {
        let resolvers = {
            let mut state = self.state.borrow_mut();
            state.snapshot = None;
            std::mem::take(&mut state.resolvers)
        };
        for resolver in resolvers.values() {
            resolver.dispose();
        }
    }

    fn entry_resolver(&self, key: Key) -> Rc<SingleResolver> {
        let on_value = self.this.clone();
        let on_error = self.this.clone();
        SingleResolver::new(Sink::new(
            move |value| {
                if let Some(container) = on_value.upgrade() {
                    container.settle_entry(&key, value);
                }
            },
            move |error| {
                if let Some(container) = on_error.upgrade() {
                    container.dispose();
                    container.sink.error(error);
                }
            },
        ))
    }

    fn settle_entry(&self, key: &Key, value: Value) {
        if let Some(snapshot) = self.state.borrow_mut().snapshot.as_mut() {
            snapshot.set(key, value);
        }
        self.deliver_if_settled();
    }

    fn deliver_if_settled(&self) {
        let ready = {
            let state = self.state.borrow();
            if state.resolving {
                return;
            }
            state
                .snapshot
                .as_ref()
                .filter(|snapshot| snapshot.is_settled())
                .map(Snapshot::to_value)
        };
        if let Some(value) = ready {
            self.sink.value(value);
        }
    }
}
