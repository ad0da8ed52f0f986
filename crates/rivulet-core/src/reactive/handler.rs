//! Subscriptions
//!
//! A handler pairs the `on_value`/`on_error` callbacks of one `subscribe`
//! call with the derived reactive value returned to the subscriber. The parent
//! owns the handler. The derived value's cleanup holds the parent, so a
//! running subscription keeps its parent alive, and detaches the handler by id
//! once the derived value stops.

use super::{Cleanup, Fail, Producer, ReactiveValue, Settle, State};
use crate::{Error, Result, Value};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::warn;

pub(crate) type OnValue = Box<dyn Fn(Value) -> Result<Value>>;
pub(crate) type OnError = Box<dyn Fn(Error) -> Result<()>>;

pub(crate) struct Handler {
    id: u64,
    derived: ReactiveValue,
    /// Settle/fail handles of `derived`, available once its producer ran
    outlet: RefCell<Option<(Settle, Fail)>>,
    /// Settle `derived` with the mapped value; off for internal observers
    forwards_values: bool,
    on_value: OnValue,
    on_error: OnError,
}

impl Handler {
    pub(crate) fn new(
        id: u64,
        parent: &ReactiveValue,
        on_value: OnValue,
        on_error: OnError,
        forwards_values: bool,
    ) -> Rc<Self> {
        Rc::new_cyclic(|handler: &Weak<Handler>| {
            let handler = handler.clone();
            let parent_ref = Rc::downgrade(&parent.shared);
            let producer = Producer::new(move |settle, fail, _args| {
                if let Some(handler) = handler.upgrade() {
                    *handler.outlet.borrow_mut() = Some((settle, fail));
                }
                let parent = parent_ref.upgrade();
                Ok(Some(Cleanup::new(move || {
                    if let Some(parent) = parent {
                        ReactiveValue::from_shared(parent).detach(id);
                    }
                    Ok(())
                })))
            });

            Handler {
                id,
                derived: ReactiveValue::new(parent.scheduler().clone(), producer, Vec::new()),
                outlet: RefCell::new(None),
                forwards_values,
                on_value,
                on_error,
            }
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn derived(&self) -> &ReactiveValue {
        &self.derived
    }

    /// Check if the derived value can still be attached to its parent
    pub(crate) fn is_live(&self) -> bool {
        !self.derived.state().is_terminal()
    }

    /// Map a parent value into the derived value
    pub(crate) fn on_value(&self, value: Value) {
        let Some((settle, fail)) = self.outlet() else {
            return;
        };
        let outcome = match (self.on_value)(value) {
            Ok(mapped) if self.forwards_values => settle.call(mapped),
            Ok(_) => Ok(()),
            Err(error) => fail.call(error),
        };
        if let Err(error) = outcome {
            warn!(handler = self.id, %error, "derived value rejected mapped outcome");
        }
    }

    /// Report a parent failure; the derived value is canceled afterwards
    /// unless `on_error` itself fails
    pub(crate) fn on_error(&self, error: Error) {
        let Some((_, fail)) = self.outlet() else {
            return;
        };
        match (self.on_error)(error) {
            Ok(()) => self.derived.cancel(),
            Err(thrown) => {
                if let Err(error) = fail.call(thrown) {
                    warn!(handler = self.id, %error, "derived value rejected failure");
                }
            }
        }
    }

    pub(crate) fn cancel(&self) {
        self.derived.cancel();
    }

    fn outlet(&self) -> Option<(Settle, Fail)> {
        if self.derived.state() != State::Running {
            return None;
        }
        self.outlet.borrow().clone()
    }
}
