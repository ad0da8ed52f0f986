//! Resolution of a single nested reactive value

use super::Sink;
use crate::{compare, Error, ReactiveValue, Value};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::debug;

#[derive(Default)]
struct Tracking {
    /// Dependency currently subscribed to
    tracked: Option<ReactiveValue>,
    /// Derived value of our subscription to `tracked`
    subscription: Option<ReactiveValue>,
    /// Last value `tracked` produced
    last_value: Option<Value>,
}

/// Tracks at most one nested reactive value, reusing it across resolutions
/// as long as the candidates stay structurally equal
pub(crate) struct SingleResolver {
    sink: Sink,
    this: Weak<SingleResolver>,
    tracking: RefCell<Tracking>,
}

impl SingleResolver {
    pub(crate) fn new(sink: Sink) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            sink,
            this: this.clone(),
            tracking: RefCell::new(Tracking::default()),
        })
    }

    pub(crate) fn resolve(&self, candidate: ReactiveValue) {
        let reuse = {
            let tracking = self.tracking.borrow();
            match &tracking.tracked {
                Some(tracked) if compare(&candidate, tracked) => {
                    Some((candidate.ptr_eq(tracked), tracking.last_value.clone()))
                }
                _ => None,
            }
        };

        if let Some((identical, last_value)) = reuse {
            debug!(identical, "reusing equivalent dependency");
            if !identical {
                candidate.cancel();
            }
            if let Some(value) = last_value {
                self.sink.value(value);
            }
            return;
        }

        self.dispose();
        debug!("subscribing to dependency");
        let on_value = self.this.clone();
        let on_error = self.this.clone();
        let subscription = candidate.observe(
            move |value| {
                if let Some(resolver) = on_value.upgrade() {
                    resolver.record(value);
                }
            },
            move |error| {
                if let Some(resolver) = on_error.upgrade() {
                    resolver.forward_error(error);
                }
            },
        );

        let mut tracking = self.tracking.borrow_mut();
        tracking.tracked = Some(candidate);
        tracking.subscription = Some(subscription);
    }

    /// Cancel the tracked dependency
    pub(crate) fn dispose(&self) {
        let Tracking {
            tracked,
            subscription,
            ..
        } = std::mem::take(&mut *self.tracking.borrow_mut());
        // Detach first so a failing teardown of `tracked` cannot reach the sink.
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
        if let Some(tracked) = tracked {
            tracked.cancel();
        }
    }

    fn record(&self, value: Value) {
        self.tracking.borrow_mut().last_value = Some(value.clone());
        self.sink.value(value);
    }

    fn forward_error(&self, error: Error) {
        // The failed dependency is finished; there is nothing left to cancel.
        self.tracking.replace(Tracking::default());
        self.sink.error(error);
    }
}
