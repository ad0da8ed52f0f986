//! Rivulet Core - Cancelable reactive values
//!
//! This crate provides a single-threaded reactive primitive:
//! - Reactive values (`ReactiveValue`) computed once by a producer, with
//!   repeated settlements, failure and cancellation
//! - Subscriptions returning derived reactive values
//! - Transparent resolution of nested reactive values, alone or inside lists
//!   and maps
//! - Structural equality (`compare`), so an equal dependency keeps running
//!   instead of being restarted
//! - An injectable `Scheduler`, with a FIFO `TaskQueue` for hosts and tests
//!
//! ## Deferral
//!
//! Producers, notifications and subscription replays never run inside the
//! call that caused them. They are queued on the scheduler and run on a later
//! turn, which the host drives with [`TaskQueue::run_pending`].
//!
//! ```
//! use rivulet_core::{Factory, Producer, TaskQueue, Value};
//! use std::rc::Rc;
//!
//! let queue = Rc::new(TaskQueue::new());
//! let user = Factory::new(
//!     queue.clone(),
//!     Producer::new(|settle, _fail, args| {
//!         settle.call(Value::map([("id", args[0].clone())]))?;
//!         Ok(None)
//!     }),
//! );
//!
//! let profile = user.create(vec![Value::Int(7)]);
//! let seen = profile.subscribe(|value| Ok(value), |_| Ok(()));
//! assert_eq!(seen.last_value(), None);
//!
//! queue.run_pending().unwrap();
//! assert_eq!(seen.last_value(), Some(Value::map([("id", 7)])));
//! ```

mod compare;
pub mod config;
mod error;
mod factory;
pub mod reactive;
mod resolve;
pub mod scheduler;
mod value;

pub use compare::compare;
pub use config::{QueueConfig, DEFAULT_MAX_TASKS_PER_FLUSH};
pub use error::{Error, Operation, Result};
pub use factory::Factory;
pub use reactive::{Cleanup, Fail, Producer, ReactiveValue, Settle, State};
pub use scheduler::{QueueStats, Scheduler, SchedulerRef, Task, TaskId, TaskQueue};
pub use value::{Value, ValueMap};
