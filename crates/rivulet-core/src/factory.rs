//! Curried constructors
//!
//! A [`Factory`] binds a producer and a scheduler once, so application code can
//! create reactive values from arguments alone. All values created by one
//! factory share its producer, which makes equal arguments structurally equal.

use crate::{Producer, ReactiveValue, SchedulerRef, Value};
use std::fmt;

/// Constructor of reactive values sharing one producer
///
/// # Example
///
/// ```
/// use rivulet_core::{compare, Factory, Producer, TaskQueue, Value};
/// use std::rc::Rc;
///
/// let queue = Rc::new(TaskQueue::new());
/// let square = Factory::new(
///     queue.clone(),
///     Producer::new(|settle, _fail, args| {
///         let n = args.first().and_then(Value::as_int).unwrap_or(0);
///         settle.call(n * n)?;
///         Ok(None)
///     }),
/// );
///
/// let a = square.create(vec![Value::Int(3)]);
/// let b = square.create(vec![Value::Int(3)]);
/// assert!(compare(&a, &b));
/// ```
#[derive(Clone)]
pub struct Factory {
    scheduler: SchedulerRef,
    producer: Producer,
}

impl Factory {
    /// Bind a producer to a scheduler
    pub fn new(scheduler: SchedulerRef, producer: Producer) -> Self {
        Self {
            scheduler,
            producer,
        }
    }

    /// The shared producer
    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    /// Create a reactive value from arguments
    pub fn create(&self, args: Vec<Value>) -> ReactiveValue {
        ReactiveValue::new(self.scheduler.clone(), self.producer.clone(), args)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("producer", &self.producer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TaskQueue;
    use std::rc::Rc;

    #[test]
    fn test_create_binds_producer_and_args() {
        let queue = Rc::new(TaskQueue::new());
        let producer = Producer::new(|_, _, _| Ok(None));
        let factory = Factory::new(queue.clone(), producer.clone());

        let args = vec![Value::map([("a", 1)]), Value::map([("b", 2)])];
        let reactive = factory.create(args.clone());

        assert!(reactive.producer().same(&producer));
        assert!(factory.producer().same(&producer));
        assert_eq!(reactive.args().len(), 2);
        assert!(reactive.args()[0].is_identical(&args[0]));
        assert!(reactive.args()[1].is_identical(&args[1]));
    }

    #[test]
    fn test_created_values_run_independently() {
        let queue = Rc::new(TaskQueue::new());
        let factory = Factory::new(
            queue.clone(),
            Producer::new(|settle, _, args| {
                settle.call(args[0].clone())?;
                Ok(None)
            }),
        );

        let a = factory.create(vec![Value::Int(1)]);
        let b = factory.create(vec![Value::Int(2)]);
        assert_eq!(a.last_value(), None);

        queue.run_pending().unwrap();
        assert_eq!(a.last_value(), Some(Value::Int(1)));
        assert_eq!(b.last_value(), Some(Value::Int(2)));

        let doubled = a.subscribe(
            |v| Ok(Value::from(v.as_int().unwrap_or(0) * 2)),
            |_| Ok(()),
        );
        queue.run_pending().unwrap();
        assert_eq!(doubled.last_value(), Some(Value::Int(2)));
        assert_eq!(b.last_value(), Some(Value::Int(2)));
    }
}
