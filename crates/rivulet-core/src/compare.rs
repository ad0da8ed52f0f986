//! Structural equality of reactive values
//!
//! Two reactive values are considered the same computation when they were
//! built from the same producer with equivalent arguments. Resolvers rely on
//! this to keep an existing subscription alive instead of restarting work.

use crate::{ReactiveValue, Value};

/// Check if `a` and `b` describe the same computation
///
/// True when both share a producer, have the same number of arguments, and
/// every argument pair is either identical, two reactive values that compare
/// equal recursively, or two lists/maps with the same keys holding identical
/// entries.
pub fn compare(a: &ReactiveValue, b: &ReactiveValue) -> bool {
    if !a.producer().same(b.producer()) {
        return false;
    }
    let (a_args, b_args) = (a.args(), b.args());
    a_args.len() == b_args.len()
        && a_args
            .iter()
            .zip(b_args)
            .all(|(x, y)| equivalent_args(x, y))
}

fn equivalent_args(a: &Value, b: &Value) -> bool {
    if a.is_identical(b) {
        return true;
    }
    match (a, b) {
        (Value::Reactive(a), Value::Reactive(b)) => compare(a, b),
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.is_identical(y))
        }
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| x.is_identical(y)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Producer, SchedulerRef, TaskQueue};
    use std::rc::Rc;

    fn noop() -> Producer {
        Producer::new(|_, _, _| Ok(None))
    }

    fn reactive(scheduler: &SchedulerRef, producer: &Producer, args: Vec<Value>) -> ReactiveValue {
        ReactiveValue::new(scheduler.clone(), producer.clone(), args)
    }

    #[test]
    fn test_different_producers() {
        let scheduler: SchedulerRef = Rc::new(TaskQueue::new());
        let a = reactive(&scheduler, &noop(), Vec::new());
        let b = reactive(&scheduler, &noop(), Vec::new());

        assert!(!compare(&a, &b));
        assert!(compare(&a, &a));
    }

    #[test]
    fn test_different_argument_counts() {
        let scheduler: SchedulerRef = Rc::new(TaskQueue::new());
        let producer = noop();
        let a = reactive(&scheduler, &producer, vec![1.into(), 2.into()]);
        let b = reactive(&scheduler, &producer, vec![1.into(), 2.into(), 3.into()]);

        assert!(!compare(&a, &b));
    }

    #[test]
    fn test_different_plain_arguments() {
        let scheduler: SchedulerRef = Rc::new(TaskQueue::new());
        let producer = noop();
        let a = reactive(&scheduler, &producer, vec![Value::map([("a", 1)])]);
        let others = [
            Value::map([("a", 2)]),
            Value::map([("a", 1), ("b", 2)]),
            Value::Null,
            Value::Int(1),
            Value::list([1]),
        ];

        for other in others {
            let b = reactive(&scheduler, &producer, vec![other.clone()]);
            assert!(!compare(&a, &b), "expected {} to differ", other);
        }
    }

    #[test]
    fn test_different_reactive_arguments() {
        let scheduler: SchedulerRef = Rc::new(TaskQueue::new());
        let producer = noop();
        let a = reactive(
            &scheduler,
            &producer,
            vec![reactive(&scheduler, &noop(), Vec::new()).into()],
        );
        let b = reactive(
            &scheduler,
            &producer,
            vec![reactive(&scheduler, &noop(), Vec::new()).into()],
        );

        assert!(!compare(&a, &b));
    }

    #[test]
    fn test_equivalent_arguments() {
        let scheduler: SchedulerRef = Rc::new(TaskQueue::new());
        let producer = noop();
        let args = || {
            vec![
                Value::Int(1),
                Value::map([("a", 1), ("b", 2)]),
                reactive(&scheduler, &producer, Vec::new()).into(),
            ]
        };
        let a = reactive(&scheduler, &producer, args());
        let b = reactive(&scheduler, &producer, args());

        assert!(compare(&a, &b));
    }

    #[test]
    fn test_containers_compare_entries_by_identity() {
        let scheduler: SchedulerRef = Rc::new(TaskQueue::new());
        let producer = noop();
        let shared = Value::list([1, 2]);
        let a = reactive(&scheduler, &producer, vec![Value::list([shared.clone()])]);
        let b = reactive(&scheduler, &producer, vec![Value::list([shared])]);
        let c = reactive(
            &scheduler,
            &producer,
            vec![Value::list([Value::list([1, 2])])],
        );

        assert!(compare(&a, &b));
        assert!(!compare(&a, &c));
    }
}
