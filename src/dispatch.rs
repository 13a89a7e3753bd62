//! Record dispatchers: route each record to one or more downstream queues.

use crate::error::DispatchError;
use crate::queue::RecordQueue;
use crate::record::Record;

/// Chooses target queues for a record and enqueues it.
pub trait RecordDispatcher<P>: Send {
    /// Indices into [`queues`](Self::queues) that should receive `record`
    fn targets(&mut self, record: &Record<P>) -> Vec<usize>;

    fn queues(&self) -> &[RecordQueue<P>];

    /// Enqueue `record` into every target, returning how many received it.
    /// Zero means the record was dropped.
    fn dispatch(&mut self, record: Record<P>) -> usize
    where
        P: Clone,
    {
        let targets = self.targets(&record);
        let queues = self.queues();
        if let Some((&last, rest)) = targets.split_last() {
            for &index in rest {
                queues[index].push(record.clone());
            }
            queues[last].push(record);
        }
        targets.len()
    }
}

type Predicate<P> = Box<dyn Fn(&Record<P>) -> bool + Send>;

/// Sends each record to every queue whose predicate matches.
///
/// Predicates run in registration order and matching is not first-wins, so a
/// record can fan out to several interested consumers.
pub struct ContentBasedDispatcher<P> {
    predicates: Vec<Predicate<P>>,
    queues: Vec<RecordQueue<P>>,
}

impl<P> ContentBasedDispatcher<P> {
    pub fn builder() -> ContentBasedDispatcherBuilder<P> {
        ContentBasedDispatcherBuilder {
            predicates: Vec::new(),
            queues: Vec::new(),
        }
    }
}

impl<P: Send> RecordDispatcher<P> for ContentBasedDispatcher<P> {
    fn targets(&mut self, record: &Record<P>) -> Vec<usize> {
        self.predicates
            .iter()
            .enumerate()
            .filter(|(_, predicate)| predicate(record))
            .map(|(index, _)| index)
            .collect()
    }

    fn queues(&self) -> &[RecordQueue<P>] {
        &self.queues
    }
}

/// `when(...).dispatch_to(...)` chain for [`ContentBasedDispatcher`]
pub struct ContentBasedDispatcherBuilder<P> {
    predicates: Vec<Predicate<P>>,
    queues: Vec<RecordQueue<P>>,
}

impl<P> ContentBasedDispatcherBuilder<P> {
    pub fn when(
        self,
        predicate: impl Fn(&Record<P>) -> bool + Send + 'static,
    ) -> PendingRoute<P> {
        PendingRoute {
            builder: self,
            predicate: Box::new(predicate),
        }
    }

    /// Shorthand for a catch-all route, registered last
    pub fn otherwise(self, queue: RecordQueue<P>) -> Self {
        self.when(|_| true).dispatch_to(queue)
    }

    pub fn build(self) -> Result<ContentBasedDispatcher<P>, DispatchError> {
        if self.queues.is_empty() {
            return Err(DispatchError::NoQueues);
        }
        Ok(ContentBasedDispatcher {
            predicates: self.predicates,
            queues: self.queues,
        })
    }
}

/// A predicate waiting for its target queue
pub struct PendingRoute<P> {
    builder: ContentBasedDispatcherBuilder<P>,
    predicate: Predicate<P>,
}

impl<P> PendingRoute<P> {
    pub fn dispatch_to(mut self, queue: RecordQueue<P>) -> ContentBasedDispatcherBuilder<P> {
        self.builder.predicates.push(self.predicate);
        self.builder.queues.push(queue);
        self.builder
    }
}

/// Sends the i-th dispatched record to `queues[i % queues.len()]`.
pub struct RoundRobinDispatcher<P> {
    queues: Vec<RecordQueue<P>>,
    next: usize,
}

impl<P> RoundRobinDispatcher<P> {
    pub fn new(queues: Vec<RecordQueue<P>>) -> Result<Self, DispatchError> {
        if queues.is_empty() {
            return Err(DispatchError::NoQueues);
        }
        Ok(Self { queues, next: 0 })
    }
}

impl<P: Send> RecordDispatcher<P> for RoundRobinDispatcher<P> {
    fn targets(&mut self, _record: &Record<P>) -> Vec<usize> {
        let index = self.next;
        self.next = (self.next + 1) % self.queues.len();
        vec![index]
    }

    fn queues(&self) -> &[RecordQueue<P>] {
        &self.queues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Header, RecordMessage};
    use proptest::prelude::*;

    fn record(n: i64) -> Record<i64> {
        Record::new(Header::new(n.unsigned_abs() + 1, "numbers"), n)
    }

    fn payloads(queue: &RecordQueue<i64>) -> Vec<i64> {
        queue
            .drain()
            .into_iter()
            .filter_map(RecordMessage::into_record)
            .map(|r| *r.payload())
            .collect()
    }

    #[test]
    fn test_content_based_fans_out_to_all_matches() {
        let large = RecordQueue::new("large");
        let even = RecordQueue::new("even");
        let mut dispatcher = ContentBasedDispatcher::builder()
            .when(|r: &Record<i64>| *r.payload() > 10)
            .dispatch_to(large.clone())
            .when(|r: &Record<i64>| r.payload() % 2 == 0)
            .dispatch_to(even.clone())
            .build()
            .unwrap();

        assert_eq!(dispatcher.dispatch(record(12)), 2);
        assert_eq!(dispatcher.dispatch(record(11)), 1);
        assert_eq!(dispatcher.dispatch(record(4)), 1);
        assert_eq!(dispatcher.dispatch(record(3)), 0);

        assert_eq!(payloads(&large), vec![12, 11]);
        assert_eq!(payloads(&even), vec![12, 4]);
    }

    #[test]
    fn test_otherwise_catches_unmatched() {
        let odd = RecordQueue::new("odd");
        let rest = RecordQueue::new("rest");
        let mut dispatcher = ContentBasedDispatcher::builder()
            .when(|r: &Record<i64>| r.payload() % 2 != 0)
            .dispatch_to(odd.clone())
            .otherwise(rest.clone())
            .build()
            .unwrap();

        for n in 1..=4 {
            dispatcher.dispatch(record(n));
        }
        assert_eq!(payloads(&odd), vec![1, 3]);
        assert_eq!(payloads(&rest), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_empty_dispatchers_fail_at_construction() {
        let err = ContentBasedDispatcher::<i64>::builder().build().err();
        assert_eq!(err, Some(DispatchError::NoQueues));

        let err = RoundRobinDispatcher::<i64>::new(Vec::new()).err();
        assert_eq!(err, Some(DispatchError::NoQueues));
    }

    proptest! {
        #[test]
        fn prop_content_dispatch_matches_predicates(values in prop::collection::vec(-1000i64..1000, 0..64)) {
            let negative = RecordQueue::new("negative");
            let even = RecordQueue::new("even");
            let big = RecordQueue::new("big");
            let mut dispatcher = ContentBasedDispatcher::builder()
                .when(|r: &Record<i64>| *r.payload() < 0).dispatch_to(negative.clone())
                .when(|r: &Record<i64>| r.payload() % 2 == 0).dispatch_to(even.clone())
                .when(|r: &Record<i64>| r.payload().abs() > 500).dispatch_to(big.clone())
                .build()
                .unwrap();

            let mut dropped = 0;
            for &v in &values {
                let expected = [v < 0, v % 2 == 0, v.abs() > 500].iter().filter(|m| **m).count();
                let delivered = dispatcher.dispatch(record(v));
                prop_assert_eq!(delivered, expected);
                if delivered == 0 {
                    dropped += 1;
                }
            }

            let expect = |f: &dyn Fn(i64) -> bool| values.iter().copied().filter(|v| f(*v)).collect::<Vec<_>>();
            prop_assert_eq!(payloads(&negative), expect(&|v| v < 0));
            prop_assert_eq!(payloads(&even), expect(&|v| v % 2 == 0));
            prop_assert_eq!(payloads(&big), expect(&|v| v.abs() > 500));
            prop_assert_eq!(dropped, values.iter().filter(|v| **v >= 0 && **v % 2 != 0 && v.abs() <= 500).count());
        }

        #[test]
        fn prop_round_robin_is_fair(n in 0usize..200, m in 1usize..8) {
            let queues: Vec<RecordQueue<i64>> = (0..m).map(|i| RecordQueue::new(format!("q{i}"))).collect();
            let mut dispatcher = RoundRobinDispatcher::new(queues.clone()).unwrap();
            for position in 0..n {
                prop_assert_eq!(dispatcher.dispatch(record(position as i64)), 1);
            }

            for (i, queue) in queues.iter().enumerate() {
                let received = payloads(queue);
                prop_assert!(received.len() == n / m || received.len() == n.div_ceil(m));
                let expected: Vec<i64> = (i..n).step_by(m).map(|p| p as i64).collect();
                prop_assert_eq!(received, expected);
            }
        }
    }
}
