//! Bounded worker pool with ordered results.
//!
//! Jobs go out over a crossbeam channel to `workers` scoped threads; results
//! come back tagged with their input index and are reassembled in input
//! order, so completion order never leaks into reports. A panicking job is
//! caught and reported instead of tearing down the batch. The per-item
//! budget cannot preempt a running job; it only marks the outcome.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    pub workers: usize,
    /// Completed items slower than this are flagged `over_budget`
    pub item_budget: Option<Duration>,
    /// Items not started within this much wall-clock time are skipped
    pub deadline: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkOutcome<T> {
    Completed {
        value: T,
        elapsed: Duration,
        over_budget: bool,
    },
    /// The batch deadline passed before the item started
    Skipped,
    Panicked {
        message: String,
    },
}

impl<T> WorkOutcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            WorkOutcome::Completed { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            WorkOutcome::Completed { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        )
    }
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            item_budget: None,
            deadline: None,
        }
    }

    pub fn with_item_budget(mut self, budget: Option<Duration>) -> Self {
        self.item_budget = budget;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run `job` over every item; `result[i]` is the outcome of `items[i]`.
    pub fn run_ordered<I, T, F>(&self, items: Vec<I>, job: F) -> Vec<WorkOutcome<T>>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> T + Sync,
    {
        let count = items.len();
        if count == 0 {
            return Vec::new();
        }
        let started = Instant::now();

        let (job_tx, job_rx) = unbounded::<(usize, I)>();
        for entry in items.into_iter().enumerate() {
            // The receiver is alive until the scope below ends.
            let _ = job_tx.send(entry);
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded::<(usize, WorkOutcome<T>)>();
        let workers = self.workers.min(count);
        debug!(workers, items = count, "starting worker pool");

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let job = &job;
                scope.spawn(move || {
                    for (index, item) in job_rx.iter() {
                        let outcome = self.run_one(index, item, job, started);
                        if result_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut slots: Vec<Option<WorkOutcome<T>>> = (0..count).map(|_| None).collect();
        for (index, outcome) in result_rx.iter() {
            slots[index] = Some(outcome);
        }
        slots
            .into_iter()
            .map(|slot| slot.unwrap_or(WorkOutcome::Skipped))
            .collect()
    }

    fn run_one<I, T, F>(&self, index: usize, item: I, job: &F, started: Instant) -> WorkOutcome<T>
    where
        F: Fn(I) -> T,
    {
        if self.deadline.is_some_and(|d| started.elapsed() >= d) {
            warn!(index, "batch deadline passed; item skipped");
            return WorkOutcome::Skipped;
        }

        let t0 = Instant::now();
        match catch_unwind(AssertUnwindSafe(|| job(item))) {
            Ok(value) => {
                let elapsed = t0.elapsed();
                let over_budget = self.item_budget.is_some_and(|b| elapsed > b);
                if over_budget {
                    warn!(index, elapsed_ms = elapsed.as_millis() as u64, "item exceeded its time budget");
                }
                WorkOutcome::Completed {
                    value,
                    elapsed,
                    over_budget,
                }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(index, %message, "item panicked");
                WorkOutcome::Panicked { message }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_follow_input_order() {
        let pool = WorkerPool::new(4);
        let items: Vec<u64> = (0..32).collect();
        let outcomes = pool.run_ordered(items, |n| {
            // Later items finish first.
            thread::sleep(Duration::from_millis(32 - n));
            n * 10
        });
        let values: Vec<u64> = outcomes.into_iter().filter_map(WorkOutcome::into_value).collect();
        assert_eq!(values, (0..32).map(|n| n * 10).collect::<Vec<_>>());
    }

    #[test]
    fn panics_are_contained() {
        let pool = WorkerPool::new(2);
        let outcomes = pool.run_ordered(vec![1, 2, 3], |n| {
            if n == 2 {
                panic!("bad fixture {n}");
            }
            n
        });
        assert_eq!(outcomes[0].value(), Some(&1));
        assert_eq!(
            outcomes[1],
            WorkOutcome::Panicked { message: "bad fixture 2".to_string() }
        );
        assert_eq!(outcomes[2].value(), Some(&3));
    }

    #[test]
    fn budget_marks_but_keeps_slow_items() {
        let pool = WorkerPool::new(1).with_item_budget(Some(Duration::from_millis(5)));
        let outcomes = pool.run_ordered(vec![0u64, 30], |ms| {
            thread::sleep(Duration::from_millis(ms));
            ms
        });
        assert!(matches!(outcomes[0], WorkOutcome::Completed { over_budget: false, .. }));
        assert!(matches!(outcomes[1], WorkOutcome::Completed { over_budget: true, value: 30, .. }));
    }

    #[test]
    fn expired_deadline_skips_everything() {
        let pool = WorkerPool::new(2).with_deadline(Some(Duration::ZERO));
        let outcomes = pool.run_ordered(vec![1, 2], |n| n);
        assert!(outcomes.iter().all(|o| *o == WorkOutcome::Skipped));
        assert!(pool.run_ordered(Vec::<u8>::new(), |n| n).is_empty());
    }
}
