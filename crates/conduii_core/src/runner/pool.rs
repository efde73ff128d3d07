//! Bounded worker pool.
//!
//! A fixed number of worker tasks pull jobs from a shared FIFO queue, so at
//! most `workers` jobs are in flight. Outputs are buffered by submission
//! index and reassembled in order. A halt predicate stops further dequeues
//! once it matches; jobs already running finish normally.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// A pool of `workers` tasks (at least one)
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` over `items`.
    ///
    /// Returns one slot per item in submission order; `None` marks an item
    /// that was never started because `halt` matched an earlier output.
    pub async fn run<T, R, F, Fut, H>(&self, items: Vec<T>, job: F, halt: H) -> Vec<Option<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        H: Fn(&R) -> bool + Send + Sync + 'static,
    {
        let total = items.len();
        let queue = Arc::new(Mutex::new(
            items.into_iter().enumerate().collect::<VecDeque<_>>(),
        ));
        let halted = Arc::new(AtomicBool::new(false));
        let job = Arc::new(job);
        let halt = Arc::new(halt);

        let mut handles = Vec::with_capacity(self.workers.min(total));
        for _ in 0..self.workers.min(total) {
            let queue = Arc::clone(&queue);
            let halted = Arc::clone(&halted);
            let job = Arc::clone(&job);
            let halt = Arc::clone(&halt);

            handles.push(tokio::spawn(async move {
                let mut done = Vec::new();
                loop {
                    if halted.load(Ordering::SeqCst) {
                        break;
                    }
                    let Some((index, item)) = queue.lock().await.pop_front() else {
                        break;
                    };
                    let output = job(item).await;
                    if halt(&output) {
                        halted.store(true, Ordering::SeqCst);
                    }
                    done.push((index, output));
                }
                done
            }));
        }

        let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
        for handle in handles {
            match handle.await {
                Ok(done) => {
                    for (index, output) in done {
                        slots[index] = Some(output);
                    }
                }
                Err(e) => error!("Worker task failed: {}", e),
            }
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_bounded_by_workers() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let start = Instant::now();
        let job_in_flight = Arc::clone(&in_flight);
        let job_peak = Arc::clone(&peak);
        let outputs = WorkerPool::new(2)
            .run(
                (0..5).collect(),
                move |n: u32| {
                    let in_flight = Arc::clone(&job_in_flight);
                    let peak = Arc::clone(&job_peak);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        n * 10
                    }
                },
                |_| false,
            )
            .await;

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(400), "{:?}", elapsed);
        assert_eq!(
            outputs,
            vec![Some(0), Some(10), Some(20), Some(30), Some(40)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_outputs_in_submission_order() {
        let outputs = WorkerPool::new(3)
            .run(
                vec![300u64, 10, 100],
                |ms| async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    ms
                },
                |_| false,
            )
            .await;
        assert_eq!(outputs, vec![Some(300), Some(10), Some(100)]);
    }

    #[tokio::test]
    async fn test_halt_stops_dequeue() {
        let outputs = WorkerPool::new(1)
            .run(vec![1, 2, 3, 4], |n| async move { n }, |n| *n == 2)
            .await;
        assert_eq!(outputs, vec![Some(1), Some(2), None, None]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outputs: Vec<Option<u8>> = WorkerPool::new(4)
            .run(Vec::<u8>::new(), |n| async move { n }, |_| false)
            .await;
        assert!(outputs.is_empty());
        assert_eq!(WorkerPool::new(0).workers(), 1);
    }
}
