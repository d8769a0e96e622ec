//! Bounded worker pool for per-unit pipeline work.
//!
//! Workers pull item indices from a shared counter and report results over a
//! channel; the caller gets results back in item order regardless of
//! completion order. The only coordination is message passing plus one
//! atomic, so there is no shared mutable state to guard.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

/// Default worker count for parallel compile/verify fan-out.
pub const DEFAULT_WORKERS: usize = 4;

/// Cooperative cancellation flag observed between pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Run `job` over `items` with at most `workers` threads.
///
/// Results come back in item order. Items not started before cancellation
/// are reported as `None`.
pub fn run_parallel<T, R, F>(
    items: &[T],
    workers: usize,
    cancel: &CancelToken,
    job: F,
) -> Vec<Option<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let worker_count = workers.clamp(1, items.len().max(1));
    let next = AtomicUsize::new(0);
    let (sender, receiver) = mpsc::channel::<(usize, R)>();

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let sender = sender.clone();
            let next = &next;
            let job = &job;
            scope.spawn(move || loop {
                if cancel.is_cancelled() {
                    break;
                }
                let idx = next.fetch_add(1, Ordering::SeqCst);
                if idx >= items.len() {
                    break;
                }
                let result = job(&items[idx]);
                if sender.send((idx, result)).is_err() {
                    break;
                }
            });
        }
        drop(sender);

        let mut results: Vec<Option<R>> = (0..items.len()).map(|_| None).collect();
        for (idx, result) in receiver {
            results[idx] = Some(result);
        }
        results
    })
}
