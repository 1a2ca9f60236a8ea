//! Bounded worker dispatch.
//!
//! Tasks run on a dedicated rayon pool sized to the configured worker count;
//! each completion is sent over a channel and drained on the calling thread,
//! which owns the progress callback. With one worker everything runs inline.
//! Results come back in task order regardless of completion order.

use std::sync::mpsc;
use std::thread;

use rayon::prelude::*;
use tracing::debug;

use crate::error::AppError;

/// Progress snapshot passed to the callback after every completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

/// Evaluate `eval` on every task with at most `workers` threads.
pub fn run_tasks<T, R, F>(
    tasks: &[T],
    workers: usize,
    eval: F,
    progress: &mut dyn FnMut(Progress),
) -> Result<Vec<R>, AppError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if workers == 0 {
        return Err(AppError::config("workers must be >= 1."));
    }
    let total = tasks.len();

    if workers == 1 || total <= 1 {
        let mut out = Vec::with_capacity(total);
        for (i, task) in tasks.iter().enumerate() {
            out.push(eval(task));
            progress(Progress {
                processed: i + 1,
                total,
            });
        }
        return Ok(out);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| AppError::config(format!("Failed to start worker pool: {e}")))?;
    debug!(workers, total, "dispatching to worker pool");

    let mut slots: Vec<Option<R>> = (0..total).map(|_| None).collect();
    let (tx, rx) = mpsc::channel::<(usize, R)>();
    let eval = &eval;

    thread::scope(|s| {
        s.spawn(move || {
            pool.install(|| {
                tasks.par_iter().enumerate().for_each_with(tx, |tx, (i, task)| {
                    // The receiver lives until every sender is dropped.
                    let _ = tx.send((i, eval(task)));
                });
            });
        });

        for (n, (i, result)) in rx.iter().enumerate() {
            slots[i] = Some(result);
            progress(Progress {
                processed: n + 1,
                total,
            });
        }
    });

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.ok_or_else(|| AppError::numerical(format!("Task {i} produced no result."))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_and_parallel_agree_and_keep_order() {
        let tasks: Vec<u64> = (0..200).collect();
        let square = |x: &u64| x * x;
        let serial = run_tasks(&tasks, 1, square, &mut |_| {}).unwrap();
        let parallel = run_tasks(&tasks, 4, square, &mut |_| {}).unwrap();
        assert_eq!(serial, parallel);
        assert_eq!(parallel[17], 289);
    }

    #[test]
    fn progress_is_monotone_and_complete() {
        let tasks: Vec<u32> = (0..50).collect();
        let mut seen = Vec::new();
        run_tasks(&tasks, 3, |x| x + 1, &mut |p| seen.push(p)).unwrap();
        assert_eq!(seen.len(), 50);
        assert!(seen.windows(2).all(|w| w[0].processed < w[1].processed));
        assert_eq!(seen.last().map(|p| p.processed), Some(50));
        assert!(seen.iter().all(|p| p.total == 50));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let tasks = [1];
        assert!(run_tasks(&tasks, 0, |x| *x, &mut |_| {}).is_err());
    }
}
