//! Pull-based parallel task runner
//!
//! The scheduler does not own a queue: the task itself pulls work out of whatever shared source
//! it closes over (guarding it however it likes), does one unit of work, and reports whether it
//! found anything to do.

use std::thread;

/// Outcome of one invocation of a scheduled task
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tick {
    /// A unit of work was done, so the worker should call the task again
    Continue,

    /// No work was left for this worker
    Done,
}

/// Run `task` on `threads` workers until every worker gets [`Tick::Done`]
///
/// With one worker or fewer, the task runs on the calling thread. Otherwise the workers are
/// scoped threads named `jardelta-worker-{i}`, so the task may borrow from the caller's stack.
/// Returns once every worker has finished. A panic in any worker is propagated.
pub fn run<F>(threads: usize, task: F)
where
    F: Fn() -> Tick + Sync,
{
    if threads <= 1 {
        log::debug!("Running scheduled task on the calling thread");
        while task() == Tick::Continue {}
        return;
    }

    log::debug!("Spawning {} scheduler workers", threads);
    let task = &task;
    thread::scope(|scope| {
        let workers: Vec<_> = (0..threads)
            .filter_map(|i| {
                let name = format!("jardelta-worker-{}", i);
                log::trace!("Starting {}", name);
                let spawned = thread::Builder::new()
                    .name(name)
                    .spawn_scoped(scope, move || while task() == Tick::Continue {});
                match spawned {
                    Ok(worker) => Some(worker),
                    Err(err) => {
                        log::warn!("Could not spawn scheduler worker {}: {}", i, err);
                        None
                    }
                }
            })
            .collect();

        // Every worker failed to start, so do the work here rather than drop it
        if workers.is_empty() {
            while task() == Tick::Continue {}
        }

        for worker in workers {
            if let Err(panic) = worker.join() {
                std::panic::resume_unwind(panic);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn drain(threads: usize, items: usize) -> Vec<usize> {
        let pending = Mutex::new((0..items).collect::<Vec<_>>());
        let done = Mutex::new(vec![]);
        run(threads, || {
            let next = pending.lock().unwrap().pop();
            match next {
                None => Tick::Done,
                Some(item) => {
                    done.lock().unwrap().push(item * 2);
                    Tick::Continue
                }
            }
        });
        let mut done = done.into_inner().unwrap();
        done.sort();
        done
    }

    #[test]
    fn every_item_is_processed_once() {
        let expected: Vec<usize> = (0..500).map(|i| i * 2).collect();
        for threads in [0, 1, 2, 7, 16] {
            assert_eq!(drain(threads, 500), expected, "with {} threads", threads);
        }
    }

    #[test]
    fn empty_work_returns() {
        assert_eq!(drain(4, 0), Vec::<usize>::new());
    }

    #[test]
    fn each_worker_runs_until_done() {
        // Every worker must see `Done` at least once, so the task is called at least once per
        // worker beyond the units of work
        let calls = AtomicUsize::new(0);
        let remaining = AtomicUsize::new(10);
        run(4, || {
            calls.fetch_add(1, Ordering::SeqCst);
            let claimed = remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            });
            if claimed.is_ok() {
                Tick::Continue
            } else {
                Tick::Done
            }
        });
        assert_eq!(remaining.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 10 + 4);
    }

    #[test]
    fn workers_are_named() {
        let names = Mutex::new(HashSet::new());
        let seen = AtomicUsize::new(0);
        run(3, || {
            let name = thread::current().name().map(String::from);
            names.lock().unwrap().insert(name);
            if seen.fetch_add(1, Ordering::SeqCst) < 30 {
                Tick::Continue
            } else {
                Tick::Done
            }
        });
        let names = names.into_inner().unwrap();
        assert!(!names.is_empty());
        for name in names {
            assert!(name.unwrap().starts_with("jardelta-worker-"));
        }
    }
}
