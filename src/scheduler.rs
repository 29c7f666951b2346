//! Periodic task execution
//!
//! The pool manager only needs "run this job every `interval`". Hosts can
//! plug in their own timer by implementing [`Scheduler`]; a thread-backed and
//! a tokio-backed implementation are provided.

use crate::errors::{PoolError, PoolResult};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// A job to run repeatedly on a fixed interval
pub struct PeriodicTask {
    name: String,
    initial_delay: Duration,
    interval: Duration,
    repeat: Option<usize>,
    job: Box<dyn FnMut() + Send>,
}

impl PeriodicTask {
    pub fn new<J>(name: impl Into<String>, initial_delay: Duration, interval: Duration, job: J) -> Self
    where
        J: FnMut() + Send + 'static,
    {
        Self {
            name: name.into(),
            initial_delay,
            interval,
            repeat: None,
            job: Box::new(job),
        }
    }

    /// Stop after `count` runs
    pub fn with_repeat(mut self, count: usize) -> Self {
        self.repeat = Some(count);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `None` repeats until the scheduler stops
    pub fn repeat(&self) -> Option<usize> {
        self.repeat
    }

    /// Run the job once
    pub fn run(&mut self) {
        trace!(task = %self.name, "running periodic task");
        (self.job)();
    }

    fn exhausted(&self, runs: usize) -> bool {
        self.repeat.is_some_and(|repeat| runs >= repeat)
    }
}

impl fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("initial_delay", &self.initial_delay)
            .field("interval", &self.interval)
            .field("repeat", &self.repeat)
            .finish_non_exhaustive()
    }
}

/// Runs [`PeriodicTask`]s
pub trait Scheduler: Send + Sync {
    fn schedule(&self, task: PeriodicTask) -> PoolResult<()>;
}

/// Runs each task on its own OS thread until shut down
///
/// # Examples
///
/// ```
/// use poolkit::{PeriodicTask, Scheduler, ThreadScheduler};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let runs = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&runs);
/// let scheduler = ThreadScheduler::new();
/// let task = PeriodicTask::new("tick", Duration::ZERO, Duration::from_millis(1), move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// })
/// .with_repeat(3);
///
/// scheduler.schedule(task).unwrap();
/// scheduler.shutdown();
/// assert!(runs.load(Ordering::SeqCst) <= 3);
/// ```
#[derive(Default)]
pub struct ThreadScheduler {
    workers: Mutex<Vec<(Sender<()>, JoinHandle<()>)>>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop every task and wait for its thread to exit
    pub fn shutdown(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        for (stop, handle) in workers {
            let _ = stop.send(());
            if handle.join().is_err() {
                warn!("periodic task thread panicked");
            }
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, mut task: PeriodicTask) -> PoolResult<()> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let name = task.name.clone();
        debug!(task = %name, interval = ?task.interval, "scheduling task on thread");

        let handle = thread::Builder::new()
            .name(format!("poolkit-{}", name))
            .spawn(move || {
                let mut delay = task.initial_delay;
                let mut runs = 0;
                while !task.exhausted(runs) {
                    match stop_rx.recv_timeout(delay) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    task.run();
                    runs += 1;
                    delay = task.interval;
                }
                debug!(task = %task.name, runs, "periodic task stopped");
            })
            .map_err(|err| PoolError::Schedule(err.to_string()))?;

        self.workers.lock().push((stop_tx, handle));
        Ok(())
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs each task as a tokio task; the job itself runs on the blocking pool
pub struct TokioScheduler {
    runtime: tokio::runtime::Handle,
    tasks: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl TokioScheduler {
    /// Use the runtime the caller is running in
    pub fn new() -> PoolResult<Self> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|err| PoolError::Schedule(err.to_string()))?;
        Ok(Self::with_handle(runtime))
    }

    pub fn with_handle(runtime: tokio::runtime::Handle) -> Self {
        Self {
            runtime,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Abort every scheduled task
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: PeriodicTask) -> PoolResult<()> {
        debug!(task = %task.name, interval = ?task.interval, "scheduling task on tokio");
        let handle = self.runtime.spawn(async move {
            let mut task = task;
            let mut delay = task.initial_delay;
            let mut runs = 0;
            while !task.exhausted(runs) {
                tokio::time::sleep(delay).await;
                task = match tokio::task::spawn_blocking(move || {
                    task.run();
                    task
                })
                .await
                {
                    Ok(task) => task,
                    Err(err) => {
                        warn!(error = %err, "periodic task failed");
                        return;
                    }
                };
                runs += 1;
                delay = task.interval;
            }
        });
        self.tasks.lock().push(handle);
        Ok(())
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("tasks", &self.tasks.lock().len())
            .finish()
    }
}
