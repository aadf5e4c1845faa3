use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{Error, Result};

/// Context handed to a background task for one run
pub struct Context {
    pub task_name: &'static str,
    pub run_id: u64,
    pub shutdown: broadcast::Receiver<()>,
}

/// A periodic background task
#[async_trait::async_trait]
pub trait BackgroundTask: Send + Sync {
    fn name(&self) -> &'static str;

    /// Delay before the first run and between runs
    fn interval(&self) -> Duration;

    async fn execute(&self, ctx: Context) -> Result<()>;
}

/// Runs background tasks on a tokio runtime until shut down.
///
/// The scheduler holds a runtime handle, so it can be created and fed tasks
/// from synchronous code that merely has access to a runtime.
pub struct Scheduler {
    runtime: Handle,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    /// Creates a scheduler on the current tokio runtime.
    pub fn new() -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::InvalidState(format!("No tokio runtime for scheduler: {}", e)))?;
        Ok(Self::with_runtime(runtime))
    }

    pub fn with_runtime(runtime: Handle) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            runtime,
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
        }
    }

    /// Starts running `task` every `task.interval()`.
    pub fn register<T: BackgroundTask + 'static>(&self, task: Arc<T>) -> Result<&Self> {
        let handle = self.spawn_timer_loop(task);
        self.tasks.lock()?.push(handle);
        Ok(self)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.lock().map_or(0, |tasks| tasks.len())
    }

    fn spawn_timer_loop<T: BackgroundTask + 'static>(&self, task: Arc<T>) -> JoinHandle<()> {
        let interval = task.interval();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            // A slow sweep should not be followed by a burst of catch-up runs.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut run_id = 0u64;

            tracing::info!(task = task.name(), ?interval, "Background task started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_id += 1;
                        let ctx = Context {
                            task_name: task.name(),
                            run_id,
                            shutdown: shutdown_rx.resubscribe(),
                        };

                        if let Err(e) = task.execute(ctx).await {
                            tracing::error!(
                                task = task.name(),
                                run_id,
                                error = %e,
                                "Task execution failed"
                            );
                        }
                    }

                    _ = shutdown_rx.recv() => {
                        tracing::info!(task = task.name(), runs = run_id, "Task shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Signals every task to stop and waits for them to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_tx.send(()).ok();

        let tasks = std::mem::take(&mut *self.tasks.lock()?);
        for task in tasks {
            task.await
                .map_err(|e| Error::InvalidState(format!("Task join error: {}", e)))?;
        }

        Ok(())
    }
}
