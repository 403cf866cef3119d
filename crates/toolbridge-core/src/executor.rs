//! Designated executor
//!
//! Some hosts (editor main loops, UI toolkits) only tolerate calls from one
//! thread. Handlers registered with main-thread affinity are queued here and
//! executed by whichever thread owns the [`MainThreadQueue`]; the dispatching
//! task waits on a oneshot for the result.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::registry::HandlerResult;

/// Jobs drained per `pump` call when the host does not say otherwise
pub const DEFAULT_JOBS_PER_PUMP: usize = 100;

type Job = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutorError {
    #[error("main-thread executor is not running")]
    Closed,

    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Cloneable sender side, held by the dispatcher
#[derive(Clone)]
pub struct MainThreadHandle {
    sender: mpsc::UnboundedSender<Job>,
    owner: Arc<OnceLock<ThreadId>>,
}

/// Receiver side, owned by the designated thread
pub struct MainThreadQueue {
    receiver: mpsc::UnboundedReceiver<Job>,
    owner: Arc<OnceLock<ThreadId>>,
}

impl MainThreadQueue {
    /// Create a queue and its handle. The first thread to `pump` or `run`
    /// becomes the designated thread.
    pub fn new() -> (MainThreadHandle, MainThreadQueue) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let owner = Arc::new(OnceLock::new());

        (
            MainThreadHandle {
                sender,
                owner: Arc::clone(&owner),
            },
            MainThreadQueue { receiver, owner },
        )
    }

    /// Start a named OS thread that serves the queue until every handle is dropped
    pub fn spawn_dedicated(name: &str) -> std::io::Result<MainThreadHandle> {
        let (handle, queue) = Self::new();
        thread::Builder::new().name(name.to_string()).spawn(move || queue.run())?;
        Ok(handle)
    }

    /// Execute at most `max_jobs` queued jobs without blocking.
    ///
    /// Returns the number of jobs executed.
    pub fn pump(&mut self, max_jobs: usize) -> usize {
        self.claim_thread();

        let mut processed = 0;
        while processed < max_jobs {
            match self.receiver.try_recv() {
                Ok(job) => {
                    job();
                    processed += 1;
                }
                Err(_) => break,
            }
        }

        if processed > 0 {
            debug!("Main-thread queue processed {} jobs", processed);
        }
        processed
    }

    /// Block the current thread serving jobs until all handles are gone
    pub fn run(mut self) {
        self.claim_thread();
        debug!("Main-thread executor running on {:?}", thread::current().name());

        while let Some(job) = self.receiver.blocking_recv() {
            job();
        }

        debug!("Main-thread executor stopped");
    }

    fn claim_thread(&self) {
        let current = thread::current().id();
        let owner = self.owner.get_or_init(|| current);
        if *owner != current {
            warn!("Main-thread queue pumped from a different thread than the one that first claimed it");
        }
    }
}

impl MainThreadHandle {
    /// Whether the caller is already the designated thread
    pub fn is_current_thread(&self) -> bool {
        self.owner.get().is_some_and(|owner| *owner == thread::current().id())
    }

    /// Run `f` on the designated thread and wait for its result.
    ///
    /// Called from the designated thread itself, `f` runs immediately.
    pub async fn run<F>(&self, f: F) -> Result<HandlerResult, ExecutorError>
    where
        F: FnOnce() -> HandlerResult + Send + 'static,
    {
        if self.is_current_thread() {
            return run_guarded(f);
        }

        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let outcome = run_guarded(f);
            if tx.send(outcome).is_err() {
                debug!("Main-thread job finished after its caller stopped waiting");
            }
        });

        self.sender.send(job).map_err(|_| ExecutorError::Closed)?;
        rx.await.map_err(|_| ExecutorError::Closed)?
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

fn run_guarded<F>(f: F) -> Result<HandlerResult, ExecutorError>
where
    F: FnOnce() -> HandlerResult,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| ExecutorError::Panicked(panic_message(payload.as_ref())))
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
