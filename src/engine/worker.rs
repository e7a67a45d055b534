//! The single background worker all disk I/O runs on, and completion handles.
//!
//! Jobs run one at a time in submission order. That FIFO order is what keeps
//! a commit's record writes ahead of its metadata write, and every later read
//! behind every earlier write.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::types::error::{StoreError, StoreResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to a value produced asynchronously by the worker.
pub struct Completion<T> {
    rx: Receiver<T>,
}

impl<T> Completion<T> {
    /// A completion that is already resolved.
    pub fn ready(value: T) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(value);
        Self { rx }
    }

    /// Block the calling thread until the value is delivered.
    pub fn wait(self) -> StoreResult<T> {
        self.rx.recv().map_err(|_| StoreError::WorkerClosed)
    }

    /// The value if it has been delivered, without blocking.
    pub fn try_take(&self) -> StoreResult<Option<T>> {
        match self.rx.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(StoreError::WorkerClosed),
        }
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion").finish()
    }
}

/// A single-threaded, strictly FIFO job queue.
pub struct Worker {
    tx: Option<Sender<Job>>,
    join: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn the worker thread.
    pub fn spawn(name: &str) -> StoreResult<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                // Ends once every sender is gone and the queue is empty.
                for job in rx {
                    job();
                }
                log::debug!("background worker drained and stopped");
            })?;
        Ok(Self {
            tx: Some(tx),
            join: Some(join),
        })
    }

    /// Queue a job. Returns false if the worker has shut down.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> bool {
        match &self.tx {
            Some(tx) => tx.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Queue a job whose result is delivered through a [`Completion`].
    pub fn call<T, F>(&self, f: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        if !self.submit(move || {
            let _ = tx.send(f());
        }) {
            log::warn!("job submitted to a stopped worker");
        }
        Completion { rx }
    }

    /// Run a job on the worker and block until it is done.
    pub fn run_blocking<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        self.call(f).wait()
    }

    /// Block until every job queued so far has run.
    pub fn drain(&self) -> StoreResult<()> {
        self.run_blocking(|| ())
    }

    /// Stop accepting jobs, let the queue empty, and join the thread.
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("background worker panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
