//! Fixed-size worker pool for CPU-bound analysis jobs.
//!
//! Forecast and optimization jobs are pure and CPU-bound, so they run on
//! plain threads sized to the available cores. Each job answers on its own
//! channel; the optimizer's time budget bounds how long a caller waits.

use std::io;
use std::num::NonZeroUsize;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use bookwise_analytics::AnalysisJob;
use bookwise_core::{AnalyticsError, AnalyticsResult};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Pending result of a submitted job.
#[derive(Debug)]
pub struct JobTicket<T> {
    rx: mpsc::Receiver<AnalyticsResult<T>>,
}

impl<T> JobTicket<T> {
    /// Block until the job finishes.
    pub fn wait(self) -> AnalyticsResult<T> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(AnalyticsError::unavailable("worker dropped the job")))
    }

    /// Block for at most `timeout`; `None` when the job is still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<AnalyticsResult<T>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Some(Err(AnalyticsError::unavailable("worker dropped the job")))
            }
        }
    }
}

#[derive(Debug)]
pub struct AnalysisPool {
    name: String,
    sender: Option<mpsc::Sender<Task>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl AnalysisPool {
    /// One worker per available core.
    pub fn with_available_parallelism(name: impl Into<String>) -> io::Result<Self> {
        let size = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::new(name, size)
    }

    pub fn new(name: impl Into<String>, size: usize) -> io::Result<Self> {
        let name = name.into();
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Task>();
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let rx = rx.clone();
            let worker_name = format!("{name}-{i}");
            let handle = thread::Builder::new()
                .name(worker_name.clone())
                .spawn(move || worker_loop(&worker_name, rx))?;
            workers.push(handle);
        }

        info!(pool = %name, workers = size, "analysis pool started");
        Ok(Self {
            name,
            sender: Some(tx),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue `job`; the ticket yields its result.
    pub fn submit<J: AnalysisJob>(&self, job: J) -> JobTicket<J::Output> {
        let (tx, rx) = mpsc::sync_channel(1);
        let kind = job.kind();
        let task: Task = Box::new(move || {
            debug!(job = kind.as_str(), as_of = %job.as_of(), "job started");
            let _ = tx.send(job.run());
        });

        match &self.sender {
            Some(sender) => {
                if sender.send(task).is_err() {
                    warn!(pool = %self.name, job = kind.as_str(), "pool is shut down; job dropped");
                }
            }
            None => warn!(pool = %self.name, job = kind.as_str(), "pool is shut down; job dropped"),
        }
        JobTicket { rx }
    }

    /// Finish queued jobs and stop every worker.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for AnalysisPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(name: &str, rx: Arc<Mutex<mpsc::Receiver<Task>>>) {
    loop {
        let task = {
            let guard = match rx.lock() {
                Ok(g) => g,
                Err(_) => break,
            };
            guard.recv()
        };
        match task {
            Ok(task) => task(),
            Err(_) => break,
        }
    }
    debug!(worker = name, "analysis worker stopped");
}
