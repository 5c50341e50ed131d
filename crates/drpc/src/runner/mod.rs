// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Retryable task runner.
//!
//! Every transport operation (connect, publish, subscribe, unsubscribe,
//! disconnect) runs on a small pool of worker threads. A failed attempt is
//! handed to the [`FailurePolicy`]; a retry puts the job back on the pool
//! queue instead of looping on the same worker.
//!
//! # State machine
//!
//! ```text
//! Pending -> Running -> Completed
//!                    -> RetryScheduled -> Running ...
//!                    -> Failed
//! ```
//!
//! Cancellation is checked before every attempt and moves the task to
//! `Cancelled`.

pub mod policy;

pub use policy::{FailurePolicy, RetryLimit, TransientOnly, DEFAULT_MAX_RETRIES};

use crate::error::{RpcError, RpcResult};
use crate::transport::TransportError;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Worker count used when none is configured.
pub const DEFAULT_WORKER_THREADS: usize = 10;

/// Transport operation performed by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Connect,
    Publish,
    Subscribe,
    Unsubscribe,
    Disconnect,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Publish => "publish",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    RetryScheduled,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Completed, failed or cancelled.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

type Work = Box<dyn FnMut() -> Result<(), TransportError> + Send>;

struct TaskState {
    status: TaskStatus,
    attempts: u32,
    failure: Option<TransportError>,
    cancelled: bool,
}

struct TaskShared {
    kind: TaskKind,
    state: Mutex<TaskState>,
    done: Condvar,
}

impl TaskShared {
    fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            state: Mutex::new(TaskState {
                status: TaskStatus::Pending,
                attempts: 0,
                failure: None,
                cancelled: false,
            }),
            done: Condvar::new(),
        }
    }

    fn finish(&self, status: TaskStatus, failure: Option<TransportError>) {
        let mut state = self.state.lock();
        state.status = status;
        state.failure = failure;
        drop(state);
        self.done.notify_all();
    }
}

struct Job {
    work: Work,
    shared: Arc<TaskShared>,
}

enum Message {
    Run(Job),
    Stop,
}

/// Waits on, inspects, or cancels one submitted task.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<TaskShared>,
}

impl TaskHandle {
    pub fn kind(&self) -> TaskKind {
        self.shared.kind
    }

    /// Retries made so far (the first attempt is not a retry).
    pub fn attempts(&self) -> u32 {
        self.shared.state.lock().attempts
    }

    pub fn status(&self) -> TaskStatus {
        self.shared.state.lock().status
    }

    /// Request cancellation. Takes effect before the next attempt; an
    /// attempt already running is not interrupted.
    pub fn cancel(&self) {
        self.shared.state.lock().cancelled = true;
    }

    /// Block until the task reaches a terminal state.
    ///
    /// Returns immediately when the task already finished.
    pub fn wait(&self) -> RpcResult<()> {
        let mut state = self.shared.state.lock();
        while !state.status.is_terminal() {
            self.shared.done.wait(&mut state);
        }

        match state.status {
            TaskStatus::Completed => Ok(()),
            _ => Err(RpcError::TaskFailed {
                kind: self.shared.kind,
                attempts: state.attempts,
                source: state.failure.clone().unwrap_or(TransportError::Closed),
            }),
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TaskHandle")
            .field("kind", &self.shared.kind)
            .field("status", &state.status)
            .field("attempts", &state.attempts)
            .finish()
    }
}

struct Pool {
    sender: Sender<Message>,
    policy: Arc<dyn FailurePolicy>,
    closed: AtomicBool,
}

impl Pool {
    fn execute(&self, mut job: Job) {
        {
            let mut state = job.shared.state.lock();
            if state.cancelled {
                state.status = TaskStatus::Cancelled;
                drop(state);
                job.shared.done.notify_all();
                log::debug!("[runner] {} task cancelled", job.shared.kind);
                return;
            }
            state.status = TaskStatus::Running;
        }

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (job.work)()))
            .unwrap_or_else(|_| Err(TransportError::Io("task panicked".to_string())));

        let failure = match outcome {
            Ok(()) => {
                job.shared.finish(TaskStatus::Completed, None);
                return;
            }
            Err(failure) => failure,
        };

        let attempts = job.shared.state.lock().attempts;
        if !self.policy.should_retry(&failure, attempts) {
            log::warn!(
                "[runner] {} task failed after {} retries: {}",
                job.shared.kind,
                attempts,
                failure
            );
            job.shared.finish(TaskStatus::Failed, Some(failure));
            return;
        }

        if self.closed.load(Ordering::Acquire) {
            job.shared.finish(TaskStatus::Failed, Some(TransportError::Closed));
            return;
        }

        {
            let mut state = job.shared.state.lock();
            state.attempts += 1;
            state.status = TaskStatus::RetryScheduled;
            state.failure = Some(failure);
        }
        log::debug!(
            "[runner] {} task retry #{} scheduled",
            job.shared.kind,
            attempts + 1
        );

        if let Err(channel::SendError(Message::Run(job))) = self.sender.send(Message::Run(job)) {
            job.shared.finish(TaskStatus::Failed, Some(TransportError::Closed));
        }
    }
}

/// Bounded worker pool executing transport tasks.
pub struct TaskRunner {
    pool: Arc<Pool>,
    receiver: Receiver<Message>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRunner {
    /// Spawn `threads` workers (at least one).
    pub fn new(threads: usize, policy: Arc<dyn FailurePolicy>) -> Self {
        let (sender, receiver) = channel::unbounded();
        let pool = Arc::new(Pool {
            sender,
            policy,
            closed: AtomicBool::new(false),
        });

        let workers = (0..threads.max(1))
            .map(|index| {
                let pool = Arc::clone(&pool);
                let receiver = receiver.clone();
                #[allow(clippy::expect_used)] // thread spawn failure is unrecoverable
                thread::Builder::new()
                    .name(format!("drpc-worker-{}", index))
                    .spawn(move || worker_loop(&pool, &receiver))
                    .expect("failed to spawn drpc worker thread")
            })
            .collect();

        log::debug!("[runner] started {} workers", threads.max(1));

        Self {
            pool,
            receiver,
            workers: Mutex::new(workers),
        }
    }

    /// Queue `work` and return a handle to its task.
    pub fn submit<F>(&self, kind: TaskKind, work: F) -> TaskHandle
    where
        F: FnMut() -> Result<(), TransportError> + Send + 'static,
    {
        let shared = Arc::new(TaskShared::new(kind));
        let handle = TaskHandle {
            shared: Arc::clone(&shared),
        };

        if self.pool.closed.load(Ordering::Acquire) {
            shared.finish(TaskStatus::Failed, Some(TransportError::Closed));
            return handle;
        }

        let job = Job {
            work: Box::new(work),
            shared,
        };
        if let Err(channel::SendError(Message::Run(job))) = self.pool.sender.send(Message::Run(job))
        {
            job.shared.finish(TaskStatus::Failed, Some(TransportError::Closed));
        }
        handle
    }

    /// Submit `work` and wait for its outcome.
    pub fn run<F>(&self, kind: TaskKind, work: F) -> RpcResult<()>
    where
        F: FnMut() -> Result<(), TransportError> + Send + 'static,
    {
        self.submit(kind, work).wait()
    }

    pub fn policy(&self) -> &Arc<dyn FailurePolicy> {
        &self.pool.policy
    }

    pub fn is_shutdown(&self) -> bool {
        self.pool.closed.load(Ordering::Acquire)
    }

    /// Stop the workers. Queued tasks fail with [`TransportError::Closed`].
    ///
    /// Must not be called from a worker thread.
    pub fn shutdown(&self) {
        if self.pool.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for _ in 0..workers.len() {
            let _ = self.pool.sender.send(Message::Stop);
        }
        for worker in workers {
            if worker.join().is_err() {
                log::error!("[runner] worker thread panicked");
            }
        }

        // Jobs resubmitted while the workers were stopping.
        while let Ok(message) = self.receiver.try_recv() {
            if let Message::Run(job) = message {
                job.shared.finish(TaskStatus::Failed, Some(TransportError::Closed));
            }
        }
        log::debug!("[runner] stopped");
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(pool: &Pool, receiver: &Receiver<Message>) {
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run(job) if pool.closed.load(Ordering::Acquire) => {
                job.shared.finish(TaskStatus::Failed, Some(TransportError::Closed));
            }
            Message::Run(job) => pool.execute(job),
            Message::Stop => break,
        }
    }
}
