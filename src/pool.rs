use std::{
    fmt,
    panic::AssertUnwindSafe,
    sync::{atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering}, Arc},
    thread::JoinHandle,
};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use thiserror::Error;

use crate::{error::FsResult, handle::{self, IoHandle}};

const QUEUE_SLOTS_PER_THREAD: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TaskId {
    fn default() -> Self { Self::new() }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub (crate) struct Task {
    pub id: TaskId,
    job: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    pub fn new(id: TaskId, job: impl FnOnce() + Send + 'static) -> Self {
        Self { id, job: Box::new(job) }
    }

    fn run(self) { (self.job)() }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("A pool needs at least one worker thread")]
    NoWorkers,

    #[error("Pool has not been started")]
    NotStarted,

    #[error("Pool has been shut down")]
    ShutDown,

    #[error("Failed to spawn worker {id}: {source}")]
    SpawnFailed { id: usize, source: std::io::Error },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Starting = 0,
    Idle = 1,
    Busy = 2,
    Stopped = 3,
}

impl From<u8> for WorkerState {
    fn from(state: u8) -> Self {
        match state {
            0 => WorkerState::Starting,
            1 => WorkerState::Idle,
            2 => WorkerState::Busy,
            _ => WorkerState::Stopped,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Starting => write!(f, "Starting"),
            WorkerState::Idle => write!(f, "Idle"),
            WorkerState::Busy => write!(f, "Busy"),
            WorkerState::Stopped => write!(f, "Stopped"),
        }
    }
}

struct Worker {
    id: usize,
    state: Arc<AtomicU8>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {

    fn spawn(
        id: usize,
        receiver: Receiver<Task>,
        killed: Arc<AtomicBool>,
    ) -> Result<Self, PoolError> {
        let state = Arc::new(AtomicU8::new(WorkerState::Starting as u8));
        let thread_state = Arc::clone(&state);

        let handle = std::thread::Builder::new()
            .name(format!("cl-fs-worker-{id}"))
            .spawn(move || Self::worker_loop(id, thread_state, receiver, killed))
            .map_err(|source| PoolError::SpawnFailed { id, source })?;

        Ok(Self { id, state, handle: Some(handle) })
    }

    fn set_state(state_u8: &AtomicU8, state: WorkerState) {
        state_u8.store(state as u8, Ordering::Release);
    }

    fn worker_loop(
        id: usize,
        state: Arc<AtomicU8>,
        receiver: Receiver<Task>,
        killed: Arc<AtomicBool>,
    ) {
        info!("cl-fs: Worker {} starting", id);
        Self::set_state(&state, WorkerState::Idle);

        // Ends once every sender is gone and the queue is drained
        while let Ok(task) = receiver.recv() {
            if killed.load(Ordering::Acquire) {
                debug!("cl-fs: Worker {} discarding task {}", id, task.id);
                continue;
            }

            Self::set_state(&state, WorkerState::Busy);
            let task_id = task.id;
            if std::panic::catch_unwind(AssertUnwindSafe(|| task.run())).is_err() {
                error!("cl-fs: Task {} panicked on worker {}", task_id, id);
            }
            Self::set_state(&state, WorkerState::Idle);
        }

        Self::set_state(&state, WorkerState::Stopped);
        info!("cl-fs: Worker {} stopped", id);
    }

    fn get_state(&self) -> WorkerState {
        WorkerState::from(self.state.load(Ordering::Acquire))
    }
}

/// Fixed set of worker threads fed through a bounded queue.
///
/// At most `num_threads()` jobs run at once. Submitting blocks while the queue
/// is full.
pub struct ThreadPool {
    n_threads: usize,
    queue_capacity: usize,
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<Worker>>,
    killed: Arc<AtomicBool>,
}

impl ThreadPool {

    pub fn new(n_threads: usize) -> Self {
        Self {
            n_threads,
            queue_capacity: n_threads.max(1) * QUEUE_SLOTS_PER_THREAD,
            sender: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
            killed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn start(self) -> Result<Self, PoolError> {
        if self.n_threads == 0 { return Err(PoolError::NoWorkers) }

        info!("cl-fs: Starting {} workers", self.n_threads);

        let (tx, rx) = crossbeam_channel::bounded(self.queue_capacity);
        {
            let mut workers = self.workers.lock();
            for i in 0..self.n_threads {
                workers.push(Worker::spawn(i, rx.clone(), Arc::clone(&self.killed))?);
            }
        }

        *self.sender.lock() = Some(tx);
        Ok(self)
    }

    pub fn num_threads(&self) -> usize { self.n_threads }
    pub fn queue_capacity(&self) -> usize { self.queue_capacity }

    pub fn is_running(&self) -> bool { self.sender.lock().is_some() }

    // Jobs waiting for a worker
    pub fn queued(&self) -> usize {
        self.sender.lock().as_ref().map_or(0, |s| s.len())
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.workers.lock().iter().map(|w| w.get_state()).collect()
    }

    pub (crate) fn submit(&self, task: Task) -> Result<(), PoolError> {
        // Clone out of the lock so a full queue doesn't block shutdown
        let sender = match self.sender.lock().as_ref() {
            Some(sender) => sender.clone(),
            None => {
                return Err(if self.workers.lock().is_empty() {
                    PoolError::NotStarted
                } else {
                    PoolError::ShutDown
                });
            }
        };

        debug!("cl-fs: Submitting task {}", task.id);
        sender.send(task).map_err(|_| PoolError::ShutDown)
    }

    /// Runs `work` on a pool thread and returns a handle to its result.
    pub fn run<T, F>(&self, work: F) -> IoHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> FsResult<T> + Send + 'static,
    {
        let id = TaskId::new();
        let (completer, handle) = handle::channel(id);

        let task = Task::new(id, move || {
            if completer.is_cancelled() {
                debug!("cl-fs: Task {} was cancelled before it started", id);
                return;
            }
            completer.complete(work());
        });

        match self.submit(task) {
            Ok(()) => handle,
            Err(e) => {
                warn!("cl-fs: Failed to submit task {}: {}", id, e);
                IoHandle::ready(Err(e.into()))
            }
        }
    }

    /// Stops accepting work, lets queued jobs finish, and joins every worker.
    pub fn shutdown(&self) {
        info!("cl-fs: Shutting down all workers");
        self.sender.lock().take();
        self.join();
    }

    /// Stops accepting work and discards queued jobs; their handles resolve to
    /// `FsError::Cancelled`. Jobs already running are not interrupted.
    pub fn kill(&self) {
        info!("cl-fs: Killing all workers");
        self.killed.store(true, Ordering::Release);
        self.sender.lock().take();
    }

    pub fn join(&self) {
        let handles: Vec<(usize, JoinHandle<()>)> = self.workers
            .lock()
            .iter_mut()
            .filter_map(|w| w.handle.take().map(|h| (w.id, h)))
            .collect();

        for (id, handle) in handles {
            if handle.join().is_err() {
                warn!("cl-fs: Failed to join worker {id}");
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
