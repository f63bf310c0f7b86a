use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{atomic::{AtomicBool, Ordering}, Arc},
    task::{Context, Poll, Waker},
};

use parking_lot::{Condvar, Mutex};

use crate::{error::{FsError, FsResult}, pool::TaskId};

enum Slot<T> {
    Pending,
    Ready(FsResult<T>),
    Taken,
}

struct State<T> {
    slot: Slot<T>,
    waker: Option<Waker>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
    cancelled: AtomicBool,
}

impl<T> Shared<T> {

    fn new(slot: Slot<T>) -> Self {
        Self {
            state: Mutex::new(State { slot, waker: None }),
            ready: Condvar::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    // First result wins; later ones are dropped.
    fn fulfil(&self, result: FsResult<T>) {
        let waker = {
            let mut state = self.state.lock();
            if !matches!(state.slot, Slot::Pending) { return }
            state.slot = Slot::Ready(result);
            state.waker.take()
        };

        self.ready.notify_all();
        if let Some(waker) = waker { waker.wake() }
    }
}

/// Pairs an `IoHandle` with the side that produces its result.
pub (crate) fn channel<T>(id: TaskId) -> (Completer<T>, IoHandle<T>) {
    let shared = Arc::new(Shared::new(Slot::Pending));
    (
        Completer { shared: Some(Arc::clone(&shared)) },
        IoHandle { shared, id: Some(id) }
    )
}

/// Producing half of an `IoHandle`. Dropping it without completing (a killed
/// pool, a panicking job) resolves the handle to `FsError::Cancelled`.
pub (crate) struct Completer<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Completer<T> {

    pub fn is_cancelled(&self) -> bool {
        self.shared.as_ref().is_some_and(|s| s.cancelled.load(Ordering::Acquire))
    }

    pub fn complete(mut self, result: FsResult<T>) {
        if let Some(shared) = self.shared.take() {
            shared.fulfil(result);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.fulfil(Err(FsError::Cancelled));
        }
    }
}

/// Result of work running on a pool thread.
///
/// Block on it with `wait()`, poll it with `is_ready()`, or `.await` it.
/// `cancel()` is advisory: a job that has not started yet is skipped and
/// resolves to `FsError::Cancelled`; a job already running completes normally.
pub struct IoHandle<T> {
    shared: Arc<Shared<T>>,
    id: Option<TaskId>,
}

impl<T> IoHandle<T> {

    /// A handle that is already resolved, with no job behind it.
    pub fn ready(result: FsResult<T>) -> Self {
        Self {
            shared: Arc::new(Shared::new(Slot::Ready(result))),
            id: None,
        }
    }

    pub fn id(&self) -> Option<TaskId> { self.id }

    pub fn is_ready(&self) -> bool {
        !matches!(self.shared.state.lock().slot, Slot::Pending)
    }

    /// Takes the result if it has arrived, leaving the handle spent.
    pub fn try_take(&mut self) -> Option<FsResult<T>> {
        let mut state = self.shared.state.lock();
        match std::mem::replace(&mut state.slot, Slot::Taken) {
            Slot::Ready(result) => Some(result),
            other => {
                state.slot = other;
                None
            }
        }
    }

    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    pub fn wait(self) -> FsResult<T> {
        let mut state = self.shared.state.lock();
        while matches!(state.slot, Slot::Pending) {
            self.shared.ready.wait(&mut state);
        }

        match std::mem::replace(&mut state.slot, Slot::Taken) {
            Slot::Ready(result) => result,
            // Only reachable by awaiting a handle and then waiting on it
            Slot::Pending | Slot::Taken => Err(FsError::Cancelled),
        }
    }
}

impl<T> Future for IoHandle<T> {
    type Output = FsResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();

        match std::mem::replace(&mut state.slot, Slot::Taken) {
            Slot::Ready(result) => Poll::Ready(result),
            Slot::Pending => {
                state.slot = Slot::Pending;
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            },
            Slot::Taken => panic!("cl-fs: IoHandle polled after completion"),
        }
    }
}

impl<T> fmt::Debug for IoHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoHandle")
            .field("id", &self.id)
            .field("ready", &self.is_ready())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_then_wait() {
        let (completer, handle) = channel::<u32>(TaskId::new());
        assert!(!handle.is_ready());
        completer.complete(Ok(7));
        assert!(handle.is_ready());
        assert_eq!(handle.wait().unwrap(), 7);
    }

    #[test]
    fn test_dropped_completer_cancels() {
        let (completer, handle) = channel::<u32>(TaskId::new());
        drop(completer);
        assert!(matches!(handle.wait(), Err(FsError::Cancelled)));
    }

    #[test]
    fn test_wait_blocks_until_completed_from_another_thread() {
        let (completer, handle) = channel::<String>(TaskId::new());
        let producer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            completer.complete(Ok(String::from("done")));
        });
        assert_eq!(handle.wait().unwrap(), "done");
        producer.join().unwrap();
    }

    #[test]
    fn test_handle_is_a_future() {
        let (completer, handle) = channel::<u8>(TaskId::new());
        let producer = std::thread::spawn(move || completer.complete(Ok(1)));
        assert_eq!(futures::executor::block_on(handle).unwrap(), 1);
        producer.join().unwrap();
    }

    #[test]
    fn test_cancel_is_visible_to_producer() {
        let (completer, handle) = channel::<()>(TaskId::new());
        assert!(!completer.is_cancelled());
        handle.cancel();
        assert!(completer.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_try_take() {
        let (completer, mut handle) = channel::<u8>(TaskId::new());
        assert!(handle.try_take().is_none());
        completer.complete(Ok(9));
        assert_eq!(handle.try_take().unwrap().unwrap(), 9);
        assert!(handle.try_take().is_none());
        assert!(handle.is_ready());
    }

    #[test]
    fn test_ready_handle() {
        let handle = IoHandle::ready(Ok(3u8));
        assert!(handle.is_ready());
        assert!(handle.id().is_none());
        assert_eq!(handle.wait().unwrap(), 3);
    }
}
