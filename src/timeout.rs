//! Soft timeouts: racing a load against a timer without cancelling it.
//!
//! A timed-out load keeps running on the runtime; callers hold a
//! [`LateResult`] to pick up the real data when it arrives.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::{LoadError, LoadResult};
use crate::logging::log_timeout;

fn millis(dur: Duration) -> u64 {
    dur.as_millis().min(u64::MAX as u128) as u64
}

/// Resolves with `fut`, or `LoadError::Timeout` if the timer fires first.
/// The timer lives inside the race and is dropped with it on both branches.
/// Dropping `fut` on timeout is this function's only side effect; use
/// [`soft_load`] when the work must keep going.
pub async fn with_timeout<F, T>(fut: F, dur: Duration) -> LoadResult<T>
where
    F: Future<Output = LoadResult<T>>,
{
    match tokio::time::timeout(dur, fut).await {
        Ok(res) => res,
        Err(_) => Err(LoadError::Timeout(millis(dur))),
    }
}

/// Handle to a load that outlived its timeout.
pub struct LateResult<T> {
    handle: JoinHandle<LoadResult<T>>,
}

impl<T: Send + 'static> LateResult<T> {
    pub async fn wait(self) -> LoadResult<T> {
        join_result(self.handle.await)
    }

    /// Writes the eventual outcome into `slot`; ignored if the slot was
    /// closed in the meantime.
    pub fn deliver_to(self, slot: ViewSlot<T>) -> JoinHandle<bool> {
        tokio::spawn(async move {
            match self.wait().await {
                Ok(value) => slot.set(ViewState::Ready(value)),
                Err(err) => slot.set(ViewState::Failed(err.to_string())),
            }
        })
    }
}

fn join_result<T>(joined: Result<LoadResult<T>, tokio::task::JoinError>) -> LoadResult<T> {
    joined.unwrap_or_else(|e| Err(LoadError::fetch("background load", e)))
}

pub enum SoftLoad<T> {
    Ready(LoadResult<T>),
    TimedOut(LateResult<T>),
}

/// Spawns `fut` and waits at most `dur` for it. On timeout the task keeps
/// running and is returned as a [`LateResult`].
pub async fn soft_load<F, T>(label: &str, fut: F, dur: Duration) -> SoftLoad<T>
where
    F: Future<Output = LoadResult<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut handle = tokio::spawn(fut);
    match tokio::time::timeout(dur, &mut handle).await {
        Ok(joined) => SoftLoad::Ready(join_result(joined)),
        Err(_) => {
            log_timeout(label, millis(dur));
            SoftLoad::TimedOut(LateResult { handle })
        }
    }
}

/// Single-output variant of [`soft_load`]: the timeout is only logged and
/// the late result is awaited, so the caller still sees exactly one outcome.
pub async fn load_settled<F, T>(label: &str, fut: F, dur: Duration) -> LoadResult<T>
where
    F: Future<Output = LoadResult<T>> + Send + 'static,
    T: Send + 'static,
{
    match soft_load(label, fut, dur).await {
        SoftLoad::Ready(res) => res,
        SoftLoad::TimedOut(late) => late.wait().await,
    }
}

// =============================================================================
// View slot
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Loading,
    /// Timeout elapsed; the load is still running.
    TimedOut,
    Ready(T),
    Failed(String),
}

struct SlotInner<T> {
    state: ViewState<T>,
    writes: u64,
    closed: bool,
}

/// Shared, last-write-wins holder for what a view displays.
/// Once closed, every write is a no-op.
pub struct ViewSlot<T> {
    inner: Arc<Mutex<SlotInner<T>>>,
}

impl<T> Clone for ViewSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for ViewSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ViewSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlotInner {
                state: ViewState::Loading,
                writes: 0,
                closed: false,
            })),
        }
    }

    /// Returns false when the slot is closed or its lock is poisoned.
    pub fn set(&self, state: ViewState<T>) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        if inner.closed {
            return false;
        }
        inner.state = state;
        inner.writes += 1;
        true
    }

    pub fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().map(|i| i.closed).unwrap_or(true)
    }

    pub fn writes(&self) -> u64 {
        self.inner.lock().map(|i| i.writes).unwrap_or(0)
    }
}

impl<T: Clone> ViewSlot<T> {
    pub fn get(&self) -> Option<ViewState<T>> {
        self.inner.lock().ok().map(|i| i.state.clone())
    }
}

/// Drives a slot through a soft-timeout load: `Ready`/`Failed` if the
/// load settles in time, otherwise `TimedOut` followed by the late result.
pub async fn load_into_view<F, T>(
    label: &str,
    slot: &ViewSlot<T>,
    fut: F,
    dur: Duration,
) -> Option<JoinHandle<bool>>
where
    F: Future<Output = LoadResult<T>> + Send + 'static,
    T: Send + 'static,
{
    slot.set(ViewState::Loading);
    match soft_load(label, fut, dur).await {
        SoftLoad::Ready(Ok(value)) => {
            slot.set(ViewState::Ready(value));
            None
        }
        SoftLoad::Ready(Err(err)) => {
            slot.set(ViewState::Failed(err.to_string()));
            None
        }
        SoftLoad::TimedOut(late) => {
            slot.set(ViewState::TimedOut);
            Some(late.deliver_to(slot.clone()))
        }
    }
}
