//! Plumbing shared by the reactive aggregators: the reentrancy gate, the
//! trigger scheduler and the subscription callback factory.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::errors::CoreError;
use crate::store::Change;

/// How a requested pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Completed,
    /// An import was running; nothing was recomputed
    SuppressedByImport,
}

// ── Reentrancy gate ─────────────────────────────────────────────────

/// At most one pass at a time per aggregator (Idle → Loading → Idle).
#[derive(Debug)]
pub(crate) struct PassGate {
    label: &'static str,
    running: AtomicBool,
    idle: Notify,
}

impl PassGate {
    pub(crate) fn new(label: &'static str) -> Arc<Self> {
        Arc::new(Self {
            label,
            running: AtomicBool::new(false),
            idle: Notify::new(),
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Enter Loading, or `None` if a pass is already running.
    pub(crate) fn try_begin(self: &Arc<Self>) -> Option<PassGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| PassGuard {
                gate: Arc::clone(self),
            })
    }

    /// Wait for the in-flight pass (if any) to finish, then enter Loading.
    pub(crate) async fn begin(self: &Arc<Self>) -> PassGuard {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            // Register before probing so a release in between is not missed
            idle.as_mut().enable();
            if let Some(guard) = self.try_begin() {
                return guard;
            }
            debug!("{} pass in flight, waiting", self.label);
            idle.await;
        }
    }
}

/// Back to Idle on drop, whether the pass succeeded, failed or panicked.
#[derive(Debug)]
pub(crate) struct PassGuard {
    gate: Arc<PassGate>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.gate.running.store(false, Ordering::Release);
        self.gate.idle.notify_waiters();
    }
}

// ── Trigger scheduling ──────────────────────────────────────────────

/// Spawns passes on the runtime captured at `initialize()`, optionally
/// collapsing bursts of triggers into one pass per debounce window.
#[derive(Debug)]
pub(crate) struct Scheduler {
    label: &'static str,
    debounce: Option<Duration>,
    handle: Mutex<Option<Handle>>,
    generation: Arc<AtomicU64>,
}

impl Scheduler {
    pub(crate) fn new(label: &'static str, debounce: Option<Duration>) -> Self {
        Self {
            label,
            debounce,
            handle: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Capture the current tokio runtime. Fails outside of one.
    pub(crate) fn attach(&self) -> Result<(), CoreError> {
        let handle = Handle::try_current()?;
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    pub(crate) fn detach(&self) {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // Pending debounced passes see a newer generation and give up
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn handle(&self) -> Option<Handle> {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `pass` now, without debouncing.
    pub(crate) fn spawn<F, Fut>(&self, pass: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        match self.handle() {
            Some(handle) => {
                handle.spawn(pass());
            }
            None => debug!("{} not initialized, trigger ignored", self.label),
        }
    }

    /// Run `pass` after the debounce window, unless a newer trigger
    /// arrives first. Without a window this is [`spawn`](Self::spawn).
    pub(crate) fn schedule<F, Fut>(&self, pass: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(window) = self.debounce else {
            self.spawn(pass);
            return;
        };
        let Some(handle) = self.handle() else {
            debug!("{} not initialized, trigger ignored", self.label);
            return;
        };

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let latest = Arc::clone(&self.generation);
        let label = self.label;
        handle.spawn(async move {
            tokio::time::sleep(window).await;
            if latest.load(Ordering::Acquire) == generation {
                pass().await;
            } else {
                debug!("{} trigger superseded within debounce window", label);
            }
        });
    }
}

/// Subscription callback that forwards any change batch to `fire`,
/// holding only a weak reference to the aggregator.
pub(crate) fn retrigger<S, T>(
    target: &Arc<S>,
    fire: fn(&Arc<S>),
) -> impl Fn(&[Change<T>]) + Send + Sync + 'static
where
    S: Send + Sync + 'static,
{
    let weak = Arc::downgrade(target);
    move |_: &[Change<T>]| {
        if let Some(target) = weak.upgrade() {
            fire(&target);
        }
    }
}
