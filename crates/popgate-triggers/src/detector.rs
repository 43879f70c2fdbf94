//! Detector contract and the shared plumbing every detector is built on.
//!
//! A detector is a single-shot asynchronous predicate. [`Detector::start`]
//! arms it with a callback; the callback runs at most once, with either
//! [`Detection::Triggered`] or [`Detection::Unmet`]. [`Detector::stop`] is
//! synchronous: once it returns the callback has been dropped and will
//! never run.
//!
//! Concrete detectors own a [`DetectorCore`] and hand [`Resolver`] clones to
//! the tasks they spawn.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use popgate_core::{PageContext, SignalBus, TriggerContext};
use popgate_settings::TriggerSettings;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::latch::{LatchState, TriggerLatch};

/// How a detector resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// The condition became true.
    Triggered(TriggerContext),
    /// The condition can never become true on this page.
    Unmet(String),
}

impl Detection {
    /// Whether the condition was met.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        matches!(self, Self::Triggered(_))
    }
}

/// Callback invoked when a detector resolves.
pub type ResolveCallback = Box<dyn FnOnce(Detection) + Send + 'static>;

/// A single behavioral condition.
pub trait Detector: Send + Sync {
    /// Trigger-type name this detector was built for.
    fn trigger_type(&self) -> &str;

    /// Arm the detector. Only the first call on a fresh detector has any
    /// effect; later calls drop `on_resolved` unused.
    fn start(&self, on_resolved: ResolveCallback);

    /// Cancel the detector. Idempotent, and safe before [`Detector::start`].
    fn stop(&self);

    /// Whether the detector is armed and still waiting.
    fn is_active(&self) -> bool;

    /// Release everything the detector holds. Equivalent to `stop`.
    fn destroy(&self) {
        self.stop();
    }
}

#[cfg(test)]
impl std::fmt::Debug for dyn Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("trigger_type", &self.trigger_type())
            .finish_non_exhaustive()
    }
}

/// What detectors observe: the signal bus, readable page state and defaults.
#[derive(Clone)]
pub struct DetectorEnv {
    /// Live page signals.
    pub bus: SignalBus,
    /// Page state read on demand.
    pub page: Arc<dyn PageContext>,
    /// Defaults for fields a campaign leaves out.
    pub settings: TriggerSettings,
}

impl DetectorEnv {
    /// Bundle a bus, page and settings.
    pub fn new(bus: SignalBus, page: Arc<dyn PageContext>, settings: TriggerSettings) -> Self {
        Self {
            bus,
            page,
            settings,
        }
    }
}

impl std::fmt::Debug for DetectorEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorEnv")
            .field("subscribers", &self.bus.subscriber_count())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

struct CoreShared {
    trigger_type: String,
    latch: TriggerLatch,
    cancel: CancellationToken,
    callback: Mutex<Option<ResolveCallback>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CoreShared {
    fn resolve(&self, detection: Detection) -> bool {
        let callback = {
            let mut slot = self.callback.lock();
            let won = match &detection {
                Detection::Triggered(_) => self.latch.fire(),
                Detection::Unmet(_) => self.latch.abandon(),
            };
            if !won {
                return false;
            }
            slot.take()
        };
        debug!(
            trigger_type = %self.trigger_type,
            triggered = detection.is_triggered(),
            "detector resolved"
        );
        self.release();
        if let Some(callback) = callback {
            callback(detection);
        }
        true
    }

    fn stop(&self) {
        let (changed, callback) = {
            let mut slot = self.callback.lock();
            (self.latch.stop(), slot.take())
        };
        drop(callback);
        self.release();
        if changed {
            debug!(trigger_type = %self.trigger_type, "detector stopped");
        }
    }

    fn release(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}

/// Owner side of a detector's latch, callback and background task.
///
/// Dropping the core stops the detector.
pub struct DetectorCore {
    shared: Arc<CoreShared>,
}

impl DetectorCore {
    /// Fresh core for `trigger_type`, in [`LatchState::Idle`].
    pub fn new(trigger_type: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(CoreShared {
                trigger_type: trigger_type.into(),
                latch: TriggerLatch::new(),
                cancel: CancellationToken::new(),
                callback: Mutex::new(None),
                task: Mutex::new(None),
            }),
        }
    }

    /// Trigger-type name.
    pub fn trigger_type(&self) -> &str {
        &self.shared.trigger_type
    }

    /// Current latch state.
    pub fn state(&self) -> LatchState {
        self.shared.latch.state()
    }

    /// Whether the detector is armed.
    pub fn is_active(&self) -> bool {
        self.shared.latch.is_armed()
    }

    /// Install the callback and move `Idle → Armed`.
    ///
    /// Returns `false` (dropping the callback) if the detector was already
    /// started or stopped.
    pub fn arm(&self, on_resolved: ResolveCallback) -> bool {
        let mut slot = self.shared.callback.lock();
        if !self.shared.latch.arm() {
            return false;
        }
        *slot = Some(on_resolved);
        debug!(trigger_type = %self.shared.trigger_type, "detector armed");
        true
    }

    /// Handle for tasks that may resolve the detector later.
    pub fn resolver(&self) -> Resolver {
        Resolver {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Resolve now. See [`Resolver::resolve`].
    pub fn resolve(&self, detection: Detection) -> bool {
        self.shared.resolve(detection)
    }

    /// Run `fut` as the detector's background task.
    ///
    /// The task is cancelled when the detector resolves or stops. Nothing is
    /// spawned if the detector is no longer armed. A panicking task resolves
    /// the detector as unmet.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.shared.task.lock();
        if !self.shared.latch.is_armed() {
            return;
        }
        let token = self.shared.cancel.clone();
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                outcome = AssertUnwindSafe(fut).catch_unwind() => {
                    if outcome.is_err() {
                        warn!(trigger_type = %shared.trigger_type, "detector task panicked");
                        let _ = shared.resolve(Detection::Unmet("detector task panicked".into()));
                    }
                }
            }
        });
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Stop the detector.
    pub fn stop(&self) {
        self.shared.stop();
    }
}

impl Drop for DetectorCore {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl std::fmt::Debug for DetectorCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorCore")
            .field("trigger_type", &self.shared.trigger_type)
            .field("state", &self.shared.latch.state())
            .finish_non_exhaustive()
    }
}

/// Task-side handle that can resolve a detector.
#[derive(Clone)]
pub struct Resolver {
    shared: Arc<CoreShared>,
}

impl Resolver {
    /// Resolve the detector once.
    ///
    /// Returns `true` if this call resolved it. Later calls, and calls after
    /// `stop`, return `false` without invoking the callback.
    pub fn resolve(&self, detection: Detection) -> bool {
        self.shared.resolve(detection)
    }

    /// Resolve as triggered with `context`.
    pub fn trigger(&self, context: TriggerContext) -> bool {
        self.resolve(Detection::Triggered(context))
    }

    /// Resolve as unmet with `reason`.
    pub fn unmet(&self, reason: impl Into<String>) -> bool {
        self.resolve(Detection::Unmet(reason.into()))
    }

    /// Trigger-type name.
    pub fn trigger_type(&self) -> &str {
        &self.shared.trigger_type
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("trigger_type", &self.shared.trigger_type)
            .finish_non_exhaustive()
    }
}
