//! AND/OR combination of a campaign's detectors.
//!
//! Every configured trigger type becomes one boolean future. The futures are
//! polled together and the first decisive result wins: the first `false`
//! under `AND`, the first `true` under `OR`. Detectors created for an
//! evaluation are destroyed as soon as it resolves.
//!
//! A detector that panics while being built or started counts as `false` for
//! its trigger type. Once [`TriggerManager::cleanup`] has run the manager is
//! spent: evaluations still arming stop creating detectors and every
//! evaluation resolves `false`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use parking_lot::Mutex;
use popgate_core::campaign::is_enabled;
use popgate_core::{Campaign, LogicOperator, TriggerContext};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::detector::{Detection, Detector, DetectorEnv};
use crate::registry::DetectorRegistry;

/// Outcome of one trigger evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerDecision {
    /// Whether the popup may be shown.
    pub show: bool,
    /// Context from the detector that decided, when a detector decided.
    pub context: Option<TriggerContext>,
}

impl TriggerDecision {
    /// Show, with optional context.
    #[must_use]
    pub fn show(context: Option<TriggerContext>) -> Self {
        Self {
            show: true,
            context,
        }
    }

    /// Do not show.
    #[must_use]
    pub fn hide() -> Self {
        Self::default()
    }
}

struct TypeOutcome {
    trigger_type: String,
    met: bool,
    context: Option<TriggerContext>,
}

impl TypeOutcome {
    fn unmet(trigger_type: String) -> Self {
        Self {
            trigger_type,
            met: false,
            context: None,
        }
    }
}

type Pending = BoxFuture<'static, TypeOutcome>;

/// Evaluates campaign trigger configurations.
pub struct TriggerManager {
    registry: Arc<DetectorRegistry>,
    env: DetectorEnv,
    active: Mutex<Vec<Arc<dyn Detector>>>,
    cancel: CancellationToken,
}

impl TriggerManager {
    /// Manager over `registry`, observing `env`.
    pub fn new(registry: Arc<DetectorRegistry>, env: DetectorEnv) -> Self {
        Self {
            registry,
            env,
            active: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Manager with the built-in detectors.
    pub fn with_defaults(env: DetectorEnv) -> Self {
        Self::new(Arc::new(DetectorRegistry::with_defaults()), env)
    }

    /// Whether `campaign`'s triggers allow showing it.
    pub async fn evaluate_triggers(&self, campaign: &Campaign) -> bool {
        self.evaluate(campaign).await.show
    }

    /// Evaluate `campaign`'s triggers.
    ///
    /// Never fails: detectors that cannot be built, and disabled trigger
    /// types, count as `false`. With no enabled trigger type the campaign is
    /// shown immediately without creating any detector.
    #[instrument(skip_all, fields(campaign_id = %campaign.id))]
    pub async fn evaluate(&self, campaign: &Campaign) -> TriggerDecision {
        if self.cancel.is_cancelled() {
            debug!("manager cleaned up, not evaluating");
            return TriggerDecision::hide();
        }
        let Some(triggers) = campaign.triggers() else {
            debug!("no trigger configuration, showing immediately");
            return TriggerDecision::show(None);
        };
        if triggers.enabled_types().is_empty() {
            debug!("no enabled triggers, showing immediately");
            return TriggerDecision::show(None);
        }

        let policy = triggers.policy();
        let mut created: Vec<Arc<dyn Detector>> = Vec::new();
        let mut pending: FuturesUnordered<Pending> = FuturesUnordered::new();
        for (trigger_type, config) in triggers.configured() {
            pending.push(self.arm(trigger_type, config, &mut created));
        }
        debug!(%policy, detectors = created.len(), "trigger evaluation armed");

        let decision = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                debug!("trigger evaluation cancelled");
                TriggerDecision::hide()
            }
            decision = combine(policy, &mut pending) => decision,
        };
        drop(pending);
        self.release(&created);
        debug!(show = decision.show, "trigger evaluation resolved");
        decision
    }

    /// Destroy every live detector and cancel pending evaluations, which
    /// resolve `false`. Detectors are never created by this manager again.
    pub fn cleanup(&self) {
        self.cancel.cancel();
        let detectors = std::mem::take(&mut *self.active.lock());
        for detector in &detectors {
            detector.destroy();
        }
        if !detectors.is_empty() {
            debug!(count = detectors.len(), "destroyed active detectors");
        }
    }

    /// Whether [`TriggerManager::cleanup`] has run.
    pub fn is_cleaned_up(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of detectors currently owned by in-flight evaluations.
    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    fn arm(
        &self,
        trigger_type: &str,
        config: &Value,
        created: &mut Vec<Arc<dyn Detector>>,
    ) -> Pending {
        let trigger_type = trigger_type.to_string();
        if !is_enabled(config) {
            debug!(trigger_type = %trigger_type, "trigger disabled, counting as false");
            return futures::future::ready(TypeOutcome::unmet(trigger_type)).boxed();
        }
        if self.cancel.is_cancelled() {
            debug!(trigger_type = %trigger_type, "manager cleaned up, not arming");
            return futures::future::ready(TypeOutcome::unmet(trigger_type)).boxed();
        }

        let built = catch_unwind(AssertUnwindSafe(|| {
            self.registry.build(&trigger_type, config, &self.env)
        }));
        let detector: Arc<dyn Detector> = match built {
            Ok(Ok(detector)) => Arc::from(detector),
            Ok(Err(error)) => {
                warn!(trigger_type = %trigger_type, error = %error, "failed to build detector");
                return futures::future::ready(TypeOutcome::unmet(trigger_type)).boxed();
            }
            Err(_) => {
                warn!(trigger_type = %trigger_type, "detector factory panicked");
                return futures::future::ready(TypeOutcome::unmet(trigger_type)).boxed();
            }
        };

        let (tx, rx) = oneshot::channel();
        self.active.lock().push(Arc::clone(&detector));
        created.push(Arc::clone(&detector));
        let started = catch_unwind(AssertUnwindSafe(|| {
            detector.start(Box::new(move |detection| {
                let _ = tx.send(detection);
            }));
        }));
        if started.is_err() {
            warn!(trigger_type = %trigger_type, "detector panicked while starting");
            detector.destroy();
            return futures::future::ready(TypeOutcome::unmet(trigger_type)).boxed();
        }
        if self.cancel.is_cancelled() {
            // Cleanup ran while this detector was starting and may have
            // missed it.
            detector.destroy();
        }

        async move {
            let (met, context) = match rx.await {
                Ok(Detection::Triggered(context)) => (true, Some(context)),
                Ok(Detection::Unmet(reason)) => {
                    debug!(trigger_type = %trigger_type, reason = %reason, "trigger cannot be met");
                    (false, None)
                }
                Err(_) => {
                    debug!(trigger_type = %trigger_type, "detector stopped before resolving");
                    (false, None)
                }
            };
            TypeOutcome {
                trigger_type,
                met,
                context,
            }
        }
        .boxed()
    }

    fn release(&self, created: &[Arc<dyn Detector>]) {
        for detector in created {
            detector.destroy();
        }
        self.active
            .lock()
            .retain(|live| !created.iter().any(|c| Arc::ptr_eq(c, live)));
    }
}

impl Drop for TriggerManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for TriggerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerManager")
            .field("registry", &self.registry)
            .field("active", &self.active_count())
            .finish_non_exhaustive()
    }
}

async fn combine(
    policy: LogicOperator,
    pending: &mut FuturesUnordered<Pending>,
) -> TriggerDecision {
    match policy {
        LogicOperator::And => {
            let mut last = None;
            while let Some(outcome) = pending.next().await {
                if !outcome.met {
                    debug!(trigger_type = %outcome.trigger_type, "AND short-circuited on false");
                    return TriggerDecision::hide();
                }
                last = outcome.context.or(last);
            }
            TriggerDecision::show(last)
        }
        LogicOperator::Or => {
            while let Some(outcome) = pending.next().await {
                if outcome.met {
                    debug!(trigger_type = %outcome.trigger_type, "OR short-circuited on true");
                    return TriggerDecision::show(outcome.context);
                }
            }
            TriggerDecision::hide()
        }
    }
}
