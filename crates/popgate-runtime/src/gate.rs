//! Campaign gate.
//!
//! [`CampaignGate::prepare`] runs a campaign's trigger evaluation and, if the
//! triggers allow it, its resource hooks. A detector that panics counts as
//! `false` for its trigger type; should the evaluation task itself die, the
//! gate fails open and counts it as "show". Resource loading fails closed:
//! any failed hook blocks the popup.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use popgate_core::{ApiClient, Campaign, PageContext, SignalBus, TriggerContext};
use popgate_hooks::{CampaignHooksResult, HookExecutor, HookRegistry, register_default_hooks};
use popgate_settings::GateSettings;
use popgate_triggers::{DetectorEnv, DetectorRegistry, TriggerDecision, TriggerManager};
use serde_json::Value;
use tracing::{Instrument, debug, info, instrument, warn};

/// Result of preparing one campaign.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// Triggers resolved false; nothing was loaded.
    Suppressed,
    /// At least one hook failed; the popup must not render.
    Blocked(CampaignHooksResult),
    /// The popup may render.
    Ready {
        /// Hook name → loaded data.
        resources: BTreeMap<String, Value>,
        /// Context from the deciding trigger.
        trigger_context: Option<TriggerContext>,
        /// Every hook result.
        hooks: CampaignHooksResult,
    },
}

impl GateOutcome {
    /// Whether the popup may render.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

type Evaluations = Arc<DashMap<String, Arc<TriggerManager>>>;

/// Composes trigger evaluation with resource loading per campaign.
pub struct CampaignGate {
    env: DetectorEnv,
    detectors: Arc<DetectorRegistry>,
    executor: HookExecutor,
    evaluations: Evaluations,
}

impl CampaignGate {
    /// Gate over the given detectors and hook executor.
    pub fn new(env: DetectorEnv, detectors: Arc<DetectorRegistry>, executor: HookExecutor) -> Self {
        Self {
            env,
            detectors,
            executor,
            evaluations: Arc::new(DashMap::new()),
        }
    }

    /// Gate with the built-in detectors and hooks, configured from `settings`.
    pub fn from_settings(
        bus: SignalBus,
        page: Arc<dyn PageContext>,
        settings: &GateSettings,
    ) -> Self {
        let env = DetectorEnv::new(bus, page, settings.triggers.clone());
        let mut hooks = HookRegistry::new();
        register_default_hooks(&mut hooks);
        let executor = HookExecutor::from_settings(Arc::new(hooks), &settings.hooks);
        Self::new(env, Arc::new(DetectorRegistry::with_defaults()), executor)
    }

    /// Signal bus detectors listen on.
    pub fn bus(&self) -> &SignalBus {
        &self.env.bus
    }

    /// The hook executor.
    pub fn executor(&self) -> &HookExecutor {
        &self.executor
    }

    /// Decide whether `campaign` may render and load what it needs.
    ///
    /// Starting a new preparation for a campaign cancels the one already in
    /// flight for it.
    #[instrument(skip_all, fields(campaign_id = %campaign.id))]
    pub async fn prepare(
        &self,
        campaign: &Campaign,
        api: Arc<dyn ApiClient>,
        session_id: &str,
        visitor_id: Option<&str>,
    ) -> GateOutcome {
        let decision = self.evaluate(campaign).await;
        if !decision.show {
            info!("triggers not met, popup suppressed");
            return GateOutcome::Suppressed;
        }

        let hooks = self
            .executor
            .execute_hooks_for_campaign(
                campaign,
                api,
                session_id,
                visitor_id,
                decision.context.clone(),
            )
            .await;
        if !hooks.success {
            info!(failed = ?hooks.failed_hooks(), "resource hooks failed, popup blocked");
            return GateOutcome::Blocked(hooks);
        }

        info!(resources = hooks.loaded_resources.len(), "popup ready");
        GateOutcome::Ready {
            resources: hooks.loaded_resources.clone(),
            trigger_context: decision.context,
            hooks,
        }
    }

    /// Cancel the evaluation in flight for `campaign_id`.
    ///
    /// Returns `true` if one was running. Its `prepare` resolves
    /// [`GateOutcome::Suppressed`].
    pub fn cancel(&self, campaign_id: &str) -> bool {
        let Some((_, manager)) = self.evaluations.remove(campaign_id) else {
            return false;
        };
        manager.cleanup();
        debug!(campaign_id, "cancelled trigger evaluation");
        true
    }

    /// The campaign's popup was closed: forget its cached resources.
    pub fn on_popup_closed(&self, campaign_id: &str) {
        let removed = self.executor.clear_campaign_cache(campaign_id);
        debug!(campaign_id, removed, "popup closed");
    }

    /// The visitor left the page: cancel everything and clear the cache.
    pub fn on_navigation(&self) {
        let managers: Vec<Arc<TriggerManager>> = self
            .evaluations
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        self.evaluations.clear();
        for manager in &managers {
            manager.cleanup();
        }
        self.executor.clear_cache();
        debug!(cancelled = managers.len(), "navigation reset");
    }

    /// Number of trigger evaluations in flight.
    pub fn active_evaluations(&self) -> usize {
        self.evaluations.len()
    }

    /// Whether an evaluation is in flight for `campaign_id`.
    pub fn is_evaluating(&self, campaign_id: &str) -> bool {
        self.evaluations.contains_key(campaign_id)
    }

    async fn evaluate(&self, campaign: &Campaign) -> TriggerDecision {
        let manager = Arc::new(TriggerManager::new(
            Arc::clone(&self.detectors),
            self.env.clone(),
        ));
        if let Some(previous) = self
            .evaluations
            .insert(campaign.id.clone(), Arc::clone(&manager))
        {
            debug!("replacing in-flight evaluation");
            previous.cleanup();
        }
        let _guard = EvaluationGuard {
            evaluations: Arc::clone(&self.evaluations),
            campaign_id: campaign.id.clone(),
            manager: Arc::clone(&manager),
        };

        let task = {
            let campaign = campaign.clone();
            tokio::spawn(async move { manager.evaluate(&campaign).await }.in_current_span())
        };
        match task.await {
            Ok(decision) => decision,
            Err(error) => {
                warn!(error = %error, "trigger evaluation failed, showing anyway");
                TriggerDecision::show(None)
            }
        }
    }
}

impl std::fmt::Debug for CampaignGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignGate")
            .field("detectors", &self.detectors)
            .field("executor", &self.executor)
            .field("active_evaluations", &self.active_evaluations())
            .finish_non_exhaustive()
    }
}

/// Unregisters and cleans up one evaluation when `prepare` finishes or is
/// dropped.
struct EvaluationGuard {
    evaluations: Evaluations,
    campaign_id: String,
    manager: Arc<TriggerManager>,
}

impl Drop for EvaluationGuard {
    fn drop(&mut self) {
        let _ = self
            .evaluations
            .remove_if(&self.campaign_id, |_, live| Arc::ptr_eq(live, &self.manager));
        self.manager.cleanup();
    }
}
