//! Campaign model.
//!
//! A [`Campaign`] is read-only input to both engines: the trigger engine reads
//! [`EnhancedTriggers`], the hook executor reads the template type and the
//! content/design configuration. The campaign itself uses `camelCase` JSON;
//! the trigger map keeps the admin UI's `snake_case` keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys inside the enhanced trigger object that configure combination rather
/// than naming a trigger type.
const COMBINATION_KEYS: &[&str] = &["trigger_combination", "logic_operator"];

/// A marketing campaign that may be shown as a popup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    /// Campaign identifier.
    pub id: String,
    /// Human-readable name (admin-facing, used in logs only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Template the popup renders with; selects the resource hooks.
    pub template_type: TemplateType,
    /// Template content (headlines, product selection, discount copy).
    #[serde(default)]
    pub content_config: Value,
    /// Visual configuration (colors, background image, layout).
    #[serde(default)]
    pub design_config: Value,
    /// Client-side trigger configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_triggers: Option<ClientTriggers>,
}

impl Campaign {
    /// Create a campaign with empty content/design configuration and no triggers.
    #[must_use]
    pub fn new(id: impl Into<String>, template_type: TemplateType) -> Self {
        Self {
            id: id.into(),
            name: None,
            template_type,
            content_config: Value::Null,
            design_config: Value::Null,
            client_triggers: None,
        }
    }

    /// Attach an enhanced trigger configuration.
    #[must_use]
    pub fn with_triggers(mut self, triggers: EnhancedTriggers) -> Self {
        self.client_triggers = Some(ClientTriggers {
            enhanced_triggers: triggers,
        });
        self
    }

    /// Replace the content configuration.
    #[must_use]
    pub fn with_content(mut self, content: Value) -> Self {
        self.content_config = content;
        self
    }

    /// Replace the design configuration.
    #[must_use]
    pub fn with_design(mut self, design: Value) -> Self {
        self.design_config = design;
        self
    }

    /// The enhanced trigger configuration, if any.
    #[must_use]
    pub fn triggers(&self) -> Option<&EnhancedTriggers> {
        self.client_triggers.as_ref().map(|c| &c.enhanced_triggers)
    }
}

/// Popup template type.
///
/// Unknown template names deserialize to [`TemplateType::Other`] so a new
/// admin template never makes a campaign unreadable; it simply has no hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateType {
    /// Email capture.
    Newsletter,
    /// Time-boxed discount.
    FlashSale,
    /// Gamified wheel discount.
    SpinToWin,
    /// Gamified scratch-card discount.
    ScratchCard,
    /// Cart recovery reminder.
    CartAbandonment,
    /// Product recommendations.
    ProductUpsell,
    /// Free-shipping threshold progress.
    FreeShipping,
    /// Countdown banner.
    Countdown,
    /// Plain announcement.
    Announcement,
    /// Any template this build does not know.
    #[serde(other)]
    Other,
}

impl std::fmt::Display for TemplateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Newsletter => "NEWSLETTER",
            Self::FlashSale => "FLASH_SALE",
            Self::SpinToWin => "SPIN_TO_WIN",
            Self::ScratchCard => "SCRATCH_CARD",
            Self::CartAbandonment => "CART_ABANDONMENT",
            Self::ProductUpsell => "PRODUCT_UPSELL",
            Self::FreeShipping => "FREE_SHIPPING",
            Self::Countdown => "COUNTDOWN",
            Self::Announcement => "ANNOUNCEMENT",
            Self::Other => "OTHER",
        };
        f.write_str(name)
    }
}

/// Client-side trigger wrapper as stored on the campaign.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTriggers {
    /// Per-type trigger configuration.
    #[serde(default)]
    pub enhanced_triggers: EnhancedTriggers,
}

/// How detector results are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOperator {
    /// Every enabled trigger must resolve `true`.
    #[default]
    And,
    /// Any enabled trigger resolving `true` is enough.
    Or,
}

impl LogicOperator {
    /// Parse an operator name case-insensitively.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogicOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
        }
    }
}

/// Explicit combination block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerCombination {
    /// `AND` / `OR`, any case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

/// Trigger-type name → per-type configuration object, plus combination keys.
///
/// Per-type objects stay as raw JSON here; each detector parses its own
/// typed configuration so adding a trigger type never touches this model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnhancedTriggers {
    /// Preferred combination source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_combination: Option<TriggerCombination>,
    /// Legacy combination source, used when `trigger_combination` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic_operator: Option<String>,
    /// Per-type configuration keyed by trigger-type name.
    #[serde(flatten)]
    pub triggers: BTreeMap<String, Value>,
}

impl EnhancedTriggers {
    /// Add or replace one trigger type's configuration.
    #[must_use]
    pub fn with(mut self, trigger_type: impl Into<String>, config: Value) -> Self {
        let _ = self.triggers.insert(trigger_type.into(), config);
        self
    }

    /// Set the combination operator.
    #[must_use]
    pub fn with_operator(mut self, operator: LogicOperator) -> Self {
        self.trigger_combination = Some(TriggerCombination {
            operator: Some(operator.to_string()),
        });
        self
    }

    /// Resolve the combination policy.
    ///
    /// `trigger_combination.operator` wins over `logic_operator`; anything
    /// missing or unparseable falls through to `AND`.
    #[must_use]
    pub fn policy(&self) -> LogicOperator {
        self.trigger_combination
            .as_ref()
            .and_then(|c| c.operator.as_deref())
            .and_then(LogicOperator::parse)
            .or_else(|| self.logic_operator.as_deref().and_then(LogicOperator::parse))
            .unwrap_or_default()
    }

    /// All configured trigger types (enabled or not), in key order.
    pub fn configured(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.triggers
            .iter()
            .filter(|(name, config)| {
                config.is_object() && !COMBINATION_KEYS.contains(&name.as_str())
            })
            .map(|(name, config)| (name.as_str(), config))
    }

    /// Names of the configured trigger types whose `enabled` flag is `true`.
    #[must_use]
    pub fn enabled_types(&self) -> Vec<&str> {
        self.configured()
            .filter(|(_, config)| is_enabled(config))
            .map(|(name, _)| name)
            .collect()
    }
}

/// Whether a per-type configuration object is enabled.
///
/// A missing `enabled` flag counts as disabled.
#[must_use]
pub fn is_enabled(config: &Value) -> bool {
    config
        .get("enabled")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}
