//! Page signals and the bus that fans them out to detectors.
//!
//! The host page forwards DOM events (`mousemove`, `mouseleave`, `scroll`,
//! activity events, theme custom events) as [`PageSignal`]s. Every armed
//! detector holds its own [`broadcast::Receiver`], so a detector never sees
//! signals emitted before it subscribed and never blocks its siblings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Default bus capacity. Slow receivers beyond this lag and skip signals.
pub const DEFAULT_SIGNAL_CAPACITY: usize = 256;

/// A DOM-level event forwarded by the host page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PageSignal {
    /// Cursor moved.
    #[serde(rename_all = "camelCase")]
    MouseMove {
        /// Horizontal client position in px.
        x: f64,
        /// Vertical client position in px.
        y: f64,
        /// Event timestamp in milliseconds (page clock).
        timestamp_ms: f64,
    },
    /// Cursor left the document.
    MouseLeave {
        /// Horizontal client position in px.
        x: f64,
        /// Vertical client position in px; negative above the viewport.
        y: f64,
    },
    /// Document scrolled.
    Scroll(ScrollMetrics),
    /// Any other visitor activity (keyboard, touch, click).
    Activity {
        /// Which activity.
        kind: ActivityKind,
    },
    /// Theme or application custom event.
    Custom {
        /// Event name as dispatched on `document`/`window`.
        name: String,
        /// Event detail payload.
        #[serde(default)]
        detail: Value,
    },
}

impl PageSignal {
    /// Shorthand for a custom event.
    #[must_use]
    pub fn custom(name: impl Into<String>, detail: Value) -> Self {
        Self::Custom {
            name: name.into(),
            detail,
        }
    }

    /// The activity this signal represents, if it counts as visitor activity.
    #[must_use]
    pub fn activity_kind(&self) -> Option<ActivityKind> {
        match self {
            Self::MouseMove { .. } => Some(ActivityKind::MouseMove),
            Self::Scroll(_) => Some(ActivityKind::Scroll),
            Self::Activity { kind } => Some(*kind),
            Self::MouseLeave { .. } | Self::Custom { .. } => None,
        }
    }
}

/// Visitor activity kinds that reset idle timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// `mousemove`
    MouseMove,
    /// `mousedown`
    MouseDown,
    /// `keydown`
    KeyDown,
    /// `touchstart`
    TouchStart,
    /// `scroll`
    Scroll,
    /// `click`
    Click,
}

impl ActivityKind {
    /// Every activity kind.
    #[must_use]
    pub fn all() -> &'static [ActivityKind] {
        &[
            Self::MouseMove,
            Self::MouseDown,
            Self::KeyDown,
            Self::TouchStart,
            Self::Scroll,
            Self::Click,
        ]
    }
}

/// Document scroll geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollMetrics {
    /// Pixels scrolled from the top.
    pub scroll_top: f64,
    /// Total document height.
    pub scroll_height: f64,
    /// Viewport height.
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Create scroll metrics.
    #[must_use]
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    /// Scroll depth as a percentage in `[0, 100]`.
    ///
    /// A page that cannot scroll has not been scrolled, so it reports 0
    /// unless an offset was recorded anyway. Unset metrics are all zero and
    /// therefore read as the top of the page.
    #[must_use]
    pub fn depth_percent(&self) -> f64 {
        let scrollable = self.scroll_height - self.client_height;
        if scrollable <= 0.0 {
            return if self.scroll_top > 0.0 { 100.0 } else { 0.0 };
        }
        (self.scroll_top / scrollable * 100.0).clamp(0.0, 100.0)
    }
}

/// Fan-out channel from the host page to armed detectors.
#[derive(Clone, Debug)]
pub struct SignalBus {
    tx: broadcast::Sender<PageSignal>,
}

impl SignalBus {
    /// Create a bus that buffers up to `capacity` signals per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to signals emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PageSignal> {
        self.tx.subscribe()
    }

    /// Emit a signal. Returns how many subscribers received it.
    pub fn emit(&self, signal: PageSignal) -> usize {
        self.tx.send(signal).unwrap_or(0)
    }

    /// Emit a custom event.
    pub fn emit_custom(&self, name: impl Into<String>, detail: Value) -> usize {
        self.emit(PageSignal::custom(name, detail))
    }

    /// Number of live subscriptions (armed detectors).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNAL_CAPACITY)
    }
}
