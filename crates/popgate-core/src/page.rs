//! Page state that detectors read rather than observe.
//!
//! Page globals (the product or collection being viewed), the user agent,
//! the current scroll position and the cart snapshot are owned by the host.
//! [`PageState`] is a thread-safe in-memory implementation the host keeps
//! up to date; tests use it directly.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::signals::ScrollMetrics;

/// Read-only view of host page state.
pub trait PageContext: Send + Sync {
    /// Browser user agent string.
    fn user_agent(&self) -> String;

    /// Current document scroll geometry.
    fn scroll_metrics(&self) -> ScrollMetrics;

    /// Product shown on the current page, if it is a product page.
    fn product_id(&self) -> Option<String>;

    /// Collections the current page belongs to (collection page or the
    /// viewed product's collections).
    fn collection_ids(&self) -> Vec<String>;

    /// Latest known cart, if the theme exposes one.
    fn cart(&self) -> Option<CartSnapshot>;
}

/// Cart totals as exposed by the theme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CartSnapshot {
    /// Cart total in currency units.
    pub total: f64,
    /// Number of line items.
    pub item_count: u32,
    /// ISO currency code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl CartSnapshot {
    /// A cart with the given total and item count.
    #[must_use]
    pub fn new(total: f64, item_count: u32) -> Self {
        Self {
            total,
            item_count,
            currency: None,
        }
    }
}

#[derive(Debug, Default)]
struct PageStateInner {
    user_agent: String,
    scroll: ScrollMetrics,
    product_id: Option<String>,
    collection_ids: Vec<String>,
    cart: Option<CartSnapshot>,
}

/// Mutable, shareable page state.
#[derive(Debug, Default)]
pub struct PageState {
    inner: RwLock<PageStateInner>,
}

impl PageState {
    /// Empty page state (desktop-agnostic user agent, top of page, no cart).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user agent.
    pub fn set_user_agent(&self, user_agent: impl Into<String>) {
        self.inner.write().user_agent = user_agent.into();
    }

    /// Set the current scroll geometry.
    pub fn set_scroll(&self, scroll: ScrollMetrics) {
        self.inner.write().scroll = scroll;
    }

    /// Set (or clear) the product shown on this page.
    pub fn set_product(&self, product_id: Option<String>) {
        self.inner.write().product_id = product_id;
    }

    /// Set the collections of the current page.
    pub fn set_collections(&self, collection_ids: Vec<String>) {
        self.inner.write().collection_ids = collection_ids;
    }

    /// Set (or clear) the cart snapshot.
    pub fn set_cart(&self, cart: Option<CartSnapshot>) {
        self.inner.write().cart = cart;
    }
}

impl PageContext for PageState {
    fn user_agent(&self) -> String {
        self.inner.read().user_agent.clone()
    }

    fn scroll_metrics(&self) -> ScrollMetrics {
        self.inner.read().scroll
    }

    fn product_id(&self) -> Option<String> {
        self.inner.read().product_id.clone()
    }

    fn collection_ids(&self) -> Vec<String> {
        self.inner.read().collection_ids.clone()
    }

    fn cart(&self) -> Option<CartSnapshot> {
        self.inner.read().cart.clone()
    }
}
