//! API client contract.
//!
//! The HTTP plumbing lives outside popgate; resource hooks only need
//! something that returns JSON-shaped data asynchronously and may fail.

use async_trait::async_trait;
use serde_json::Value;

use crate::campaign::Campaign;
use crate::errors::Result;

/// Storefront API used by resource hooks.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Campaigns currently active for this storefront.
    async fn fetch_active_campaigns(&self) -> Result<Vec<Campaign>>;

    /// Product records for the given ids.
    async fn fetch_products(&self, product_ids: &[String]) -> Result<Value>;

    /// Recommended products, skipping `exclude`.
    async fn fetch_recommendations(&self, limit: usize, exclude: &[String]) -> Result<Value>;

    /// The visitor's current cart.
    async fn fetch_cart(&self, session_id: &str) -> Result<Value>;

    /// Inventory counts keyed by product id.
    async fn fetch_inventory(&self, product_ids: &[String]) -> Result<Value>;

    /// Fetch an image so it is warm in the browser cache; returns its metadata.
    async fn preload_image(&self, url: &str) -> Result<Value>;
}
