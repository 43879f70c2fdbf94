//! Background image preloading.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::field;
use crate::errors::HookError;
use crate::handler::PreDisplayHook;
use crate::types::{HookContext, HookResult};

const NAME: &str = "background_image";
const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Preloads `design_config.background_image_url`.
///
/// Never fails: a load error or slow load is reported as
/// `{"loaded": false, "error": ...}` so the popup renders without the image.
#[derive(Debug, Clone)]
pub struct BackgroundImageHook {
    load_timeout: Duration,
}

impl BackgroundImageHook {
    /// Hook that gives up on the image after `load_timeout`.
    #[must_use]
    pub fn new(load_timeout: Duration) -> Self {
        Self { load_timeout }
    }
}

impl Default for BackgroundImageHook {
    fn default() -> Self {
        Self::new(DEFAULT_LOAD_TIMEOUT)
    }
}

#[async_trait]
impl PreDisplayHook for BackgroundImageHook {
    fn name(&self) -> &str {
        NAME
    }

    fn run_in_preview(&self) -> bool {
        true
    }

    // Longer than the load timeout so the hook itself never times out.
    fn timeout_ms(&self) -> Option<u64> {
        let load_ms = u64::try_from(self.load_timeout.as_millis()).unwrap_or(u64::MAX);
        Some(load_ms.saturating_add(1_000))
    }

    fn description(&self) -> Option<&str> {
        Some("Preloads the campaign background image")
    }

    async fn execute(&self, context: &HookContext) -> Result<HookResult, HookError> {
        let Some(url) = field(
            &context.campaign.design_config,
            "background_image_url",
            "backgroundImageUrl",
        )
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty()) else {
            return Ok(HookResult::ok(NAME, None));
        };

        let data = match tokio::time::timeout(self.load_timeout, context.api.preload_image(url)).await
        {
            Ok(Ok(image)) => json!({ "loaded": true, "url": url, "image": image }),
            Ok(Err(error)) => {
                debug!(url, error = %error, "background image failed to load");
                json!({ "loaded": false, "url": url, "error": error.to_string() })
            }
            Err(_) => {
                debug!(url, "background image load timed out");
                json!({
                    "loaded": false,
                    "url": url,
                    "error": format!("image load timed out after {}ms", self.load_timeout.as_millis()),
                })
            }
        };
        Ok(HookResult::ok(NAME, Some(data)))
    }
}
