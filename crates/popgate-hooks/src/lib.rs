//! # popgate-hooks
//!
//! Loads what a popup needs **before** it renders.
//!
//! - [`PreDisplayHook`]: one resource loader (products, cart, inventory,
//!   background image)
//! - [`HookRegistry`]: template type → ordered hooks
//! - [`HookExecutor`]: concurrent per-hook pipelines with timeouts and
//!   caching, aggregated into a [`CampaignHooksResult`]
//! - [`ResourceCache`]: campaign-scoped TTL cache of successful hook data

#![deny(unsafe_code)]

pub mod builtin;
pub mod cache;
pub mod errors;
pub mod executor;
pub mod handler;
pub mod registry;
pub mod types;

pub use builtin::register_default_hooks;
pub use cache::ResourceCache;
pub use errors::{HookError, Result};
pub use executor::HookExecutor;
pub use handler::PreDisplayHook;
pub use registry::HookRegistry;
pub use types::{CampaignHooksResult, HookContext, HookInfo, HookResult};
