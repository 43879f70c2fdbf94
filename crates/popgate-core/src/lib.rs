//! # popgate-core
//!
//! Shared vocabulary for the popgate crates:
//!
//! - **Campaigns**: [`Campaign`](campaign::Campaign) with its template type and
//!   declarative trigger configuration
//! - **Page signals**: [`PageSignal`](signals::PageSignal) events fanned out to
//!   detectors through a [`SignalBus`](signals::SignalBus)
//! - **Page context**: the [`PageContext`](page::PageContext) trait for state
//!   that is read rather than observed (user agent, scroll position, cart)
//! - **API client**: the [`ApiClient`](api::ApiClient) contract resource hooks
//!   fetch through
//! - **Ids**: product and collection id comparison shared by filters and
//!   hooks
//! - **Logging**: `tracing` subscriber setup and test capture helpers

#![deny(unsafe_code)]

pub mod api;
pub mod campaign;
pub mod context;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod page;
pub mod signals;

pub use api::ApiClient;
pub use campaign::{Campaign, ClientTriggers, EnhancedTriggers, LogicOperator, TemplateType};
pub use context::TriggerContext;
pub use errors::ApiError;
pub use page::{CartSnapshot, PageContext, PageState};
pub use signals::{ActivityKind, PageSignal, ScrollMetrics, SignalBus};
