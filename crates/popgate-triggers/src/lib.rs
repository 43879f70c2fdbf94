//! # popgate-triggers
//!
//! Decides **when** a campaign may appear.
//!
//! - [`Detector`]: single-shot behavioral predicates (exit intent, scroll
//!   depth, idle time, cart events, custom events, product views, delays)
//!   built on a [`TriggerLatch`] so each resolves at most once
//! - [`DetectorRegistry`]: trigger-type name → detector factory
//! - [`TriggerManager`]: AND/OR combination of a campaign's detectors into
//!   one [`TriggerDecision`]

#![deny(unsafe_code)]

pub mod detector;
pub mod detectors;
pub mod errors;
pub mod filter;
pub mod latch;
pub mod manager;
pub mod registry;

pub use detector::{Detection, Detector, DetectorCore, DetectorEnv, ResolveCallback, Resolver};
pub use errors::{Result, TriggerError};
pub use filter::ProductFilter;
pub use latch::{LatchState, TriggerLatch};
pub use manager::{TriggerDecision, TriggerManager};
pub use registry::{BUILTIN_TRIGGER_TYPES, DetectorFactory, DetectorRegistry};
