//! Receptivity enrichment for header-bidding requests.
//!
//! This crate fetches a "receptivity" signal from an externally loaded
//! connector, caches it per customer and bidder with a time-to-live, and
//! merges it into ad-server targeting and OpenRTB 2 bidder fragments. When
//! the engine is not available it falls back to cached values, or to
//! nothing at all.
//!
//! # Modules
//!
//! - [`analytics`]: Optional analytics sink
//! - [`cache`]: Time-bound receptivity cache over session storage
//! - [`clock`]: Wall clock abstraction
//! - [`connector`]: Connector loading, readiness state machine and live API
//! - [`constants`]: Module-wide constants
//! - [`error`]: Error types
//! - [`events`]: Behavioral event collection before the engine is ready
//! - [`logging`]: Logger installation
//! - [`openrtb`]: OpenRTB 2 fragment types
//! - [`provider`]: The host-facing real-time data provider
//! - [`receptivity`]: The opaque receptivity value
//! - [`settings`]: Module configuration and settings loading
//! - [`storage`]: Session storage abstraction

pub mod analytics;
pub mod cache;
pub mod clock;
pub mod connector;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod openrtb;
pub mod provider;
pub mod receptivity;
mod resolver;
pub mod settings;
pub mod storage;
pub mod test_support;

pub use provider::{ContxtfulRtdProvider, ContxtfulRtdProviderBuilder};
