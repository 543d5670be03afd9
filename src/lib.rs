//! media-gateway Library
//!
//! This module exposes the gateway components for use in integration tests
//! and as a library.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::{router, ApiServer, ApiState};
pub use adapters::outbound::{TcpAuthClient, TcpAuthConfig};
pub use application::{CacheService, CatalogService, GateError, GuardChain};
pub use config::{load_config, Config};
pub use domain::entities::{CacheEntry, Identity};
pub use domain::ports::{AuthBackend, CacheStore, Clock, MetadataSource};
pub use infrastructure::{ReconnectConfig, ShutdownController};
