//! Application Layer
//!
//! Use cases built on the domain ports: the access gate, the cache-aside
//! layer and the catalog reads that go through it.

pub mod access_gate;
pub mod cache_service;
pub mod catalog_service;

pub use access_gate::{AuthGuard, GateError, Guard, GuardChain, RequestContext, SubscriberGuard};
pub use cache_service::{CacheOptions, CacheService};
pub use catalog_service::{CatalogError, CatalogService};
