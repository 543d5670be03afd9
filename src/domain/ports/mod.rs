mod auth_backend;
mod cache_store;
mod clock;
mod metadata_source;

pub use auth_backend::{AuthBackend, AuthBackendError};
pub use cache_store::{CacheStore, CacheStoreError};
pub use clock::Clock;
pub use metadata_source::{MetadataError, MetadataSource};
