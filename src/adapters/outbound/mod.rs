mod dashmap_cache_store;
mod redis_cache_store;
mod system_clock;
mod tcp_auth_client;
mod tmdb_client;

pub use dashmap_cache_store::DashMapCacheStore;
pub use redis_cache_store::RedisCacheStore;
pub use system_clock::SystemClock;
pub use tcp_auth_client::{
    BoxedReader, BoxedWriter, ConnectionStatus, Connector, TcpAuthClient, TcpAuthConfig,
    TcpConnector,
};
pub use tmdb_client::{TmdbClient, TmdbConfig};
