//! TMDB Metadata Client
//!
//! Implements MetadataSource against the TMDB v3 REST API using reqwest.

use crate::domain::ports::{MetadataError, MetadataSource};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// TMDB client configuration.
#[derive(Debug, Clone)]
pub struct TmdbConfig {
    /// API root, e.g. `https://api.themoviedb.org/3`
    pub base_url: String,
    /// v4 read access token sent as a bearer credential
    pub access_key: String,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3".to_string(),
            access_key: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// reqwest-backed TMDB client.
pub struct TmdbClient {
    config: TmdbConfig,
    client: reqwest::Client,
}

impl TmdbClient {
    pub fn new(config: TmdbConfig) -> anyhow::Result<Self> {
        if config.access_key.is_empty() {
            anyhow::bail!("TMDB access key is empty");
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl MetadataSource for TmdbClient {
    async fn fetch(&self, path: &str, query: &[(&str, String)]) -> Result<Value, MetadataError> {
        let url = self.url(path);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_key)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("TMDB API error: {}", e);
                MetadataError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("TMDB API error: {} {} - {}", status, path, body);
            return Err(MetadataError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| MetadataError::Decode(e.to_string()))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> TmdbClient {
        TmdbClient::new(TmdbConfig {
            base_url: server.uri(),
            access_key: "test-key".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[test]
    fn test_empty_access_key_rejected() {
        assert!(TmdbClient::new(TmdbConfig::default()).is_err());
    }

    #[test]
    fn test_url_joining() {
        let client = TmdbClient::new(TmdbConfig {
            base_url: "http://tmdb.local/3/".to_string(),
            access_key: "k".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.url("movie/550"), "http://tmdb.local/3/movie/550");
        assert_eq!(client.url("/genre/tv/list"), "http://tmdb.local/3/genre/tv/list");
    }

    #[tokio::test]
    async fn test_fetch_sends_bearer_and_query() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/movie/popular"))
            .and(header("authorization", "Bearer test-key"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"page": 2, "results": []})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let value = client
            .fetch("movie/popular", &[("page", "2".to_string())])
            .await
            .unwrap();

        assert_eq!(value["page"], 2);
    }

    #[tokio::test]
    async fn test_fetch_status_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/movie/0"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string("The resource could not be found."),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.fetch("movie/0", &[]).await.unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_invalid_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/genre/movie/list"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.fetch("genre/movie/list", &[]).await.unwrap_err();

        assert!(matches!(err, MetadataError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let client = TmdbClient::new(TmdbConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            access_key: "k".to_string(),
            timeout: Duration::from_secs(2),
        })
        .unwrap();

        let err = client.fetch("movie/popular", &[]).await.unwrap_err();
        assert!(matches!(err, MetadataError::Request(_)));
        assert_eq!(err.status(), None);
    }
}
