//! Catalog Service - Cached metadata lookups
//!
//! Builds cache keys, picks TTLs and runs every metadata fetch through the
//! cache-aside layer. Values are passed through as JSON.

use crate::application::cache_service::{CacheOptions, CacheService};
use crate::domain::ports::{MetadataError, MetadataSource};
use crate::domain::value_objects::{MediaType, MovieList, SearchKind, SortOrder, TimeWindow, TvList};
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

/// Movie lists change quickly.
pub const MOVIE_LIST_TTL_SECS: u64 = 60;
/// Details, seasons, credits, related lists, TV lists and trending.
pub const DETAIL_TTL_SECS: u64 = 3_600;
/// Genre lists barely change.
pub const GENRE_TTL_SECS: u64 = 86_400;
pub const SEARCH_TTL_SECS: u64 = 1_800;

const MAX_PAGE: u32 = 500;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Upstream(#[from] MetadataError),
}

impl CatalogError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// `GET /movies` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieListQuery {
    pub suggest: Option<MovieList>,
    pub sort: Option<SortOrder>,
    pub page: Option<u32>,
    pub genres: Option<String>,
}

/// `GET /tv-shows` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TvListQuery {
    pub suggest: Option<TvList>,
    pub sort: Option<SortOrder>,
    pub page: Option<u32>,
    pub genres: Option<String>,
}

/// `GET /search` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<SearchKind>,
    pub sort: Option<SortOrder>,
    pub page: Option<u32>,
}

/// Query carrying only a page number.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

fn validate_page(page: Option<u32>) -> Result<u32, CatalogError> {
    match page.unwrap_or(1) {
        0 => Err(CatalogError::invalid("page must not be less than 1")),
        p if p > MAX_PAGE => Err(CatalogError::invalid(format!(
            "page must not be greater than {}",
            MAX_PAGE
        ))),
        p => Ok(p),
    }
}

/// Order `results` by `popularity`. Items without a popularity sort as 0.
pub fn sort_by_popularity(data: &mut Value, order: SortOrder) {
    let Some(results) = data.get_mut("results").and_then(Value::as_array_mut) else {
        return;
    };
    let popularity = |item: &Value| item.get("popularity").and_then(Value::as_f64).unwrap_or(0.0);
    results.sort_by(|a, b| {
        let ord = popularity(a).partial_cmp(&popularity(b)).unwrap_or(Ordering::Equal);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

pub fn movie_list_key(list: MovieList, sort: SortOrder, page: u32, genres: Option<&str>) -> String {
    format!(
        "movies:list:{}:{}:{}:{}",
        list.as_str(),
        sort.as_str(),
        page,
        genres.unwrap_or("undefined")
    )
}

pub fn tv_list_key(list: TvList, sort: SortOrder, page: u32, genres: Option<&str>) -> String {
    format!(
        "tv-shows:list:{}:{}:{}:{}",
        list.as_str(),
        sort.as_str(),
        page,
        genres.unwrap_or("undefined")
    )
}

pub fn search_key(query: &str, kind: SearchKind, sort: SortOrder, page: u32) -> String {
    format!("search:{}:{}:{}:{}", query, kind.as_str(), sort.as_str(), page)
}

pub fn trending_key(media: MediaType, window: TimeWindow, page: u32) -> String {
    format!("trending:{}:{}:{}", media.as_str(), window.as_str(), page)
}

/// Cached catalog reads.
pub struct CatalogService {
    cache: Arc<CacheService>,
    source: Arc<dyn MetadataSource>,
}

impl CatalogService {
    pub fn new(cache: Arc<CacheService>, source: Arc<dyn MetadataSource>) -> Self {
        Self { cache, source }
    }

    async fn cached(
        &self,
        key: &str,
        ttl_secs: u64,
        path: String,
        query: Vec<(&'static str, String)>,
        sort: Option<SortOrder>,
    ) -> Result<Value, CatalogError> {
        self.cache
            .get_or_compute(key, CacheOptions::ttl_secs(ttl_secs), || async move {
                tracing::debug!("fetching {} from metadata API", path);
                let mut data = self.source.fetch(&path, &query).await?;
                if let Some(order) = sort {
                    sort_by_popularity(&mut data, order);
                }
                Ok(data)
            })
            .await
    }

    // ===== Movies =====

    pub async fn list_movies(&self, query: MovieListQuery) -> Result<Value, CatalogError> {
        let list = query.suggest.unwrap_or_default();
        let sort = query.sort.unwrap_or_default();
        let page = validate_page(query.page)?;
        let genres = query.genres.filter(|g| !g.is_empty());

        let key = movie_list_key(list, sort, page, genres.as_deref());
        let mut params = vec![("page", page.to_string())];
        if let Some(genres) = genres {
            params.push(("with_genres", genres));
        }

        self.cached(&key, MOVIE_LIST_TTL_SECS, list.endpoint().to_string(), params, Some(sort))
            .await
    }

    pub async fn movie_genres(&self) -> Result<Value, CatalogError> {
        self.cached("movies:genres", GENRE_TTL_SECS, "genre/movie/list".to_string(), vec![], None)
            .await
    }

    pub async fn movie_details(&self, id: u64) -> Result<Value, CatalogError> {
        let key = format!("movies:details:{}", id);
        self.cached(&key, DETAIL_TTL_SECS, format!("movie/{}", id), vec![], None)
            .await
    }

    pub async fn movie_recommendations(&self, id: u64, page: Option<u32>) -> Result<Value, CatalogError> {
        let page = validate_page(page)?;
        let key = format!("movies:recommendations:{}:{}", id, page);
        let path = format!("movie/{}/recommendations", id);
        self.cached(&key, DETAIL_TTL_SECS, path, vec![("page", page.to_string())], None)
            .await
    }

    pub async fn movie_similar(&self, id: u64, page: Option<u32>) -> Result<Value, CatalogError> {
        let page = validate_page(page)?;
        let key = format!("movies:similar:{}:{}", id, page);
        let path = format!("movie/{}/similar", id);
        self.cached(&key, DETAIL_TTL_SECS, path, vec![("page", page.to_string())], None)
            .await
    }

    pub async fn movie_credits(&self, id: u64) -> Result<Value, CatalogError> {
        let key = format!("movies:credits:{}", id);
        self.cached(&key, DETAIL_TTL_SECS, format!("movie/{}/credits", id), vec![], None)
            .await
    }

    // ===== TV Shows =====

    pub async fn list_tv_shows(&self, query: TvListQuery) -> Result<Value, CatalogError> {
        let list = query.suggest.unwrap_or_default();
        let sort = query.sort.unwrap_or_default();
        let page = validate_page(query.page)?;
        let genres = query.genres.filter(|g| !g.is_empty());

        let key = tv_list_key(list, sort, page, genres.as_deref());
        let mut params = vec![("page", page.to_string())];
        if let Some(genres) = genres {
            params.push(("with_genres", genres));
        }

        self.cached(&key, DETAIL_TTL_SECS, list.endpoint().to_string(), params, Some(sort))
            .await
    }

    pub async fn tv_genres(&self) -> Result<Value, CatalogError> {
        self.cached("tv-shows:genres", GENRE_TTL_SECS, "genre/tv/list".to_string(), vec![], None)
            .await
    }

    pub async fn tv_details(&self, id: u64) -> Result<Value, CatalogError> {
        let key = format!("tv-shows:details:{}", id);
        self.cached(&key, DETAIL_TTL_SECS, format!("tv/{}", id), vec![], None)
            .await
    }

    pub async fn tv_season(&self, id: u64, season: u32) -> Result<Value, CatalogError> {
        let key = format!("tv-shows:season:{}:{}", id, season);
        let path = format!("tv/{}/season/{}", id, season);
        self.cached(&key, DETAIL_TTL_SECS, path, vec![], None).await
    }

    pub async fn tv_recommendations(&self, id: u64, page: Option<u32>) -> Result<Value, CatalogError> {
        let page = validate_page(page)?;
        let key = format!("tv-shows:recommendations:{}:{}", id, page);
        let path = format!("tv/{}/recommendations", id);
        self.cached(&key, DETAIL_TTL_SECS, path, vec![("page", page.to_string())], None)
            .await
    }

    pub async fn tv_similar(&self, id: u64, page: Option<u32>) -> Result<Value, CatalogError> {
        let page = validate_page(page)?;
        let key = format!("tv-shows:similar:{}:{}", id, page);
        let path = format!("tv/{}/similar", id);
        self.cached(&key, DETAIL_TTL_SECS, path, vec![("page", page.to_string())], None)
            .await
    }

    pub async fn tv_credits(&self, id: u64) -> Result<Value, CatalogError> {
        let key = format!("tv-shows:credits:{}", id);
        self.cached(&key, DETAIL_TTL_SECS, format!("tv/{}/credits", id), vec![], None)
            .await
    }

    pub async fn tv_episode_credits(
        &self,
        id: u64,
        season: u32,
        episode: u32,
    ) -> Result<Value, CatalogError> {
        let key = format!("tv-shows:episode-credits:{}:{}:{}", id, season, episode);
        let path = format!("tv/{}/season/{}/episode/{}/credits", id, season, episode);
        self.cached(&key, DETAIL_TTL_SECS, path, vec![], None).await
    }

    // ===== Trending & Search =====

    pub async fn trending(&self, media: &str, window: &str, page: Option<u32>) -> Result<Value, CatalogError> {
        let window = TimeWindow::parse(window).ok_or_else(|| {
            CatalogError::invalid("Invalid time_window. Must be either \"day\" or \"week\"")
        })?;
        let media = MediaType::parse(media).ok_or_else(|| CatalogError::invalid("Invalid media type"))?;
        let page = validate_page(page)?;

        let key = trending_key(media, window, page);
        let path = format!("trending/{}/{}", media.as_str(), window.as_str());
        self.cached(&key, DETAIL_TTL_SECS, path, vec![("page", page.to_string())], None)
            .await
    }

    pub async fn search(&self, query: SearchQuery) -> Result<Value, CatalogError> {
        let q = query
            .q
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .ok_or_else(|| CatalogError::invalid("q should not be empty"))?;
        let kind = query.kind.unwrap_or_default();
        let sort = query.sort.unwrap_or_default();
        let page = validate_page(query.page)?;

        let key = search_key(&q, kind, sort, page);
        let path = format!("search/{}", kind.as_str());
        let params = vec![("query", q), ("page", page.to_string())];
        self.cached(&key, SEARCH_TTL_SECS, path, params, Some(sort)).await
    }
}
