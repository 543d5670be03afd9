//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Credential extracted from an `Authorization: Bearer <token>` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Parse an `Authorization` header value.
    ///
    /// Splits on the first space. The scheme must be exactly `Bearer` and the
    /// token must be non-empty after trimming.
    ///
    /// # Examples
    /// ```
    /// use media_gateway::domain::value_objects::BearerToken;
    ///
    /// assert_eq!(BearerToken::from_header("Bearer abc").unwrap().as_str(), "abc");
    /// assert!(BearerToken::from_header("Basic abc").is_none());
    /// assert!(BearerToken::from_header("Bearer ").is_none());
    /// ```
    pub fn from_header(header: &str) -> Option<Self> {
        let (scheme, token) = header.split_once(' ')?;
        let token = token.trim();
        if scheme.trim() != "Bearer" || token.is_empty() {
            return None;
        }
        Some(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

// Tokens never end up in logs through Debug.
impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BearerToken(***)")
    }
}

/// Popularity ordering applied to list results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Curated movie lists offered by the metadata API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MovieList {
    #[default]
    Popular,
    NowPlaying,
    Upcoming,
    TopRated,
}

impl MovieList {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Popular => "popular",
            Self::NowPlaying => "now-playing",
            Self::Upcoming => "upcoming",
            Self::TopRated => "top-rated",
        }
    }

    /// Upstream endpoint path for this list.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Popular => "movie/popular",
            Self::NowPlaying => "movie/now_playing",
            Self::Upcoming => "movie/upcoming",
            Self::TopRated => "movie/top_rated",
        }
    }
}

/// Curated TV show lists offered by the metadata API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TvList {
    #[default]
    Popular,
    OnAir,
    TopRated,
}

impl TvList {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Popular => "popular",
            Self::OnAir => "on-air",
            Self::TopRated => "top-rated",
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Popular => "tv/popular",
            Self::OnAir => "tv/on_the_air",
            Self::TopRated => "tv/top_rated",
        }
    }
}

/// Media type for trending lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    All,
    Movie,
    Tv,
    Person,
}

impl MediaType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "movie" => Some(Self::Movie),
            "tv" => Some(Self::Tv),
            "person" => Some(Self::Person),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Movie => "movie",
            Self::Tv => "tv",
            Self::Person => "person",
        }
    }
}

/// Trending time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Day,
    Week,
}

impl TimeWindow {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
        }
    }
}

/// Search scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Movie,
    Tv,
    #[default]
    Multi,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
            Self::Multi => "multi",
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    // ===== BearerToken Tests =====

    #[test]
    fn test_bearer_token_valid() {
        let token = BearerToken::from_header("Bearer abc").unwrap();
        assert_eq!(token.as_str(), "abc");
    }

    #[test]
    fn test_bearer_token_trims_token() {
        let token = BearerToken::from_header("Bearer   abc  ").unwrap();
        assert_eq!(token.as_str(), "abc");
    }

    #[test]
    fn test_bearer_token_rejects_malformed() {
        for header in [
            "",
            "Bearer",
            "Bearer ",
            "Bearer    ",
            "bearer abc",
            "Basic abc",
            "Token abc",
            "abc",
            " abc",
        ] {
            assert!(
                BearerToken::from_header(header).is_none(),
                "header {:?} should be rejected",
                header
            );
        }
    }

    #[test]
    fn test_bearer_token_debug_is_redacted() {
        let token = BearerToken::from_header("Bearer secret").unwrap();
        let debug = format!("{:?}", token);
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_bearer_token_into_inner() {
        let token = BearerToken::from_header("Bearer xyz").unwrap();
        assert_eq!(token.into_inner(), "xyz");
    }

    // ===== Catalog Enum Tests =====

    #[test]
    fn test_sort_order_default_and_str() {
        assert_eq!(SortOrder::default(), SortOrder::Desc);
        assert_eq!(SortOrder::Asc.as_str(), "asc");
    }

    #[test]
    fn test_movie_list_endpoints() {
        assert_eq!(MovieList::Popular.endpoint(), "movie/popular");
        assert_eq!(MovieList::NowPlaying.endpoint(), "movie/now_playing");
        assert_eq!(MovieList::Upcoming.endpoint(), "movie/upcoming");
        assert_eq!(MovieList::TopRated.endpoint(), "movie/top_rated");
    }

    #[test]
    fn test_movie_list_deserializes_kebab_case() {
        let list: MovieList = serde_json::from_str("\"now-playing\"").unwrap();
        assert_eq!(list, MovieList::NowPlaying);
        assert_eq!(list.as_str(), "now-playing");
    }

    #[test]
    fn test_tv_list_endpoints() {
        assert_eq!(TvList::Popular.endpoint(), "tv/popular");
        assert_eq!(TvList::OnAir.endpoint(), "tv/on_the_air");
        assert_eq!(TvList::TopRated.endpoint(), "tv/top_rated");
    }

    #[test]
    fn test_media_type_parse() {
        assert_eq!(MediaType::parse("all"), Some(MediaType::All));
        assert_eq!(MediaType::parse("person"), Some(MediaType::Person));
        assert_eq!(MediaType::parse("people"), None);
    }

    #[test]
    fn test_time_window_parse() {
        assert_eq!(TimeWindow::parse("day"), Some(TimeWindow::Day));
        assert_eq!(TimeWindow::parse("week"), Some(TimeWindow::Week));
        assert_eq!(TimeWindow::parse("month"), None);
    }

    #[test]
    fn test_search_kind_default() {
        assert_eq!(SearchKind::default(), SearchKind::Multi);
        assert_eq!(SearchKind::Tv.as_str(), "tv");
    }
}
