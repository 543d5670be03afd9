//! Gateway API Server
//!
//! HTTP surface of the gateway: health, gated content routes and cached
//! catalog reads. The access gate is mounted as route middleware; it
//! attaches the resolved [`Identity`] to request extensions.

use crate::adapters::outbound::{ConnectionStatus, SystemClock, TcpAuthClient};
use crate::application::catalog_service::{MovieListQuery, PageQuery, SearchQuery, TvListQuery};
use crate::application::{CatalogError, CatalogService, GateError, GuardChain, RequestContext};
use crate::domain::entities::Identity;
use crate::domain::ports::{AuthBackend, Clock};
use crate::infrastructure::ShutdownController;
use axum::{
    extract::{Path, Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Connection snapshot for the health endpoint.
pub trait ConnectionProbe: Send + Sync {
    fn status(&self) -> ConnectionStatus;
}

impl ConnectionProbe for TcpAuthClient {
    fn status(&self) -> ConnectionStatus {
        TcpAuthClient::status(self)
    }
}

/// Error body shared by every non-2xx response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    let body = ErrorBody {
        status_code: status.as_u16(),
        message,
        error: status.canonical_reason().unwrap_or("Error").to_string(),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::UNAUTHORIZED);
        error_response(status, self.to_string())
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        match self {
            CatalogError::InvalidArgument(message) => {
                error_response(StatusCode::BAD_REQUEST, message)
            }
            CatalogError::Upstream(e) if e.status() == Some(404) => {
                error_response(StatusCode::NOT_FOUND, "The resource could not be found".to_string())
            }
            CatalogError::Upstream(e) => {
                tracing::error!("metadata lookup failed: {}", e);
                error_response(StatusCode::BAD_GATEWAY, "Metadata service error".to_string())
            }
        }
    }
}

/// Health response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub auth_backend: ConnectionStatus,
}

/// API Server state.
#[derive(Clone)]
pub struct ApiState {
    pub catalog: Arc<CatalogService>,
    pub probe: Arc<dyn ConnectionProbe>,
    /// Guards for routes that need a signed-in user
    pub authenticated: GuardChain,
    /// Guards for subscriber-only routes
    pub subscriber: GuardChain,
}

impl ApiState {
    pub fn new(
        catalog: Arc<CatalogService>,
        auth: Arc<dyn AuthBackend>,
        probe: Arc<dyn ConnectionProbe>,
    ) -> Self {
        Self {
            catalog,
            probe,
            authenticated: GuardChain::authenticated(auth.clone()),
            subscriber: GuardChain::subscriber(auth),
        }
    }
}

/// Build the full router.
pub fn router(state: ApiState) -> Router {
    let protected = Router::new()
        .route("/content/protected", get(protected_content_handler))
        .route("/content/user-info", get(user_info_handler))
        .route_layer(middleware::from_fn_with_state(
            state.authenticated.clone(),
            gate_middleware,
        ));

    let premium = Router::new()
        .route("/content/premium", get(premium_content_handler))
        .route_layer(middleware::from_fn_with_state(
            state.subscriber.clone(),
            gate_middleware,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/content/public", get(public_content_handler))
        .merge(protected)
        .merge(premium)
        // Movies
        .route("/movies", get(list_movies_handler))
        .route("/movies/genres", get(movie_genres_handler))
        .route("/movies/:id", get(movie_details_handler))
        .route("/movies/:id/recommendations", get(movie_recommendations_handler))
        .route("/movies/:id/similar", get(movie_similar_handler))
        .route("/movies/:id/credits", get(movie_credits_handler))
        // TV shows
        .route("/tv-shows", get(list_tv_shows_handler))
        .route("/tv-shows/genres", get(tv_genres_handler))
        .route("/tv-shows/:id", get(tv_details_handler))
        .route("/tv-shows/:id/season/:season", get(tv_season_handler))
        .route(
            "/tv-shows/:id/season/:season/episode/:episode/credits",
            get(tv_episode_credits_handler),
        )
        .route("/tv-shows/:id/recommendations", get(tv_recommendations_handler))
        .route("/tv-shows/:id/similar", get(tv_similar_handler))
        .route("/tv-shows/:id/credits", get(tv_credits_handler))
        // Trending & search
        .route("/trending/:media/:window", get(trending_handler))
        .route("/search", get(search_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Gateway API server.
pub struct ApiServer {
    listen_addr: String,
    state: ApiState,
}

impl ApiServer {
    pub fn new(listen_addr: String, state: ApiState) -> Self {
        Self { listen_addr, state }
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub async fn run(&self, shutdown: ShutdownController) -> anyhow::Result<()> {
        let app = router(self.state.clone());

        let listener = TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("gateway API listening on {}", self.listen_addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("gateway API stopped");
        Ok(())
    }
}

// Middleware

async fn gate_middleware(
    State(chain): State<GuardChain>,
    mut request: Request,
    next: Next,
) -> Result<Response, GateError> {
    // Non-UTF-8 values are kept so they fail as malformed, not as missing
    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

    let mut ctx = RequestContext::new(authorization);
    chain.run(&mut ctx).await?;

    if let Some(identity) = ctx.identity {
        request.extensions_mut().insert(identity);
    }
    Ok(next.run(request).await)
}

// Handler functions

fn timestamp_ms() -> u64 {
    SystemClock.now_ms()
}

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        auth_backend: state.probe.status(),
    })
}

async fn public_content_handler() -> impl IntoResponse {
    Json(json!({
        "message": "Public content - accessible to everyone",
        "timestamp": timestamp_ms(),
    }))
}

async fn protected_content_handler(Extension(identity): Extension<Identity>) -> impl IntoResponse {
    Json(json!({
        "message": "Protected content - requires authentication",
        "userId": identity.id,
        "timestamp": timestamp_ms(),
    }))
}

async fn premium_content_handler(Extension(identity): Extension<Identity>) -> impl IntoResponse {
    Json(json!({
        "message": "Premium subscriber-only content",
        "userId": identity.id,
        "isSubscriber": identity.is_subscriber(),
        "timestamp": timestamp_ms(),
    }))
}

async fn user_info_handler(Extension(identity): Extension<Identity>) -> impl IntoResponse {
    Json(json!({
        "message": "User information from authenticated request",
        "user": identity,
        "timestamp": timestamp_ms(),
    }))
}

type CatalogResult = Result<Json<Value>, CatalogError>;

async fn list_movies_handler(
    State(state): State<ApiState>,
    Query(query): Query<MovieListQuery>,
) -> CatalogResult {
    state.catalog.list_movies(query).await.map(Json)
}

async fn movie_genres_handler(State(state): State<ApiState>) -> CatalogResult {
    state.catalog.movie_genres().await.map(Json)
}

async fn movie_details_handler(State(state): State<ApiState>, Path(id): Path<u64>) -> CatalogResult {
    state.catalog.movie_details(id).await.map(Json)
}

async fn movie_recommendations_handler(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
    Query(query): Query<PageQuery>,
) -> CatalogResult {
    state.catalog.movie_recommendations(id, query.page).await.map(Json)
}

async fn movie_similar_handler(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
    Query(query): Query<PageQuery>,
) -> CatalogResult {
    state.catalog.movie_similar(id, query.page).await.map(Json)
}

async fn movie_credits_handler(State(state): State<ApiState>, Path(id): Path<u64>) -> CatalogResult {
    state.catalog.movie_credits(id).await.map(Json)
}

async fn list_tv_shows_handler(
    State(state): State<ApiState>,
    Query(query): Query<TvListQuery>,
) -> CatalogResult {
    state.catalog.list_tv_shows(query).await.map(Json)
}

async fn tv_genres_handler(State(state): State<ApiState>) -> CatalogResult {
    state.catalog.tv_genres().await.map(Json)
}

async fn tv_details_handler(State(state): State<ApiState>, Path(id): Path<u64>) -> CatalogResult {
    state.catalog.tv_details(id).await.map(Json)
}

async fn tv_season_handler(
    State(state): State<ApiState>,
    Path((id, season)): Path<(u64, u32)>,
) -> CatalogResult {
    state.catalog.tv_season(id, season).await.map(Json)
}

async fn tv_episode_credits_handler(
    State(state): State<ApiState>,
    Path((id, season, episode)): Path<(u64, u32, u32)>,
) -> CatalogResult {
    state.catalog.tv_episode_credits(id, season, episode).await.map(Json)
}

async fn tv_recommendations_handler(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
    Query(query): Query<PageQuery>,
) -> CatalogResult {
    state.catalog.tv_recommendations(id, query.page).await.map(Json)
}

async fn tv_similar_handler(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
    Query(query): Query<PageQuery>,
) -> CatalogResult {
    state.catalog.tv_similar(id, query.page).await.map(Json)
}

async fn tv_credits_handler(State(state): State<ApiState>, Path(id): Path<u64>) -> CatalogResult {
    state.catalog.tv_credits(id).await.map(Json)
}

async fn trending_handler(
    State(state): State<ApiState>,
    Path((media, window)): Path<(String, String)>,
    Query(query): Query<PageQuery>,
) -> CatalogResult {
    state.catalog.trending(&media, &window, query.page).await.map(Json)
}

async fn search_handler(
    State(state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> CatalogResult {
    state.catalog.search(query).await.map(Json)
}
