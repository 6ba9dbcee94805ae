use crate::auth::TokenVerifier;
use crate::error::{ApiError, ApiResult};
use crate::models::{MovieListing, MovieSummary, VideoListing, WatchlistEntry};
use crate::tmdb::{self, ListKind, TmdbApi, TmdbClient};
use crate::watchlist::{SqliteWatchlist, WatchlistStore};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::TypedHeader;
use headers::authorization::{Authorization, Bearer};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::{env, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

const MAX_BODY_BYTES: usize = 1024 * 1024; // 1MB safety cap

#[derive(Clone)]
pub struct AppState {
    pub tmdb: Arc<dyn TmdbApi>,
    pub watchlist: Arc<dyn WatchlistStore>,
    pub verifier: Arc<TokenVerifier>,
}

pub async fn run_server() -> Result<()> {
    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_env()?);
    let verifier = Arc::new(TokenVerifier::from_env()?);

    let db_url = env::var("WATCHLIST_DB").unwrap_or_else(|_| "sqlite://watchlist.db".to_string());
    let watchlist: Arc<dyn WatchlistStore> = Arc::new(SqliteWatchlist::connect(&db_url).await?);

    let state = AppState {
        tmdb,
        watchlist,
        verifier,
    };

    let app = build_router(state);

    let addr: SocketAddr = env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3280".to_string())
        .parse()
        .context("BIND_ADDR is not a valid socket address")?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    // Browser clients call these endpoints cross-origin; preflights get a
    // blanket allow with the header set the frontend actually sends.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route("/search", post(search))
        .route("/movie-details", post(movie_details))
        .route("/movie-videos", post(movie_videos))
        .route("/watchlist", get(watchlist_index).post(watchlist_add))
        .route("/watchlist/:id", delete(watchlist_remove))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

fn parse_json<T: DeserializeOwned>(headers: &HeaderMap, body: &Bytes) -> ApiResult<T> {
    let content_type_ok = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        == Some(true);
    if !content_type_ok {
        return Err(ApiError::InvalidRequest(
            "Expected an application/json body".to_string(),
        ));
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid JSON body: {}", e)))
}

#[derive(Deserialize)]
struct SearchRequest {
    query: Option<String>,
    #[serde(rename = "type", default = "default_kind")]
    kind: String,
    #[serde(default = "default_page")]
    page: i64,
}

fn default_kind() -> String {
    "search".to_string()
}

fn default_page() -> i64 {
    1
}

async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<MovieListing>> {
    let req: SearchRequest = parse_json(&headers, &body)?;
    let kind = ListKind::parse(&req.kind)
        .ok_or_else(|| ApiError::InvalidRequest("Invalid request type".to_string()))?;

    let query = req.query.as_deref().map(str::trim).filter(|q| !q.is_empty());
    if kind == ListKind::Search && query.is_none() {
        return Err(ApiError::InvalidRequest(
            "Query is required for search".to_string(),
        ));
    }

    debug!("Proxying {:?} listing, page {}", kind, req.page);
    let listing = state.tmdb.list_movies(kind, query, req.page).await?;
    Ok(Json(listing))
}

#[derive(Deserialize)]
struct MovieIdRequest {
    #[serde(rename = "movieId")]
    movie_id: Option<i64>,
}

async fn movie_details(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<MovieSummary>> {
    let req: MovieIdRequest = parse_json(&headers, &body)?;
    let movie_id = req
        .movie_id
        .ok_or_else(|| ApiError::InvalidRequest("Movie ID is required".to_string()))?;

    debug!("Proxying details for movie {}", movie_id);
    let summary = state.tmdb.movie_details(movie_id).await?;
    Ok(Json(summary))
}

async fn movie_videos(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<VideoListing>> {
    let req: MovieIdRequest = parse_json(&headers, &body)?;
    let movie_id = req
        .movie_id
        .ok_or_else(|| ApiError::InvalidRequest("Movie ID is required".to_string()))?;

    debug!("Proxying videos for movie {}", movie_id);
    let videos = state.tmdb.movie_videos(movie_id).await?;
    Ok(Json(videos))
}

fn authenticate(
    state: &AppState,
    auth: Option<&TypedHeader<Authorization<Bearer>>>,
) -> ApiResult<String> {
    let token = auth.map(|h| h.token()).ok_or(ApiError::Unauthorized)?;
    state.verifier.verify(token)
}

async fn watchlist_index(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> ApiResult<Json<Vec<WatchlistEntry>>> {
    let user_id = authenticate(&state, auth.as_ref())?;
    let entries = state.watchlist.list(&user_id).await?;
    Ok(Json(entries))
}

#[derive(Deserialize)]
struct WatchlistAddRequest {
    movie_id: Option<i64>,
    movie_title: Option<String>,
    movie_poster: Option<String>,
}

async fn watchlist_add(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<WatchlistEntry>)> {
    let user_id = authenticate(&state, auth.as_ref())?;
    let req: WatchlistAddRequest = parse_json(&headers, &body)?;
    let movie_id = req
        .movie_id
        .ok_or_else(|| ApiError::InvalidRequest("Movie ID is required".to_string()))?;
    let movie_title = req
        .movie_title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("Movie title is required".to_string()))?;
    let movie_poster = req
        .movie_poster
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| tmdb::PLACEHOLDER.to_string());

    info!("Adding movie {} to watchlist for {}", movie_id, user_id);
    let entry = state
        .watchlist
        .add(&user_id, movie_id, &movie_title, &movie_poster)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn watchlist_remove(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Path(entry_id): Path<String>,
) -> ApiResult<StatusCode> {
    let user_id = authenticate(&state, auth.as_ref())?;
    info!("Removing watchlist entry {} for {}", entry_id, user_id);
    state.watchlist.remove(&user_id, &entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
