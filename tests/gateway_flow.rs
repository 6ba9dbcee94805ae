use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use flixgate::app::{build_router, AppState};
use flixgate::auth::TokenVerifier;
use flixgate::error::{ApiError, ApiResult};
use flixgate::models::{MovieListing, MovieSummary, VideoInfo, VideoListing};
use flixgate::tmdb::{ListKind, TmdbApi};
use flixgate::watchlist::SqliteWatchlist;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

const SIGNING_SECRET: &str = "test-secret";

struct FakeTmdb {
    calls: Mutex<Vec<String>>,
    upstream_status: Option<u16>,
}

impl FakeTmdb {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            upstream_status: None,
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            upstream_status: Some(status),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl TmdbApi for FakeTmdb {
    async fn list_movies(
        &self,
        kind: ListKind,
        query: Option<&str>,
        page: i64,
    ) -> ApiResult<MovieListing> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("list {:?} {:?} {}", kind, query, page));
        if let Some(status) = self.upstream_status {
            return Err(ApiError::Upstream { status });
        }
        Ok(MovieListing {
            page,
            results: vec![summary(101), summary(102)],
            total_pages: 3,
            total_results: 42,
        })
    }

    async fn movie_details(&self, movie_id: i64) -> ApiResult<MovieSummary> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("details {}", movie_id));
        if let Some(status) = self.upstream_status {
            return Err(ApiError::Upstream { status });
        }
        Ok(summary(movie_id))
    }

    async fn movie_videos(&self, movie_id: i64) -> ApiResult<VideoListing> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("videos {}", movie_id));
        if let Some(status) = self.upstream_status {
            return Err(ApiError::Upstream { status });
        }
        Ok(VideoListing {
            results: vec![VideoInfo {
                id: "v1".to_string(),
                key: "dQw4w9WgXcQ".to_string(),
                name: "Official Trailer".to_string(),
                site: "YouTube".to_string(),
                video_type: "Trailer".to_string(),
                official: true,
            }],
        })
    }
}

fn summary(id: i64) -> MovieSummary {
    MovieSummary {
        id,
        title: format!("Movie {}", id),
        overview: "A movie.".to_string(),
        poster_path: "https://image.tmdb.org/t/p/w500/poster.jpg".to_string(),
        backdrop_path: "https://image.tmdb.org/t/p/original/backdrop.jpg".to_string(),
        release_date: "2024-01-01".to_string(),
        vote_average: 7.4,
        genre_ids: vec![28, 12],
        adult: false,
        original_language: "en".to_string(),
        popularity: 123.4,
        video: false,
        vote_count: 1000,
    }
}

static DB_SEQ: AtomicUsize = AtomicUsize::new(0);

async fn memory_watchlist() -> SqliteWatchlist {
    let n = DB_SEQ.fetch_add(1, Ordering::SeqCst);
    let url = format!("sqlite:file:gateway_flow_{}?mode=memory&cache=shared", n);
    SqliteWatchlist::connect(&url)
        .await
        .expect("in-memory watchlist")
}

async fn app_with_mocks(tmdb: FakeTmdb) -> (Router, Arc<FakeTmdb>) {
    let tmdb = Arc::new(tmdb);
    let state = AppState {
        tmdb: tmdb.clone(),
        watchlist: Arc::new(memory_watchlist().await),
        verifier: Arc::new(TokenVerifier::new(SIGNING_SECRET)),
    };
    (build_router(state), tmdb)
}

fn post_json(path: &str, body: Value) -> Request<Body> {
    Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body was not JSON")
}

fn token_for(user: &str) -> String {
    TokenVerifier::new(SIGNING_SECRET).sign(user)
}

#[tokio::test]
async fn search_without_query_is_rejected_before_upstream() {
    let (app, tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let res = app
        .oneshot(post_json("/search", json!({ "type": "search" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["error"], "Query is required for search");
    assert_eq!(tmdb.call_count(), 0);
}

#[tokio::test]
async fn search_with_blank_query_is_rejected() {
    let (app, tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let res = app
        .oneshot(post_json(
            "/search",
            json!({ "type": "search", "query": "   " }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["error"], "Query is required for search");
    assert_eq!(tmdb.call_count(), 0);
}

#[tokio::test]
async fn missing_type_defaults_to_search() {
    let (app, tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let res = app
        .oneshot(post_json("/search", json!({ "query": "dune" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        *tmdb.calls.lock().unwrap(),
        vec!["list Search Some(\"dune\") 1".to_string()]
    );
}

#[tokio::test]
async fn unknown_list_type_is_rejected() {
    let (app, tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let res = app
        .oneshot(post_json("/search", json!({ "type": "now_playing" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["error"], "Invalid request type");
    assert_eq!(tmdb.call_count(), 0);
}

#[tokio::test]
async fn popular_listing_passes_through() {
    let (app, tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let res = app
        .oneshot(post_json("/search", json!({ "type": "popular", "page": 2 })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["page"], 2);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["total_results"], 42);
    assert_eq!(
        *tmdb.calls.lock().unwrap(),
        vec!["list Popular None 2".to_string()]
    );
}

#[tokio::test]
async fn upstream_failure_maps_to_400_with_status() {
    let (app, _tmdb) = app_with_mocks(FakeTmdb::failing(500)).await;

    let res = app
        .oneshot(post_json("/search", json!({ "type": "popular" })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["error"], "TMDB API error: 500");
}

#[tokio::test]
async fn details_require_movie_id() {
    let (app, tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let res = app
        .oneshot(post_json("/movie-details", json!({})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["error"], "Movie ID is required");
    assert_eq!(tmdb.call_count(), 0);
}

#[tokio::test]
async fn details_pass_through() {
    let (app, tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let res = app
        .oneshot(post_json("/movie-details", json!({ "movieId": 603 })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["id"], 603);
    assert_eq!(body["genre_ids"], json!([28, 12]));
    assert_eq!(
        *tmdb.calls.lock().unwrap(),
        vec!["details 603".to_string()]
    );
}

#[tokio::test]
async fn videos_pass_through_with_wire_field_names() {
    let (app, _tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let res = app
        .oneshot(post_json("/movie-videos", json!({ "movieId": 603 })))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    let first = &body["results"][0];
    assert_eq!(first["site"], "YouTube");
    // serialized as "type", not "video_type"
    assert_eq!(first["type"], "Trailer");
    assert!(first.get("video_type").is_none());
}

#[tokio::test]
async fn non_json_content_type_is_rejected() {
    let (app, tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let req = Request::post("/search")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("type=popular"))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = body_json(res).await;
    assert_eq!(body["error"], "Expected an application/json body");
    assert_eq!(tmdb.call_count(), 0);
}

#[tokio::test]
async fn watchlist_requires_a_token() {
    let (app, _tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let res = app
        .oneshot(Request::get("/watchlist").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(res).await;
    assert_eq!(body["error"], "Invalid or missing bearer token");
}

#[tokio::test]
async fn watchlist_rejects_a_forged_token() {
    let (app, _tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let forged = TokenVerifier::new("wrong-secret").sign("user-1");
    let req = Request::get("/watchlist")
        .header(header::AUTHORIZATION, format!("Bearer {}", forged))
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_verification_roundtrip() {
    let verifier = TokenVerifier::new(SIGNING_SECRET);
    let token = verifier.sign("user-42");
    assert_eq!(verifier.verify(&token).unwrap(), "user-42");

    assert!(verifier.verify("no-signature").is_err());
    assert!(verifier.verify(".deadbeef").is_err());
    let mut tampered = token.clone();
    tampered.push('0');
    assert!(verifier.verify(&tampered).is_err());
}

#[tokio::test]
async fn watchlist_add_list_remove_roundtrip() {
    let (app, _tmdb) = app_with_mocks(FakeTmdb::new()).await;
    let token = token_for("user-1");

    for (movie_id, title) in [(603, "The Matrix"), (550, "Fight Club")] {
        let req = Request::post("/watchlist")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(
                json!({
                    "movie_id": movie_id,
                    "movie_title": title,
                    "movie_poster": "https://image.tmdb.org/t/p/w500/p.jpg",
                })
                .to_string(),
            ))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = body_json(res).await;
        assert_eq!(body["movie_id"], movie_id);
        assert!(body["id"].as_str().is_some());
    }

    let req = Request::get("/watchlist")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    // newest first
    assert_eq!(entries[0]["movie_title"], "Fight Club");
    assert_eq!(entries[1]["movie_title"], "The Matrix");

    let first_id = entries[0]["id"].as_str().unwrap().to_string();
    let req = Request::delete(format!("/watchlist/{}", first_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let req = Request::get("/watchlist")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    let body = body_json(res).await;
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["movie_title"], "The Matrix");
}

#[tokio::test]
async fn watchlist_rows_are_scoped_to_the_caller() {
    let (app, _tmdb) = app_with_mocks(FakeTmdb::new()).await;
    let alice = token_for("alice");
    let bob = token_for("bob");

    let req = Request::post("/watchlist")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", alice))
        .body(Body::from(
            json!({ "movie_id": 603, "movie_title": "The Matrix" }).to_string(),
        ))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let entry_id = body_json(res).await["id"].as_str().unwrap().to_string();

    // bob sees nothing
    let req = Request::get("/watchlist")
        .header(header::AUTHORIZATION, format!("Bearer {}", bob))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 0);

    // bob deleting alice's row succeeds without deleting anything
    let req = Request::delete(format!("/watchlist/{}", entry_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", bob))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let req = Request::get("/watchlist")
        .header(header::AUTHORIZATION, format!("Bearer {}", alice))
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn missing_poster_falls_back_to_placeholder() {
    let (app, _tmdb) = app_with_mocks(FakeTmdb::new()).await;
    let token = token_for("user-1");

    let req = Request::post("/watchlist")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(
            json!({ "movie_id": 603, "movie_title": "The Matrix" }).to_string(),
        ))
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(body_json(res).await["movie_poster"], "/placeholder.svg");
}

#[tokio::test]
async fn preflight_gets_permissive_cors() {
    let (app, _tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let req = Request::builder()
        .method("OPTIONS")
        .uri("/search")
        .header(header::ORIGIN, "https://example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type,authorization")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _tmdb) = app_with_mocks(FakeTmdb::new()).await;

    let res = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
