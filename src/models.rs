use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The normalized movie record every endpoint speaks. Image paths are
/// either the placeholder sentinel or a fully-qualified CDN URL, never the
/// bare fragment TMDB returns.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MovieSummary {
    pub id: i64,
    pub title: String,
    pub overview: String,
    pub poster_path: String,
    pub backdrop_path: String,
    pub release_date: String,
    pub vote_average: f64,
    pub genre_ids: Vec<i64>,
    pub adult: bool,
    pub original_language: String,
    pub popularity: f64,
    pub video: bool,
    pub vote_count: i64,
}

/// Paginated envelope for the listing endpoints, field names as upstream
/// sends them.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MovieListing {
    pub page: i64,
    pub results: Vec<MovieSummary>,
    pub total_pages: i64,
    pub total_results: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VideoInfo {
    pub id: String,
    pub key: String,
    pub name: String,
    pub site: String,
    #[serde(rename = "type")]
    pub video_type: String,
    #[serde(default)]
    pub official: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VideoListing {
    pub results: Vec<VideoInfo>,
}

/// One row of a user's watchlist. The owning user id is never serialized;
/// rows are only ever read through a caller-scoped query.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct WatchlistEntry {
    pub id: String,
    pub movie_id: i64,
    pub movie_title: String,
    pub movie_poster: String,
    pub added_at: DateTime<Utc>,
}
