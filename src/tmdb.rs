use crate::error::{ApiError, ApiResult};
use crate::models::{MovieListing, MovieSummary, VideoInfo, VideoListing};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
pub const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
pub const BACKDROP_BASE: &str = "https://image.tmdb.org/t/p/original";
pub const PLACEHOLDER: &str = "/placeholder.svg";

/// Which TMDB listing a search request maps to. One dispatch table instead
/// of one handler per listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Search,
    Popular,
    Trending,
    TopRated,
}

impl ListKind {
    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "search" => Some(ListKind::Search),
            "popular" => Some(ListKind::Popular),
            "trending" => Some(ListKind::Trending),
            "top_rated" => Some(ListKind::TopRated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base: String,
}

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn list_movies(
        &self,
        kind: ListKind,
        query: Option<&str>,
        page: i64,
    ) -> ApiResult<MovieListing>;
    async fn movie_details(&self, movie_id: i64) -> ApiResult<MovieSummary>;
    async fn movie_videos(&self, movie_id: i64) -> ApiResult<VideoListing>;
}

impl TmdbClient {
    pub fn from_env() -> ApiResult<Self> {
        let api_key = env::var("TMDB_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(ApiError::Configuration("TMDB_API_KEY"))?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base(api_key, TMDB_BASE)
    }

    /// Point the client at a different upstream base URL. Tests use this to
    /// swap in a local stub.
    pub fn with_base(api_key: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base: base.into(),
        }
    }

    fn list_url(&self, kind: ListKind, query: Option<&str>, page: i64) -> String {
        match kind {
            ListKind::Search => format!(
                "{}/search/movie?api_key={}&query={}&page={}",
                self.base,
                self.api_key,
                urlencoding::encode(query.unwrap_or_default()),
                page
            ),
            ListKind::Popular => {
                format!("{}/movie/popular?api_key={}&page={}", self.base, self.api_key, page)
            }
            ListKind::Trending => format!(
                "{}/trending/movie/week?api_key={}&page={}",
                self.base, self.api_key, page
            ),
            ListKind::TopRated => {
                format!("{}/movie/top_rated?api_key={}&page={}", self.base, self.api_key, page)
            }
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> ApiResult<T> {
        // without_url() keeps the api_key query parameter out of error text.
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow::Error::from(e.without_url()).context("TMDB request failed"))?;
        let status = res.status();
        if !status.is_success() {
            return Err(ApiError::Upstream {
                status: status.as_u16(),
            });
        }
        let parsed: T = res
            .json()
            .await
            .map_err(|e| anyhow::Error::from(e.without_url()))
            .context("TMDB response was not valid JSON")?;
        Ok(parsed)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn list_movies(
        &self,
        kind: ListKind,
        query: Option<&str>,
        page: i64,
    ) -> ApiResult<MovieListing> {
        let url = self.list_url(kind, query, page);
        let data: ListResponse = self.get_json(&url).await?;
        Ok(MovieListing {
            page: data.page,
            results: data.results.into_iter().map(summary_from_list).collect(),
            total_pages: data.total_pages,
            total_results: data.total_results,
        })
    }

    async fn movie_details(&self, movie_id: i64) -> ApiResult<MovieSummary> {
        let url = format!("{}/movie/{}?api_key={}", self.base, movie_id, self.api_key);
        let data: DetailMovie = self.get_json(&url).await?;
        Ok(summary_from_detail(data))
    }

    async fn movie_videos(&self, movie_id: i64) -> ApiResult<VideoListing> {
        let url = format!(
            "{}/movie/{}/videos?api_key={}",
            self.base, movie_id, self.api_key
        );
        self.get_json(&url).await
    }
}

/// Listing entries carry genre ids pre-flattened.
#[derive(Debug, Deserialize)]
struct ListResponse {
    page: i64,
    results: Vec<ListMovie>,
    total_pages: i64,
    total_results: i64,
}

#[derive(Debug, Deserialize)]
struct ListMovie {
    id: i64,
    title: String,
    #[serde(default)]
    overview: String,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    release_date: Option<String>,
    #[serde(default)]
    vote_average: f64,
    #[serde(default)]
    genre_ids: Vec<i64>,
    #[serde(default)]
    adult: bool,
    #[serde(default)]
    original_language: String,
    #[serde(default)]
    popularity: f64,
    #[serde(default)]
    video: bool,
    #[serde(default)]
    vote_count: i64,
}

/// The single-movie endpoint nests genres as objects instead.
#[derive(Debug, Deserialize)]
struct DetailMovie {
    id: i64,
    title: String,
    #[serde(default)]
    overview: String,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    release_date: Option<String>,
    #[serde(default)]
    vote_average: f64,
    genres: Option<Vec<Genre>>,
    #[serde(default)]
    adult: bool,
    #[serde(default)]
    original_language: String,
    #[serde(default)]
    popularity: f64,
    #[serde(default)]
    video: bool,
    #[serde(default)]
    vote_count: i64,
}

#[derive(Debug, Deserialize)]
struct Genre {
    id: i64,
}

pub fn poster_url(path: Option<&str>) -> String {
    match path {
        Some(p) => format!("{POSTER_BASE}{p}"),
        None => PLACEHOLDER.to_string(),
    }
}

pub fn backdrop_url(path: Option<&str>) -> String {
    match path {
        Some(p) => format!("{BACKDROP_BASE}{p}"),
        None => PLACEHOLDER.to_string(),
    }
}

fn summary_from_list(m: ListMovie) -> MovieSummary {
    MovieSummary {
        id: m.id,
        title: m.title,
        overview: m.overview,
        poster_path: poster_url(m.poster_path.as_deref()),
        backdrop_path: backdrop_url(m.backdrop_path.as_deref()),
        release_date: m.release_date.unwrap_or_default(),
        vote_average: m.vote_average,
        genre_ids: m.genre_ids,
        adult: m.adult,
        original_language: m.original_language,
        popularity: m.popularity,
        video: m.video,
        vote_count: m.vote_count,
    }
}

fn summary_from_detail(m: DetailMovie) -> MovieSummary {
    let genre_ids = m
        .genres
        .unwrap_or_default()
        .into_iter()
        .map(|g| g.id)
        .collect();
    MovieSummary {
        id: m.id,
        title: m.title,
        overview: m.overview,
        poster_path: poster_url(m.poster_path.as_deref()),
        backdrop_path: backdrop_url(m.backdrop_path.as_deref()),
        release_date: m.release_date.unwrap_or_default(),
        vote_average: m.vote_average,
        genre_ids,
        adult: m.adult,
        original_language: m.original_language,
        popularity: m.popularity,
        video: m.video,
        vote_count: m.vote_count,
    }
}

/// First YouTube trailer, else any YouTube video, else nothing.
pub fn select_trailer(videos: &[VideoInfo]) -> Option<&VideoInfo> {
    videos
        .iter()
        .find(|v| v.video_type == "Trailer" && v.site == "YouTube")
        .or_else(|| videos.iter().find(|v| v.site == "YouTube"))
}
