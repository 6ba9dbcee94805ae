use crate::models::{MovieListing, MovieSummary, VideoInfo, VideoListing, WatchlistEntry};
use crate::tmdb;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Typed client for the gateway's HTTP surface. Request construction and
/// response unwrapping only; the one piece of logic it owns is the image
/// URL rule, shared with the server side.
#[derive(Debug, Clone)]
pub struct MovieService {
    client: Client,
    base: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl MovieService {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let user_agent = format!("flixgate-client/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build gateway HTTP client")?;
        Ok(Self {
            client,
            base: base.into(),
        })
    }

    pub async fn search_movies(&self, query: &str, page: i64) -> Result<MovieListing> {
        self.post_json(
            "/search",
            &json!({ "type": "search", "query": query, "page": page }),
        )
        .await
    }

    pub async fn popular(&self, page: i64) -> Result<MovieListing> {
        self.post_json("/search", &json!({ "type": "popular", "page": page }))
            .await
    }

    pub async fn trending(&self, page: i64) -> Result<MovieListing> {
        self.post_json("/search", &json!({ "type": "trending", "page": page }))
            .await
    }

    pub async fn top_rated(&self, page: i64) -> Result<MovieListing> {
        self.post_json("/search", &json!({ "type": "top_rated", "page": page }))
            .await
    }

    pub async fn movie_details(&self, movie_id: i64) -> Result<MovieSummary> {
        self.post_json("/movie-details", &json!({ "movieId": movie_id }))
            .await
    }

    pub async fn movie_videos(&self, movie_id: i64) -> Result<Vec<VideoInfo>> {
        let listing: VideoListing = self
            .post_json("/movie-videos", &json!({ "movieId": movie_id }))
            .await?;
        Ok(listing.results)
    }

    /// The playable trailer for a movie, if it has one.
    pub async fn trailer(&self, movie_id: i64) -> Result<Option<VideoInfo>> {
        let videos = self.movie_videos(movie_id).await?;
        Ok(tmdb::select_trailer(&videos).cloned())
    }

    pub async fn watchlist(&self, token: &str) -> Result<Vec<WatchlistEntry>> {
        let res = self
            .client
            .get(format!("{}/watchlist", self.base))
            .bearer_auth(token)
            .send()
            .await
            .context("Gateway request failed")?;
        unwrap_response(res).await
    }

    pub async fn add_to_watchlist(
        &self,
        token: &str,
        movie: &MovieSummary,
    ) -> Result<WatchlistEntry> {
        let body = json!({
            "movie_id": movie.id,
            "movie_title": movie.title,
            "movie_poster": movie.poster_path,
        });
        let res = self
            .client
            .post(format!("{}/watchlist", self.base))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .context("Gateway request failed")?;
        unwrap_response(res).await
    }

    pub async fn remove_from_watchlist(&self, token: &str, entry_id: &str) -> Result<()> {
        let res = self
            .client
            .delete(format!("{}/watchlist/{}", self.base, entry_id))
            .bearer_auth(token)
            .send()
            .await
            .context("Gateway request failed")?;
        let status = res.status();
        if !status.is_success() {
            anyhow::bail!("Gateway error (status {})", status);
        }
        Ok(())
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let res = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await
            .context("Gateway request failed")?;
        unwrap_response(res).await
    }
}

/// Pure image helper for consumers holding a raw TMDB path.
pub fn image_url(path: Option<&str>) -> String {
    tmdb::poster_url(path)
}

async fn unwrap_response<T: DeserializeOwned>(res: reqwest::Response) -> Result<T> {
    let status = res.status();
    let bytes = res
        .bytes()
        .await
        .context("Failed to read gateway response")?;
    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&bytes)
            .map(|e| e.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
        anyhow::bail!("Gateway error (status {}): {}", status, message);
    }
    serde_json::from_slice(&bytes).context("Failed to parse gateway JSON")
}
