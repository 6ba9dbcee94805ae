pub mod app;
pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod tmdb;
pub mod watchlist;
