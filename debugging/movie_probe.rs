//! Drive a running flixgate gateway and print what the client would see.
//! Usage:
//!   cargo run --bin movie_probe -- popular [page]
//!   cargo run --bin movie_probe -- search <query> [page]
//!   cargo run --bin movie_probe -- details <movie_id>
//!   cargo run --bin movie_probe -- videos <movie_id>
//! Reads GATEWAY_URL from the environment (default http://127.0.0.1:3280).

use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use flixgate::client::MovieService;
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    let base = env::var("GATEWAY_URL").unwrap_or_else(|_| "http://127.0.0.1:3280".to_string());
    let service = MovieService::new(&base)?;

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        bail!("Expected a command: popular | search | details | videos");
    };

    match command {
        "popular" => {
            let page = parse_page(args.get(1))?;
            let listing = service.popular(page).await?;
            print_listing(&listing);
        }
        "search" => {
            let query = args.get(1).context("search needs a query")?;
            let page = parse_page(args.get(2))?;
            let listing = service.search_movies(query, page).await?;
            print_listing(&listing);
        }
        "details" => {
            let id = parse_id(args.get(1))?;
            let movie = service.movie_details(id).await?;
            println!("{:#?}", movie);
        }
        "videos" => {
            let id = parse_id(args.get(1))?;
            let videos = service.movie_videos(id).await?;
            for v in &videos {
                println!("{} [{} / {}] key={}", v.name, v.site, v.video_type, v.key);
            }
            match service.trailer(id).await? {
                Some(t) => println!("-> trailer: https://www.youtube.com/watch?v={}", t.key),
                None => println!("-> no playable trailer"),
            }
        }
        other => bail!("Unknown command '{}'", other),
    }

    Ok(())
}

fn parse_page(arg: Option<&String>) -> Result<i64> {
    match arg {
        Some(p) => p.parse().context("page must be a number"),
        None => Ok(1),
    }
}

fn parse_id(arg: Option<&String>) -> Result<i64> {
    arg.context("expected a movie id")?
        .parse()
        .context("movie id must be a number")
}

fn print_listing(listing: &flixgate::models::MovieListing) {
    println!(
        "page {}/{} ({} total results)",
        listing.page, listing.total_pages, listing.total_results
    );
    for m in &listing.results {
        println!("{:>9}  {}  ({})", m.id, m.title, m.release_date);
    }
}
