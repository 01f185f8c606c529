//! Scrape League of Legends profiles from op.gg and turn them into meme
//! leaderboard stats for a group of friends.
//!
//! [`OpggClient`] fetches profile pages, [`stats::aggregate`] derives the
//! leaderboard, and [`server`] exposes both over HTTP with a snapshot cache.

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub(crate) mod scraper;
pub mod server;
pub mod stats;

pub use client::OpggClient;
pub use error::{Result, ScrapeError};
pub use model::*;
