//! # fetchline
//!
//! A client-side fetch manager: queue downloads of JSON, images or text,
//! optionally keep the raw responses in a bounded disk cache, and get exactly
//! one callback per request.
//!
//! ## Architecture
//!
//! ```text
//! enqueue → Dispatcher → [CacheStore hit | Fetcher] → ResponseDecoder → CacheStore → Observer
//! ```
//!
//! - [`queue`]: [`FetchQueue`](queue::FetchQueue) and its dispatcher
//! - [`cache`]: URL-keyed disk cache with count-based eviction
//! - [`fetcher`]: HTTP GET/POST over reqwest
//! - [`decoder`]: JSON, image and text decoding
//!
//! ## Quick Start
//!
//! ```bash
//! # Fetch a JSON document, caching the response
//! fetchline get https://api.github.com/repos/rust-lang/rust --type json
//!
//! # POST form data and print the body
//! fetchline get https://httpbin.org/post --post "a=1&b=2" --no-cache
//!
//! # Inspect the cache
//! fetchline cache list
//! ```

/// Application context and error types.
///
/// [`AppContext`](app::AppContext) builds the cache, HTTP client and queue
/// from a [`Config`](config::Config).
pub mod app;

/// Disk cache keyed by the SHA-256 of the URL, bounded by file count.
pub mod cache;

/// Command-line interface using clap.
///
/// - `get <url>...` - Download URLs
/// - `cache list|clear|path` - Manage the disk cache
pub mod cli;

/// Configuration loaded from `~/.config/fetchline/config.toml`.
pub mod config;

/// Response decoding by content type.
pub mod decoder;

/// Requests, content types and decoded values.
pub mod domain;

/// HTTP transfers.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for one GET/POST round-trip
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// Request queue, dispatcher and observer contract.
pub mod queue;

pub use app::{FetchError, Result};
pub use cache::CacheStore;
pub use domain::{ContentType, Decoded, Request};
pub use queue::{FetchQueue, Observer};
