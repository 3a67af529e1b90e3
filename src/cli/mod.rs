pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::domain::ContentType;

#[derive(Parser)]
#[command(name = "fetchline")]
#[command(about = "Fetch JSON, images and text with a bounded disk cache", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/fetchline/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cache directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Maximum number of cached files (0 disables caching)
    #[arg(long, global = true)]
    pub max_files: Option<usize>,

    /// Maximum number of concurrent transfers
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.cache_dir {
            config.cache_directory = Some(dir.clone());
        }
        if let Some(max_files) = self.max_files {
            config.cache_max_files = max_files;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download one or more URLs
    Get {
        /// URLs to fetch
        #[arg(required = true)]
        urls: Vec<String>,

        /// How to decode the response
        #[arg(short = 't', long = "type", value_enum, default_value_t = ContentType::String)]
        content_type: ContentType,

        /// Send a POST with this form-encoded body instead of a GET
        #[arg(long)]
        post: Option<String>,

        /// Skip the disk cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Inspect or clear the disk cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List cached files, oldest first
    List,
    /// Delete every cached file
    Clear,
    /// Show the cache file used for a URL
    Path {
        /// URL to look up
        url: String,
    },
}
