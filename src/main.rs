use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fetchline::app::AppContext;
use fetchline::cli::{commands, CacheAction, Cli, Commands};
use fetchline::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cli.apply(&mut config);

    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Get {
            urls,
            content_type,
            post,
            no_cache,
        } => {
            let failures =
                commands::get(&ctx, &urls, content_type, post.as_deref(), !no_cache).await?;
            if failures > 0 {
                anyhow::bail!("{} of {} downloads failed", failures, urls.len());
            }
        }
        Commands::Cache { action } => match action {
            CacheAction::List => commands::cache_list(&ctx)?,
            CacheAction::Clear => commands::cache_clear(&ctx)?,
            CacheAction::Path { url } => commands::cache_path(&ctx, &url)?,
        },
    }

    Ok(())
}
