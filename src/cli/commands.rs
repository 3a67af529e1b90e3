use std::sync::Arc;

use tokio::sync::mpsc;

use crate::app::{AppContext, FetchError, Result};
use crate::cache::CacheStore;
use crate::domain::{ContentType, Decoded};
use crate::queue::{FetchQueue, Observer};

type Outcome = (usize, std::result::Result<Decoded, String>);

/// Forwards notifications to the command loop; the reference is the URL's
/// position on the command line.
struct PrintObserver {
    tx: mpsc::UnboundedSender<Outcome>,
}

impl Observer<usize> for PrintObserver {
    fn on_ready(&self, value: Decoded, reference: usize) {
        let _ = self.tx.send((reference, Ok(value)));
    }

    fn on_failed(&self, reference: usize, error: &FetchError) {
        let _ = self.tx.send((reference, Err(error.to_string())));
    }
}

/// Downloads every URL and prints results as they arrive. Returns the number
/// of failed downloads.
pub async fn get(
    ctx: &AppContext,
    urls: &[String],
    content_type: ContentType,
    post: Option<&str>,
    use_cache: bool,
) -> Result<usize> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let observer = Arc::new(PrintObserver { tx });

    let queue: FetchQueue<usize> = ctx.queue();
    queue.set_observer(&observer);

    for (i, url) in urls.iter().enumerate() {
        queue.download(
            url.as_str(),
            content_type,
            post.map(String::from),
            use_cache,
            i,
        );
    }

    let mut failures = 0;
    for _ in 0..urls.len() {
        let Some((i, outcome)) = rx.recv().await else {
            break;
        };
        match outcome {
            Ok(value) => println!("{}\n{}", urls[i], value.summary()),
            Err(e) => {
                failures += 1;
                eprintln!("{}: failed: {}", urls[i], e);
            }
        }
    }

    Ok(failures)
}

pub fn cache_list(ctx: &AppContext) -> Result<()> {
    let entries = ctx.cache.entries()?;

    if entries.is_empty() {
        println!("Cache is empty ({})", ctx.cache.dir().display());
        return Ok(());
    }

    println!(
        "{} of {} files in {}",
        entries.len(),
        ctx.cache.max_files(),
        ctx.cache.dir().display()
    );
    for entry in entries {
        println!(
            "  {}  {:>10}  {}",
            entry.name,
            entry.size,
            entry.modified.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

pub fn cache_clear(ctx: &AppContext) -> Result<()> {
    let removed = ctx.cache.clear()?;
    println!("Removed {} cached files", removed);
    Ok(())
}

pub fn cache_path(ctx: &AppContext, url: &str) -> Result<()> {
    let path = ctx.cache.path_for(url);
    let state = if ctx.cache.has(url) { "cached" } else { "not cached" };
    println!("{} ({})", path.display(), state);
    println!("name: {}", CacheStore::filename_for(url));
    Ok(())
}
