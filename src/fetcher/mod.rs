pub mod http_fetcher;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::Method;

/// One network round-trip. Non-success statuses are errors; nothing is
/// retried here.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str, method: &Method) -> Result<Vec<u8>>;
}
