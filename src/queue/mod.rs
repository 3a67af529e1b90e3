//! The fetch queue.
//!
//! [`FetchQueue::enqueue`] validates a request and hands it to a single
//! [`Dispatcher`] task, which makes the cache-or-network decision for each
//! entry in enqueue order. Cache hits are answered on the spot; misses are
//! spawned as independent transfer tasks bounded by a semaphore, so their
//! completions may arrive in any order.
//!
//! Every accepted request owns a completion ticket. Resolving a ticket
//! consumes it, and dropping an unresolved one reports
//! [`FetchError::Abandoned`], so each request produces exactly one observer
//! callback.

pub mod observer;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::app::FetchError;
use crate::cache::CacheStore;
use crate::decoder::ResponseDecoder;
use crate::domain::{ContentType, Decoded, Method, Request};
use crate::fetcher::Fetcher;

pub use observer::Observer;

pub const DEFAULT_WORKERS: usize = 10;

/// Bookkeeping for a request that has not reached a terminal state.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub seq: u64,
    pub url: String,
    pub content_type: ContentType,
}

struct Shared<R> {
    cache: Arc<CacheStore>,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    decoder: ResponseDecoder,
    observer: RwLock<Option<Weak<dyn Observer<R>>>>,
    pending: Mutex<BTreeMap<u64, PendingEntry>>,
    next_seq: AtomicU64,
    semaphore: Arc<Semaphore>,
}

impl<R: Send + 'static> Shared<R> {
    fn observer(&self) -> Option<Arc<dyn Observer<R>>> {
        self.observer.read().ok()?.as_ref()?.upgrade()
    }

    fn notify_ready(&self, value: Decoded, reference: R) {
        match self.observer() {
            Some(observer) => observer.on_ready(value, reference),
            None => debug!("No observer registered, dropping ready notification"),
        }
    }

    fn notify_failed(&self, reference: R, error: &FetchError) {
        match self.observer() {
            Some(observer) => observer.on_failed(reference, error),
            None => debug!("No observer registered, dropping failure notification"),
        }
    }

    fn track(&self, entry: PendingEntry) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(entry.seq, entry);
        }
    }

    fn untrack(&self, seq: u64) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&seq);
        }
    }
}

/// Completion token for one accepted request.
struct Ticket<R: Send + 'static> {
    seq: u64,
    url: String,
    reference: Option<R>,
    shared: Arc<Shared<R>>,
}

impl<R: Send + 'static> Ticket<R> {
    fn ready(mut self, value: Decoded) {
        if let Some(reference) = self.reference.take() {
            self.shared.untrack(self.seq);
            info!("Request #{} for {} ready", self.seq, self.url);
            self.shared.notify_ready(value, reference);
        }
    }

    fn failed(mut self, error: FetchError) {
        if let Some(reference) = self.reference.take() {
            self.shared.untrack(self.seq);
            if error.is_transfer() || error.is_decode() {
                warn!(kind = error.kind(), "Request #{} for {} failed: {}", self.seq, self.url, error);
            } else {
                error!(kind = error.kind(), "Request #{} for {} failed: {}", self.seq, self.url, error);
            }
            self.shared.notify_failed(reference, &error);
        }
    }
}

impl<R: Send + 'static> Drop for Ticket<R> {
    fn drop(&mut self) {
        if let Some(reference) = self.reference.take() {
            self.shared.untrack(self.seq);
            warn!("Request #{} for {} abandoned", self.seq, self.url);
            self.shared.notify_failed(reference, &FetchError::Abandoned);
        }
    }
}

struct QueueEntry<R: Send + 'static> {
    url: String,
    content_type: ContentType,
    method: Method,
    use_cache: bool,
    ticket: Ticket<R>,
}

/// Caller-facing handle. Cheap to clone; all clones feed the same dispatcher.
pub struct FetchQueue<R: Send + 'static> {
    tx: mpsc::UnboundedSender<QueueEntry<R>>,
    shared: Arc<Shared<R>>,
}

impl<R: Send + 'static> Clone for FetchQueue<R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<R: Send + 'static> FetchQueue<R> {
    /// Builds a queue and its dispatcher. Nothing is processed until
    /// [`Dispatcher::run`] is polled.
    pub fn new(
        cache: Arc<CacheStore>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        workers: usize,
    ) -> (Self, Dispatcher<R>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            cache,
            fetcher,
            decoder: ResponseDecoder::new(),
            observer: RwLock::new(None),
            pending: Mutex::new(BTreeMap::new()),
            next_seq: AtomicU64::new(0),
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        });

        let queue = Self {
            tx,
            shared: shared.clone(),
        };
        (queue, Dispatcher { rx, shared })
    }

    /// Builds a queue and spawns its dispatcher on the current tokio runtime.
    pub fn spawn(
        cache: Arc<CacheStore>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        workers: usize,
    ) -> Self {
        let (queue, dispatcher) = Self::new(cache, fetcher, workers);
        tokio::spawn(dispatcher.run());
        queue
    }

    /// Registers the observer, replacing any previous one. Only a weak
    /// reference is kept.
    pub fn set_observer<O: Observer<R> + 'static>(&self, observer: &Arc<O>) {
        let weak: Weak<O> = Arc::downgrade(observer);
        let weak: Weak<dyn Observer<R>> = weak;
        if let Ok(mut slot) = self.shared.observer.write() {
            *slot = Some(weak);
        }
    }

    pub fn clear_observer(&self) {
        if let Ok(mut slot) = self.shared.observer.write() {
            *slot = None;
        }
    }

    /// Accepts a request. Invalid requests are reported to the observer
    /// before this returns; everything else is reported once it completes.
    pub fn enqueue(&self, request: Request<R>) {
        if let Err(e) = request.validate() {
            warn!(kind = e.kind(), "Rejected request for {:?}: {}", request.url, e);
            self.shared.notify_failed(request.reference, &e);
            return;
        }

        let method = request.method();
        let Request {
            url,
            content_type,
            use_cache,
            reference,
            ..
        } = request;

        let seq = self.shared.next_seq.fetch_add(1, Ordering::SeqCst);
        self.shared.track(PendingEntry {
            seq,
            url: url.clone(),
            content_type,
        });

        let entry = QueueEntry {
            ticket: Ticket {
                seq,
                url: url.clone(),
                reference: Some(reference),
                shared: self.shared.clone(),
            },
            url,
            content_type,
            method,
            use_cache,
        };

        debug!("Queued request #{} for {} ({})", seq, entry.url, content_type);

        if let Err(mpsc::error::SendError(entry)) = self.tx.send(entry) {
            entry.ticket.failed(FetchError::QueueClosed);
        }
    }

    /// Shorthand for building and enqueueing a [`Request`].
    pub fn download(
        &self,
        url: impl Into<String>,
        content_type: ContentType,
        post_data: Option<String>,
        use_cache: bool,
        reference: R,
    ) {
        let mut request = Request::new(url, content_type, reference).cached(use_cache);
        request.post_data = post_data;
        self.enqueue(request);
    }

    /// Number of accepted requests that have not been reported yet.
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Non-terminal entries in enqueue order.
    pub fn pending_entries(&self) -> Vec<PendingEntry> {
        self.shared
            .pending
            .lock()
            .map(|p| p.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.shared.cache
    }
}

/// Consumes queued entries in order and routes each to the cache or the
/// network.
pub struct Dispatcher<R: Send + 'static> {
    rx: mpsc::UnboundedReceiver<QueueEntry<R>>,
    shared: Arc<Shared<R>>,
}

impl<R: Send + 'static> Dispatcher<R> {
    /// Runs until every [`FetchQueue`] handle has been dropped.
    pub async fn run(mut self) {
        debug!("Fetch dispatcher started");

        while let Some(entry) = self.rx.recv().await {
            self.dispatch(entry);
        }

        debug!("Fetch dispatcher stopped");
    }

    fn dispatch(&self, entry: QueueEntry<R>) {
        let Some(entry) = self.try_cache(entry) else {
            return;
        };

        tokio::spawn(transfer(self.shared.clone(), entry));
    }

    /// Answers `entry` from the cache when possible; hands it back on a miss.
    fn try_cache(&self, entry: QueueEntry<R>) -> Option<QueueEntry<R>> {
        if !entry.use_cache {
            return Some(entry);
        }

        let cache = &self.shared.cache;
        let bytes = match cache.read(&entry.url) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("Cache miss for {}", entry.url);
                return Some(entry);
            }
            Err(e) => {
                warn!("Cache read failed for {}, fetching instead: {}", entry.url, e);
                return Some(entry);
            }
        };

        debug!("Cache hit for {}", entry.url);
        match self.shared.decoder.decode(&bytes, entry.content_type) {
            Ok(value) => entry.ticket.ready(value),
            Err(e) => {
                if let Err(remove_err) = cache.remove(&entry.url) {
                    warn!("Failed to drop bad cache entry for {}: {}", entry.url, remove_err);
                }
                entry.ticket.failed(e);
            }
        }
        None
    }
}

async fn transfer<R: Send + 'static>(shared: Arc<Shared<R>>, entry: QueueEntry<R>) {
    let _permit = match shared.semaphore.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            entry.ticket.failed(FetchError::QueueClosed);
            return;
        }
    };

    let fetched = shared
        .fetcher
        .fetch(&entry.url, &entry.method)
        .await;

    let body = match fetched {
        Ok(body) => body,
        Err(e) => {
            entry.ticket.failed(e);
            return;
        }
    };

    let value = match shared.decoder.decode(&body, entry.content_type) {
        Ok(value) => value,
        Err(e) => {
            entry.ticket.failed(e);
            return;
        }
    };

    if entry.use_cache {
        if let Err(e) = shared.cache.write(&entry.url, &body) {
            warn!(kind = e.kind(), "Could not cache {}: {}", entry.url, e);
        }
    }

    entry.ticket.ready(value);
}
