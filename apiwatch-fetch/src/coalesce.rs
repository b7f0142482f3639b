//! Per-cycle deduplication of in-flight fetches.
//!
//! Several watch targets often point at anchors of the same page. Within one
//! cycle they share a single request keyed by the fragment-free URL.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::content::ContentSource;
use crate::outcome::FetchOutcome;
use crate::urls::strip_fragment;

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Shares one fetch per URL within a cycle.
pub struct FetchCoalescer {
    source: Arc<dyn ContentSource>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
}

impl FetchCoalescer {
    /// Creates a coalescer over `source`.
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self {
            source,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Forgets every entry from the previous cycle.
    pub async fn begin_cycle(&self) {
        let mut in_flight = self.in_flight.lock().await;
        if !in_flight.is_empty() {
            debug!(entries = in_flight.len(), "Clearing fetch cache");
        }
        in_flight.clear();
    }

    /// Number of URLs fetched or fetching this cycle.
    pub async fn len(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Returns true if nothing was fetched this cycle.
    pub async fn is_empty(&self) -> bool {
        self.in_flight.lock().await.is_empty()
    }

    /// Fetches `url`, joining an existing request for the same page.
    ///
    /// Failed outcomes are shared too; a page is tried at most once per cycle.
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let key = strip_fragment(url).to_string();

        let shared = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!(url = %key, "Joining in-flight fetch");
                    existing.clone()
                }
                None => {
                    let source = Arc::clone(&self.source);
                    let target = key.clone();
                    let fut = async move { source.fetch(&target).await }.boxed().shared();
                    in_flight.insert(key, fut.clone());
                    fut
                }
            }
        };

        shared.await
    }
}
