//! Debounced search-as-you-type.
//!
//! Every keystroke cancels the pending lookup and schedules a new one after
//! a quiet period. Each input gets a sequence number; a lookup result is
//! published only while its number is still the latest, so a slow response
//! for an old prefix can never replace a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{DirectorySearch, MIN_PREFIX_CHARS};
use crate::profile::Organization;

/// Default quiet period before a lookup fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Latest published suggestions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    /// Sequence number of the input that produced these results.
    pub seq: u64,
    pub query: String,
    pub organizations: Vec<Organization>,
}

/// Cancellable delayed lookup over a [`DirectorySearch`].
pub struct DebouncedSearch {
    search: Arc<DirectorySearch>,
    delay: Duration,
    latest: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
    tx: Arc<watch::Sender<SearchResults>>,
}

impl DebouncedSearch {
    pub fn new(search: Arc<DirectorySearch>, delay: Duration) -> Self {
        let (tx, _rx) = watch::channel(SearchResults::default());
        Self {
            search,
            delay,
            latest: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            tx: Arc::new(tx),
        }
    }

    /// Receiver notified each time a fresh result set is published.
    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.tx.subscribe()
    }

    /// Most recently published results.
    pub fn current(&self) -> SearchResults {
        self.tx.borrow().clone()
    }

    /// Register a keystroke. Returns the sequence number assigned to it.
    pub fn input(&self, query: &str) -> u64 {
        // Numbering, aborting and storing the handle happen under one lock so
        // the stored handle always belongs to the latest input.
        let mut pending = self.lock_pending();
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        let query = query.trim().to_string();
        if query.chars().count() < MIN_PREFIX_CHARS {
            self.tx.send_replace(SearchResults {
                seq,
                query,
                organizations: Vec::new(),
            });
            return seq;
        }

        let search = Arc::clone(&self.search);
        let latest = Arc::clone(&self.latest);
        let tx = Arc::clone(&self.tx);
        let delay = self.delay;

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if latest.load(Ordering::SeqCst) != seq {
                return;
            }
            let result = search.search(&query).await;
            if latest.load(Ordering::SeqCst) != seq {
                debug!(seq, query = %query, "Discarding stale search result");
                return;
            }
            match result {
                Ok(organizations) => {
                    tx.send_replace(SearchResults {
                        seq,
                        query,
                        organizations,
                    });
                }
                Err(e) => warn!(seq, query = %query, error = %e, "Organization search failed"),
            }
        }));
        seq
    }

    /// Drop any scheduled or in-flight lookup without publishing.
    pub fn cancel(&self) {
        let mut pending = self.lock_pending();
        self.latest.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_pending().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    const WAIT: Duration = Duration::from_secs(10);

    fn debounced(backend: Arc<MemoryBackend>) -> DebouncedSearch {
        let search = Arc::new(DirectorySearch::new(backend));
        DebouncedSearch::new(search, DEFAULT_DEBOUNCE)
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_keystrokes_issue_one_lookup() {
        let backend = Arc::new(MemoryBackend::seeded().await);
        let search = debounced(backend.clone());
        let mut rx = search.subscribe();

        for query in ["ban", "banc", "banco"] {
            search.input(query);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        tokio::time::timeout(WAIT, rx.changed())
            .await
            .expect("no result published")
            .unwrap();

        let results = search.current();
        assert_eq!(results.query, "banco");
        assert_eq!(results.organizations.len(), 1);
        assert_eq!(results.organizations[0].id, "org-3");
        assert_eq!(backend.directory_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_result_is_superseded() {
        let backend = Arc::new(
            MemoryBackend::seeded()
                .await
                .with_latency(Duration::from_millis(500)),
        );
        let search = debounced(backend.clone());
        let mut rx = search.subscribe();

        search.input("acm");
        // first lookup has fired and is waiting on the backend
        tokio::time::sleep(Duration::from_millis(350)).await;
        let second = search.input("ban");

        tokio::time::timeout(WAIT, rx.changed())
            .await
            .expect("no result published")
            .unwrap();

        let results = search.current();
        assert_eq!(results.seq, second);
        assert_eq!(results.query, "ban");
        assert_eq!(backend.directory_calls(), 2);

        // nothing else arrives later
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn short_input_clears_suggestions_without_lookup() {
        let backend = Arc::new(MemoryBackend::seeded().await);
        let search = debounced(backend.clone());

        let seq = search.input("ba");
        let results = search.current();
        assert_eq!(results.seq, seq);
        assert!(results.organizations.is_empty());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.directory_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_pending_lookup() {
        let backend = Arc::new(MemoryBackend::seeded().await);
        let search = debounced(backend.clone());
        let rx = search.subscribe();

        search.input("talent");
        search.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!rx.has_changed().unwrap());
        assert_eq!(backend.directory_calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_keystrokes_keep_only_latest_lookup() {
        let backend = Arc::new(MemoryBackend::seeded().await);
        let search = Arc::new(DebouncedSearch::new(
            Arc::new(DirectorySearch::new(backend.clone())),
            Duration::from_millis(50),
        ));
        let mut rx = search.subscribe();

        let typists: Vec<_> = (0..8)
            .map(|_| {
                let search = Arc::clone(&search);
                tokio::spawn(async move { search.input("talent") })
            })
            .collect();
        let mut last = 0;
        for typist in typists {
            last = last.max(typist.await.unwrap());
        }
        {
            let pending = search.lock_pending();
            let handle = pending.as_ref().expect("latest lookup is scheduled");
            assert!(!handle.is_finished());
        }

        let results = tokio::time::timeout(WAIT, rx.wait_for(|r| r.seq != 0))
            .await
            .expect("no result published")
            .unwrap()
            .clone();
        assert_eq!(results.seq, last);
        assert_eq!(results.organizations.len(), 2);
        assert_eq!(backend.directory_calls(), 1);
    }
}
