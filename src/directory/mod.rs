//! Organization directory search used by the onboarding autocomplete.

pub mod debounce;

use std::sync::Arc;

use tracing::debug;

use crate::backend::OrganizationDirectory;
use crate::backend::retry::read_with_retry;
use crate::error::BackendError;
use crate::profile::Organization;

/// Shortest prefix that reaches the backend.
pub const MIN_PREFIX_CHARS: usize = 3;

/// Default number of suggestions.
pub const DEFAULT_LIMIT: usize = 5;

pub use debounce::{DebouncedSearch, SearchResults};

/// Prefix lookup with the autocomplete contract applied: short prefixes are
/// answered locally with nothing.
pub struct DirectorySearch {
    directory: Arc<dyn OrganizationDirectory>,
    limit: usize,
}

impl DirectorySearch {
    pub fn new(directory: Arc<dyn OrganizationDirectory>) -> Self {
        Self {
            directory,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Search with the configured limit.
    pub async fn search(&self, prefix: &str) -> Result<Vec<Organization>, BackendError> {
        self.search_with_limit(prefix, self.limit).await
    }

    /// Organizations whose name contains `prefix`, ordered by name, at most
    /// `limit` of them. Empty without a backend call when the trimmed prefix
    /// is shorter than [`MIN_PREFIX_CHARS`].
    pub async fn search_with_limit(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<Organization>, BackendError> {
        let prefix = prefix.trim();
        if prefix.chars().count() < MIN_PREFIX_CHARS || limit == 0 {
            return Ok(Vec::new());
        }
        debug!(prefix, limit, "Searching organizations");
        let mut found = read_with_retry("find_organizations", || {
            self.directory.find_organizations(prefix, limit)
        })
        .await?;
        found.truncate(limit);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    async fn search() -> (Arc<MemoryBackend>, DirectorySearch) {
        let backend = Arc::new(MemoryBackend::seeded().await);
        let search = DirectorySearch::new(backend.clone());
        (backend, search)
    }

    #[tokio::test]
    async fn short_prefix_skips_backend() {
        let (backend, search) = search().await;
        assert!(search.search("").await.unwrap().is_empty());
        assert!(search.search("ta").await.unwrap().is_empty());
        assert!(search.search("  ta  ").await.unwrap().is_empty());
        assert_eq!(backend.directory_calls(), 0);
    }

    #[tokio::test]
    async fn multibyte_prefix_counts_characters() {
        let (backend, search) = search().await;
        // "ció" is three characters but four bytes
        let found = search.search("ció").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Acme Corporación");
        assert_eq!(backend.directory_calls(), 1);
    }

    #[tokio::test]
    async fn results_are_limited() {
        let (_backend, search) = search().await;
        let search = search.with_limit(1);
        let found = search.search("tal").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Disruptive Talent");
    }
}
