//! Database builder for fluent configuration
//!
//! Provides a builder pattern for assembling a database around an existing
//! store, a default retry policy, and an optional fault injector.

use std::sync::Arc;

use huebucket_concurrency::FaultInjector;
use huebucket_core::{HueError, HueResult};
use huebucket_storage::ShardedStore;

use super::{Database, RetryConfig};
use crate::coordinator::TransactionCoordinator;

// ============================================================================
// Database Builder Pattern
// ============================================================================

/// Builder for Database configuration
///
/// ```ignore
/// use huebucket_engine::Database;
///
/// // 1. Empty in-memory store with default retries
/// let db = Database::ephemeral();
///
/// // 2. Builder for custom retry policy or fault injection
/// let db = Database::builder()
///     .retry(RetryConfig::no_retry())
///     .fault_injector(Arc::new(FaultInjector::new().conflict_every(3)))
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct DatabaseBuilder {
    storage: Option<Arc<ShardedStore>>,
    retry: RetryConfig,
    faults: Option<Arc<FaultInjector>>,
}

impl DatabaseBuilder {
    /// Create new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing store instead of an empty one
    ///
    /// The transaction manager starts at the store's current version.
    pub fn storage(mut self, storage: Arc<ShardedStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the default retry policy used by [`Database::transaction_with_default_retry`]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Inject commit faults (tests and contention drills)
    pub fn fault_injector(mut self, faults: Arc<FaultInjector>) -> Self {
        self.faults = Some(faults);
        self
    }

    /// Get the configured retry policy
    pub fn get_retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Assemble the database
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the retry base delay exceeds its maximum.
    pub fn build(self) -> HueResult<Arc<Database>> {
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(HueError::invalid_input(format!(
                "retry base delay {}ms exceeds max delay {}ms",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }

        let storage = self.storage.unwrap_or_default();
        let initial_version = storage.version();
        let coordinator = match self.faults {
            Some(faults) => TransactionCoordinator::with_fault_injector(initial_version, faults),
            None => TransactionCoordinator::new(initial_version),
        };

        Ok(Arc::new(Database {
            storage,
            coordinator,
            retry: self.retry,
        }))
    }
}
