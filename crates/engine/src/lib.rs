//! Hue bucket aggregation engine
//!
//! This crate orchestrates the lower layers:
//! - Database: storage + transaction coordination + retry with backoff
//! - EventValidator / BucketAggregator: the hue counting transaction
//! - HueBucketHandler: the document-created trigger entry point
//! - BucketDistribution: read-only view over all bucket counts
//! - Configuration (`huebucket.toml`), logging init, process-wide service
//!
//! The engine is the only component that knows about hues and buckets;
//! storage and concurrency deal in plain documents.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregator;
pub mod coordinator;
pub mod database;
pub mod distribution;
pub mod event;
pub mod handler;
pub mod service;
pub mod telemetry;
pub mod validator;

pub use aggregator::{increment_bucket, AggregationOutcome, BucketAggregator, BucketUpdate};
pub use coordinator::{TransactionCoordinator, TransactionMetrics};
pub use database::{Database, DatabaseBuilder, HueBucketConfig, LoggingConfig, RetryConfig};
pub use distribution::{BucketCount, BucketDistribution};
pub use event::DocumentCreatedEvent;
pub use handler::{HandlerOutcome, HueBucketHandler};
pub use huebucket_concurrency::{FaultInjector, TransactionContext};
pub use service::{init_service, service};
pub use telemetry::{init_logging, LogFormat};
pub use validator::EventValidator;
