//! Process-wide handler instance
//!
//! Trigger runtimes invoke the handler through a plain function, so the
//! handler and its store client live in a process-wide cell. The first
//! [`init_service`] call builds them; every later call returns that same
//! instance and ignores its arguments.

use std::sync::Arc;

use huebucket_core::HueResult;
use once_cell::sync::OnceCell;
use tracing::info;

use crate::database::{Database, HueBucketConfig};
use crate::handler::{HandlerOutcome, HueBucketHandler};
use crate::telemetry;

static SERVICE: OnceCell<HueBucketHandler> = OnceCell::new();

/// Initialize logging and the process-wide handler, once
///
/// # Errors
/// `InvalidInput` if the first call's configuration does not validate. A
/// failed call leaves the cell empty so a later call can retry.
pub fn init_service(
    config: &HueBucketConfig,
    db: Arc<Database>,
) -> HueResult<&'static HueBucketHandler> {
    SERVICE.get_or_try_init(|| {
        config.validate()?;
        telemetry::init_logging(&config.logging);
        let handler = HueBucketHandler::new(db, config)?;
        info!(
            target: "huebucket",
            buckets = %config.buckets_collection,
            deduplicate = config.deduplicate,
            max_retries = config.retry.max_retries,
            "Hue bucket service initialized"
        );
        Ok(handler)
    })
}

/// The process-wide handler, if [`init_service`] has succeeded
pub fn service() -> Option<&'static HueBucketHandler> {
    SERVICE.get()
}

/// Handle a raw trigger payload with the process-wide handler
///
/// Returns `None` if the service was never initialized.
pub fn handle_payload(payload: &[u8]) -> Option<HandlerOutcome> {
    service().map(|handler| handler.handle_payload(payload))
}
