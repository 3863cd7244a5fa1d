//! Process-wide logging setup
//!
//! The handler only emits `tracing` events. Hosts that already install a
//! subscriber can skip this module; everyone else calls [`init_logging`]
//! once at startup. Repeated calls are no-ops.

use crate::database::LoggingConfig;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOGGING: OnceCell<bool> = OnceCell::new();

/// Output format of the log sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!(
                "unknown log format '{}', expected \"text\" or \"json\"",
                other
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` takes precedence over `config.filter`. Returns `true` only on
/// the call that installed the subscriber; `false` on later calls or when
/// the host already installed one.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let mut installed = false;
    LOGGING.get_or_init(|| {
        installed = install(config);
        installed
    });
    installed
}

/// Whether [`init_logging`] has run in this process
pub fn logging_initialized() -> bool {
    LOGGING.get().is_some()
}

fn install(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let format = config.log_format().unwrap_or_default();

    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    match result {
        Ok(()) => {
            tracing::info!(target: "huebucket", filter = %config.filter, %format, "Logging initialized");
            true
        }
        Err(_) => false,
    }
}
