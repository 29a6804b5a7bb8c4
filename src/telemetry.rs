use tracing_subscriber::EnvFilter;

use crate::{PipelineError, Result};

/// Default directive when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "castle_pipeline=info";

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Fails if a global subscriber is
/// already installed.
pub fn init_tracing(default_filter: &str, json: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| PipelineError::Internal(format!("tracing subscriber: {}", e)))
}
