//! Tracing setup for the locker coordinator. `RUST_LOG` wins outright when
//! set; otherwise the filter is assembled from the configured level plus
//! directives that keep the HTTP plumbing quieter than the delivery flow,
//! so reservation and sweep events stay readable at `info`.

use crate::config::TelemetryConfig;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Infrastructure targets capped at `warn` in the assembled filter.
const QUIET_TARGETS: &[&str] = &["hyper", "mio", "tower"];

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter '{directives}'")]
    Filter {
        directives: String,
        #[source]
        source: ParseError,
    },
    #[error("tracing subscriber install failed: {0}")]
    Install(String),
}

/// `APP_LOG_LEVEL` as the base level, noisy targets capped. The result is
/// an `EnvFilter` directive string, e.g. `info,hyper=warn,mio=warn`.
fn filter_directives(config: &TelemetryConfig) -> String {
    let mut directives = config.log_level.trim().to_string();
    for target in QUIET_TARGETS {
        directives.push(',');
        directives.push_str(target);
        directives.push_str("=warn");
    }
    directives
}

fn build_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    let directives = filter_directives(config);
    EnvFilter::try_new(&directives).map_err(|source| TelemetryError::Filter { directives, source })
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(config)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(|err| TelemetryError::Install(err.to_string()))
}
