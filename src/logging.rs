use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// configured level; `log_json` switches to structured output for log
/// shippers. Safe to call once per process; later calls are ignored so test
/// binaries can initialize freely.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.log_json {
        let _ = fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}
