//! Logging initialisation for binaries and demos built on glkit.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Subscriber configuration.
///
/// `env_filter` uses `tracing-subscriber`'s `EnvFilter` directive syntax
/// (e.g. "info", "glkit=debug,glkit_core=trace").
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Filter from the config, else `RUST_LOG`, else `info`.
    pub fn filter(&self) -> EnvFilter {
        match &self.env_filter {
            Some(directives) => EnvFilter::new(directives),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        }
    }
}

static INIT: Once = Once::new();

/// Install the global `tracing` subscriber once.
///
/// Later calls are ignored, as is an already-installed subscriber from
/// elsewhere.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let installed = tracing_subscriber::fmt()
            .with_env_filter(config.filter())
            .with_ansi(config.ansi)
            .with_target(true)
            .try_init()
            .is_ok();
        if installed {
            tracing::debug!("logging initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins() {
        let config = LoggingConfig {
            env_filter: Some("glkit=trace".to_string()),
            ansi: false,
        };
        assert_eq!(config.filter().to_string(), "glkit=trace");
    }

    #[test]
    fn init_is_idempotent() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig::default());
    }
}
