use crate::config::LogConfig;
use tracing_subscriber::{EnvFilter, prelude::*};

fn directives(level: &str, verbose: bool) -> String {
    if verbose {
        format!("{},dotagent=debug", level)
    } else {
        level.to_string()
    }
}

/// Build the filter: `RUST_LOG` wins, then the configured level (plus
/// `dotagent=debug` when verbose).
pub fn build_filter(cfg: &LogConfig, verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = directives(&cfg.level, verbose);
        EnvFilter::try_new(&level).unwrap_or_else(|e| {
            eprintln!("invalid log level '{}': {}; using default", level, e);
            EnvFilter::new(directives(&LogConfig::default().level, verbose))
        })
    })
}

/// Initialize tracing on stderr. Later calls are no-ops.
pub fn init_tracing(cfg: &LogConfig, verbose: bool) {
    let filter = build_filter(cfg, verbose);

    let _ = if cfg.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}
