use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogFormat;

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "lessonforge=debug"
    } else {
        "lessonforge=info"
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the verbosity flag.
/// Logs go to stderr so they never interleave with the report on stdout.
pub fn init_logging(verbose: bool, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    match format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
