use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` wins over the built-in directive when it parses.
fn filter_or(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

/// Diagnostics go to stderr so stdout carries only the command response.
pub fn init_cli_logger(verbose: bool) {
    let directive = if verbose {
        "safe_zones=debug,info"
    } else {
        "safe_zones=warn"
    };

    tracing_subscriber::registry()
        .with(filter_or(directive))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

pub fn init_lambda_logger() {
    tracing_subscriber::registry()
        .with(filter_or("safe_zones=info"))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .without_time()
                .json(), // CloudWatch stamps each line itself
        )
        .init();
}
