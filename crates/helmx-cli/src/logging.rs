//! Log setup
//!
//! `RUST_LOG` wins when set. Otherwise `HELM_X_VERBOSITY` picks the filter: a number maps to a
//! level, anything else is used as a filter directive. `--debug` raises the default to `debug`.

use tracing_subscriber::EnvFilter;

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Filter directive for the given `HELM_X_VERBOSITY` value and `--debug` flag
pub fn directive(verbosity: Option<&str>, debug: bool) -> String {
    match verbosity.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => match v.parse::<u8>() {
            Ok(n) => level_for(n).to_string(),
            Err(_) => v.to_string(),
        },
        None if debug => "debug".to_string(),
        None => "warn".to_string(),
    }
}

pub fn init(verbosity: Option<&str>, debug: bool) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(env) if !env.is_empty() => EnvFilter::try_new(&env).ok(),
        _ => None,
    }
    .or_else(|| EnvFilter::try_new(directive(verbosity, debug)).ok())
    .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(debug)
        .init();
}
