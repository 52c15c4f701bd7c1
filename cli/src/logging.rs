//! Log setup for `vault-cli`.
//!
//! Logs go to stderr; stdout is reserved for addresses, signatures and
//! balances. `RUST_LOG`, when set, replaces the filter picked by `-v`.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose events the default filter lets through.
const OWN_TARGETS: [&str; 2] = ["vault_cli", "vault_client"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Filter directives for `-v` repeated `verbosity` times.
///
/// Quiet by default (warnings only), so command output stays readable.
/// Other crates (reqwest, hyper) stay at `warn` whatever the verbosity.
pub fn directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let mut out = String::from("warn");
    for target in OWN_TARGETS {
        out.push_str(&format!(",{target}={level}"));
    }
    out
}

/// Installs the global subscriber. Call once, before the first event.
pub fn init_logging(verbosity: u8, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(verbosity)));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbosity >= 2),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}
