//! Tracing setup for the synth binary.
//!
//! Logs go to stderr; stdout carries command output (digests, summaries).
//! Without `RUST_LOG`, only the synthesizer's own crates log at the chosen
//! level and everything else is held at `warn`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events follow the requested level.
const SYNTH_TARGETS: &[&str] = &["mlops_core", "mlops_stacks", "mlops_synth"];

/// Install the global subscriber. `json` selects newline-delimited JSON.
///
/// Only the first call in a process takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let json_layer = json.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
    });
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .ok();
}

fn default_directives(level: Level) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        SYNTH_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level.as_str().to_lowercase())),
    );
    directives.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_level_to_synth_crates() {
        assert_eq!(
            default_directives(Level::DEBUG),
            "warn,mlops_core=debug,mlops_stacks=debug,mlops_synth=debug"
        );
    }

    #[test]
    fn test_default_directives_parse() {
        assert!(default_directives(Level::INFO)
            .parse::<EnvFilter>()
            .is_ok());
    }
}
