use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber for the binary. Log lines go to stderr so
/// the report on stdout stays clean. `RUST_LOG` overrides the `info` default.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(json: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::init_tracing;

    #[test]
    fn second_install_is_rejected() {
        // another test in this binary may already have won the race
        let _ = init_tracing(false);
        assert!(init_tracing(true).is_err());
    }
}
