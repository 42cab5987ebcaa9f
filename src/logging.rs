//! Logging setup for applications embedding haul.
//!
//! The library only emits `tracing` events. These helpers install a
//! `tracing-subscriber` fmt subscriber on stderr for callers that have none.

use crate::error::{Error, Result};

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,haul=debug";

/// Install a stderr subscriber honoring `RUST_LOG`.
///
/// Fails if a global subscriber is already set.
pub fn init_tracing() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter)
}

/// Install a stderr subscriber with an explicit filter directive.
pub fn init_tracing_with(directives: &str) -> Result<()> {
    let filter = EnvFilter::try_new(directives)
        .map_err(|e| Error::InvalidConfig(format!("invalid log filter {directives:?}: {e}")))?;
    install(filter)
}

fn install(filter: EnvFilter) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(|e| Error::Internal(format!("cannot install log subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_is_a_config_error() {
        assert!(matches!(
            init_tracing_with("haul=notalevel"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn second_install_fails() {
        let _ = init_tracing_with("warn");
        assert!(matches!(init_tracing_with("warn"), Err(Error::Internal(_))));
    }
}
