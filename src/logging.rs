// Tracing subscriber setup for binaries and tests embedding the core

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "tubefetch_lib=info";

/// Install a fmt subscriber filtered by `RUST_LOG`. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // an already installed global subscriber wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_tracing();
        init_tracing();
        tracing::info!("logging initialised");
    }
}
