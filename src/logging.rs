//! Tracing subscriber set-up for the binary.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,opendal=warn";

/// Install the global tracing subscriber.
///
/// `verbose` raises this crate to `debug` when `RUST_LOG` is unset.
pub fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let fallback = if verbose {
        "info,bucket_adapter=debug,opendal=info"
    } else {
        DEFAULT_FILTER
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    Ok(())
}
