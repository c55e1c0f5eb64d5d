//! In-process host for gateway-core: broadcast network, heartbeat timer, artifact directory.

pub mod artifacts;
pub mod config;
pub mod host;
pub mod network;

pub use artifacts::DirectorySink;
pub use config::HostConfig;
pub use host::{GatewayHost, HostedCore};
pub use network::{Endpoint, Network, PeerLink};

/// Install the fmt subscriber. `RUST_LOG` overrides the default `info` filter.
/// Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
