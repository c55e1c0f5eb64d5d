// Gateway host demo: two same-origin contexts on the in-process network,
// handshake, storage sync and file transfer, then wait for Ctrl+C.

use std::path::PathBuf;
use std::time::Duration;

use gateway_core::{EventKind, Environment, GatewayEvent, MemoryStore};
use gateway_host::{config, DirectorySink, GatewayHost, Network};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    let mut config_path = PathBuf::from("gateway.toml");
    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("gateway-host {}", VERSION);
            return Ok(());
        }
        config_path = PathBuf::from(arg);
    }

    gateway_host::init_tracing();
    let cfg = config::load(&config_path)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let network = Network::new();

        let left_env = Environment::new(cfg.origin.clone());
        let left_store: MemoryStore = [("greeting", "hello"), ("theme", "dark")]
            .into_iter()
            .collect();
        let left = GatewayHost::start(
            &network,
            &left_env,
            cfg.gateway.clone(),
            left_store,
            DirectorySink::new(cfg.artifact_dir.join("left")),
        )?;

        let right_env = Environment::new(cfg.origin.clone());
        let right = GatewayHost::start(
            &network,
            &right_env,
            cfg.gateway.clone(),
            MemoryStore::new(),
            DirectorySink::new(cfg.artifact_dir.join("right")),
        )?;

        right.core().lock().await.on(EventKind::LocalStorageUpdated, |event| {
            if let GatewayEvent::LocalStorageUpdated(snapshot) = event {
                tracing::info!(keys = snapshot.len(), "right context received storage");
            }
            Ok(())
        });

        left.announce().await;
        right.announce().await;

        // CONNECT is handled by the left context's inbox task; wait for it.
        let right_id = right.core().lock().await.local_id().clone();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !left.core().lock().await.has_peer(&right_id) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await?;
        {
            let core = left.core().lock().await;
            core.exchange_local_storage(&right_id)?;
            core.exchange_files(&right_id)?;
        }

        shutdown_signal().await?;
        left.shutdown().await;
        right.shutdown().await;
        anyhow::Ok(())
    })?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
