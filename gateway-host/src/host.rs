//! Runs one GatewayCore on the in-process network: inbox loop, heartbeat timer, shutdown.

use std::sync::Arc;
use std::time::Duration;

use gateway_core::{ArtifactSink, Environment, GatewayConfig, GatewayCore, GatewayError, MemoryStore};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::network::{Endpoint, Inbox, Network, PeerLink};

pub type HostedCore<A> = GatewayCore<PeerLink, MemoryStore, A>;

/// One running context. Call [`shutdown`](Self::shutdown) to notify peers; dropping the
/// host instead aborts its tasks and leaves the network without telling anyone, and the
/// activation claim is released once the aborted tasks let go of the core.
pub struct GatewayHost<A> {
    core: Arc<Mutex<HostedCore<A>>>,
    endpoint: Endpoint,
    network: Network,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl<A: ArtifactSink + 'static> GatewayHost<A> {
    /// Activate a gateway for `env`, join `network` and start the inbox and heartbeat tasks.
    /// Must be called from within a tokio runtime.
    pub fn start(
        network: &Network,
        env: &Environment,
        config: GatewayConfig,
        store: MemoryStore,
        sink: A,
    ) -> Result<Self, GatewayError> {
        let period = config.heartbeat_interval();
        let core = Arc::new(Mutex::new(GatewayCore::new(env, config, store, sink)?));
        let (endpoint, inbox) = network.join(env.origin());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = vec![
            tokio::spawn(inbox_loop(core.clone(), inbox, shutdown_rx.clone())),
            tokio::spawn(heartbeat_loop(core.clone(), period, shutdown_rx)),
        ];
        info!(context = endpoint.id(), origin = env.origin(), "gateway host started");
        Ok(Self {
            core,
            endpoint,
            network: network.clone(),
            shutdown_tx,
            tasks,
        })
    }

    pub fn core(&self) -> &Arc<Mutex<HostedCore<A>>> {
        &self.core
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Send CONNECT to every other context on the network. Returns how many were contacted.
    pub async fn announce(&self) -> usize {
        let links = self.network.links_from(&self.endpoint);
        let core = self.core.lock().await;
        for link in &links {
            core.connect_to(link);
        }
        links.len()
    }

    /// Shut the gateway down, stop both tasks and leave the network.
    pub async fn shutdown(mut self) {
        self.core.lock().await.shutdown();
        let _ = self.shutdown_tx.send(true);
        self.network.leave(&self.endpoint);
        for task in std::mem::take(&mut self.tasks) {
            let _ = task.await;
        }
        info!(context = self.endpoint.id(), "gateway host stopped");
    }
}

impl<A> Drop for GatewayHost<A> {
    fn drop(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        for task in &self.tasks {
            task.abort();
        }
        self.network.leave(&self.endpoint);
        debug!(context = self.endpoint.id(), "gateway host dropped without shutdown");
    }
}

async fn inbox_loop<A: ArtifactSink + 'static>(
    core: Arc<Mutex<HostedCore<A>>>,
    mut inbox: Inbox,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            event = inbox.recv() => match event {
                Some(event) => {
                    let outcome = core.lock().await.on_event(event);
                    debug!(?outcome, "inbound event handled");
                }
                None => break,
            },
            _ = shutdown.changed() => break,
        }
    }
}

async fn heartbeat_loop<A: ArtifactSink + 'static>(
    core: Arc<Mutex<HostedCore<A>>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    // first tick completes immediately
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut core = core.lock().await;
                if !core.is_active() {
                    break;
                }
                let evicted = core.tick();
                if !evicted.is_empty() {
                    debug!(count = evicted.len(), "peers evicted");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("heartbeat timer stopped");
}
