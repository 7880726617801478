//! Online/offline signal.
//!
//! The host (or the endpoint probe) publishes connectivity changes; the
//! coordinator subscribes and treats a transition into online as a trigger.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shared connectivity flag backed by a watch channel
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn online() -> Self {
        Self::new(true)
    }

    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Whether connectivity is currently believed available
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Publish a new state; subscribers are only woken on change
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            if online {
                tracing::info!("Connectivity restored");
            } else {
                tracing::info!("Connectivity lost");
            }
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Check whether the endpoint's host accepts TCP connections
pub async fn probe_endpoint(url: &str, timeout: Duration) -> bool {
    let parsed = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("Cannot probe invalid endpoint {}: {}", url, e);
            return false;
        }
    };

    let (Some(host), Some(port)) = (parsed.host_str(), parsed.port_or_known_default()) else {
        return false;
    };

    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// Probe the endpoint on a fixed cadence and publish the result
pub fn spawn_probe(connectivity: Connectivity, url: String, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let online = probe_endpoint(&url, every).await;
            connectivity.set_online(online);
        }
    })
}
