use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::background::{self, BackgroundHandle, SyncTrigger};
use crate::events::{self, ClientEvent, EventSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

impl From<bool> for Connectivity {
    fn from(online: bool) -> Self {
        if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Reconnected,
    Disconnected,
}

/// Tracks online/offline edges and starts a sync pass on every reconnect.
pub struct ConnectivityMonitor {
    state: watch::Sender<Connectivity>,
    events: EventSender,
    sync: Option<BackgroundHandle>,
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity, events: EventSender, sync: Option<BackgroundHandle>) -> Self {
        Self {
            state: watch::channel(initial).0,
            events,
            sync,
        }
    }

    pub fn current(&self) -> Connectivity {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.state.subscribe()
    }

    /// Record the latest observed status. Returns the edge it caused, if any.
    pub fn report(&self, online: bool) -> Option<Transition> {
        let next = Connectivity::from(online);
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if !changed {
            return None;
        }

        let transition = match next {
            Connectivity::Online => Transition::Reconnected,
            Connectivity::Offline => Transition::Disconnected,
        };

        match transition {
            Transition::Reconnected => {
                tracing::info!("Connectivity restored");
                events::publish(&self.events, ClientEvent::Reconnected);
                if let Some(sync) = &self.sync {
                    sync.trigger_sync(SyncTrigger::Reconnected);
                }
            }
            Transition::Disconnected => {
                tracing::info!("Connectivity lost");
                events::publish(&self.events, ClientEvent::Disconnected);
            }
        }

        Some(transition)
    }
}

/// A way to tell whether the remote API is reachable.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Any HTTP response from the probe URL counts as online.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build probe client: {e}"))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn is_online(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!("Probe of {} failed: {e}", self.url);
                false
            }
        }
    }
}

/// Probe on a fixed interval and feed each result into the monitor.
pub fn spawn_probe(
    monitor: Arc<ConnectivityMonitor>,
    probe: Arc<dyn Probe>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = background::stopped(&mut shutdown) => break,
            }
            let online = probe.is_online().await;
            monitor.report(online);
        }

        tracing::debug!("Connectivity probe stopped");
    })
}
