use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::connectivity::Connectivity;
use crate::error::QueueError;
use crate::models::{FormSubmission, QueuedSubmission};
use crate::queue::QueueManager;
use crate::sync::{SyncCoordinator, SyncSummary};

/// Why a sync pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Requested,
    Reconnected,
    Periodic,
    NewWork,
}

impl std::fmt::Display for SyncTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncTrigger::Requested => write!(f, "request"),
            SyncTrigger::Reconnected => write!(f, "reconnect"),
            SyncTrigger::Periodic => write!(f, "periodic sync"),
            SyncTrigger::NewWork => write!(f, "new work"),
        }
    }
}

/// Commands sent to the background context.
enum Command {
    QueueForm {
        form: FormSubmission,
        respond: oneshot::Sender<Result<QueuedSubmission, QueueError>>,
    },
    Sync {
        trigger: SyncTrigger,
        respond: oneshot::Sender<Result<SyncSummary, QueueError>>,
    },
    Pending {
        respond: oneshot::Sender<Result<i64, QueueError>>,
    },
}

/// Cloneable request/response handle to the background context.
#[derive(Clone)]
pub struct BackgroundHandle {
    tx: mpsc::Sender<Command>,
    sync_requested: Arc<Notify>,
}

impl BackgroundHandle {
    pub async fn queue_form(&self, form: FormSubmission) -> Result<QueuedSubmission, QueueError> {
        let (respond, rx) = oneshot::channel();
        self.request(Command::QueueForm { form, respond }, rx).await
    }

    /// Run a sync pass and wait for its summary.
    pub async fn sync(&self, trigger: SyncTrigger) -> Result<SyncSummary, QueueError> {
        let (respond, rx) = oneshot::channel();
        self.request(Command::Sync { trigger, respond }, rx).await
    }

    /// Request a sync pass without waiting for it. Requests made before the
    /// background context gets to them collapse into a single pass.
    pub fn trigger_sync(&self, trigger: SyncTrigger) {
        tracing::debug!("Sync requested by {trigger}");
        self.sync_requested.notify_one();
    }

    pub async fn pending(&self) -> Result<i64, QueueError> {
        let (respond, rx) = oneshot::channel();
        self.request(Command::Pending { respond }, rx).await
    }

    async fn request<T>(
        &self,
        command: Command,
        rx: oneshot::Receiver<Result<T, QueueError>>,
    ) -> Result<T, QueueError> {
        self.tx.send(command).await.map_err(|_| QueueError::Closed)?;
        rx.await.map_err(|_| QueueError::Closed)?
    }
}

/// Start the background context. It owns the queue and serializes every
/// store operation, so an enqueue never interleaves with a sync pass.
pub fn spawn(
    manager: QueueManager,
    coordinator: SyncCoordinator,
    shutdown: watch::Receiver<bool>,
) -> (BackgroundHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(64);
    let sync_requested = Arc::new(Notify::new());
    let task = tokio::spawn(run(
        manager,
        coordinator,
        rx,
        sync_requested.clone(),
        shutdown,
    ));
    (BackgroundHandle { tx, sync_requested }, task)
}

enum Work {
    Command(Command),
    /// A fire-and-forget sync request from `trigger_sync`.
    RequestedSync,
}

async fn run(
    manager: QueueManager,
    coordinator: SyncCoordinator,
    mut rx: mpsc::Receiver<Command>,
    sync_requested: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!("Background queue started");

    let mut backlog: Option<Command> = None;

    loop {
        let work = match backlog.take() {
            Some(command) => Work::Command(command),
            None => tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => Work::Command(command),
                    None => break,
                },
                _ = sync_requested.notified() => Work::RequestedSync,
                _ = stopped(&mut shutdown) => break,
            },
        };

        match work {
            Work::Command(Command::QueueForm { form, respond }) => {
                let _ = respond.send(manager.enqueue(form).await);
            }
            Work::Command(Command::Pending { respond }) => {
                let _ = respond.send(manager.pending().await);
            }
            Work::Command(Command::Sync { trigger, respond }) => {
                let origin = trigger.to_string();
                sync_pass(&coordinator, &mut rx, &mut backlog, vec![respond], &origin).await;
            }
            Work::RequestedSync => {
                sync_pass(&coordinator, &mut rx, &mut backlog, Vec::new(), "background trigger")
                    .await;
            }
        }
    }

    tracing::info!("Background queue stopped");
}

/// Run one pass and send its result to every responder, including sync
/// requests already waiting in the channel behind it.
async fn sync_pass(
    coordinator: &SyncCoordinator,
    rx: &mut mpsc::Receiver<Command>,
    backlog: &mut Option<Command>,
    mut responders: Vec<oneshot::Sender<Result<SyncSummary, QueueError>>>,
    origin: &str,
) {
    let mut coalesced = 0usize;

    while let Ok(waiting) = rx.try_recv() {
        match waiting {
            Command::Sync { respond, .. } => {
                responders.push(respond);
                coalesced += 1;
            }
            other => {
                *backlog = Some(other);
                break;
            }
        }
    }

    tracing::debug!("Sync pass triggered by {origin} ({coalesced} coalesced)");

    let result = coordinator.run_pass().await;
    if let Err(e) = &result {
        tracing::error!("Sync pass failed: {e}");
    }

    for respond in responders {
        let _ = respond.send(result.clone());
    }
}

/// Drive sync triggers that originate inside the background context: new work
/// queued while online, and the periodic sync interval (zero disables it).
pub fn spawn_scheduler(
    handle: BackgroundHandle,
    work_pending: Arc<Notify>,
    connectivity: watch::Receiver<Connectivity>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = (!interval.is_zero()).then(|| {
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval)
        });

        loop {
            let trigger = tokio::select! {
                _ = work_pending.notified() => SyncTrigger::NewWork,
                _ = tick(ticker.as_mut()) => SyncTrigger::Periodic,
                _ = stopped(&mut shutdown) => break,
            };

            if connectivity.borrow().is_online() {
                handle.trigger_sync(trigger);
            } else {
                tracing::debug!("Skipping sync ({trigger}) while offline");
            }
        }

        tracing::debug!("Sync scheduler stopped");
    })
}

async fn tick(ticker: Option<&mut tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Resolves once shutdown is signaled. Never resolves if the signal's sender is gone.
pub async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
