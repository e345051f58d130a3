use crate::account::AccountStore;
use crate::activity::ActivityFetcher;
use crate::backend::WalletBackend;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};

pub const RPC_POLL_INTERVAL: Duration = Duration::from_millis(4000);
/// Shortest period the background loops accept; tokio rejects a zero period
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connectivity {
    Down,
    Up,
}

impl From<bool> for Connectivity {
    fn from(status: bool) -> Self {
        if status {
            Connectivity::Up
        } else {
            Connectivity::Down
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Reconnected,
    Disconnected,
    Unchanged,
}

/// Polls the backend rpc status and resyncs balance and activity when the
/// connection comes back.
pub struct ConnectivityWatchdog {
    backend: Arc<dyn WalletBackend>,
    store: Arc<AccountStore>,
    activity: ActivityFetcher,
    rpc_status: Arc<watch::Sender<bool>>,
    previous: Connectivity,
}

impl ConnectivityWatchdog {
    pub fn new(
        backend: Arc<dyn WalletBackend>,
        store: Arc<AccountStore>,
        activity: ActivityFetcher,
        rpc_status: Arc<watch::Sender<bool>>,
    ) -> Self {
        let previous = Connectivity::from(*rpc_status.borrow());
        ConnectivityWatchdog {
            backend,
            store,
            activity,
            rpc_status,
            previous,
        }
    }

    pub fn previous(&self) -> Connectivity {
        self.previous
    }

    pub async fn poll_once(&mut self) -> Transition {
        let previous = self.previous;
        let status = match self.backend.get_rpc_status().await {
            Ok(status) => status,
            Err(e) => {
                log::warn!("RPC status query failed: {}", e);
                false
            }
        };
        let current = Connectivity::from(status);
        let transition = match (previous, current) {
            (Connectivity::Down, Connectivity::Up) => Transition::Reconnected,
            (Connectivity::Up, Connectivity::Down) => Transition::Disconnected,
            _ => Transition::Unchanged,
        };
        log::debug!("RPC status {:?} -> {:?}", previous, current);
        // status is settled before the resubscribe await
        self.previous = current;
        self.rpc_status.send_replace(status);

        match transition {
            Transition::Reconnected => {
                log::info!("RPC reconnected, resyncing balance and activity");
                self.store.expire_balance();
                self.activity.trigger();
                if let Err(e) = self.backend.subscribe_utxos_changed().await {
                    log::warn!("Failed to resubscribe to UTXO changes: {}", e);
                }
            }
            Transition::Disconnected => log::info!("RPC disconnected"),
            Transition::Unchanged => {}
        }
        transition
    }

    /// Poll every `period`, first poll one period from now
    pub fn spawn(mut self, period: Duration) -> WatchdogHandle {
        if period < MIN_INTERVAL {
            log::warn!("RPC poll interval {:?} too short, using {:?}", period, MIN_INTERVAL);
        }
        let period = period.max(MIN_INTERVAL);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = interval.tick() => {}
                }
                // a poll still in flight at shutdown is dropped with its result
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = self.poll_once() => {}
                }
            }
            log::debug!("Connectivity watchdog stopped");
        });
        WatchdogHandle {
            shutdown_tx,
            handle: Some(handle),
        }
    }
}

pub struct WatchdogHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl WatchdogHandle {
    /// Safe to call more than once
    pub fn stop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

impl Drop for WatchdogHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
