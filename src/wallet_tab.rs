use crate::account::{display_balance, AccountBalance, AccountStore};
use crate::activity::{ActivityFetcher, ResolvePolicy, DEFAULT_ACTIVITY_LIMIT};
use crate::backend::WalletBackend;
use crate::indexer::Indexer;
use crate::monitor::{ConnectivityWatchdog, WatchdogHandle, RPC_POLL_INTERVAL};
use crate::price::PriceConverter;
use crate::transaction::TransactionInfo;
use anyhow::anyhow;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Duration;

#[derive(Clone, Debug)]
pub struct TabConfig {
    pub address: String,
    pub activity_limit: usize,
    pub poll_interval: Duration,
    pub stale_activity: ResolvePolicy,
}

impl Default for TabConfig {
    fn default() -> Self {
        TabConfig {
            address: String::new(),
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
            poll_interval: RPC_POLL_INTERVAL,
            stale_activity: ResolvePolicy::default(),
        }
    }
}

/// What the wallet tab renders
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TabSnapshot {
    pub display_balance: String,
    pub usd_value: String,
    pub activity: Vec<TransactionInfo>,
    pub connected: bool,
    pub rpc_status: bool,
    pub show_safe_notice: bool,
}

pub struct WalletTab {
    backend: Arc<dyn WalletBackend>,
    store: Arc<AccountStore>,
    activity: ActivityFetcher,
    price: PriceConverter,
    rpc_status: Arc<watch::Sender<bool>>,
    connected: watch::Sender<bool>,
    show_safe_notice: watch::Sender<bool>,
    poll_interval: Duration,
}

impl WalletTab {
    pub fn new(
        backend: Arc<dyn WalletBackend>,
        store: Arc<AccountStore>,
        indexer: Arc<dyn Indexer>,
        config: &TabConfig,
    ) -> Arc<Self> {
        let activity = ActivityFetcher::new(
            indexer.clone(),
            &config.address,
            config.activity_limit,
            config.stale_activity,
        );
        let (rpc_status, _) = watch::channel(true);
        let (connected, _) = watch::channel(false);
        let (show_safe_notice, _) = watch::channel(false);
        Arc::new(WalletTab {
            backend,
            store,
            activity,
            price: PriceConverter::new(indexer),
            rpc_status: Arc::new(rpc_status),
            connected,
            show_safe_notice,
            poll_interval: config.poll_interval,
        })
    }

    pub fn snapshot(&self) -> TabSnapshot {
        let balance = self.store.balance();
        let activity = self.activity.transactions();
        TabSnapshot {
            display_balance: display_balance(&balance.amount, activity.len()),
            usd_value: self.price.usd_value(),
            activity,
            connected: *self.connected.borrow(),
            rpc_status: *self.rpc_status.borrow(),
            show_safe_notice: *self.show_safe_notice.borrow(),
        }
    }

    /// Returns the sequence number of the issued fetch
    pub fn refresh_activity(&self) -> (u64, JoinHandle<()>) {
        self.activity.trigger()
    }

    pub async fn set_show_safe_notice(&self, show: bool) -> anyhow::Result<()> {
        self.backend.set_show_safe_notice(show).await?;
        self.show_safe_notice.send_replace(show);
        Ok(())
    }

    /// Start the background work of an open tab. Everything stops when the
    /// returned session is closed or dropped.
    pub fn activate(self: &Arc<Self>, tab_id: Option<u32>) -> TabSession {
        log::info!("Activating wallet tab (tab id {:?})", tab_id);
        let (snapshots, snapshots_rx) = watch::channel(self.snapshot());
        let balance_rx = self.store.subscribe();

        let setup = {
            let tab = self.clone();
            tokio::spawn(async move { tab.setup(tab_id).await })
        };
        let balance = {
            let tab = self.clone();
            tokio::spawn(async move { tab.watch_balance(balance_rx).await })
        };
        let publisher = {
            let tab = self.clone();
            tokio::spawn(async move { tab.publish(snapshots).await })
        };
        let watchdog = ConnectivityWatchdog::new(
            self.backend.clone(),
            self.store.clone(),
            self.activity.clone(),
            self.rpc_status.clone(),
        )
        .spawn(self.poll_interval);

        TabSession {
            watchdog,
            tasks: vec![setup, balance, publisher],
            snapshots: snapshots_rx,
        }
    }

    async fn setup(&self, tab_id: Option<u32>) {
        match self.backend.get_show_safe_notice().await {
            Ok(show) => {
                self.show_safe_notice.send_replace(show);
            }
            Err(e) => log::warn!("Failed to read safe notice setting: {}", e),
        }

        let tab_id = match tab_id {
            Some(tab_id) => tab_id,
            None => return,
        };
        match self.backend.get_current_connected_site(tab_id).await {
            Ok(Some(site)) => {
                log::debug!("Tab {} is on {} (connected: {})", tab_id, site.origin, site.is_connected);
                self.connected.send_replace(site.is_connected);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Failed to read connected site of tab {}: {}", tab_id, e),
        }
    }

    /// Any balance change, including the initial one, refetches activity and price
    async fn watch_balance(&self, mut balance_rx: watch::Receiver<AccountBalance>) {
        loop {
            let amount = balance_rx.borrow_and_update().amount.clone();
            self.activity.trigger();
            self.price.trigger(amount);
            if balance_rx.changed().await.is_err() {
                break;
            }
        }
    }

    async fn publish(&self, snapshots: watch::Sender<TabSnapshot>) {
        let mut balance = self.store.subscribe();
        let mut activity = self.activity.subscribe();
        let mut usd_value = self.price.subscribe();
        let mut rpc_status = self.rpc_status.subscribe();
        let mut connected = self.connected.subscribe();
        let mut show_safe_notice = self.show_safe_notice.subscribe();
        loop {
            snapshots.send_replace(self.snapshot());
            let alive = tokio::select! {
                r = balance.changed() => r.is_ok(),
                r = activity.changed() => r.is_ok(),
                r = usd_value.changed() => r.is_ok(),
                r = rpc_status.changed() => r.is_ok(),
                r = connected.changed() => r.is_ok(),
                r = show_safe_notice.changed() => r.is_ok(),
            };
            if !alive {
                break;
            }
        }
    }
}

pub struct TabSession {
    watchdog: WatchdogHandle,
    tasks: Vec<JoinHandle<()>>,
    snapshots: watch::Receiver<TabSnapshot>,
}

impl TabSession {
    pub fn snapshots(&self) -> watch::Receiver<TabSnapshot> {
        self.snapshots.clone()
    }

    /// In-flight activity and price fetches are left to finish
    pub fn close(&mut self) {
        self.watchdog.stop();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for TabSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// The tab served over rpc, with at most one live session
pub struct ActiveTab {
    tab: Arc<WalletTab>,
    session: Mutex<Option<TabSession>>,
}

impl ActiveTab {
    pub fn new(tab: Arc<WalletTab>) -> Self {
        ActiveTab {
            tab,
            session: Mutex::new(None),
        }
    }

    pub fn tab(&self) -> &Arc<WalletTab> {
        &self.tab
    }

    pub fn activate(&self, tab_id: Option<u32>) -> anyhow::Result<()> {
        let session = self.tab.activate(tab_id);
        let previous = self
            .session
            .lock()
            .map_err(|_| anyhow!("Session lock poisoned"))?
            .replace(session);
        if previous.is_some() {
            log::info!("Replaced previous wallet tab session");
        }
        Ok(())
    }

    /// Returns false if no session was active
    pub fn deactivate(&self) -> anyhow::Result<bool> {
        let previous = self
            .session
            .lock()
            .map_err(|_| anyhow!("Session lock poisoned"))?
            .take();
        if previous.is_some() {
            log::info!("Wallet tab deactivated");
        }
        Ok(previous.is_some())
    }

    pub fn is_active(&self) -> anyhow::Result<bool> {
        let session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Session lock poisoned"))?;
        Ok(session.is_some())
    }
}
