use crate::account::AccountStore;
use crate::db::Db;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConnectedSite {
    pub origin: String,
    #[serde(rename = "isConnected")]
    pub is_connected: bool,
}

/// Wallet services the tab reads from. The tab never signs or derives
/// anything itself.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    async fn get_rpc_status(&self) -> anyhow::Result<bool>;

    async fn get_current_connected_site(&self, tab_id: u32) -> anyhow::Result<Option<ConnectedSite>>;

    async fn subscribe_utxos_changed(&self) -> anyhow::Result<()>;

    async fn get_show_safe_notice(&self) -> anyhow::Result<bool>;

    async fn set_show_safe_notice(&self, show: bool) -> anyhow::Result<()>;
}

#[derive(Deserialize)]
struct HealthResponse {
    #[serde(rename = "kaspadServers", default)]
    kaspad_servers: Option<Vec<KaspadServer>>,
}

#[derive(Deserialize)]
struct KaspadServer {
    #[serde(rename = "isSynced", default)]
    is_synced: bool,
}

pub struct LocalBackend {
    db: Db,
    store: Arc<AccountStore>,
    rpc_url: String,
    client: reqwest::Client,
    subscriptions: AtomicU64,
}

impl LocalBackend {
    pub fn new(db: Db, store: Arc<AccountStore>, rpc_url: &str) -> Self {
        LocalBackend {
            db,
            store,
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            subscriptions: AtomicU64::new(0),
        }
    }

    pub fn subscriptions(&self) -> u64 {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletBackend for LocalBackend {
    async fn get_rpc_status(&self) -> anyhow::Result<bool> {
        let rep = self
            .client
            .get(format!("{}/info/health", self.rpc_url))
            .send()
            .await?;
        if !rep.status().is_success() {
            return Ok(false);
        }
        let health: HealthResponse = rep.json().await?;
        let status = match health.kaspad_servers {
            Some(servers) => servers.iter().any(|s| s.is_synced),
            None => true,
        };
        Ok(status)
    }

    async fn get_current_connected_site(&self, tab_id: u32) -> anyhow::Result<Option<ConnectedSite>> {
        self.db.get_connected_site(tab_id)
    }

    async fn subscribe_utxos_changed(&self) -> anyhow::Result<()> {
        let n = self.subscriptions.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!("Subscribed to UTXO changes ({})", n);
        self.store.request_refresh();
        Ok(())
    }

    async fn get_show_safe_notice(&self) -> anyhow::Result<bool> {
        self.db.get_show_safe_notice()
    }

    async fn set_show_safe_notice(&self, show: bool) -> anyhow::Result<()> {
        self.db.set_show_safe_notice(show)
    }
}
