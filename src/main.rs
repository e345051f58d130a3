#[macro_use]
extern crate rocket;

mod account;
mod activity;
mod backend;
mod db;
mod indexer;
mod monitor;
mod price;
mod rpc;
mod transaction;
mod wallet_tab;

#[cfg(test)]
mod testing;

pub use crate::rpc::*;

use crate::account::{balance_task, AccountStore};
use crate::activity::ResolvePolicy;
use crate::backend::{LocalBackend, WalletBackend};
use crate::db::Db;
use crate::indexer::{Indexer, RestIndexer};
use crate::wallet_tab::{ActiveTab, TabConfig, WalletTab};
use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[clap(about, version, author)]
struct Args {
    /// Do not open the wallet tab at startup
    #[clap(short, long)]
    idle: bool,
    /// Browser tab to read the connected site of
    #[clap(short, long)]
    tab_id: Option<u32>,
}

// They come from the config file
//
// db_path = "kaspa-walletd.db"
// indexer_url = "https://api.kaspa.org"
// poll_interval = 4000
//
// ADDRESS, INDEXER_URL and RPC_URL in .env take precedence
#[derive(Deserialize)]
pub struct WalletConfig {
    db_path: String,
    indexer_url: String,
    rpc_url: String,
    wallet_address: String,
    activity_limit: usize,
    /// milliseconds between rpc status polls
    poll_interval: u64,
    /// seconds between balance refreshes
    balance_interval: u64,
    #[serde(default)]
    stale_activity: ResolvePolicy,
}

impl WalletConfig {
    fn validate(&self) -> anyhow::Result<()> {
        if self.wallet_address.is_empty() {
            anyhow::bail!("Wallet address missing, set ADDRESS in the .env file");
        }
        if self.poll_interval == 0 {
            anyhow::bail!("poll_interval must be at least 1 ms");
        }
        if self.balance_interval == 0 {
            anyhow::bail!("balance_interval must be at least 1 s");
        }
        Ok(())
    }

    fn tab_config(&self) -> TabConfig {
        TabConfig {
            address: self.wallet_address.clone(),
            activity_limit: self.activity_limit,
            poll_interval: Duration::from_millis(self.poll_interval),
            stale_activity: self.stale_activity,
        }
    }
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();
    let args: Args = Args::parse();

    let rocket = rocket::build();
    let figment = rocket.figment();
    let mut config: WalletConfig = figment
        .extract()
        .context("Invalid wallet configuration")?;
    if let Ok(address) = dotenv::var("ADDRESS") {
        config.wallet_address = address;
    }
    if let Ok(indexer_url) = dotenv::var("INDEXER_URL") {
        config.indexer_url = indexer_url;
    }
    if let Ok(rpc_url) = dotenv::var("RPC_URL") {
        config.rpc_url = rpc_url;
    }
    if let Ok(limit) = dotenv::var("ACTIVITY_LIMIT") {
        config.activity_limit = usize::from_str(&limit).context("Invalid ACTIVITY_LIMIT")?;
    }
    config.validate()?;

    let db = Db::new(&config.db_path)?;
    db.create()?;

    let store = AccountStore::new();
    let indexer: Arc<dyn Indexer> = Arc::new(RestIndexer::new(&config.indexer_url));
    let backend: Arc<dyn WalletBackend> =
        Arc::new(LocalBackend::new(db.clone(), store.clone(), &config.rpc_url));
    log::info!(
        "Tracking {} on {} (activity limit {})",
        config.wallet_address, config.indexer_url, config.activity_limit
    );

    balance_task(
        store.clone(),
        indexer.clone(),
        config.wallet_address.clone(),
        Duration::from_secs(config.balance_interval),
    );
    let tab = WalletTab::new(backend, store, indexer, &config.tab_config());
    let active = ActiveTab::new(tab);
    if !args.idle {
        active.activate(args.tab_id)?;
    }

    rocket
        .manage(db)
        .manage(active)
        .mount(
            "/",
            routes![
                get_wallet_tab,
                activate,
                deactivate,
                refresh_activity,
                set_show_safe_notice,
                set_connected_site,
            ],
        )
        .launch()
        .await?;

    Ok(())
}
