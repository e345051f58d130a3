use crate::indexer::Indexer;
use crate::monitor::MIN_INTERVAL;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Duration;

pub const SOMPI_PER_KAS: u64 = 100_000_000;

/// Shown in place of a balance or fiat value that is not known yet
pub const UNKNOWN_BALANCE: &str = "--";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub amount: String,
}

impl Default for AccountBalance {
    fn default() -> Self {
        AccountBalance {
            amount: "0".to_string(),
        }
    }
}

impl AccountBalance {
    pub fn from_sompi(sompi: u64) -> Self {
        AccountBalance {
            amount: sompi_to_amount(sompi),
        }
    }
}

pub fn sompi_to_amount(sompi: u64) -> String {
    let whole = sompi / SOMPI_PER_KAS;
    let frac = sompi % SOMPI_PER_KAS;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:08}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Balance shown to the user. A zero balance is ambiguous between an empty
/// wallet and one that has not loaded yet, so it only reads as unknown when
/// there is no activity either.
pub fn display_balance(raw_amount: &str, activity_count: usize) -> String {
    if raw_amount == "0" && activity_count == 0 {
        UNKNOWN_BALANCE.to_string()
    } else {
        raw_amount.to_string()
    }
}

/// Holds the balance of the active account. Observers only get notified
/// when the amount changes.
pub struct AccountStore {
    balance: watch::Sender<AccountBalance>,
    expired: AtomicBool,
    expirations: AtomicU64,
    refresh: Notify,
}

impl AccountStore {
    pub fn new() -> Arc<Self> {
        let (balance, _) = watch::channel(AccountBalance::default());
        Arc::new(AccountStore {
            balance,
            expired: AtomicBool::new(false),
            expirations: AtomicU64::new(0),
            refresh: Notify::new(),
        })
    }

    pub fn balance(&self) -> AccountBalance {
        self.balance.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AccountBalance> {
        self.balance.subscribe()
    }

    /// Returns true if the amount changed
    pub fn set_balance(&self, balance: AccountBalance) -> bool {
        self.expired.store(false, Ordering::SeqCst);
        self.balance.send_if_modified(|current| {
            if current.amount == balance.amount {
                false
            } else {
                *current = balance;
                true
            }
        })
    }

    pub fn expire_balance(&self) {
        self.expired.store(true, Ordering::SeqCst);
        self.expirations.fetch_add(1, Ordering::SeqCst);
        self.refresh.notify_one();
    }

    /// Ask the refresher for a fetch without marking the balance stale
    pub fn request_refresh(&self) {
        self.refresh.notify_one();
    }

    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::SeqCst)
    }

    async fn refresh_requested(&self) {
        self.refresh.notified().await
    }
}

pub async fn refresh_balance(
    store: &AccountStore,
    indexer: &dyn Indexer,
    address: &str,
) -> anyhow::Result<bool> {
    let sompi = indexer.balance(address).await?;
    let changed = store.set_balance(AccountBalance::from_sompi(sompi));
    if changed {
        log::info!("Balance of {} is now {}", address, store.balance().amount);
    }
    Ok(changed)
}

pub fn balance_task(
    store: Arc<AccountStore>,
    indexer: Arc<dyn Indexer>,
    address: String,
    interval: Duration,
) -> JoinHandle<()> {
    if interval < MIN_INTERVAL {
        log::warn!("Balance interval {:?} too short, using {:?}", interval, MIN_INTERVAL);
    }
    let interval = interval.max(MIN_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = store.refresh_requested() => {
                    log::debug!("Balance refresh requested (expired: {})", store.is_expired());
                }
            }
            if let Err(e) = refresh_balance(&store, indexer.as_ref(), &address).await {
                log::warn!("Failed to refresh balance of {}: {}", address, e);
            }
        }
    })
}
