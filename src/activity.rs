use crate::indexer::{Indexer, IndexerError};
use crate::transaction::{handle_transactions, TransactionInfo};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_ACTIVITY_LIMIT: usize = 10;

/// What to do with a response that resolves after a newer request was issued
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolvePolicy {
    /// Whatever resolves last is displayed, even if it was issued first
    #[default]
    LastResolved,
    /// Only apply a response if no newer one has been applied
    LatestIssued,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Activity {
    pub transactions: Vec<TransactionInfo>,
    /// Sequence number of the request that produced `transactions`, 0 if none
    pub sequence: u64,
}

struct Inner {
    indexer: Arc<dyn Indexer>,
    address: String,
    limit: usize,
    policy: ResolvePolicy,
    issued: AtomicU64,
    activity: watch::Sender<Activity>,
}

#[derive(Clone)]
pub struct ActivityFetcher {
    inner: Arc<Inner>,
}

impl ActivityFetcher {
    pub fn new(indexer: Arc<dyn Indexer>, address: &str, limit: usize, policy: ResolvePolicy) -> Self {
        let (activity, _) = watch::channel(Activity::default());
        ActivityFetcher {
            inner: Arc::new(Inner {
                indexer,
                address: address.to_string(),
                limit,
                policy,
                issued: AtomicU64::new(0),
                activity,
            }),
        }
    }

    /// Issue a fetch in the background and return its sequence number.
    /// Callers do not wait for it; the handle is only useful to tests.
    pub fn trigger(&self) -> (u64, JoinHandle<()>) {
        let sequence = self.inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            match inner.fetch().await {
                Ok(transactions) => {
                    inner.apply(sequence, transactions);
                }
                Err(e) => {
                    log::warn!("Failed to fetch activity #{} for {}: {}", sequence, inner.address, e);
                }
            }
        });
        (sequence, handle)
    }

    /// Number of fetches issued so far
    pub fn issued(&self) -> u64 {
        self.inner.issued.load(Ordering::SeqCst)
    }

    pub fn transactions(&self) -> Vec<TransactionInfo> {
        self.inner.activity.borrow().transactions.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Activity> {
        self.inner.activity.subscribe()
    }
}

impl Inner {
    async fn fetch(&self) -> Result<Vec<TransactionInfo>, IndexerError> {
        let data = self.indexer.full_transactions(&self.address, self.limit).await?;
        let mut transactions = handle_transactions(data, &self.address)?;
        transactions.truncate(self.limit);
        Ok(transactions)
    }

    fn apply(&self, sequence: u64, transactions: Vec<TransactionInfo>) -> bool {
        let policy = self.policy;
        let applied = self.activity.send_if_modified(|activity| {
            if policy == ResolvePolicy::LatestIssued && sequence < activity.sequence {
                return false;
            }
            activity.transactions = transactions;
            activity.sequence = sequence;
            true
        });
        if applied {
            log::debug!("Activity #{} applied for {}", sequence, self.address);
        } else {
            log::debug!("Discarded stale activity #{} for {}", sequence, self.address);
        }
        applied
    }
}
