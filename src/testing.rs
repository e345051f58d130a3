use crate::backend::{ConnectedSite, WalletBackend};
use crate::indexer::{Indexer, IndexerError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::time::Duration;

type Reply<T> = Result<T, String>;

fn to_error(e: String) -> IndexerError {
    IndexerError::Status(503, e)
}

/// A full-transactions record moving `inputs` from previous outpoints and
/// paying `outputs`, both as (address, sompi)
pub fn record(txid: &str, block_time: u64, inputs: &[(&str, u64)], outputs: &[(&str, u64)], accepted: bool) -> Value {
    let inputs: Vec<Value> = inputs
        .iter()
        .enumerate()
        .map(|(index, (address, amount))| {
            json!({
                "transaction_id": txid,
                "index": index,
                "previous_outpoint_hash": "00",
                "previous_outpoint_index": "0",
                "previous_outpoint_address": address,
                "previous_outpoint_amount": amount,
            })
        })
        .collect();
    let outputs: Vec<Value> = outputs
        .iter()
        .enumerate()
        .map(|(index, (address, amount))| {
            json!({
                "transaction_id": txid,
                "index": index,
                "amount": amount,
                "script_public_key_address": address,
                "script_public_key_type": "pubkey",
            })
        })
        .collect();
    json!({
        "transaction_id": txid,
        "hash": txid,
        "block_time": block_time,
        "is_accepted": accepted,
        "inputs": inputs,
        "outputs": outputs,
    })
}

pub struct FakeIndexer {
    transactions: Mutex<Reply<Value>>,
    held: Mutex<VecDeque<oneshot::Receiver<Reply<Value>>>>,
    balance: Mutex<Reply<u64>>,
    price: Mutex<Reply<f64>>,
    last_limit: Mutex<Option<usize>>,
    transaction_calls: AtomicUsize,
    balance_calls: AtomicUsize,
    price_calls: AtomicUsize,
}

impl FakeIndexer {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeIndexer {
            transactions: Mutex::new(Ok(json!([]))),
            held: Mutex::new(VecDeque::new()),
            balance: Mutex::new(Ok(0)),
            price: Mutex::new(Ok(0.2)),
            last_limit: Mutex::new(None),
            transaction_calls: AtomicUsize::new(0),
            balance_calls: AtomicUsize::new(0),
            price_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_transactions(&self, reply: Reply<Value>) {
        *self.transactions.lock().unwrap() = reply;
    }

    /// The next transactions call waits until the returned sender fires
    pub fn hold_transactions(&self) -> oneshot::Sender<Reply<Value>> {
        let (tx, rx) = oneshot::channel();
        self.held.lock().unwrap().push_back(rx);
        tx
    }

    pub fn set_balance(&self, reply: Reply<u64>) {
        *self.balance.lock().unwrap() = reply;
    }

    pub fn set_price(&self, reply: Reply<f64>) {
        *self.price.lock().unwrap() = reply;
    }

    pub fn last_limit(&self) -> Option<usize> {
        *self.last_limit.lock().unwrap()
    }

    pub fn transaction_calls(&self) -> usize {
        self.transaction_calls.load(Ordering::SeqCst)
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn price_calls(&self) -> usize {
        self.price_calls.load(Ordering::SeqCst)
    }

    pub async fn wait_transaction_calls(&self, n: usize) {
        while self.transaction_calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Indexer for FakeIndexer {
    async fn full_transactions(&self, _address: &str, limit: usize) -> Result<Value, IndexerError> {
        *self.last_limit.lock().unwrap() = Some(limit);
        let held = self.held.lock().unwrap().pop_front();
        let default = self.transactions.lock().unwrap().clone();
        self.transaction_calls.fetch_add(1, Ordering::SeqCst);
        let reply = match held {
            Some(rx) => rx.await.unwrap_or_else(|_| Err("dropped".to_string())),
            None => default,
        };
        reply.map_err(to_error)
    }

    async fn balance(&self, _address: &str) -> Result<u64, IndexerError> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.balance.lock().unwrap().clone().map_err(to_error)
    }

    async fn price(&self) -> Result<f64, IndexerError> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        self.price.lock().unwrap().clone().map_err(to_error)
    }
}

pub struct FakeBackend {
    statuses: Mutex<VecDeque<anyhow::Result<bool>>>,
    status_delay: Mutex<Option<Duration>>,
    subscribe_delay: Mutex<Duration>,
    status_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
    fail_subscribe: AtomicBool,
    show_safe_notice: Mutex<bool>,
    sites: Mutex<HashMap<u32, ConnectedSite>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeBackend {
            statuses: Mutex::new(VecDeque::new()),
            status_delay: Mutex::new(None),
            subscribe_delay: Mutex::new(Duration::ZERO),
            status_calls: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            fail_subscribe: AtomicBool::new(false),
            show_safe_notice: Mutex::new(true),
            sites: Mutex::new(HashMap::new()),
        })
    }

    /// Replies for the next status queries; once drained the status is up
    pub fn push_statuses(&self, statuses: &[bool]) {
        let mut queue = self.statuses.lock().unwrap();
        for status in statuses {
            queue.push_back(Ok(*status));
        }
    }

    pub fn push_status(&self, status: anyhow::Result<bool>) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_subscribe_delay(&self, delay: Duration) {
        *self.subscribe_delay.lock().unwrap() = delay;
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn set_site(&self, tab_id: u32, site: ConnectedSite) {
        self.sites.lock().unwrap().insert(tab_id, site);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletBackend for FakeBackend {
    async fn get_rpc_status(&self) -> anyhow::Result<bool> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let status = self.statuses.lock().unwrap().pop_front();
        status.unwrap_or(Ok(true))
    }

    async fn get_current_connected_site(&self, tab_id: u32) -> anyhow::Result<Option<ConnectedSite>> {
        Ok(self.sites.lock().unwrap().get(&tab_id).cloned())
    }

    async fn subscribe_utxos_changed(&self) -> anyhow::Result<()> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.subscribe_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_subscribe.load(Ordering::SeqCst) {
            anyhow::bail!("subscription rejected");
        }
        Ok(())
    }

    async fn get_show_safe_notice(&self) -> anyhow::Result<bool> {
        Ok(*self.show_safe_notice.lock().unwrap())
    }

    async fn set_show_safe_notice(&self, show: bool) -> anyhow::Result<()> {
        *self.show_safe_notice.lock().unwrap() = show;
        Ok(())
    }
}
