use crate::account::sompi_to_amount;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of `/addresses/{address}/full-transactions`, with previous
/// outpoints resolved in light mode. Fields we do not classify on are left
/// in the raw record.
#[derive(Deserialize, Debug, Clone)]
pub struct IndexerTransaction {
    pub transaction_id: String,
    #[serde(default)]
    pub block_time: Option<u64>,
    #[serde(default)]
    pub is_accepted: Option<bool>,
    #[serde(default)]
    pub inputs: Option<Vec<IndexerInput>>,
    #[serde(default)]
    pub outputs: Option<Vec<IndexerOutput>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct IndexerInput {
    #[serde(default)]
    pub previous_outpoint_address: Option<String>,
    #[serde(default)]
    pub previous_outpoint_amount: Option<u64>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct IndexerOutput {
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub script_public_key_address: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxMode {
    Send,
    Receive,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TransactionInfo {
    pub transaction_id: String,
    pub mode: TxMode,
    pub amount: String,
    #[serde(rename = "isConfirmed")]
    pub is_confirmed: bool,
    pub block_time: u64,
    #[serde(rename = "txDetail")]
    pub tx_detail: Value,
}

pub fn classify(tx: &IndexerTransaction, raw: Value, address: &str) -> TransactionInfo {
    let spent: u64 = tx
        .inputs
        .iter()
        .flatten()
        .filter(|i| i.previous_outpoint_address.as_deref() == Some(address))
        .filter_map(|i| i.previous_outpoint_amount)
        .sum();
    let received: u64 = tx
        .outputs
        .iter()
        .flatten()
        .filter(|o| o.script_public_key_address.as_deref() == Some(address))
        .map(|o| o.amount)
        .sum();
    let (mode, value) = if spent > 0 {
        (TxMode::Send, spent.saturating_sub(received))
    } else {
        (TxMode::Receive, received)
    };
    TransactionInfo {
        transaction_id: tx.transaction_id.clone(),
        mode,
        amount: sompi_to_amount(value),
        is_confirmed: tx.is_accepted.unwrap_or(false),
        block_time: tx.block_time.unwrap_or(0),
        tx_detail: raw,
    }
}

/// Map an indexer response into display records, most recent first.
/// Any record that does not have the expected shape fails the whole batch.
pub fn handle_transactions(data: Value, address: &str) -> Result<Vec<TransactionInfo>, serde_json::Error> {
    let records: Vec<Value> = serde_json::from_value(data)?;
    let mut transactions = records
        .into_iter()
        .map(|raw| {
            let tx: IndexerTransaction = serde_json::from_value(raw.clone())?;
            Ok(classify(&tx, raw, address))
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;
    transactions.sort_by(|a, b| b.block_time.cmp(&a.block_time));
    Ok(transactions)
}
