use crate::account::UNKNOWN_BALANCE;
use crate::indexer::Indexer;
use num_format::{Locale, ToFormattedString};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Fiat value of `raw_amount` KAS at `price`
pub fn usd_value(raw_amount: &str, price: f64) -> String {
    if raw_amount == "0" {
        return UNKNOWN_BALANCE.to_string();
    }
    match raw_amount.parse::<f64>() {
        Ok(amount) => format_locale(amount * price),
        Err(_) => UNKNOWN_BALANCE.to_string(),
    }
}

/// en-US number formatting: thousands grouped with commas, at most three
/// fraction digits, no trailing zeros
pub fn format_locale(value: f64) -> String {
    if !value.is_finite() {
        return UNKNOWN_BALANCE.to_string();
    }
    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');
    let int_part = match int_part.parse::<u128>() {
        Ok(int_part) => int_part,
        Err(_) => return UNKNOWN_BALANCE.to_string(),
    };

    let mut formatted = String::new();
    if value < 0.0 && (int_part != 0 || !frac_part.is_empty()) {
        formatted.push('-');
    }
    formatted.push_str(&int_part.to_formatted_string(&Locale::en));
    if !frac_part.is_empty() {
        formatted.push('.');
        formatted.push_str(frac_part);
    }
    formatted
}

/// Fetches the KAS price each time it is asked and republishes the fiat
/// value of the balance it was given. Prices are never cached.
#[derive(Clone)]
pub struct PriceConverter {
    indexer: Arc<dyn Indexer>,
    usd_value: Arc<watch::Sender<String>>,
}

impl PriceConverter {
    pub fn new(indexer: Arc<dyn Indexer>) -> Self {
        let (usd_value, _) = watch::channel(UNKNOWN_BALANCE.to_string());
        PriceConverter {
            indexer,
            usd_value: Arc::new(usd_value),
        }
    }

    pub fn usd_value(&self) -> String {
        self.usd_value.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.usd_value.subscribe()
    }

    pub async fn refresh(&self, raw_amount: &str) -> anyhow::Result<String> {
        let price = self.indexer.price().await?;
        let value = usd_value(raw_amount, price);
        self.usd_value.send_replace(value.clone());
        Ok(value)
    }

    pub fn trigger(&self, raw_amount: String) -> JoinHandle<()> {
        let converter = self.clone();
        tokio::spawn(async move {
            if let Err(e) = converter.refresh(&raw_amount).await {
                log::warn!("Failed to fetch price: {}", e);
            }
        })
    }
}
