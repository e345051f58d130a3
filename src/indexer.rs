use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Unexpected status {0} from {1}")]
    Status(u16, String),
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for IndexerError {
    fn from(e: serde_json::Error) -> Self {
        IndexerError::Malformed(e.to_string())
    }
}

/// Remote indexing service for address history, balance and price
#[async_trait]
pub trait Indexer: Send + Sync {
    async fn full_transactions(&self, address: &str, limit: usize) -> Result<Value, IndexerError>;

    async fn balance(&self, address: &str) -> Result<u64, IndexerError>;

    async fn price(&self) -> Result<f64, IndexerError>;
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: u64,
}

#[derive(Deserialize)]
struct PriceResponse {
    price: f64,
}

pub struct RestIndexer {
    url: String,
    client: reqwest::Client,
}

impl RestIndexer {
    pub fn new(url: &str) -> Self {
        RestIndexer {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, IndexerError> {
        let url = format!("{}{}", self.url, path);
        let rep = self.client.get(&url).query(query).send().await?;
        if !rep.status().is_success() {
            return Err(IndexerError::Status(rep.status().as_u16(), url));
        }
        let body = rep.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl Indexer for RestIndexer {
    async fn full_transactions(&self, address: &str, limit: usize) -> Result<Value, IndexerError> {
        let path = format!("/addresses/{}/full-transactions", address);
        self.get(
            &path,
            &[
                ("limit", limit.to_string()),
                ("resolve_previous_outpoints", "light".to_string()),
            ],
        )
        .await
    }

    async fn balance(&self, address: &str) -> Result<u64, IndexerError> {
        let path = format!("/addresses/{}/balance", address);
        let rep: BalanceResponse = serde_json::from_value(self.get(&path, &[]).await?)?;
        Ok(rep.balance)
    }

    async fn price(&self) -> Result<f64, IndexerError> {
        let rep: PriceResponse = serde_json::from_value(self.get("/info/price", &[]).await?)?;
        Ok(rep.price)
    }
}
