use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::TronConfig;
use crate::error::{Error, Result};
use crate::node::{NodeClient, RawBlock, RawTransactionInfo};
use crate::scanner::BlockNumber;

/// [`NodeClient`] over the TRON node's HTTP gateway.
///
/// Connection pooling and per-call timeouts are handled by the underlying
/// `reqwest` client, sized from [`TronConfig`].
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpNodeClient {
    pub fn new(config: &TronConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(config.max_pool_size.max(config.pool_size))
            .build()?;

        Ok(Self {
            http,
            base_url: config.node_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?
            .error_for_status()
            .map_err(map_transport_error)?;

        response.json().await.map_err(map_transport_error)
    }
}

fn map_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout
    } else {
        Error::Rpc(err)
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn get_now_block(&self) -> Result<RawBlock> {
        self.post("wallet/getnowblock", &json!({})).await
    }

    async fn get_block_by_num(&self, number: BlockNumber) -> Result<RawBlock> {
        // The gateway answers an empty object for unknown heights instead
        // of an HTTP error.
        let value: serde_json::Value = self
            .post("wallet/getblockbynum", &json!({ "num": number }))
            .await?;

        if value.get("block_header").is_none() {
            return Err(Error::BlockNotFound(number));
        }

        Ok(serde_json::from_value(value)?)
    }

    async fn get_transaction_infos(&self, number: BlockNumber) -> Result<Vec<RawTransactionInfo>> {
        self.post("wallet/gettransactioninfobyblocknum", &json!({ "num": number }))
            .await
    }
}
