//! TRON node access.
//!
//! The rest of the crate talks to the node through the [`NodeClient`] trait;
//! [`HttpNodeClient`] implements it against the node's HTTP gateway
//! (`/wallet/getnowblock`, `/wallet/getblockbynum`,
//! `/wallet/gettransactioninfobyblocknum`).

mod http;
mod types;

use async_trait::async_trait;

pub use http::HttpNodeClient;
pub use types::{
    RawBlock, RawBlockHeader, RawBlockHeaderData, RawContract, RawContractParameter, RawLog,
    RawReceipt, RawRet, RawTransaction, RawTransactionData, RawTransactionInfo,
};

use crate::error::Result;
use crate::scanner::BlockNumber;

/// Raw block and transaction-info access, as served by a TRON full node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Fetches the node's current head block.
    async fn get_now_block(&self) -> Result<RawBlock>;

    /// Fetches the block at `number`.
    async fn get_block_by_num(&self, number: BlockNumber) -> Result<RawBlock>;

    /// Fetches the transaction-info list (receipts and logs) for the block
    /// at `number`.
    async fn get_transaction_infos(&self, number: BlockNumber) -> Result<Vec<RawTransactionInfo>>;
}
