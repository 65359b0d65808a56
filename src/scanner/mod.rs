//! Block scanning.
//!
//! [`Scanner`] turns a raw node block into a [`ScannedBlock`]: it fetches
//! the block and its transaction-info list, joins them by transaction id,
//! decodes contract payloads and event logs, and recovers signer
//! addresses. Transactions without a matching info record are still
//! emitted (with empty receipt and logs), carrying the block header's
//! number and time.
//!
//! The [`BlockSource`] trait is the seam the tip controller and block
//! workers consume; tests substitute in-memory sources.

pub mod contract;
mod events;
mod signers;
mod transaction;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use contract::ContractParameter;
pub use events::{EventRegistry, ParamKind, ParamSpec};
pub use signers::{address_from_key, recover_signers};
pub use transaction::{
    BlockNumber, Contract, EventInput, LogEntry, NormalizedTransaction, Receipt, RetInfo,
    wire_time,
};

use crate::error::Result;
use crate::node::{NodeClient, RawBlock, RawTransaction, RawTransactionInfo};

/// A scanned block: height, block time, and its normalized transactions in
/// the node's returned order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedBlock {
    pub number: BlockNumber,
    pub time: DateTime<Utc>,
    pub transactions: Vec<NormalizedTransaction>,
}

/// Where block data comes from. `block_number == 0` means the current
/// head.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn scan(&self, block_number: BlockNumber) -> Result<ScannedBlock>;
}

/// Scanner over a [`NodeClient`], with a registered-event log decoder.
pub struct Scanner {
    node: Arc<dyn NodeClient>,
    events: EventRegistry,
}

impl Scanner {
    pub fn new(node: Arc<dyn NodeClient>) -> Self {
        Self {
            node,
            events: EventRegistry::with_builtin_events(),
        }
    }

    /// Replaces the event registry, e.g. to add application ABIs.
    #[must_use]
    pub fn with_event_registry(mut self, events: EventRegistry) -> Self {
        self.events = events;
        self
    }

    fn normalize(
        &self,
        tx: &RawTransaction,
        block_number: BlockNumber,
        block_time: DateTime<Utc>,
        info: Option<&RawTransactionInfo>,
    ) -> NormalizedTransaction {
        let contract = tx
            .raw_data
            .contract
            .first()
            .map(|raw| Contract {
                contract_type: raw.contract_type.clone(),
                parameter: ContractParameter::decode(
                    &raw.contract_type,
                    raw.parameter.value.clone(),
                ),
                permission_id: raw.permission_id,
            })
            .unwrap_or_default();

        let result = tx
            .ret
            .first()
            .map(|ret| RetInfo {
                contract_ret: ret.contract_ret.clone(),
            })
            .unwrap_or_default();

        let expiration = (tx.raw_data.expiration > 0)
            .then(|| wire_time::from_millis(tx.raw_data.expiration));

        let block_timestamp = match info {
            Some(info) if info.block_time_stamp > 0 => {
                wire_time::from_millis(info.block_time_stamp)
            }
            _ => block_time,
        };

        let receipt = info.and_then(|info| info.receipt.as_ref()).map(|receipt| Receipt {
            energy_usage: receipt.energy_usage,
            energy_fee: receipt.energy_fee,
            origin_energy_usage: receipt.origin_energy_usage,
            energy_usage_total: receipt.energy_usage_total,
            net_usage: receipt.net_usage,
            net_fee: receipt.net_fee,
        });

        let logs = info
            .map(|info| info.log.iter().map(|log| self.events.decode(log)).collect())
            .unwrap_or_default();

        NormalizedTransaction {
            id: tx.tx_id.clone(),
            contract,
            result,
            timestamp: wire_time::from_millis(tx.raw_data.timestamp),
            block_number,
            block_timestamp,
            expiration,
            receipt,
            logs,
            signers: recover_signers(&tx.tx_id, &tx.signature),
        }
    }

    fn normalize_block(&self, block: &RawBlock, infos: &[RawTransactionInfo]) -> ScannedBlock {
        let number = block.block_header.raw_data.number;
        let time = wire_time::from_millis(block.block_header.raw_data.timestamp);

        let info_by_id: HashMap<&str, &RawTransactionInfo> =
            infos.iter().map(|info| (info.id.as_str(), info)).collect();

        let transactions = block
            .transactions
            .iter()
            .map(|tx| self.normalize(tx, number, time, info_by_id.get(tx.tx_id.as_str()).copied()))
            .collect();

        ScannedBlock {
            number,
            time,
            transactions,
        }
    }
}

#[async_trait]
impl BlockSource for Scanner {
    async fn scan(&self, block_number: BlockNumber) -> Result<ScannedBlock> {
        let block = if block_number > 0 {
            self.node.get_block_by_num(block_number).await?
        } else {
            self.node.get_now_block().await?
        };

        let number = block.block_header.raw_data.number;
        if number <= 0 {
            // The gateway can answer an empty object during propagation
            // hiccups; surface it as a missing block so callers retry.
            return Err(crate::error::Error::BlockNotFound(block_number));
        }
        let infos = self.node.get_transaction_infos(number).await?;

        crate::metrics::record_block_scanned();
        Ok(self.normalize_block(&block, &infos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::node::{
        RawBlockHeader, RawBlockHeaderData, RawContract, RawContractParameter, RawLog, RawReceipt,
        RawRet, RawTransactionData,
    };

    struct FakeNode {
        head: RawBlock,
        infos: Vec<RawTransactionInfo>,
    }

    #[async_trait]
    impl NodeClient for FakeNode {
        async fn get_now_block(&self) -> Result<RawBlock> {
            Ok(self.head.clone())
        }

        async fn get_block_by_num(&self, number: BlockNumber) -> Result<RawBlock> {
            if number == self.head.block_header.raw_data.number {
                Ok(self.head.clone())
            } else {
                Err(Error::BlockNotFound(number))
            }
        }

        async fn get_transaction_infos(&self, _number: BlockNumber) -> Result<Vec<RawTransactionInfo>> {
            Ok(self.infos.clone())
        }
    }

    fn raw_transaction(tx_id: &str) -> RawTransaction {
        RawTransaction {
            tx_id: tx_id.into(),
            raw_data: RawTransactionData {
                timestamp: 1_700_000_002_500,
                expiration: 1_700_000_060_000,
                contract: vec![RawContract {
                    contract_type: "TransferContract".into(),
                    parameter: RawContractParameter {
                        value: serde_json::json!({
                            "owner_address": "41aa",
                            "to_address": "41bb",
                            "amount": 5
                        }),
                        type_url: String::new(),
                    },
                    permission_id: 0,
                }],
            },
            signature: Vec::new(),
            ret: vec![RawRet {
                contract_ret: "SUCCESS".into(),
            }],
        }
    }

    fn fake_node() -> FakeNode {
        FakeNode {
            head: RawBlock {
                block_id: "0065".into(),
                block_header: RawBlockHeader {
                    raw_data: RawBlockHeaderData {
                        number: 101,
                        timestamp: 1_700_000_003_000,
                    },
                },
                transactions: vec![raw_transaction("aa11"), raw_transaction("bb22")],
            },
            infos: vec![RawTransactionInfo {
                id: "aa11".into(),
                block_number: 101,
                block_time_stamp: 1_700_000_003_000,
                receipt: Some(RawReceipt {
                    energy_usage_total: 13_000,
                    net_fee: 100_000,
                    ..RawReceipt::default()
                }),
                log: vec![RawLog {
                    address: hex::encode([0x41u8; 21]),
                    topics: vec![hex::encode([0x12u8; 32])],
                    data: String::new(),
                }],
            }],
        }
    }

    #[tokio::test]
    async fn scan_joins_transactions_with_infos() {
        let scanner = Scanner::new(Arc::new(fake_node()));
        let block = scanner.scan(0).await.unwrap();

        assert_eq!(block.number, 101);
        assert_eq!(block.transactions.len(), 2);

        let enriched = &block.transactions[0];
        assert_eq!(enriched.id, "aa11");
        assert_eq!(enriched.receipt.as_ref().unwrap().energy_usage_total, 13_000);
        assert_eq!(enriched.logs.len(), 1);
    }

    #[tokio::test]
    async fn transactions_without_info_are_kept_with_block_context() {
        let scanner = Scanner::new(Arc::new(fake_node()));
        let block = scanner.scan(0).await.unwrap();

        // bb22 has no info record: no receipt, no logs, but it must keep
        // the block number and a non-zero block timestamp.
        let bare = &block.transactions[1];
        assert_eq!(bare.id, "bb22");
        assert!(bare.receipt.is_none());
        assert!(bare.logs.is_empty());
        assert_eq!(bare.block_number, 101);
        assert!(!wire_time::is_zero(&bare.block_timestamp));
    }

    #[tokio::test]
    async fn scan_by_number_misses_surface_as_block_not_found() {
        let scanner = Scanner::new(Arc::new(fake_node()));
        let err = scanner.scan(999).await.unwrap_err();
        assert!(matches!(err, Error::BlockNotFound(999)));
    }

    #[tokio::test]
    async fn transaction_order_follows_the_node() {
        let scanner = Scanner::new(Arc::new(fake_node()));
        let block = scanner.scan(0).await.unwrap();
        let ids: Vec<&str> = block.transactions.iter().map(|tx| tx.id.as_str()).collect();
        assert_eq!(ids, vec!["aa11", "bb22"]);
    }
}
