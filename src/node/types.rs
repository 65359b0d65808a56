//! Wire shapes returned by the TRON HTTP gateway.
//!
//! All fields default so that partially populated node responses
//! deserialize without errors; the scanner decides what is fatal.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBlock {
    #[serde(rename = "blockID", default)]
    pub block_id: String,

    #[serde(default)]
    pub block_header: RawBlockHeader,

    #[serde(default)]
    pub transactions: Vec<RawTransaction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBlockHeader {
    #[serde(default)]
    pub raw_data: RawBlockHeaderData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawBlockHeaderData {
    #[serde(default)]
    pub number: i64,

    /// Block time in unix milliseconds.
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransaction {
    #[serde(rename = "txID", default)]
    pub tx_id: String,

    #[serde(default)]
    pub raw_data: RawTransactionData,

    /// Hex-encoded 65-byte recoverable signatures.
    #[serde(default)]
    pub signature: Vec<String>,

    #[serde(default)]
    pub ret: Vec<RawRet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransactionData {
    #[serde(default)]
    pub timestamp: i64,

    #[serde(default)]
    pub expiration: i64,

    #[serde(default)]
    pub contract: Vec<RawContract>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContract {
    #[serde(rename = "type", default)]
    pub contract_type: String,

    #[serde(default)]
    pub parameter: RawContractParameter,

    #[serde(rename = "Permission_id", default)]
    pub permission_id: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawContractParameter {
    #[serde(default)]
    pub value: serde_json::Value,

    #[serde(default)]
    pub type_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRet {
    #[serde(rename = "contractRet", default)]
    pub contract_ret: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTransactionInfo {
    #[serde(default)]
    pub id: String,

    #[serde(rename = "blockNumber", default)]
    pub block_number: i64,

    /// Block time in unix milliseconds.
    #[serde(rename = "blockTimeStamp", default)]
    pub block_time_stamp: i64,

    #[serde(default)]
    pub receipt: Option<RawReceipt>,

    #[serde(default)]
    pub log: Vec<RawLog>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReceipt {
    #[serde(default)]
    pub energy_usage: i64,

    #[serde(default)]
    pub energy_fee: i64,

    #[serde(default)]
    pub origin_energy_usage: i64,

    #[serde(default)]
    pub energy_usage_total: i64,

    #[serde(default)]
    pub net_usage: i64,

    #[serde(default)]
    pub net_fee: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLog {
    /// Hex-encoded contract address (without the `41` network prefix on
    /// some node versions, with it on others).
    #[serde(default)]
    pub address: String,

    /// Hex-encoded 32-byte topics; `topics[0]` is the event signature.
    #[serde(default)]
    pub topics: Vec<String>,

    /// Hex-encoded ABI data for the non-indexed parameters.
    #[serde(default)]
    pub data: String,
}
