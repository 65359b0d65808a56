//! Normalized transaction model and its wire format.
//!
//! Stream entries carry one `payload` field holding the canonical JSON of
//! [`NormalizedTransaction`]. Times are RFC 3339 with millisecond
//! precision; instants that cannot round-trip (year < 0 or > 9999) are
//! emitted as the zero time so any standards-compliant parser accepts the
//! payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::contract::ContractParameter;

/// Block height on the TRON chain.
pub type BlockNumber = i64;

/// A parsed, decoded and flattened transaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTransaction {
    /// Hex transaction hash, unique within a block.
    pub id: String,

    #[serde(default)]
    pub contract: Contract,

    #[serde(rename = "ret", default)]
    pub result: RetInfo,

    /// The transaction's own raw time; may be the zero time.
    #[serde(with = "wire_time", default = "wire_time::zero")]
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub block_number: BlockNumber,

    #[serde(with = "wire_time", default = "wire_time::zero")]
    pub block_timestamp: DateTime<Utc>,

    #[serde(with = "wire_time::option", default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogEntry>,

    /// Addresses recovered from the transaction's signatures, in
    /// signature order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signers: Vec<String>,
}

/// The transaction's contract call; `parameter` is decoded per
/// `contract_type` (see [`ContractParameter`]). The arm is carried
/// implicitly through the `type` string on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contract {
    #[serde(rename = "type")]
    pub contract_type: String,

    pub parameter: ContractParameter,

    #[serde(skip_serializing_if = "is_zero_i32")]
    pub permission_id: i32,
}

impl Default for Contract {
    fn default() -> Self {
        Self {
            contract_type: String::new(),
            parameter: ContractParameter::Unrecognized(String::new()),
            permission_id: 0,
        }
    }
}

impl<'de> Deserialize<'de> for Contract {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Repr {
            #[serde(rename = "type", default)]
            contract_type: String,
            #[serde(default)]
            parameter: serde_json::Value,
            #[serde(default)]
            permission_id: i32,
        }

        let repr = Repr::deserialize(deserializer)?;
        let parameter = ContractParameter::decode(&repr.contract_type, repr.parameter);
        Ok(Contract {
            contract_type: repr.contract_type,
            parameter,
            permission_id: repr.permission_id,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetInfo {
    #[serde(rename = "contractRet", default)]
    pub contract_ret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub energy_usage: i64,

    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub energy_fee: i64,

    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub origin_energy_usage: i64,

    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub energy_usage_total: i64,

    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub net_usage: i64,

    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub net_fee: i64,
}

/// A decoded (or degraded) event log. When ABI decoding fails the entry
/// keeps only the emitting address and the raw signature topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub event_name: String,

    #[serde(default)]
    pub signature: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<EventInput>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInput {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub value: serde_json::Value,
}

fn is_zero_i64(value: &i64) -> bool {
    *value == 0
}

fn is_zero_i32(value: &i32) -> bool {
    *value == 0
}

/// Serde adapters for wire times.
pub mod wire_time {
    use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// The zero-time sentinel: `0001-01-01T00:00:00Z`.
    #[must_use]
    pub fn zero() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(1, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_zero(t: &DateTime<Utc>) -> bool {
        *t == zero()
    }

    /// Collapses instants that cannot round-trip RFC 3339.
    #[must_use]
    pub fn clamp(t: DateTime<Utc>) -> DateTime<Utc> {
        if t.year() < 0 || t.year() > 9999 { zero() } else { t }
    }

    /// Converts node-reported unix milliseconds. Zero and out-of-range
    /// values collapse to the zero time.
    #[must_use]
    pub fn from_millis(ms: i64) -> DateTime<Utc> {
        if ms == 0 {
            return zero();
        }
        DateTime::from_timestamp_millis(ms)
            .map(clamp)
            .unwrap_or_else(zero)
    }

    pub fn serialize<S>(t: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        clamp(*t)
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(t: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match t {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
        }
    }
}
