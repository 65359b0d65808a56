//! Event log decoding.
//!
//! Logs are decoded against a registry of known event signatures
//! (TRC-20/721 events are built in; callers can register more). When the
//! signature topic is unknown or the payload does not match the ABI, the
//! log degrades to `{address, signature}` instead of being dropped.

use std::collections::HashMap;

use sha3::{Digest, Keccak256};

use crate::node::RawLog;
use crate::scanner::signers::base58check_address;
use crate::scanner::transaction::{EventInput, LogEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Address,
    Uint,
    Bool,
    Bytes32,
}

impl ParamKind {
    fn solidity_name(self) -> &'static str {
        match self {
            ParamKind::Address => "address",
            ParamKind::Uint => "uint256",
            ParamKind::Bool => "bool",
            ParamKind::Bytes32 => "bytes32",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub indexed: bool,
}

impl ParamSpec {
    pub fn indexed(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            indexed: true,
        }
    }

    pub fn plain(name: &str, kind: ParamKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            indexed: false,
        }
    }
}

#[derive(Debug, Clone)]
struct EventSpec {
    name: String,
    signature: String,
    inputs: Vec<ParamSpec>,
}

/// Registry of decodable events, keyed by the Keccak-256 signature topic.
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    by_topic: HashMap<[u8; 32], EventSpec>,
}

impl EventRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the common token events.
    #[must_use]
    pub fn with_builtin_events() -> Self {
        let mut registry = Self::new();
        registry.register(
            "Transfer",
            vec![
                ParamSpec::indexed("from", ParamKind::Address),
                ParamSpec::indexed("to", ParamKind::Address),
                ParamSpec::plain("value", ParamKind::Uint),
            ],
        );
        registry.register(
            "Approval",
            vec![
                ParamSpec::indexed("owner", ParamKind::Address),
                ParamSpec::indexed("spender", ParamKind::Address),
                ParamSpec::plain("value", ParamKind::Uint),
            ],
        );
        registry.register(
            "ApprovalForAll",
            vec![
                ParamSpec::indexed("owner", ParamKind::Address),
                ParamSpec::indexed("operator", ParamKind::Address),
                ParamSpec::plain("approved", ParamKind::Bool),
            ],
        );
        registry
    }

    /// Registers an event ABI under its canonical signature.
    pub fn register(&mut self, name: &str, inputs: Vec<ParamSpec>) {
        let types: Vec<&str> = inputs
            .iter()
            .map(|input| input.kind.solidity_name())
            .collect();
        let signature = format!("{name}({})", types.join(","));
        let topic: [u8; 32] = Keccak256::digest(signature.as_bytes()).into();

        self.by_topic.insert(
            topic,
            EventSpec {
                name: name.to_string(),
                signature,
                inputs,
            },
        );
    }

    /// Decodes a raw log into a [`LogEntry`], degrading to address plus
    /// signature topic when the event is unknown or malformed.
    #[must_use]
    pub fn decode(&self, log: &RawLog) -> LogEntry {
        let address = display_address(&log.address);

        let Some(signature_topic) = log.topics.first() else {
            return LogEntry {
                address,
                ..LogEntry::default()
            };
        };

        let degraded = LogEntry {
            signature: signature_topic.clone(),
            address: address.clone(),
            ..LogEntry::default()
        };

        let Ok(topic_bytes) = hex::decode(signature_topic) else {
            return degraded;
        };
        let Ok(topic) = <[u8; 32]>::try_from(topic_bytes.as_slice()) else {
            return degraded;
        };
        let Some(spec) = self.by_topic.get(&topic) else {
            return degraded;
        };

        match decode_inputs(spec, log) {
            Some(inputs) => LogEntry {
                event_name: spec.name.clone(),
                signature: spec.signature.clone(),
                inputs,
                address,
            },
            None => degraded,
        }
    }
}

fn decode_inputs(spec: &EventSpec, log: &RawLog) -> Option<Vec<EventInput>> {
    let data = hex::decode(&log.data).ok()?;
    let data_words: Vec<&[u8]> = data.chunks_exact(32).collect();

    let mut topics = log.topics.iter().skip(1);
    let mut next_data_word = 0usize;
    let mut inputs = Vec::with_capacity(spec.inputs.len());

    for param in &spec.inputs {
        let word: [u8; 32] = if param.indexed {
            let raw = hex::decode(topics.next()?).ok()?;
            <[u8; 32]>::try_from(raw.as_slice()).ok()?
        } else {
            let word = <[u8; 32]>::try_from(*data_words.get(next_data_word)?).ok()?;
            next_data_word += 1;
            word
        };

        inputs.push(EventInput {
            name: param.name.clone(),
            kind: param.kind.solidity_name().to_string(),
            value: render_word(param.kind, &word),
        });
    }

    Some(inputs)
}

fn render_word(kind: ParamKind, word: &[u8; 32]) -> serde_json::Value {
    match kind {
        ParamKind::Address => serde_json::Value::String(base58check_address(&word[12..])),
        ParamKind::Uint => {
            // Values above u128 render as hex to stay lossless.
            if word[..16].iter().all(|b| *b == 0) {
                let mut low = [0u8; 16];
                low.copy_from_slice(&word[16..]);
                serde_json::Value::String(u128::from_be_bytes(low).to_string())
            } else {
                serde_json::Value::String(format!("0x{}", hex::encode(word)))
            }
        }
        ParamKind::Bool => serde_json::Value::Bool(word[31] != 0),
        ParamKind::Bytes32 => serde_json::Value::String(hex::encode(word)),
    }
}

/// Renders a node-reported hex address as Base58Check when it parses,
/// otherwise passes it through untouched.
fn display_address(hex_address: &str) -> String {
    match hex::decode(hex_address) {
        Ok(raw) if raw.len() == 20 || raw.len() == 21 => base58check_address(&raw),
        _ => hex_address.to_string(),
    }
}
