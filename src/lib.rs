//! TRON block ingestion pipeline and events SDK.
//!
//! The daemon side (see `main.rs`) follows the chain head, publishes each
//! block's normalized transactions to a length-capped Redis stream, and
//! schedules gap blocks onto a multi-class task queue for idempotent
//! catch-up processing. The [`subscriber`] module is the downstream SDK:
//! consumer-group reads with checkpoint resume and a catch-up → live
//! transition.

pub mod config;
pub mod controller;
pub mod cursor;
pub mod error;
pub mod metrics;
pub mod node;
pub mod publisher;
pub mod queue;
pub mod scanner;
pub mod service;
pub mod subscriber;
pub mod worker;

pub use error::{Error, Result};
pub use scanner::{BlockNumber, NormalizedTransaction, ScannedBlock};
pub use subscriber::{Event, Subscriber, SubscriberConfig};
