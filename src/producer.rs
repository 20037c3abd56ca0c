//! Consolidated-block event producer
//!
//! Turns a block of orders, already loaded by the caller, into a
//! `BlockConsolidated` envelope. Every call gets a fresh envelope id and
//! trace context; business identity lives in `subject` and `data`.

use chrono::{DateTime, FixedOffset, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use uuid::Uuid;

use crate::envelope::CloudEvent;
use crate::error::Result;
use crate::PublisherConfig;

pub const BLOCK_CONSOLIDATED_TYPE: &str = "logistrack.distribucion.BlockConsolidated.v2";
pub const BLOCK_SUBJECT_PREFIX: &str = "block:";

/// W3C trace context: `00-<32 hex trace id>-<16 hex parent id>-01`
pub fn generate_traceparent() -> String {
    let mut rng = rand::rng();
    let mut trace_id = [0u8; 16];
    let mut parent_id = [0u8; 8];
    rng.fill_bytes(&mut trace_id);
    rng.fill_bytes(&mut parent_id);

    format!("00-{}-{}-01", to_hex(&trace_id), to_hex(&parent_id))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// Id plus display name, the shape shared by SMEs, distribution centres and drivers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Named {
    pub id: String,
    pub name: String,
}

impl Named {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

pub type Driver = Named;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreparationStatus {
    #[serde(rename = "PEN")]
    Pending,
    #[serde(rename = "COM")]
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub sku: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLine {
    pub product: Product,
    pub qty: u32,
    pub weight: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub sme: Named,
    pub origin_dc: Named,
    pub destination_dc: Named,
    pub dispatched_at: DateTime<FixedOffset>,
    pub preparation_status: PreparationStatus,
    pub total_weight: f64,
    pub total_volume: f64,
    pub products: Vec<ProductLine>,

    /// Driver assigned to the order; used to pick the block driver
    #[serde(default, skip_serializing)]
    pub driver: Option<Driver>,
}

/// Block header in the event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub id: String,
    pub dispatched_at: DateTime<FixedOffset>,
    pub driver: Option<Driver>,
}

/// One consolidated delivery block and its orders
///
/// Serializes to the agreed `data` shape:
/// `{ "block": { "id", "dispatched_at", "driver" }, "orders": [...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedBlock {
    pub block: BlockHeader,
    pub orders: Vec<Order>,
}

impl ConsolidatedBlock {
    /// Consolidate `orders` into a new block dispatched now
    ///
    /// The block driver is the one assigned to most orders, earliest seen
    /// on ties, or `fallback_driver` when no order has one.
    pub fn assemble(orders: Vec<Order>, fallback_driver: Option<Driver>) -> Self {
        let driver = most_frequent_driver(&orders).or(fallback_driver);
        let simple = Uuid::new_v4().simple().to_string();

        Self {
            block: BlockHeader {
                id: format!("blk-{}", &simple[..12]),
                dispatched_at: Utc::now().into(),
                driver,
            },
            orders,
        }
    }

    pub fn id(&self) -> &str {
        &self.block.id
    }

    pub fn subject(&self) -> String {
        format!("{}{}", BLOCK_SUBJECT_PREFIX, self.block.id)
    }
}

fn most_frequent_driver(orders: &[Order]) -> Option<Driver> {
    let mut counts: HashMap<&str, (usize, usize, &Driver)> = HashMap::new();

    for (position, driver) in orders.iter().filter_map(|o| o.driver.as_ref()).enumerate() {
        counts
            .entry(driver.id.as_str())
            .and_modify(|(count, _, _)| *count += 1)
            .or_insert((1, position, driver));
    }

    counts
        .into_values()
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, _, driver)| driver.clone())
}

/// Builds `BlockConsolidated` envelopes for one producing service
#[derive(Debug, Clone)]
pub struct BlockEventFactory {
    source: String,
    data_schema: String,
}

impl BlockEventFactory {
    pub fn new(source: impl Into<String>, data_schema: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            data_schema: data_schema.into(),
        }
    }

    pub fn from_config(config: &PublisherConfig) -> Self {
        Self::new(&config.source, &config.data_schema)
    }

    /// Envelope with a fresh trace context
    ///
    /// Each call draws a new UUID v4 `id` and `traceparent`, so building the
    /// same block twice yields two distinct events sharing `subject`.
    ///
    /// # Test Reference
    /// - Test: `src/producer.rs::tests::test_factory_builds_fresh_envelopes`
    pub fn build(&self, block: &ConsolidatedBlock) -> Result<CloudEvent> {
        Ok(self.build_untraced(block)?.with_traceparent(generate_traceparent()))
    }

    /// Envelope without `traceparent`
    pub fn build_untraced(&self, block: &ConsolidatedBlock) -> Result<CloudEvent> {
        let data = serde_json::to_value(block)?;

        Ok(CloudEvent::new(
            BLOCK_CONSOLIDATED_TYPE,
            &self.source,
            Uuid::new_v4().to_string(),
            Utc::now(),
            &self.data_schema,
            block.subject(),
            data,
        ))
    }
}
