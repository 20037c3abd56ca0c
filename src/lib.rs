//! Consolidated-block event publication over an append-only log
//!
//! Producers build CloudEvents envelopes from consolidated delivery blocks
//! and hand them to an [`EventPublisher`]. The [`StreamPublisher`] appends
//! each envelope to a stream and falls back to a dead-letter stream when
//! that append fails, so an event is only reported lost when both writes
//! fail.
//!
//! # Features
//!
//! - **CloudEvents**: standard envelope (CloudEvents 1.0) with null-free wire form
//! - **JetStream log**: durable appends with broker-assigned sequence numbers
//! - **Dead-letter fallback**: failed appends are redirected with the failure reason
//! - **Fail-fast boot**: optional health check while connecting
//! - **Retry**: optional caller-side retry with exponential backoff
//!
//! # Example
//!
//! ```rust,ignore
//! use logistrack_events::{
//!     BlockEventFactory, ConsolidatedBlock, EventPublisher, JetStreamLog, PublisherConfig,
//!     StreamPublisher, StreamRoutes,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PublisherConfig::from_env()?;
//!     let factory = BlockEventFactory::from_config(&config);
//!     let routes = StreamRoutes::from(&config);
//!     let publisher = StreamPublisher::new(JetStreamLog::connect(config).await?, routes);
//!
//!     let block = ConsolidatedBlock::assemble(orders, None);
//!     publisher.publish("", &factory.build(&block)?, None).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod jetstream;
pub mod log;
pub mod memory;
pub mod options;
pub mod producer;
pub mod publisher;
pub mod retry;

pub use config::PublisherConfig;
pub use envelope::CloudEvent;
pub use error::{AppendError, Error, Result};
pub use jetstream::{JetStreamLog, StreamConfigBuilder};
pub use log::{RecordId, StreamLog, StreamRecord, DATA_FIELD, ERROR_FIELD};
pub use memory::InMemoryLog;
pub use options::PublishOptions;
pub use producer::{
    generate_traceparent, BlockEventFactory, BlockHeader, ConsolidatedBlock, Driver, Named,
    Order, PreparationStatus, Product, ProductLine, BLOCK_CONSOLIDATED_TYPE,
};
pub use publisher::{Delivery, EventPublisher, StreamPublisher, StreamRoutes};
pub use retry::{RetryPolicy, RetryingPublisher};
