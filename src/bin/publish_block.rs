use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use logistrack_events::{
    BlockEventFactory, ConsolidatedBlock, EventPublisher, JetStreamLog, Named, Order,
    PreparationStatus, Product, ProductLine, PublisherConfig, RetryPolicy, RetryingPublisher,
    StreamPublisher, StreamRoutes,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Publish BlockConsolidated events to the event log
#[derive(Parser, Debug, Clone)]
#[command(name = "publish-block")]
struct Args {
    /// Target stream; defaults to EVENTS_STREAM
    #[arg(long, env = "EVENTS_TARGET_STREAM")]
    stream: Option<String>,

    /// Number of events to publish
    #[arg(long, short = 'n', default_value_t = 1)]
    count: u32,

    /// ConsolidatedBlock JSON document to publish instead of the sample block
    #[arg(long)]
    from_file: Option<PathBuf>,

    /// Leave traceparent out of the envelopes
    #[arg(long)]
    no_trace: bool,

    /// Total attempts per event (1 = no retry) when both the stream and the
    /// dead-letter stream fail
    #[arg(long, default_value_t = 1)]
    attempts: u32,
}

impl Args {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_millis(200))
    }
}

/// `RUST_LOG` when set and valid, `info` otherwise
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let args = Args::parse();
    let config = PublisherConfig::from_env()?;
    let stream = args
        .stream
        .clone()
        .unwrap_or_else(|| config.default_stream.clone());

    let template = match &args.from_file {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Some(
                serde_json::from_str::<ConsolidatedBlock>(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?,
            )
        }
        None => None,
    };

    let factory = BlockEventFactory::from_config(&config);
    let routes = StreamRoutes::from(&config);
    let log = JetStreamLog::connect(config).await?;
    let publisher = RetryingPublisher::new(
        StreamPublisher::new(log, routes),
        args.retry_policy(),
    );

    for _ in 0..args.count {
        let block = match &template {
            Some(block) => block.clone(),
            None => sample_block(),
        };
        let event = if args.no_trace {
            factory.build_untraced(&block)?
        } else {
            factory.build(&block)?
        };

        let delivery = publisher.publish(&stream, &event, None).await?;
        info!(
            event_id = %event.id(),
            stream = %delivery.stream(),
            record_id = %delivery.record(),
            degraded = delivery.is_degraded(),
            "Publish finished"
        );
    }

    if args.count == 1 {
        println!("Event published.");
    } else {
        println!("OK: published {} events to \"{}\".", args.count, stream);
    }

    Ok(())
}

fn sample_block() -> ConsolidatedBlock {
    let order = Order {
        id: "o-1".to_string(),
        sme: Named::new("p-1", "Almacén Don Pedro"),
        origin_dc: Named::new("cd-a", "CD Norte"),
        destination_dc: Named::new("cd-b", "CD Sur"),
        dispatched_at: Utc::now().into(),
        preparation_status: PreparationStatus::Completed,
        total_weight: 2.4,
        total_volume: 0.02,
        products: vec![ProductLine {
            product: Product {
                sku: "SKU-1".to_string(),
                name: "Yerba 1kg".to_string(),
            },
            qty: 2,
            weight: 1.2,
            volume: 0.01,
        }],
        driver: Some(Named::new("c-10", "María López")),
    };

    ConsolidatedBlock::assemble(vec![order], None)
}
