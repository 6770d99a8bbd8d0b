//! Keel Replay - synthetic order flow through the matching engine.
//!
//! Every submission is encoded to its wire record and decoded again before
//! it reaches the engine; every fill and decrement the engine emits is
//! encoded on the way out. Latency is measured per engine call.

mod sink;
mod workload;

use std::collections::HashMap;
use std::mem::size_of;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use rust_decimal::Decimal;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use keel_core::{
    EngineConfig, Fee, FeeId, FeeSchedule, MatchingEngine, OrderMatchingResult, Price, Quantity,
    RejectReason, Side,
};
use keel_metrics::{EngineLatency, Operation};
use keel_proto::{MessageBuilder, MessageParser, OrderRecord};

use crate::sink::EncodingSink;
use crate::workload::{Command, Workload};

#[derive(Parser, Debug)]
#[command(author, version, about = "Replay a deterministic order flow through the matching engine", long_about = None)]
struct Args {
    /// Quantity step (overrides KEEL_STEP_SIZE)
    #[arg(long)]
    step_size: Option<Quantity>,

    /// Price tick (overrides KEEL_TICK_SIZE)
    #[arg(long)]
    tick_size: Option<Price>,

    /// Number of workload commands to run
    #[arg(long, default_value_t = 100_000)]
    orders: u64,

    /// Workload seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Outcome tally for engine calls.
#[derive(Default)]
struct RunStats {
    accepted: u64,
    cancelled: u64,
    decremented: u64,
    not_found: u64,
    rejected: HashMap<RejectReason, u64>,
}

impl RunStats {
    fn tally(&mut self, result: OrderMatchingResult) {
        match result {
            OrderMatchingResult::OrderAccepted => self.accepted += 1,
            OrderMatchingResult::CancelAccepted => self.cancelled += 1,
            OrderMatchingResult::DecrementAccepted => self.decremented += 1,
            OrderMatchingResult::OrderDoesNotExists => self.not_found += 1,
            OrderMatchingResult::Rejected(reason) => *self.rejected.entry(reason).or_default() += 1,
        }
    }
}

fn resolve_config(args: &Args) -> anyhow::Result<EngineConfig> {
    let base = EngineConfig::from_env().context("invalid engine configuration in environment")?;
    let config = EngineConfig::new(
        args.step_size.unwrap_or(base.step_size),
        args.tick_size.unwrap_or(base.tick_size),
    )
    .context("invalid engine configuration")?;
    Ok(config)
}

/// Three fee tiers; the workload spreads users across them.
fn fee_schedule() -> FeeSchedule {
    FeeSchedule::flat(Fee::new(Decimal::new(2, 1), Decimal::new(5, 1)))
        .with_tier(FeeId(1), Fee::new(Decimal::new(1, 1), Decimal::new(3, 1)))
        .with_tier(FeeId(2), Fee::default())
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = resolve_config(&args)?;
    info!(
        step_size = %config.step_size,
        tick_size = %config.tick_size,
        orders = args.orders,
        seed = args.seed,
        "starting replay"
    );

    let mut engine = MatchingEngine::new(config, fee_schedule(), Some(EncodingSink::new()));
    let mut workload = Workload::new(args.seed);
    let mut latency = EngineLatency::new().context("failed to create latency histograms")?;
    let mut builder = MessageBuilder::new();
    let mut wire = [0u8; size_of::<OrderRecord>()];
    let mut stats = RunStats::default();

    let start = Instant::now();
    for timestamp in 1..=args.orders {
        let result = match workload.next(timestamp, engine.market_price()) {
            Command::Submit(order) => {
                let size = builder.build_order(&mut wire, &order);
                let decoded = MessageParser::decode_order(&wire[..size])
                    .with_context(|| format!("order {} failed to decode", order.order_id.0))?;
                latency.measure(Operation::AddOrder, || engine.add_order(decoded, timestamp))
            }
            Command::Cancel(order_id) => {
                latency.measure(Operation::CancelOrder, || engine.cancel_order(order_id))
            }
            Command::Decrement(order_id, quantity) => latency.measure(Operation::DecrementQuantity, || {
                engine.decrement_quantity(order_id, quantity)
            }),
        };
        stats.tally(result);
    }
    let elapsed = start.elapsed();

    let sink = engine.listener().context("engine has no listener")?;
    if let Some(error) = sink.first_error {
        bail!("engine event failed to decode: {error}");
    }
    if sink.mismatches > 0 {
        bail!("{} engine events changed across the codec", sink.mismatches);
    }
    debug!(rejections = ?stats.rejected, "rejections by reason");

    let rate = args.orders as f64 / elapsed.as_secs_f64();
    info!(elapsed = ?elapsed, rate = rate as u64, "replay finished");

    println!("Processed {} commands in {:.2?} ({:.0} commands/sec)", args.orders, elapsed, rate);
    println!();
    println!("Latency:");
    for op in Operation::ALL {
        let histogram = latency.histogram(op);
        if !histogram.is_empty() {
            println!("  {:<20} {}", op.name(), histogram.snapshot());
        }
    }
    debug_assert_eq!(latency.total_count(), args.orders);

    let counts = sink.counts;
    debug_assert_eq!(counts.accepted, stats.accepted);
    let rejected: u64 = stats.rejected.values().sum();
    println!();
    println!("Results:");
    println!("  accepted      {:>10}   rejected   {:>10}", stats.accepted, rejected);
    println!("  cancels ok    {:>10}   not found  {:>10}", stats.cancelled, stats.not_found);
    println!("  decrements ok {:>10}", stats.decremented);
    println!("Events:");
    println!("  fills         {:>10}   cancels    {:>10}", counts.fills, counts.cancels);
    println!("  expired       {:>10}   triggered  {:>10}", counts.expired, counts.triggered);
    println!("  self-matches  {:>10}   decrements {:>10}", counts.self_matches, counts.decrements);
    println!("  wire bytes    {:>10}", sink.bytes_encoded);

    println!();
    println!("Book ({} resting, last price {:?}):", engine.resting_order_count(), engine.market_price());
    let asks = engine.book().depth::<5>(Side::Sell);
    for (price, quantity) in asks.iter().rev() {
        println!("  ask {:>12} x {}", price, quantity);
    }
    for (price, quantity) in engine.book().depth::<5>(Side::Buy) {
        println!("  bid {:>12} x {}", price, quantity);
    }

    Ok(())
}
