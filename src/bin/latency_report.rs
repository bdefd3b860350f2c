use std::error::Error;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use hdrhistogram::Histogram;
use log::info;
use tick_lob::{
    BookConfig, CancelOrder, Command, Engine, FixedLadder, Ladder, LadderKind, ModifyOrder,
    NewOrder, Side, SparseLadder,
};

/// Per-command latency histogram over a synthetic workload
#[derive(Parser, Debug)]
#[command(name = "latency-report")]
struct Args {
    /// Number of commands to time
    #[arg(short, long, default_value_t = 1_000_000)]
    iterations: u64,

    /// JSON book configuration; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the sparse ladder regardless of the configuration
    #[arg(long)]
    sparse: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => BookConfig::from_json_file(path)?,
        None => BookConfig::default(),
    };
    if args.sparse {
        config.ladder = LadderKind::Sparse;
    }

    println!("Preparing Latency Benchmark...");
    let (histogram, total) = match config.ladder {
        LadderKind::Fixed => measure(Engine::<FixedLadder>::from_config(&config)?, &config, args.iterations)?,
        LadderKind::Sparse => measure(Engine::<SparseLadder>::from_config(&config)?, &config, args.iterations)?,
    };

    report(&histogram, args.iterations, total);
    Ok(())
}

/// The command stream: mostly resting submits around a mid price, with
/// crossing orders, size changes and cancels mixed in.
fn command_at(n: u64, mid: u64, tick: u64) -> Command {
    match n % 10 {
        0..=5 => {
            let side = if n % 2 == 0 { Side::Buy } else { Side::Sell };
            let offset = (1 + n % 50) * tick;
            let price = match side {
                Side::Buy => mid.saturating_sub(offset),
                Side::Sell => mid + offset,
            };
            Command::Submit(NewOrder::new(n, side, price, 10))
        }
        6 => Command::Submit(NewOrder::buy(n, mid + tick, 5)),
        7 => Command::Submit(NewOrder::sell(n, mid.saturating_sub(tick), 5)),
        8 => Command::Modify(ModifyOrder {
            order_id: n.saturating_sub(4),
            new_qty: 20,
        }),
        _ => Command::Cancel(CancelOrder {
            order_id: n.saturating_sub(7),
        }),
    }
}

fn measure<L: Ladder>(
    mut engine: Engine<L>,
    config: &BookConfig,
    iterations: u64,
) -> Result<(Histogram<u64>, Duration), Box<dyn Error>> {
    engine.warm_up();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 100_000, 3)?;
    let mid = config.min_price + (config.max_price - config.min_price) / 2;
    let tick = config.tick_size.max(1);

    println!("Running {} iterations...", iterations);

    let mut total_duration = Duration::ZERO;
    for n in 1..=iterations {
        let cmd = command_at(n, mid, tick);

        let start = Instant::now();
        std::hint::black_box(engine.process_command(cmd));
        let elapsed = start.elapsed();

        // Outliers above the histogram bound are dropped
        histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
        total_duration += elapsed;
    }

    info!(
        "workload done: {} resting orders, best bid {:?}, best ask {:?}",
        engine.order_count(),
        engine.best_bid(),
        engine.best_ask()
    );

    Ok((histogram, total_duration))
}

fn report(histogram: &Histogram<u64>, iterations: u64, total: Duration) {
    println!("\n=== Latency Report (ns) ===");
    println!("Total Ops:  {}", iterations);
    println!("Throughput: {:.2} ops/sec", iterations as f64 / total.as_secs_f64());
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("P99.99: {:6} ns", histogram.value_at_quantile(0.9999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");

    println!("\nDistribution:");
    for v in histogram.iter_log(100, 2.0) {
        let count = v.count_since_last_iteration();
        if count > 0 {
            println!("<= {:6} ns: {:10} count", v.value_iterated_to(), count);
        }
    }
}
