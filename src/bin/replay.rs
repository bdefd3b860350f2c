use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use log::{debug, info};
use tick_lob::feed::{self, TimedCommand};
use tick_lob::{BookConfig, Engine, FixedLadder, Ladder, LadderKind, OutputEvent, SparseLadder};

/// Replay a CSV command feed through a fresh book and print the result
#[derive(Parser, Debug)]
#[command(name = "replay")]
struct Args {
    /// CSV feed with header `action,order_id,side,price,qty,timestamp`
    feed: PathBuf,

    /// JSON book configuration; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the sparse ladder regardless of the configuration
    #[arg(long)]
    sparse: bool,

    /// Levels per side to print
    #[arg(short, long, default_value_t = 10)]
    depth: usize,
}

#[derive(Debug, Default)]
struct Tally {
    trades: u64,
    traded_qty: u64,
    accepted: u64,
    filled: u64,
    canceled: u64,
    modified: u64,
    rejected: u64,
}

impl Tally {
    fn record(&mut self, event: &OutputEvent) {
        match event {
            OutputEvent::Trade(fill) => {
                self.trades += 1;
                self.traded_qty += fill.qty as u64;
            }
            OutputEvent::Accepted(_) => self.accepted += 1,
            OutputEvent::Filled(_) => self.filled += 1,
            OutputEvent::Canceled(_) => self.canceled += 1,
            OutputEvent::Modified(_) => self.modified += 1,
            OutputEvent::Rejected(r) => {
                debug!("order {} rejected: {:?}", r.order_id, r.reason);
                self.rejected += 1;
            }
            OutputEvent::BookDelta(_) => {}
        }
    }
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

    let commands = feed::read_commands(BufReader::new(File::open(&args.feed)?), &config)?;
    info!("loaded {} commands from {}", commands.len(), args.feed.display());

    match config.ladder {
        LadderKind::Fixed => replay(Engine::<FixedLadder>::from_config(&config)?, &config, &commands, args.depth),
        LadderKind::Sparse => replay(Engine::<SparseLadder>::from_config(&config)?, &config, &commands, args.depth),
    }
}

fn replay<L: Ladder>(
    mut engine: Engine<L>,
    config: &BookConfig,
    commands: &[TimedCommand],
    depth: usize,
) -> Result<(), Box<dyn Error>> {
    let mut tally = Tally::default();

    let start = Instant::now();
    for timed in commands {
        for event in engine.process_command(timed.command) {
            tally.record(&event);
        }
    }
    let elapsed = start.elapsed();

    engine.matcher.check_invariants()?;

    if let (Some(first), Some(last)) = (
        commands.iter().find_map(|c| c.at),
        commands.iter().rev().find_map(|c| c.at),
    ) {
        info!("feed spans {} to {}", first, last);
    }

    println!("=== Replay ===");
    println!("Commands:   {} in {:?}", commands.len(), elapsed);
    println!("Trades:     {} ({} qty)", tally.trades, tally.traded_qty);
    println!("Accepted:   {}", tally.accepted);
    println!("Filled:     {}", tally.filled);
    println!("Canceled:   {}", tally.canceled);
    println!("Modified:   {}", tally.modified);
    println!("Rejected:   {}", tally.rejected);
    println!("Resting:    {}", engine.order_count());

    let snapshot = engine.matcher.snapshot();
    println!("\n{:>12} {:>8} | {:<12} {:<8}", "BID QTY", "BID", "ASK", "ASK QTY");
    for row in 0..depth {
        let bid = snapshot.bids.get(row);
        let ask = snapshot.asks.get(row);
        if bid.is_none() && ask.is_none() {
            break;
        }
        let (bid_qty, bid_px) = bid.map_or((String::new(), String::new()), |l| {
            (l.total_qty.to_string(), config.to_quote(l.price).to_string())
        });
        let (ask_px, ask_qty) = ask.map_or((String::new(), String::new()), |l| {
            (config.to_quote(l.price).to_string(), l.total_qty.to_string())
        });
        println!("{:>12} {:>8} | {:<12} {:<8}", bid_qty, bid_px, ask_px, ask_qty);
    }

    Ok(())
}
