//! Determinism Test - Golden Master verification.
//!
//! Verifies that the engine produces identical results across runs when
//! given the same input sequence, and that both ladder layouts agree.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tick_lob::{
    CancelOrder, Command, Engine, Ladder, ModifyOrder, NewOrder, OutputEvent, PriceGrid, Side,
};

/// Generate a deterministic sequence of commands
fn generate_commands(seed: u64, count: usize) -> Vec<Command> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut commands = Vec::with_capacity(count);
    let mut active_orders: Vec<u64> = Vec::new();
    let mut next_order_id = 1u64;

    for _ in 0..count {
        let roll = rng.gen_range(0..100);
        if active_orders.is_empty() || roll < 65 {
            let order_id = next_order_id;
            next_order_id += 1;

            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            commands.push(Command::Submit(NewOrder::new(
                order_id,
                side,
                rng.gen_range(9500..10500) * 100, // 950.00 to 1050.00
                rng.gen_range(1..500),
            )));

            active_orders.push(order_id);
        } else if roll < 90 {
            let idx = rng.gen_range(0..active_orders.len());
            let order_id = active_orders.swap_remove(idx);

            commands.push(Command::Cancel(CancelOrder { order_id }));
        } else {
            let idx = rng.gen_range(0..active_orders.len());
            commands.push(Command::Modify(ModifyOrder {
                order_id: active_orders[idx],
                new_qty: rng.gen_range(-50..500),
            }));
        }
    }

    commands
}

/// Compute a hash of all output events
fn hash_events(events: &[OutputEvent]) -> u64 {
    let mut hasher = DefaultHasher::new();

    for event in events {
        match event {
            OutputEvent::Trade(t) => {
                "Trade".hash(&mut hasher);
                t.hash(&mut hasher);
            }
            OutputEvent::BookDelta(b) => {
                "BookDelta".hash(&mut hasher);
                b.side.hash(&mut hasher);
                b.price.hash(&mut hasher);
                b.new_qty.hash(&mut hasher);
                b.new_count.hash(&mut hasher);
            }
            OutputEvent::Accepted(a) => {
                "Accepted".hash(&mut hasher);
                a.order_id.hash(&mut hasher);
                a.price.hash(&mut hasher);
                a.qty.hash(&mut hasher);
            }
            OutputEvent::Filled(f) => {
                "Filled".hash(&mut hasher);
                f.order_id.hash(&mut hasher);
                f.filled_qty.hash(&mut hasher);
            }
            OutputEvent::Canceled(c) => {
                "Canceled".hash(&mut hasher);
                c.order_id.hash(&mut hasher);
                c.canceled_qty.hash(&mut hasher);
            }
            OutputEvent::Modified(m) => {
                "Modified".hash(&mut hasher);
                m.order_id.hash(&mut hasher);
                m.old_qty.hash(&mut hasher);
                m.new_qty.hash(&mut hasher);
            }
            OutputEvent::Rejected(r) => {
                "Rejected".hash(&mut hasher);
                r.order_id.hash(&mut hasher);
            }
        }
    }

    hasher.finish()
}

fn fixed_engine() -> Engine {
    Engine::new(100_000, PriceGrid::new(0, 2_000_000, 100).unwrap())
}

/// Run the engine with a command sequence and return its full event stream
fn run_events<L: Ladder>(mut engine: Engine<L>, commands: &[Command]) -> (Vec<OutputEvent>, u64) {
    let mut all_events = Vec::new();
    for cmd in commands {
        all_events.extend(engine.process_command(*cmd));
    }
    (all_events, engine.state_hash())
}

/// Run the engine with a command sequence and return hashes
fn run_engine(commands: &[Command]) -> (u64, u64) {
    let (events, state_hash) = run_events(fixed_engine(), commands);
    (hash_events(&events), state_hash)
}

#[test]
fn test_determinism_small() {
    const SEED: u64 = 0xDEADBEEF;
    const COUNT: usize = 1000;
    const RUNS: usize = 10;

    let commands = generate_commands(SEED, COUNT);

    let (first_event_hash, first_state_hash) = run_engine(&commands);

    for run in 1..RUNS {
        let (event_hash, state_hash) = run_engine(&commands);

        assert_eq!(event_hash, first_event_hash, "Event hash mismatch on run {}", run);
        assert_eq!(state_hash, first_state_hash, "State hash mismatch on run {}", run);
    }
}

#[test]
fn test_determinism_large() {
    const SEED: u64 = 0xCAFEBABE;
    const COUNT: usize = 100_000;
    const RUNS: usize = 3;

    let commands = generate_commands(SEED, COUNT);

    let (first_event_hash, first_state_hash) = run_engine(&commands);

    for run in 1..RUNS {
        let (event_hash, state_hash) = run_engine(&commands);

        assert_eq!(event_hash, first_event_hash, "Event hash mismatch on run {}", run);
        assert_eq!(state_hash, first_state_hash, "State hash mismatch on run {}", run);
    }
}

#[test]
fn test_ladders_produce_identical_streams() {
    let commands = generate_commands(0x5EED, 20_000);

    let (fixed_events, fixed_state) = run_events(fixed_engine(), &commands);
    let (sparse_events, sparse_state) = run_events(Engine::sparse(100_000), &commands);

    assert_eq!(fixed_events.len(), sparse_events.len());
    for (i, (a, b)) in fixed_events.iter().zip(&sparse_events).enumerate() {
        assert_eq!(a, b, "event {} differs between ladders", i);
    }
    assert_eq!(fixed_state, sparse_state);
}

#[test]
fn test_clear_restores_fresh_state() {
    let commands = generate_commands(42, 2_000);

    let mut engine = fixed_engine();
    let fresh = engine.state_hash();
    for cmd in &commands {
        engine.process_command(*cmd);
    }
    engine.matcher.clear();
    assert_eq!(engine.state_hash(), fresh);

    // Replaying after a clear gives the same stream as a new engine
    let mut replayed = Vec::new();
    for cmd in &commands {
        replayed.extend(engine.process_command(*cmd));
    }
    let (expected, _) = run_events(fixed_engine(), &commands);
    assert_eq!(replayed, expected);
}

#[test]
fn test_different_seeds_produce_different_results() {
    let (hash1, _) = run_engine(&generate_commands(1, 1000));
    let (hash2, _) = run_engine(&generate_commands(2, 1000));

    assert_ne!(hash1, hash2, "Different seeds should produce different results");
}
