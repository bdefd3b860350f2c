//! Engine - command dispatch and event stream around the matching engine.
//!
//! The engine is single-writer: one thread owns it and every command runs
//! to completion before the next one starts. Other threads hand commands
//! over through the SPSC ring consumed by [`Engine::run`].

use crate::command::{
    BookUpdate, Command, Fill, ModifyOrder, NewOrder, OrderAccepted, OrderCanceled, OrderFilled,
    OrderModified, OrderRejected, OutputEvent, Side,
};
use crate::config::BookConfig;
use crate::error::{BookError, BookResult};
use crate::ladder::{FixedLadder, Ladder, PriceGrid, SparseLadder};
use crate::matching::{MatchingEngine, ModifyOutcome, OrderView};

/// The engine that turns commands into output events.
pub struct Engine<L: Ladder = FixedLadder> {
    /// The underlying matching engine
    pub matcher: MatchingEngine<L>,
}

impl Engine<FixedLadder> {
    /// Engine over a fixed tick grid.
    pub fn new(capacity: u32, grid: PriceGrid) -> Self {
        Self {
            matcher: MatchingEngine::with_ladder(FixedLadder::new(grid), capacity),
        }
    }
}

impl Engine<SparseLadder> {
    /// Engine over an unbounded ordered-map ladder.
    pub fn sparse(capacity: u32) -> Self {
        Self {
            matcher: MatchingEngine::with_ladder(SparseLadder::new(), capacity),
        }
    }
}

impl<L: Ladder> Engine<L> {
    pub fn from_config(config: &BookConfig) -> BookResult<Self> {
        Ok(Self {
            matcher: MatchingEngine::from_config(config)?,
        })
    }

    /// Run the engine event loop.
    ///
    /// # Arguments
    /// * `input` - Consumer end of the command ring buffer
    /// * `output` - Producer end of the output event ring buffer
    /// * `pin_to_core` - Whether to pin to the last available CPU core
    ///
    /// # Note
    /// This function runs forever (until the program terminates).
    #[cfg(feature = "runtime")]
    pub fn run(
        &mut self,
        input: &mut rtrb::Consumer<Command>,
        output: &mut rtrb::Producer<OutputEvent>,
        pin_to_core: bool,
    ) {
        if pin_to_core {
            self.pin_to_core();
        }

        self.warm_up();
        log::info!("engine loop started");

        let mut dropped = 0u64;
        loop {
            while let Ok(cmd) = input.pop() {
                for event in self.process_command(cmd) {
                    if output.push(event).is_err() {
                        dropped += 1;
                        if dropped.is_power_of_two() {
                            log::warn!("output ring full, {} events dropped so far", dropped);
                        }
                    }
                }
            }
            std::hint::spin_loop();
        }
    }

    /// Process a single command and return output events.
    ///
    /// This is the main entry point for synchronous usage (testing, benchmarks).
    #[inline]
    pub fn process_command(&mut self, cmd: Command) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        match cmd {
            Command::Submit(order) => self.process_submit(order, &mut events),
            Command::Cancel(cancel) => self.process_cancel(cancel.order_id, &mut events),
            Command::Modify(modify) => self.process_modify(modify, &mut events),
        }
        events
    }

    fn process_submit(&mut self, order: NewOrder, events: &mut Vec<OutputEvent>) {
        let outcome = match self.matcher.submit(order) {
            Ok(outcome) => outcome,
            Err(err) => return reject(order.order_id, &err, events),
        };

        // Fills arrive grouped by level; publish each level once it is done
        let maker_side = order.side.opposite();
        let mut fills = outcome.fills.iter().peekable();
        while let Some(fill) = fills.next() {
            events.push(OutputEvent::Trade(*fill));
            let level_done = fills.peek().map_or(true, |next: &&Fill| next.price != fill.price);
            if level_done {
                events.push(self.book_delta(maker_side, fill.price));
            }
        }

        if outcome.is_resting() {
            let price = self
                .matcher
                .order(order.order_id)
                .map_or(order.price, |view| view.price);
            events.push(OutputEvent::Accepted(OrderAccepted {
                order_id: order.order_id,
                price,
                qty: outcome.resting_qty,
                side: order.side,
            }));
            events.push(self.book_delta(order.side, price));
        } else {
            events.push(OutputEvent::Filled(OrderFilled {
                order_id: order.order_id,
                filled_qty: order.qty,
            }));
        }
    }

    fn process_cancel(&mut self, order_id: u64, events: &mut Vec<OutputEvent>) {
        let view = self.matcher.order(order_id);
        match self.matcher.cancel(order_id) {
            Ok(canceled_qty) => self.canceled(view, order_id, canceled_qty, events),
            Err(err) => reject(order_id, &err, events),
        }
    }

    fn process_modify(&mut self, modify: ModifyOrder, events: &mut Vec<OutputEvent>) {
        let view = self.matcher.order(modify.order_id);
        match self.matcher.modify(modify.order_id, modify.new_qty) {
            Ok(ModifyOutcome::Updated { old_qty, new_qty }) => {
                events.push(OutputEvent::Modified(OrderModified {
                    order_id: modify.order_id,
                    old_qty,
                    new_qty,
                }));
                if let Some(view) = view {
                    events.push(self.book_delta(view.side, view.price));
                }
            }
            Ok(ModifyOutcome::Canceled { canceled_qty }) => {
                self.canceled(view, modify.order_id, canceled_qty, events)
            }
            Err(err) => reject(modify.order_id, &err, events),
        }
    }

    fn canceled(
        &self,
        view: Option<OrderView>,
        order_id: u64,
        canceled_qty: u32,
        events: &mut Vec<OutputEvent>,
    ) {
        events.push(OutputEvent::Canceled(OrderCanceled {
            order_id,
            canceled_qty,
        }));
        if let Some(view) = view {
            events.push(self.book_delta(view.side, view.price));
        }
    }

    fn book_delta(&self, side: Side, price: u64) -> OutputEvent {
        let (new_qty, new_count) = self.matcher.depth_at(side, price);
        OutputEvent::BookDelta(BookUpdate {
            side,
            price,
            new_qty,
            new_count,
        })
    }

    /// Pin the current thread to the last available CPU core.
    ///
    /// The last core is typically isolated from OS interrupts.
    pub fn pin_to_core(&self) {
        if let Some(core_ids) = core_affinity::get_core_ids() {
            if let Some(last_core) = core_ids.last() {
                if !core_affinity::set_for_current(*last_core) {
                    log::warn!("could not pin engine thread to core {:?}", last_core);
                }
            }
        }
    }

    /// Warm up the engine by pre-faulting memory pages.
    pub fn warm_up(&mut self) {
        self.matcher.warm_up();
    }

    #[inline]
    pub fn best_bid(&self) -> Option<u64> {
        self.matcher.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<u64> {
        self.matcher.best_ask()
    }

    #[inline]
    pub fn spread(&self) -> Option<u64> {
        self.matcher.spread()
    }

    #[inline]
    pub fn order_count(&self) -> usize {
        self.matcher.order_count()
    }

    /// Compute state hash for determinism testing.
    #[inline]
    pub fn state_hash(&self) -> u64 {
        self.matcher.state_hash()
    }
}

fn reject(order_id: u64, err: &BookError, events: &mut Vec<OutputEvent>) {
    events.push(OutputEvent::Rejected(OrderRejected {
        order_id,
        reason: err.into(),
    }));
}
