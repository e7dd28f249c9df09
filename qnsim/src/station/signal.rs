use std::collections::VecDeque;

use super::{Behavior, Context, Wiring};
use crate::statistics::{Counter, Record, States, Values};
use crate::Client;

/// Broadcasts its signal to every station each time a client passes through.
pub(crate) struct Signal {
    signal: usize,
    arrivals: Counter,
}

impl Signal {
    pub(crate) fn new(signal: usize) -> Self {
        Self {
            signal,
            arrivals: Counter::default(),
        }
    }
}

impl Behavior for Signal {
    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![("n", Record::Counter(self.arrivals))]
    }

    fn emitted_signal(&self) -> Option<usize> {
        Some(self.signal)
    }

    fn arrive(&mut self, wiring: &Wiring, client: Client, ctx: &mut Context<'_>) {
        self.arrivals.add();
        ctx.send(wiring.id, wiring.next(), client, 0.0);
    }
}

/// Holds clients in FIFO order until permits are available.
///
/// Each matching signal adds one permit and each released client consumes one. Without
/// `store`, a signal arriving while nobody waits is dropped.
pub(crate) struct Barrier {
    signal: usize,
    permits: usize,
    store: bool,
    queue: VecDeque<Client>,
    wait_times: Values,
    queue_length: States,
    arrivals: Counter,
}

impl Barrier {
    pub(crate) fn new(signal: usize, permits: usize, store: bool) -> Self {
        Self {
            signal,
            permits,
            store,
            queue: VecDeque::new(),
            wait_times: Values::default(),
            queue_length: States::default(),
            arrivals: Counter::default(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn update_queue(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        let len = self.queue.len();
        ctx.occupancy_mut(wiring.id).nq = len;
        self.queue_length.set(ctx.time, len as f64);
    }

    fn release(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        while self.permits > 0 {
            let mut client = match self.queue.pop_front() {
                Some(client) => client,
                None => break,
            };
            self.permits -= 1;
            let wait = ctx.time - client.entered;
            self.wait_times.add(wait);
            client.wait += wait;
            ctx.send(wiring.id, wiring.next(), client, 0.0);
            self.update_queue(wiring, ctx);
        }
    }
}

impl Behavior for Barrier {
    fn priority(&self) -> u8 {
        2
    }

    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![
            ("W", Record::Values(self.wait_times)),
            ("NQ", Record::States(self.queue_length)),
            ("n", Record::Counter(self.arrivals)),
        ]
    }

    fn arrive(&mut self, wiring: &Wiring, mut client: Client, ctx: &mut Context<'_>) {
        self.arrivals.add();
        client.entered = ctx.time;
        self.queue.push_back(client);
        self.update_queue(wiring, ctx);
        self.release(wiring, ctx);
    }

    fn signal(&mut self, wiring: &Wiring, signal: usize, ctx: &mut Context<'_>) {
        if signal != self.signal {
            return;
        }
        if self.queue.is_empty() && !self.store {
            log::trace!(
                "[{}] Barrier {} dropped signal {} with nobody waiting",
                ctx.time,
                wiring.id,
                signal
            );
            return;
        }
        self.permits += 1;
        self.release(wiring, ctx);
    }

    fn finish(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        self.update_queue(wiring, ctx);
    }
}
