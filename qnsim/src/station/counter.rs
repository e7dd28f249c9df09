use super::{Behavior, Context, Wiring};
use crate::statistics::{self, Record, Value};
use crate::Client;

/// Pass-through station counting the clients that reach it.
pub(crate) struct Counter {
    arrivals: statistics::Counter,
}

impl Counter {
    pub(crate) fn new() -> Self {
        Self {
            arrivals: statistics::Counter::default(),
        }
    }
}

impl Behavior for Counter {
    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![("n", Record::Counter(self.arrivals))]
    }

    fn arrive(&mut self, wiring: &Wiring, client: Client, ctx: &mut Context<'_>) {
        self.arrivals.add();
        ctx.send(wiring.id, wiring.next(), client, 0.0);
    }
}

/// Pass-through station measuring the rate at which clients reach it.
pub(crate) struct Throughput {
    arrivals: statistics::Counter,
    throughput: Value,
}

impl Throughput {
    pub(crate) fn new() -> Self {
        Self {
            arrivals: statistics::Counter::default(),
            throughput: Value::default(),
        }
    }
}

impl Behavior for Throughput {
    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![
            ("n", Record::Counter(self.arrivals)),
            ("throughput", Record::Value(self.throughput)),
        ]
    }

    fn arrive(&mut self, wiring: &Wiring, client: Client, ctx: &mut Context<'_>) {
        self.arrivals.add();
        ctx.send(wiring.id, wiring.next(), client, 0.0);
    }

    #[allow(clippy::cast_precision_loss)]
    fn finish(&mut self, _wiring: &Wiring, ctx: &mut Context<'_>) {
        let count = self.arrivals.count();
        let rate = if ctx.time > 0.0 {
            count as f64 / ctx.time
        } else {
            0.0
        };
        self.throughput.set_weighted(rate, count);
    }
}
