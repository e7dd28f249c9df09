use super::{Behavior, Context, Wiring};
use crate::statistics::{Counter, Record};
use crate::Client;

/// Sends the arriving client along the first edge and an independent copy along every other.
pub(crate) struct Duplicate {
    arrivals: Counter,
}

impl Duplicate {
    pub(crate) fn new() -> Self {
        Self {
            arrivals: Counter::default(),
        }
    }
}

impl Behavior for Duplicate {
    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![("n", Record::Counter(self.arrivals))]
    }

    fn arrive(&mut self, wiring: &Wiring, client: Client, ctx: &mut Context<'_>) {
        self.arrivals.add();
        let copies: Vec<Client> = wiring.successors[1..]
            .iter()
            .map(|_| client.duplicate(&mut || ctx.new_client_id()))
            .collect();
        ctx.send(wiring.id, wiring.next(), client, 0.0);
        for (&to, copy) in wiring.successors[1..].iter().zip(copies) {
            ctx.occupancy_mut(wiring.id).n += 1;
            ctx.send(wiring.id, to, copy, 0.0);
        }
    }
}
