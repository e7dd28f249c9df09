use super::{Behavior, Context, Wiring};
use crate::statistics::{Counter, Record, States, Values};
use crate::Client;

/// Collects `size` arriving clients into one batch client.
pub(crate) struct Batch {
    size: usize,
    waiting: Vec<Client>,
    wait_times: Values,
    system: States,
}

impl Batch {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            size,
            waiting: Vec::new(),
            wait_times: Values::default(),
            system: States::default(),
        }
    }
}

impl Behavior for Batch {
    fn priority(&self) -> u8 {
        2
    }

    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![
            ("W", Record::Values(self.wait_times)),
            ("N", Record::States(self.system)),
        ]
    }

    fn arrive(&mut self, wiring: &Wiring, mut client: Client, ctx: &mut Context<'_>) {
        let time = ctx.time;
        self.system.set(time, ctx.level(wiring.id));
        client.entered = time;
        self.waiting.push(client);
        if self.waiting.len() < self.size {
            return;
        }
        let wait_times = &mut self.wait_times;
        let members: Vec<Client> = self
            .waiting
            .drain(..self.size)
            .map(|mut member| {
                let wait = time - member.entered;
                member.wait += wait;
                wait_times.add(wait);
                member
            })
            .collect();
        let batch = Client::composite(ctx.new_client_id(), members);
        let occupancy = ctx.occupancy_mut(wiring.id);
        occupancy.n = (occupancy.n + 1).saturating_sub(self.size);
        ctx.send(wiring.id, wiring.next(), batch, 0.0);
    }

    fn leave(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        self.system.set(ctx.time, ctx.level(wiring.id));
    }

    fn finish(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        self.system.set(ctx.time, ctx.level(wiring.id));
    }
}

/// Splits batch clients back into their members; single units pass through.
pub(crate) struct Separate {
    arrivals: Counter,
}

impl Separate {
    pub(crate) fn new() -> Self {
        Self {
            arrivals: Counter::default(),
        }
    }
}

impl Behavior for Separate {
    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![("n", Record::Counter(self.arrivals))]
    }

    fn arrive(&mut self, wiring: &Wiring, client: Client, ctx: &mut Context<'_>) {
        self.arrivals.add();
        if !client.is_composite() {
            ctx.send(wiring.id, wiring.next(), client, 0.0);
            return;
        }
        let members = client.into_members();
        let occupancy = ctx.occupancy_mut(wiring.id);
        occupancy.n = (occupancy.n + members.len()).saturating_sub(1);
        for member in members {
            ctx.send(wiring.id, wiring.next(), member, 0.0);
        }
    }
}
