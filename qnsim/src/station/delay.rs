use rand_distr::Distribution;

use super::{Behavior, Context, Wiring};
use crate::distribution::Sampler;
use crate::statistics::{Counter, Record, States, Values};
use crate::Client;

/// Infinite-server station: every client is held for an independent service time.
pub(crate) struct Delay {
    service: Sampler,
    service_times: Values,
    system: States,
    arrivals: Counter,
}

impl Delay {
    pub(crate) fn new(service: Sampler) -> Self {
        Self {
            service,
            service_times: Values::default(),
            system: States::default(),
            arrivals: Counter::default(),
        }
    }
}

impl Behavior for Delay {
    fn priority(&self) -> u8 {
        2
    }

    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![
            ("S", Record::Values(self.service_times)),
            ("N", Record::States(self.system)),
            ("n", Record::Counter(self.arrivals)),
        ]
    }

    fn arrive(&mut self, wiring: &Wiring, mut client: Client, ctx: &mut Context<'_>) {
        self.arrivals.add();
        let delta = self.service.sample(ctx.rng);
        client.service += delta;
        self.service_times.add(delta);
        self.system.set(ctx.time, ctx.level(wiring.id));
        ctx.send(wiring.id, wiring.next(), client, delta);
    }

    fn leave(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        self.system.set(ctx.time, ctx.level(wiring.id));
    }

    fn finish(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        self.system.set(ctx.time, ctx.level(wiring.id));
    }
}
