use rand_distr::Distribution;

use super::{Behavior, Context, Wiring};
use crate::distribution::Sampler;
use crate::statistics::{Counter, Record};
use crate::{Client, Event};

/// Releases `batch` fresh clients to the first successor and counts one arrival.
fn emit(wiring: &Wiring, batch: usize, generated: &mut Counter, ctx: &mut Context<'_>) {
    ctx.occupancy_mut(wiring.id).n = batch;
    for _ in 0..batch {
        let client = ctx.new_client();
        generated.add();
        ctx.send(wiring.id, wiring.next(), client, 0.0);
    }
    ctx.count_arrival();
}

/// Generates batches of clients at random inter-arrival times.
pub(crate) struct Source {
    interarrival: Sampler,
    batch: usize,
    generated: Counter,
}

impl Source {
    pub(crate) fn new(interarrival: Sampler, batch: usize) -> Self {
        Self {
            interarrival,
            batch,
            generated: Counter::default(),
        }
    }

    fn schedule_next(&self, wiring: &Wiring, ctx: &mut Context<'_>) {
        let delay = self.interarrival.sample(ctx.rng);
        ctx.schedule(delay, Event::Arrival { station: wiring.id });
    }
}

impl Behavior for Source {
    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![("n", Record::Counter(self.generated))]
    }

    fn start(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        self.schedule_next(wiring, ctx);
    }

    fn generate(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        emit(wiring, self.batch, &mut self.generated, ctx);
        self.schedule_next(wiring, ctx);
    }

    fn arrive(&mut self, wiring: &Wiring, client: Client, ctx: &mut Context<'_>) {
        ctx.send(wiring.id, wiring.next(), client, 0.0);
    }
}

/// Generates a batch of clients whenever a matching signal is broadcast.
pub(crate) struct SignalSource {
    signal: usize,
    batch: usize,
    generated: Counter,
}

impl SignalSource {
    pub(crate) fn new(signal: usize, batch: usize) -> Self {
        Self {
            signal,
            batch,
            generated: Counter::default(),
        }
    }
}

impl Behavior for SignalSource {
    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![("n", Record::Counter(self.generated))]
    }

    fn signal(&mut self, wiring: &Wiring, signal: usize, ctx: &mut Context<'_>) {
        if signal == self.signal {
            emit(wiring, self.batch, &mut self.generated, ctx);
        }
    }

    fn arrive(&mut self, wiring: &Wiring, client: Client, ctx: &mut Context<'_>) {
        ctx.send(wiring.id, wiring.next(), client, 0.0);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::station::harness::Harness;
    use crate::StationId;

    fn wiring() -> Wiring {
        Wiring {
            id: StationId::from(0),
            successors: vec![StationId::from(1)],
        }
    }

    #[test]
    fn test_source_generates_batches() {
        let mut harness = Harness::new(2);
        let mut source = Source::new(Sampler::constant(10.0), 3);
        source.start(&wiring(), &mut harness.ctx());
        assert_eq!(harness.scheduler.peek_time(), Some(10.0));
        harness.drain();

        harness.time = 10.0;
        source.generate(&wiring(), &mut harness.ctx());
        assert_eq!(harness.run.arrivals, 1);
        assert_eq!(harness.occupancy[0].n, 0);
        assert_eq!(harness.occupancy[1].n, 3);
        let events = harness.drain();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[3], (t, Event::Arrival { .. }) if t == 20.0));
        assert_eq!(source.records()[0].1, {
            let mut c = Counter::default();
            (0..3).for_each(|_| c.add());
            Record::Counter(c)
        });
    }

    #[test]
    fn test_signal_source_reacts_to_its_signal_only() {
        let mut harness = Harness::new(2);
        let mut source = SignalSource::new(2, 2);
        source.signal(&wiring(), 1, &mut harness.ctx());
        assert!(harness.scheduler.is_empty());
        source.signal(&wiring(), 2, &mut harness.ctx());
        assert_eq!(harness.transfers().len(), 2);
        assert_eq!(harness.run.arrivals, 1);
    }
}
