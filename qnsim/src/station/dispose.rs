use super::{Behavior, Context, Wiring};
use crate::statistics::{Counter, Record, Values};
use crate::Client;

/// Terminal sink. Batches are unfolded so that every single unit is recorded on its own.
pub(crate) struct Dispose {
    wait_times: Values,
    service_times: Values,
    residence_times: Values,
    departures: Counter,
}

impl Dispose {
    pub(crate) fn new() -> Self {
        Self {
            wait_times: Values::default(),
            service_times: Values::default(),
            residence_times: Values::default(),
            departures: Counter::default(),
        }
    }
}

impl Behavior for Dispose {
    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![
            ("W", Record::Values(self.wait_times)),
            ("S", Record::Values(self.service_times)),
            ("V", Record::Values(self.residence_times)),
            ("n", Record::Counter(self.departures)),
        ]
    }

    fn arrive(&mut self, wiring: &Wiring, client: Client, ctx: &mut Context<'_>) {
        for leaf in client.into_leaves() {
            self.wait_times.add(leaf.wait());
            self.service_times.add(leaf.service());
            self.residence_times.add(leaf.wait() + leaf.service());
            self.departures.add();
        }
        ctx.occupancy_mut(wiring.id).n = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::station::harness::Harness;
    use crate::{ClientId, StationId};

    #[test]
    fn test_dispose_unfolds_batches() {
        let wiring = Wiring {
            id: StationId::from(0),
            successors: Vec::new(),
        };
        let mut harness = Harness::new(1);
        harness.occupancy[0].n = 1;
        let members = (0..3)
            .map(|id| {
                let mut c = Client::new(ClientId::from(id));
                c.wait = 1.0;
                c
            })
            .collect();
        let mut batch = Client::composite(ClientId::from(3), members);
        batch.service = 2.0;
        let mut dispose = Dispose::new();
        dispose.arrive(&wiring, batch, &mut harness.ctx());
        assert_eq!(harness.occupancy[0].n, 0);
        assert!(harness.scheduler.is_empty());
        let records = dispose.records();
        assert_eq!(records[3].1.scalar(), 3.0);
        assert_eq!(records[2].1.scalar(), 3.0);
    }
}
