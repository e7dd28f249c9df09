use std::cmp::Reverse;
use std::collections::VecDeque;

use ordered_float::OrderedFloat;
use rand::Rng;
use rand_distr::Distribution;

use super::{Behavior, Context, Wiring};
use crate::distribution::Sampler;
use crate::statistics::{Counter, Record, States, Values};
use crate::{Client, ClientId, Event};

/// Queueing discipline of a Process station.
///
/// Parsed from the numeric codes used by models (`1`, `-1`, `0`, `2`, `-2`) or from the names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::ToString)]
pub enum Policy {
    /// First in, first out.
    #[strum(to_string = "FIFO", serialize = "1", serialize = "fifo")]
    Fifo,
    /// Last in, first out.
    #[strum(to_string = "LIFO", serialize = "-1", serialize = "lifo")]
    Lifo,
    /// Uniformly random waiting client.
    #[strum(to_string = "Random", serialize = "0", serialize = "random")]
    Random,
    /// Smallest accrued service time first; ties in arrival order.
    #[strum(to_string = "SJF", serialize = "2", serialize = "sjf")]
    ShortestJobFirst,
    /// Largest accrued service time first; ties in arrival order.
    #[strum(to_string = "LJF", serialize = "-2", serialize = "ljf")]
    LongestJobFirst,
}

impl Default for Policy {
    fn default() -> Self {
        Self::Fifo
    }
}

impl Policy {
    /// Position in the non-empty `queue` of the next client to serve.
    fn select<R: Rng + ?Sized>(self, queue: &VecDeque<Client>, rng: &mut R) -> usize {
        let by_service = |(_, client): &(usize, &Client)| OrderedFloat(client.service());
        match self {
            Self::Fifo => 0,
            Self::Lifo => queue.len() - 1,
            Self::Random => rng.gen_range(0..queue.len()),
            Self::ShortestJobFirst => queue
                .iter()
                .enumerate()
                .min_by_key(by_service)
                .map_or(0, |(idx, _)| idx),
            Self::LongestJobFirst => queue
                .iter()
                .enumerate()
                .min_by_key(|entry| Reverse(by_service(entry)))
                .map_or(0, |(idx, _)| idx),
        }
    }
}

/// Multi-server queueing station with batch service and optional reneging.
///
/// Service starts while at least `batch` clients wait and a server is idle. The clients of a
/// batch share one sampled service time and occupy a single server. When the station has a
/// cancellation edge, every arriving client gets a patience timeout; the timeout is retracted
/// before the client is forwarded after service.
pub(crate) struct Process {
    service: Sampler,
    servers: usize,
    idle: usize,
    batch: usize,
    policy: Policy,
    patience: Option<Sampler>,
    success: usize,
    cancel: usize,
    queue: VecDeque<Client>,
    wait_times: Values,
    service_times: Values,
    queue_length: States,
    system: States,
    busy: States,
    arrivals: Counter,
}

impl Process {
    pub(crate) fn new(service: Sampler, servers: usize, batch: usize, policy: Policy) -> Self {
        Self {
            service,
            servers,
            idle: servers,
            batch,
            policy,
            patience: None,
            success: 0,
            cancel: 0,
            queue: VecDeque::new(),
            wait_times: Values::default(),
            service_times: Values::default(),
            queue_length: States::default(),
            system: States::default(),
            busy: States::default(),
            arrivals: Counter::default(),
        }
    }

    /// Enables reneging: clients waiting longer than a sampled patience leave through the
    /// `cancel` successor, and served clients leave through the `success` successor.
    pub(crate) fn with_patience(mut self, patience: Sampler, success: usize, cancel: usize) -> Self {
        self.patience = Some(patience);
        self.success = success;
        self.cancel = cancel;
        self
    }

    #[allow(clippy::cast_precision_loss)]
    fn update_queue(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        let len = self.queue.len();
        ctx.occupancy_mut(wiring.id).nq = len;
        self.queue_length.set(ctx.time, len as f64);
    }

    #[allow(clippy::cast_precision_loss)]
    fn update_busy(&mut self, time: f64) {
        self.busy.set(time, (self.servers - self.idle) as f64);
    }

    fn try_start(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        let target = wiring.successors[self.success];
        while self.queue.len() >= self.batch && self.idle > 0 {
            let delta = self.service.sample(ctx.rng);
            for _ in 0..self.batch {
                let idx = self.policy.select(&self.queue, ctx.rng);
                let mut client = match self.queue.remove(idx) {
                    Some(client) => client,
                    None => break,
                };
                let wait = ctx.time - client.entered;
                self.wait_times.add(wait);
                self.service_times.add(delta);
                client.wait += wait;
                client.service += delta;
                if let Some(timeout) = client.cancel.take() {
                    ctx.cancel(timeout);
                }
                ctx.send(wiring.id, target, client, delta);
            }
            self.update_queue(wiring, ctx);
            self.idle -= 1;
            self.update_busy(ctx.time);
            ctx.schedule(delta, Event::ServiceDone { station: wiring.id });
        }
    }
}

impl Behavior for Process {
    fn priority(&self) -> u8 {
        2
    }

    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![
            ("W", Record::Values(self.wait_times)),
            ("S", Record::Values(self.service_times)),
            ("NQ", Record::States(self.queue_length)),
            ("N", Record::States(self.system)),
            ("cBusy", Record::States(self.busy)),
            ("n", Record::Counter(self.arrivals)),
        ]
    }

    fn start(&mut self, _wiring: &Wiring, ctx: &mut Context<'_>) {
        self.update_busy(ctx.time);
    }

    fn arrive(&mut self, wiring: &Wiring, mut client: Client, ctx: &mut Context<'_>) {
        self.arrivals.add();
        self.system.set(ctx.time, ctx.level(wiring.id));
        client.entered = ctx.time;
        if let Some(patience) = &self.patience {
            let delay = patience.sample(ctx.rng);
            client.cancel = Some(ctx.schedule(
                delay,
                Event::WaitingCancel {
                    station: wiring.id,
                    client: client.id(),
                },
            ));
        }
        self.queue.push_back(client);
        self.update_queue(wiring, ctx);
        self.try_start(wiring, ctx);
    }

    fn leave(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        self.system.set(ctx.time, ctx.level(wiring.id));
    }

    fn finish(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        self.system.set(ctx.time, ctx.level(wiring.id));
        self.update_queue(wiring, ctx);
        self.update_busy(ctx.time);
    }

    fn service_done(&mut self, wiring: &Wiring, ctx: &mut Context<'_>) {
        self.idle = (self.idle + 1).min(self.servers);
        self.update_busy(ctx.time);
        self.try_start(wiring, ctx);
    }

    fn cancel_waiting(&mut self, wiring: &Wiring, client: ClientId, ctx: &mut Context<'_>) {
        let position = self.queue.iter().position(|c| c.id() == client);
        let mut client = match position.and_then(|idx| self.queue.remove(idx)) {
            Some(client) => client,
            None => {
                log::warn!(
                    "[{}] Client {} is no longer waiting at station {}",
                    ctx.time,
                    client,
                    wiring.id
                );
                return;
            }
        };
        client.cancel = None;
        let wait = ctx.time - client.entered;
        self.wait_times.add(wait);
        client.wait += wait;
        self.update_queue(wiring, ctx);
        ctx.send(wiring.id, wiring.successors[self.cancel], client, 0.0);
    }
}
