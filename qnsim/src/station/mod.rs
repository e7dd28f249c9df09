//! Network vertices.
//!
//! Every station kind is a local state machine implementing [`Behavior`]. Stations never call
//! each other: a client leaves a station only through a [`Event::Transfer`] scheduled by
//! [`Context::send`], and the simulator hands it to the destination when the transfer executes.

use rand_chacha::ChaChaRng;
use simcore::{EventId, Scheduler};

use crate::statistics::Record;
use crate::{Client, ClientId, Event, StationId};

mod batch;
mod counter;
mod decide;
mod delay;
mod dispose;
mod duplicate;
mod process;
mod signal;
mod source;

pub(crate) use batch::{Batch, Separate};
pub(crate) use counter::{Counter, Throughput};
pub use decide::RoutingMode;
pub(crate) use decide::Decide;
pub(crate) use delay::Delay;
pub(crate) use dispose::Dispose;
pub(crate) use duplicate::Duplicate;
pub use process::Policy;
pub(crate) use process::Process;
pub(crate) use signal::{Barrier, Signal};
pub(crate) use source::{SignalSource, Source};

/// Number of clients at a station.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    /// Clients at the station, including those in service or in transit out of it.
    pub n: usize,
    /// Clients waiting in the station's queue.
    pub nq: usize,
}

/// A client movement between two stations, as observed by an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    /// Station the client left.
    pub from: StationId,
    /// Station the client entered.
    pub to: StationId,
}

/// Per-run counters shared by all stations.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub(crate) next_client: u64,
    pub(crate) arrivals: u64,
    pub(crate) moves: Option<Vec<Move>>,
}

/// Everything a station may touch while handling an event, apart from other stations.
pub(crate) struct Context<'a> {
    pub(crate) time: f64,
    pub(crate) scheduler: &'a mut Scheduler<Event>,
    pub(crate) occupancy: &'a mut [Occupancy],
    pub(crate) rng: &'a mut ChaChaRng,
    pub(crate) run: &'a mut RunState,
}

impl<'a> Context<'a> {
    pub(crate) fn new_client_id(&mut self) -> ClientId {
        let id = ClientId::from(self.run.next_client);
        self.run.next_client += 1;
        id
    }

    pub(crate) fn new_client(&mut self) -> Client {
        Client::new(self.new_client_id())
    }

    pub(crate) fn count_arrival(&mut self) {
        self.run.arrivals += 1;
    }

    pub(crate) fn occupancy(&self, station: StationId) -> Occupancy {
        self.occupancy[usize::from(station)]
    }

    pub(crate) fn occupancy_mut(&mut self, station: StationId) -> &mut Occupancy {
        &mut self.occupancy[usize::from(station)]
    }

    /// Number of clients at `station` as a level for time-weighted statistics.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn level(&self, station: StationId) -> f64 {
        self.occupancy(station).n as f64
    }

    pub(crate) fn schedule(&mut self, delay: f64, event: Event) -> EventId {
        self.scheduler.schedule_at(self.time + delay, event)
    }

    pub(crate) fn cancel(&mut self, id: EventId) -> bool {
        self.scheduler.cancel(id)
    }

    /// Moves one client's worth of occupancy from `from` to `to`.
    pub(crate) fn move_occupancy(&mut self, from: StationId, to: StationId) {
        let source = self.occupancy_mut(from);
        source.n = source.n.saturating_sub(1);
        self.occupancy_mut(to).n += 1;
        if let Some(moves) = self.run.moves.as_mut() {
            moves.push(Move { from, to });
        }
    }

    /// Schedules `client` to move from `from` to `to` after `delay`.
    ///
    /// Occupancy moves right away for a zero delay and at execution time otherwise, so that a
    /// client held for some time still counts towards its current station.
    pub(crate) fn send(&mut self, from: StationId, to: StationId, client: Client, delay: f64) {
        #[allow(clippy::neg_cmp_op_on_partial_ord)]
        let immediate = !(delay > 0.0);
        if immediate {
            self.move_occupancy(from, to);
        }
        self.scheduler.schedule_at(
            if immediate { self.time } else { self.time + delay },
            Event::Transfer {
                from,
                to,
                client,
                immediate,
            },
        );
    }
}

/// Identity and outgoing edges of a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Wiring {
    pub(crate) id: StationId,
    pub(crate) successors: Vec<StationId>,
}

impl Wiring {
    /// First successor. Stations calling this are built with at least one outgoing edge.
    pub(crate) fn next(&self) -> StationId {
        self.successors[0]
    }
}

/// Hooks through which the simulator drives a station.
pub(crate) trait Behavior {
    /// Display priority of the station's statistics.
    fn priority(&self) -> u8 {
        1
    }

    /// Snapshot of the station's statistics.
    fn records(&self) -> Vec<(&'static str, Record)>;

    /// Called once before the first event.
    fn start(&mut self, _wiring: &Wiring, _ctx: &mut Context<'_>) {}

    /// A client has entered the station; occupancy already accounts for it.
    fn arrive(&mut self, wiring: &Wiring, client: Client, ctx: &mut Context<'_>);

    /// A client has left the station; occupancy already accounts for it.
    fn leave(&mut self, _wiring: &Wiring, _ctx: &mut Context<'_>) {}

    /// Pushes the final observations of time-weighted statistics.
    fn finish(&mut self, _wiring: &Wiring, _ctx: &mut Context<'_>) {}

    /// Signal broadcast by some Signal station.
    fn signal(&mut self, _wiring: &Wiring, _signal: usize, _ctx: &mut Context<'_>) {}

    /// Signal this station broadcasts whenever a client reaches it.
    fn emitted_signal(&self) -> Option<usize> {
        None
    }

    /// Scheduled arrival generation of a source.
    fn generate(&mut self, _wiring: &Wiring, _ctx: &mut Context<'_>) {}

    /// A server has finished its service.
    fn service_done(&mut self, _wiring: &Wiring, _ctx: &mut Context<'_>) {}

    /// The patience of a waiting client has run out.
    fn cancel_waiting(&mut self, _wiring: &Wiring, _client: ClientId, _ctx: &mut Context<'_>) {}
}

pub(crate) enum Kind {
    Source(Source),
    SignalSource(SignalSource),
    Delay(Delay),
    Process(Process),
    Decide(Decide),
    Duplicate(Duplicate),
    Counter(Counter),
    Throughput(Throughput),
    Dispose(Dispose),
    Batch(Batch),
    Separate(Separate),
    Signal(Signal),
    Barrier(Barrier),
}

macro_rules! dispatch {
    ($kind:expr, $station:ident => $body:expr) => {
        match $kind {
            Kind::Source($station) => $body,
            Kind::SignalSource($station) => $body,
            Kind::Delay($station) => $body,
            Kind::Process($station) => $body,
            Kind::Decide($station) => $body,
            Kind::Duplicate($station) => $body,
            Kind::Counter($station) => $body,
            Kind::Throughput($station) => $body,
            Kind::Dispose($station) => $body,
            Kind::Batch($station) => $body,
            Kind::Separate($station) => $body,
            Kind::Signal($station) => $body,
            Kind::Barrier($station) => $body,
        }
    };
}

/// A vertex of the simulated network.
pub struct Station {
    wiring: Wiring,
    name: String,
    kind: Kind,
}

impl Station {
    pub(crate) fn new(wiring: Wiring, name: String, kind: Kind) -> Self {
        Self { wiring, name, kind }
    }

    /// Station ID, equal to its position in the network.
    #[must_use]
    pub fn id(&self) -> StationId {
        self.wiring.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Outgoing edges, in model order.
    #[must_use]
    pub fn successors(&self) -> &[StationId] {
        &self.wiring.successors
    }

    /// Checks if this is a Process station.
    #[must_use]
    pub fn is_process(&self) -> bool {
        matches!(self.kind, Kind::Process(_))
    }

    /// Display priority of the station's statistics.
    #[must_use]
    pub fn priority(&self) -> u8 {
        dispatch!(&self.kind, s => s.priority())
    }

    /// Snapshot of the station's statistics.
    #[must_use]
    pub fn records(&self) -> Vec<(&'static str, Record)> {
        dispatch!(&self.kind, s => s.records())
    }

    pub(crate) fn emitted_signal(&self) -> Option<usize> {
        dispatch!(&self.kind, s => s.emitted_signal())
    }

    pub(crate) fn start(&mut self, ctx: &mut Context<'_>) {
        dispatch!(&mut self.kind, s => s.start(&self.wiring, ctx))
    }

    pub(crate) fn arrive(&mut self, client: Client, ctx: &mut Context<'_>) {
        dispatch!(&mut self.kind, s => s.arrive(&self.wiring, client, ctx))
    }

    pub(crate) fn leave(&mut self, ctx: &mut Context<'_>) {
        dispatch!(&mut self.kind, s => s.leave(&self.wiring, ctx))
    }

    pub(crate) fn finish(&mut self, ctx: &mut Context<'_>) {
        dispatch!(&mut self.kind, s => s.finish(&self.wiring, ctx))
    }

    pub(crate) fn signal(&mut self, signal: usize, ctx: &mut Context<'_>) {
        dispatch!(&mut self.kind, s => s.signal(&self.wiring, signal, ctx))
    }

    pub(crate) fn generate(&mut self, ctx: &mut Context<'_>) {
        dispatch!(&mut self.kind, s => s.generate(&self.wiring, ctx))
    }

    pub(crate) fn service_done(&mut self, ctx: &mut Context<'_>) {
        dispatch!(&mut self.kind, s => s.service_done(&self.wiring, ctx))
    }

    pub(crate) fn cancel_waiting(&mut self, client: ClientId, ctx: &mut Context<'_>) {
        dispatch!(&mut self.kind, s => s.cancel_waiting(&self.wiring, client, ctx))
    }
}
