use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use simcore::Scheduler;

use crate::builder::{build, BuildError, Model, Network};
use crate::report::{ReplicationResult, StatisticsRegistry};
use crate::station::{Context, Move, Occupancy, RunState, Station};
use crate::{Event, StationId};

/// Runs one replication of a built network.
///
/// The simulator owns the clock, the pending events, every station and the random number
/// generator. Nothing is shared with other simulators, so independent replications can run on
/// separate threads.
pub struct Simulator {
    scheduler: Scheduler<Event>,
    stations: Vec<Station>,
    registry: StatisticsRegistry,
    occupancy: Vec<Occupancy>,
    rng: ChaChaRng,
    run: RunState,
    executed: u64,
}

impl Simulator {
    /// Builds `model` and prepares a run seeded with `seed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model fails to build.
    pub fn new(model: &Model, seed: u64) -> Result<Self, BuildError> {
        Ok(Self::from_network(
            build(model)?,
            ChaChaRng::seed_from_u64(seed),
        ))
    }

    /// Prepares a run of an already built network, scheduling the initial events.
    #[must_use]
    pub fn from_network(network: Network, rng: ChaChaRng) -> Self {
        let Network { stations, registry } = network;
        let mut simulator = Self {
            scheduler: Scheduler::default(),
            occupancy: vec![Occupancy::default(); stations.len()],
            stations,
            registry,
            rng,
            run: RunState::default(),
            executed: 0,
        };
        simulator.for_each_station(Station::start);
        simulator
    }

    /// Enables or disables recording of client moves for an animation.
    #[must_use]
    pub fn with_animation(mut self, animate: bool) -> Self {
        self.run.moves = if animate { Some(Vec::new()) } else { None };
        self
    }

    /// Current simulated time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.scheduler.time()
    }

    /// Number of executed events.
    #[must_use]
    pub fn executed_events(&self) -> u64 {
        self.executed
    }

    /// Number of arrivals generated by sources.
    #[must_use]
    pub fn arrivals(&self) -> u64 {
        self.run.arrivals
    }

    /// Time of the next pending event.
    #[must_use]
    pub fn peek_next_time(&self) -> Option<f64> {
        self.scheduler.peek_time()
    }

    /// Checks if the next pending event happens at the current time.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn next_event_is_simultaneous(&self) -> bool {
        self.peek_next_time() == Some(self.time())
    }

    /// Client moves performed by the last [`Simulator::step`] or [`Simulator::step_instant`].
    ///
    /// Always empty unless animation is enabled.
    #[must_use]
    pub fn moves(&self) -> &[Move] {
        self.run.moves.as_deref().unwrap_or(&[])
    }

    /// Current occupancy of a station, or `None` if the network has no such station.
    #[must_use]
    pub fn occupancy(&self, station: StationId) -> Option<Occupancy> {
        self.occupancy.get(usize::from(station)).copied()
    }

    /// Stations of the simulated network.
    #[must_use]
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Statistics registry of the simulated network.
    #[must_use]
    pub fn registry(&self) -> &StatisticsRegistry {
        &self.registry
    }

    /// Executes the earliest pending event.
    ///
    /// Returns `false` without changing anything if no event is pending, which is the only way
    /// a run ends on its own.
    pub fn step(&mut self) -> bool {
        self.clear_moves();
        self.execute_next()
    }

    /// Executes the earliest pending event and every further event at the same time.
    ///
    /// Returns `false` if no event was pending.
    pub fn step_instant(&mut self) -> bool {
        self.clear_moves();
        if !self.execute_next() {
            return false;
        }
        while self.next_event_is_simultaneous() {
            self.execute_next();
        }
        true
    }

    /// Runs until `count` arrivals have been generated or no event is left, then finalizes
    /// the statistics.
    pub fn run(&mut self, count: u64) -> ReplicationResult {
        self.advance(count, 0, |_| true);
        self.finish();
        self.result()
    }

    /// Like [`Simulator::run`], but calls `progress` with the number of arrivals after every
    /// `every` arrivals. The run stops without a result as soon as `progress` returns `false`.
    pub fn run_with<F>(&mut self, count: u64, every: u64, progress: F) -> Option<ReplicationResult>
    where
        F: FnMut(u64) -> bool,
    {
        if self.advance(count, every, progress) {
            self.finish();
            Some(self.result())
        } else {
            None
        }
    }

    /// Pushes the final observation of every time-weighted statistic at the current time.
    pub fn finish(&mut self) {
        log::debug!(
            "[{}] Finishing after {} events and {} arrivals",
            self.time(),
            self.executed,
            self.run.arrivals
        );
        self.for_each_station(Station::finish);
    }

    /// Takes a snapshot of the statistics collected so far.
    #[must_use]
    pub fn result(&self) -> ReplicationResult {
        ReplicationResult::new(
            self.time(),
            self.executed,
            self.run.arrivals,
            self.registry.snapshot(&self.stations),
        )
    }

    fn advance<F>(&mut self, count: u64, every: u64, mut progress: F) -> bool
    where
        F: FnMut(u64) -> bool,
    {
        let mut reported = 0;
        while self.run.arrivals < count {
            if !self.step() {
                log::debug!("[{}] No events left", self.time());
                break;
            }
            if every > 0 && self.run.arrivals >= reported + every {
                reported = self.run.arrivals;
                if !progress(reported) {
                    log::debug!("[{}] Run cancelled", self.time());
                    return false;
                }
            }
        }
        true
    }

    fn clear_moves(&mut self) {
        if let Some(moves) = self.run.moves.as_mut() {
            moves.clear();
        }
    }

    fn for_each_station(&mut self, f: fn(&mut Station, &mut Context<'_>)) {
        let Self {
            scheduler,
            stations,
            occupancy,
            rng,
            run,
            ..
        } = self;
        let mut ctx = Context {
            time: scheduler.time(),
            scheduler,
            occupancy,
            rng,
            run,
        };
        for station in stations.iter_mut() {
            f(station, &mut ctx);
        }
    }

    fn execute_next(&mut self) -> bool {
        let entry = match self.scheduler.pop() {
            Some(entry) => entry,
            None => return false,
        };
        self.executed += 1;
        let time = entry.time();
        let event = entry.into_event();
        log::trace!("[{}] Executing event at station {}", time, event.station());

        let Self {
            scheduler,
            stations,
            occupancy,
            rng,
            run,
            ..
        } = self;
        let mut ctx = Context {
            time,
            scheduler,
            occupancy,
            rng,
            run,
        };
        match event {
            Event::Arrival { station } => stations[usize::from(station)].generate(&mut ctx),
            Event::ServiceDone { station } => {
                stations[usize::from(station)].service_done(&mut ctx);
            }
            Event::WaitingCancel { station, client } => {
                stations[usize::from(station)].cancel_waiting(client, &mut ctx);
            }
            Event::Transfer {
                from,
                to,
                client,
                immediate,
            } => {
                if !immediate {
                    ctx.move_occupancy(from, to);
                }
                stations[usize::from(from)].leave(&mut ctx);
                if let Some(signal) = stations[usize::from(to)].emitted_signal() {
                    log::trace!("[{}] Broadcasting signal {}", time, signal);
                    for station in stations.iter_mut() {
                        station.signal(signal, &mut ctx);
                    }
                }
                stations[usize::from(to)].arrive(client, &mut ctx);
            }
        }
        true
    }
}
