use itertools::Itertools;
use rand::distributions::WeightedIndex;
use rand::seq::SliceRandom;
use rand_distr::Distribution;

use super::{Behavior, Context, Occupancy, Wiring};
use crate::statistics::{Counter, Record};
use crate::Client;

/// Routing rule of a Decide station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::ToString)]
#[strum(serialize_all = "snake_case")]
pub enum RoutingMode {
    /// Weighted random choice of the outgoing edge.
    #[strum(serialize = "0", serialize = "random")]
    Random,
    /// Successor with the fewest waiting clients.
    #[strum(serialize = "1", serialize = "fewest_in_queue")]
    FewestInQueue,
    /// Successor with the fewest clients in total.
    #[strum(serialize = "2", serialize = "fewest_in_system")]
    FewestInSystem,
    /// Successor with the most waiting clients.
    #[strum(serialize = "3", serialize = "most_in_queue")]
    MostInQueue,
    /// Successor with the most clients in total.
    #[strum(serialize = "4", serialize = "most_in_system")]
    MostInSystem,
}

impl Default for RoutingMode {
    fn default() -> Self {
        Self::Random
    }
}

impl RoutingMode {
    /// Checks if the mode inspects the queues of successors, which requires all of them to be
    /// Process stations.
    #[must_use]
    pub fn inspects_successors(self) -> bool {
        self != Self::Random
    }
}

/// Routes each client to exactly one successor.
pub(crate) struct Decide {
    mode: RoutingMode,
    /// `None` when all weights are zero, in which case everything goes to the first edge.
    weights: Option<WeightedIndex<f64>>,
    routed: Counter,
}

impl Decide {
    pub(crate) fn new(mode: RoutingMode, weights: &[f64]) -> Self {
        Self {
            mode,
            weights: if mode == RoutingMode::Random {
                WeightedIndex::new(weights).ok()
            } else {
                None
            },
            routed: Counter::default(),
        }
    }

    /// Index of the successor with the extreme `key`, ties broken uniformly at random.
    fn extreme<F>(wiring: &Wiring, ctx: &mut Context<'_>, most: bool, key: F) -> usize
    where
        F: Fn(Occupancy) -> usize,
    {
        let values: Vec<usize> = wiring
            .successors
            .iter()
            .map(|&s| key(ctx.occupancy(s)))
            .collect();
        let best = if most {
            values.iter().max()
        } else {
            values.iter().min()
        };
        let best = match best {
            Some(&best) => best,
            None => return 0,
        };
        let ties: Vec<usize> = values.iter().positions(|&v| v == best).collect();
        if ties.len() == 1 {
            ties[0]
        } else {
            ties.choose(ctx.rng).copied().unwrap_or(0)
        }
    }
}

impl Behavior for Decide {
    fn records(&self) -> Vec<(&'static str, Record)> {
        vec![("n", Record::Counter(self.routed))]
    }

    fn arrive(&mut self, wiring: &Wiring, client: Client, ctx: &mut Context<'_>) {
        self.routed.add();
        let next = match self.mode {
            RoutingMode::Random => self.weights.as_ref().map_or(0, |w| w.sample(ctx.rng)),
            RoutingMode::FewestInQueue => Self::extreme(wiring, ctx, false, |o| o.nq),
            RoutingMode::FewestInSystem => Self::extreme(wiring, ctx, false, |o| o.n),
            RoutingMode::MostInQueue => Self::extreme(wiring, ctx, true, |o| o.nq),
            RoutingMode::MostInSystem => Self::extreme(wiring, ctx, true, |o| o.n),
        };
        ctx.send(wiring.id, wiring.successors[next], client, 0.0);
    }
}
