//! Independent replications of one model, run in parallel and pooled into one result.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use rayon::prelude::*;

use crate::builder::{build, BuildError, Model};
use crate::report::ReplicationResult;
use crate::simulator::Simulator;

/// Arrivals simulated per replication when neither the configuration nor the model says.
pub const DEFAULT_ARRIVALS: u64 = 100_000;

/// Replication failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplicationError {
    /// The model failed to build.
    #[error(transparent)]
    Build(#[from] BuildError),
    /// The cancel flag was raised before all replications finished.
    #[error("replications cancelled")]
    Cancelled,
    /// Zero replications were requested.
    #[error("no replications to run")]
    NoReplications,
}

/// Lock-free progress of running replications.
///
/// Every replication owns one counter of simulated arrivals, which it updates periodically.
/// Readers may poll [`Progress::fraction`] from any thread at any time.
#[derive(Debug, Default)]
pub struct Progress {
    done: Vec<AtomicU64>,
    target: AtomicU64,
}

impl Progress {
    /// Creates progress counters for `replications` replications.
    #[must_use]
    pub fn new(replications: usize) -> Self {
        Self {
            done: (0..replications).map(|_| AtomicU64::new(0)).collect(),
            target: AtomicU64::new(0),
        }
    }

    fn reset(&self, target: u64) {
        self.target.store(target, Ordering::Relaxed);
        for done in &self.done {
            done.store(0, Ordering::Relaxed);
        }
    }

    fn update(&self, replication: usize, arrivals: u64) {
        if let Some(done) = self.done.get(replication) {
            done.store(arrivals, Ordering::Relaxed);
        }
    }

    /// Arrivals simulated so far by each replication.
    #[must_use]
    pub fn arrivals(&self) -> Vec<u64> {
        self.done
            .iter()
            .map(|done| done.load(Ordering::Relaxed))
            .collect()
    }

    /// Mean completed fraction over all replications, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        let target = self.target.load(Ordering::Relaxed);
        if target == 0 || self.done.is_empty() {
            return 0.0;
        }
        let done: u64 = self
            .done
            .iter()
            .map(|done| done.load(Ordering::Relaxed).min(target))
            .sum();
        done as f64 / (target as f64 * self.done.len() as f64)
    }
}

/// Result pooled over all replications.
#[derive(Debug, Clone, PartialEq)]
pub struct Pooled {
    /// Merged statistics.
    pub result: ReplicationResult,
    /// Number of merged replications.
    pub replications: usize,
    /// Wall-clock time of the whole batch.
    pub wall_time: Duration,
}

/// Configuration of a batch of independent replications.
///
/// Replication `i` uses a ChaCha generator seeded with the configured seed on stream `i`, so
/// results are reproducible regardless of how the replications are scheduled on threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replications {
    replications: usize,
    seed: u64,
    progress_every: u64,
    arrivals: Option<u64>,
}

impl Default for Replications {
    fn default() -> Self {
        Self {
            replications: 1,
            seed: 0,
            progress_every: 20_000,
            arrivals: None,
        }
    }
}

impl Replications {
    /// Configures `replications` replications with default settings.
    #[must_use]
    pub fn new(replications: usize) -> Self {
        Self {
            replications,
            ..Self::default()
        }
    }

    /// Sets the base seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets how many arrivals pass between progress updates and cancellation checks.
    #[must_use]
    pub fn progress_every(mut self, arrivals: u64) -> Self {
        self.progress_every = arrivals.max(1);
        self
    }

    /// Sets the number of arrivals simulated by each replication, overriding the model.
    #[must_use]
    pub fn arrivals(mut self, arrivals: u64) -> Self {
        self.arrivals = Some(arrivals);
        self
    }

    /// Spreads `total` arrivals evenly over the replications, rounding up.
    #[must_use]
    pub fn total_arrivals(mut self, total: u64) -> Self {
        let replications = self.replications.max(1) as u64;
        self.arrivals = Some((total + replications - 1) / replications);
        self
    }

    /// Number of configured replications.
    #[must_use]
    pub fn replications(&self) -> usize {
        self.replications
    }

    /// Arrivals each replication simulates for `model`.
    #[must_use]
    pub fn arrivals_for(&self, model: &Model) -> u64 {
        self.arrivals.or(model.count).unwrap_or(DEFAULT_ARRIVALS)
    }

    /// Progress counters sized for this configuration.
    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress::new(self.replications)
    }

    /// Runs all replications to completion and pools their results.
    ///
    /// # Errors
    ///
    /// Returns an error if the model fails to build or no replications are configured.
    pub fn run(&self, model: &Model) -> Result<Pooled, ReplicationError> {
        self.run_with(model, &self.progress(), &AtomicBool::new(false))
    }

    /// Runs all replications, reporting to `progress` and stopping early once `cancel` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the model fails to build, no replications are configured, or the
    /// run was cancelled. A cancelled run merges nothing.
    pub fn run_with(
        &self,
        model: &Model,
        progress: &Progress,
        cancel: &AtomicBool,
    ) -> Result<Pooled, ReplicationError> {
        if self.replications == 0 {
            return Err(ReplicationError::NoReplications);
        }
        let count = self.arrivals_for(model);
        progress.reset(count);
        log::info!(
            "Running {} replications of {} arrivals",
            self.replications,
            count
        );
        let start = Instant::now();
        let results = (0..self.replications)
            .into_par_iter()
            .map(|replication| -> Result<Option<ReplicationResult>, BuildError> {
                if cancel.load(Ordering::Relaxed) {
                    return Ok(None);
                }
                let mut rng = ChaChaRng::seed_from_u64(self.seed);
                rng.set_stream(replication as u64);
                let mut simulator = Simulator::from_network(build(model)?, rng);
                let result = simulator.run_with(count, self.progress_every, |arrivals| {
                    progress.update(replication, arrivals);
                    !cancel.load(Ordering::Relaxed)
                });
                if result.is_some() {
                    progress.update(replication, count);
                }
                log::debug!(
                    "Replication {} stopped after {} arrivals",
                    replication,
                    simulator.arrivals()
                );
                Ok(result)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let results: Vec<ReplicationResult> = match results.into_iter().collect() {
            Some(results) => results,
            None => {
                log::info!("Replications cancelled after {:?}", start.elapsed());
                return Err(ReplicationError::Cancelled);
            }
        };
        let result =
            ReplicationResult::merge(&results).ok_or(ReplicationError::NoReplications)?;
        let wall_time = start.elapsed();
        log::info!(
            "Finished {} replications in {:?} ({} simulated events)",
            results.len(),
            wall_time,
            result.events()
        );
        Ok(Pooled {
            result,
            replications: results.len(),
            wall_time,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn model() -> Model {
        serde_json::from_value(json!({
            "nodes": [
                { "id": "s", "type": "Source", "name": "Source", "params": { "EI": 10, "CVI": 1 } },
                { "id": "p", "type": "Process", "name": "Process", "params": { "ES": 7, "CVS": 1, "c": 1 } },
                { "id": "d", "type": "Dispose", "name": "Exit" }
            ],
            "edges": [ { "from": "s", "to": "p" }, { "from": "p", "to": "d" } ],
            "count": 300
        }))
        .expect("invalid test model")
    }

    #[rstest]
    fn test_pooled_counts(model: Model) {
        let pooled = Replications::new(4).seed(1).run(&model).unwrap();
        assert_eq!(pooled.replications, 4);
        assert_eq!(pooled.result.arrivals(), 1200);
    }

    #[rstest]
    fn test_replications_are_reproducible(model: Model) {
        let config = Replications::new(3).seed(9).arrivals(200);
        let first = config.run(&model).unwrap();
        let second = config.run(&model).unwrap();
        assert_eq!(first.result, second.result);
    }

    #[rstest]
    fn test_single_replication_matches_simulator(model: Model) {
        let pooled = Replications::new(1).seed(5).run(&model).unwrap();
        let single = Simulator::new(&model, 5).unwrap().run(300);
        assert_eq!(pooled.result, single);
    }

    #[rstest]
    fn test_arrival_count_sources(model: Model) {
        assert_eq!(Replications::new(2).arrivals_for(&model), 300);
        assert_eq!(Replications::new(2).arrivals(50).arrivals_for(&model), 50);
        assert_eq!(Replications::new(3).total_arrivals(1000).arrivals_for(&model), 334);
        let mut model = model;
        model.count = None;
        assert_eq!(Replications::new(2).arrivals_for(&model), DEFAULT_ARRIVALS);
    }

    #[rstest]
    fn test_progress_completes(model: Model) {
        let config = Replications::new(2).progress_every(50);
        let progress = config.progress();
        assert_eq!(progress.fraction(), 0.0);
        config
            .run_with(&model, &progress, &AtomicBool::new(false))
            .unwrap();
        assert_eq!(progress.fraction(), 1.0);
        assert_eq!(progress.arrivals(), vec![300, 300]);
    }

    #[rstest]
    fn test_cancelled_run_merges_nothing(model: Model) {
        let config = Replications::new(2);
        let progress = config.progress();
        let err = config
            .run_with(&model, &progress, &AtomicBool::new(true))
            .unwrap_err();
        assert_eq!(err, ReplicationError::Cancelled);
    }

    #[rstest]
    fn test_errors(model: Model) {
        assert_eq!(
            Replications::new(0).run(&model).unwrap_err(),
            ReplicationError::NoReplications
        );
        let mut broken = model;
        broken.nodes.remove(0);
        let err = Replications::new(2).run(&broken).unwrap_err();
        assert_eq!(err, ReplicationError::Build(BuildError::NoSource));
        assert_eq!(err.to_string(), "no source");
    }
}
