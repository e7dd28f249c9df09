//! Statistics snapshots of finished runs and their pooling across replications.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::statistics::{Record, Summary};
use crate::station::Station;
use crate::StationId;

/// Registered statistics source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    name: String,
    priority: u8,
    station: StationId,
}

impl RegistryEntry {
    /// Station display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display priority; higher goes first.
    #[must_use]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Station the statistics belong to.
    #[must_use]
    pub fn station(&self) -> StationId {
        self.station
    }
}

/// Maps station display names to the stations holding their statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatisticsRegistry {
    entries: Vec<RegistryEntry>,
}

impl StatisticsRegistry {
    pub(crate) fn register(&mut self, station: &Station) {
        self.entries.push(RegistryEntry {
            name: station.name().to_string(),
            priority: station.priority(),
            station: station.id(),
        });
    }

    /// Registered entries in model order.
    #[must_use]
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Takes a snapshot of all registered statistics.
    pub(crate) fn snapshot(&self, stations: &[Station]) -> BTreeMap<String, StationStatistics> {
        self.entries
            .iter()
            .map(|entry| {
                let records = stations[usize::from(entry.station)]
                    .records()
                    .into_iter()
                    .map(|(name, record)| (name.to_string(), record))
                    .collect();
                (
                    entry.name.clone(),
                    StationStatistics {
                        priority: entry.priority,
                        records,
                    },
                )
            })
            .collect()
    }
}

/// Statistics of one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationStatistics {
    /// Display priority; higher goes first.
    pub priority: u8,
    /// Records by name.
    pub records: BTreeMap<String, Record>,
}

impl StationStatistics {
    fn merge(&self, other: &Self, station: &str) -> Self {
        let mut records = self.records.clone();
        for (name, record) in &other.records {
            match records.get(name) {
                Some(existing) => match existing.merge(record) {
                    Some(merged) => {
                        records.insert(name.clone(), merged);
                    }
                    None => log::warn!(
                        "Record {} of station {} differs in kind between results; keeping the first",
                        name,
                        station
                    ),
                },
                None => {
                    records.insert(name.clone(), *record);
                }
            }
        }
        Self {
            priority: self.priority.max(other.priority),
            records,
        }
    }
}

/// Short result form: station → record → scalar.
pub type ShortResult = BTreeMap<String, BTreeMap<String, f64>>;

/// Full description of one station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullStation {
    /// Display priority.
    pub priority: u8,
    /// Records keyed by display name (`E[W]` for expectations, plain name otherwise).
    pub records: BTreeMap<String, Summary>,
}

/// Full result form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullResult {
    /// Simulated time.
    pub time: f64,
    /// Executed events.
    pub events: u64,
    /// Stations by name.
    pub stations: BTreeMap<String, FullStation>,
}

/// Immutable statistics of one finished run, or of several pooled runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationResult {
    time: f64,
    events: u64,
    arrivals: u64,
    stations: BTreeMap<String, StationStatistics>,
}

impl ReplicationResult {
    pub(crate) fn new(
        time: f64,
        events: u64,
        arrivals: u64,
        stations: BTreeMap<String, StationStatistics>,
    ) -> Self {
        Self {
            time,
            events,
            arrivals,
            stations,
        }
    }

    /// Simulated time; summed when pooled.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Executed events; summed when pooled.
    #[must_use]
    pub fn events(&self) -> u64 {
        self.events
    }

    /// Generated arrivals; summed when pooled.
    #[must_use]
    pub fn arrivals(&self) -> u64 {
        self.arrivals
    }

    /// Statistics of all stations.
    #[must_use]
    pub fn stations(&self) -> &BTreeMap<String, StationStatistics> {
        &self.stations
    }

    /// Looks up a record by station name and record name.
    #[must_use]
    pub fn record(&self, station: &str, record: &str) -> Option<&Record> {
        self.stations.get(station)?.records.get(record)
    }

    /// Short form: the count of every counter and the mean of every other record.
    #[must_use]
    pub fn short(&self) -> ShortResult {
        self.stations
            .iter()
            .map(|(name, station)| {
                let records = station
                    .records
                    .iter()
                    .map(|(record, value)| (record.clone(), value.scalar()))
                    .collect();
                (name.clone(), records)
            })
            .collect()
    }

    /// Full form with moments and ranges of every record.
    #[must_use]
    pub fn full(&self) -> FullResult {
        let stations = self
            .stations
            .iter()
            .map(|(name, station)| {
                let records = station
                    .records
                    .iter()
                    .map(|(record, value)| {
                        let key = if value.is_expectation() {
                            format!("E[{}]", record)
                        } else {
                            record.clone()
                        };
                        (key, value.summary())
                    })
                    .collect();
                (
                    name.clone(),
                    FullStation {
                        priority: station.priority,
                        records,
                    },
                )
            })
            .collect();
        FullResult {
            time: self.time,
            events: self.events,
            stations,
        }
    }

    /// Pools this result with another one; neither input changes.
    #[must_use]
    pub fn merge_with(&self, other: &Self) -> Self {
        let mut stations = self.stations.clone();
        for (name, statistics) in &other.stations {
            let merged = match stations.get(name) {
                Some(existing) => existing.merge(statistics, name),
                None => statistics.clone(),
            };
            stations.insert(name.clone(), merged);
        }
        Self {
            time: self.time + other.time,
            events: self.events + other.events,
            arrivals: self.arrivals + other.arrivals,
            stations,
        }
    }

    /// Pools several results. Returns `None` for no input and a copy of the only result for
    /// one input.
    ///
    /// The outcome does not depend on the order of `results`: inputs are pooled in a fixed
    /// order so that floating-point sums come out bit-identical.
    #[must_use]
    pub fn merge(results: &[ReplicationResult]) -> Option<Self> {
        let mut ordered: Vec<&ReplicationResult> = results.iter().collect();
        ordered.sort_by(|a, b| {
            a.pooling_key()
                .cmp(&b.pooling_key())
                .then_with(|| a.fingerprint().cmp(&b.fingerprint()))
        });
        let (first, rest) = ordered.split_first()?;
        Some(rest.iter().fold((*first).clone(), |acc, r| acc.merge_with(r)))
    }

    fn pooling_key(&self) -> (OrderedFloat<f64>, u64, u64) {
        (OrderedFloat(self.time), self.events, self.arrivals)
    }

    fn fingerprint(&self) -> String {
        serde_json::to_string(&self.stations).unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use float_cmp::approx_eq;
    use quickcheck_macros::quickcheck;

    use crate::statistics::{Counter, States, Values};

    fn result(waits: &[u16], levels: &[u8], arrivals: u16) -> ReplicationResult {
        let mut w = Values::default();
        waits.iter().for_each(|&x| w.add(f64::from(x)));
        let mut nq = States::default();
        for (t, &level) in levels.iter().enumerate() {
            nq.set(t as f64, f64::from(level));
        }
        let mut n = Counter::default();
        (0..arrivals).for_each(|_| n.add());
        let records = vec![
            (String::from("W"), Record::Values(w)),
            (String::from("NQ"), Record::States(nq)),
            (String::from("n"), Record::Counter(n)),
        ]
        .into_iter()
        .collect();
        let mut stations = BTreeMap::new();
        stations.insert(
            String::from("Process"),
            StationStatistics {
                priority: 2,
                records,
            },
        );
        ReplicationResult::new(levels.len() as f64, u64::from(arrivals) * 3, u64::from(arrivals), stations)
    }

    #[test]
    fn test_short_and_full() -> eyre::Result<()> {
        let r = result(&[1, 3], &[0, 2, 2], 4);
        let short = r.short();
        assert_eq!(short["Process"]["W"], 2.0);
        assert_eq!(short["Process"]["n"], 4.0);
        assert_eq!(short["Process"]["NQ"], 1.0);

        let full = serde_json::to_value(r.full())?;
        assert_eq!(full["time"], 3.0);
        assert_eq!(full["stations"]["Process"]["priority"], 2);
        assert_eq!(full["stations"]["Process"]["records"]["E[W]"]["mean"], 2.0);
        assert_eq!(full["stations"]["Process"]["records"]["E[NQ]"]["time"], 2.0);
        assert_eq!(full["stations"]["Process"]["records"]["n"]["count"], 4);
        Ok(())
    }

    #[test]
    fn test_merge_edge_cases() {
        assert!(ReplicationResult::merge(&[]).is_none());
        let r = result(&[1, 2, 3], &[1, 4], 3);
        assert_eq!(ReplicationResult::merge(&[r.clone()]), Some(r));
    }

    #[test]
    fn test_merge_pools_samples() {
        let a = result(&[1, 3], &[2, 2], 2);
        let b = result(&[5], &[0, 0, 0], 1);
        let merged = ReplicationResult::merge(&[a, b]).unwrap();
        assert_eq!(merged.time(), 5.0);
        assert_eq!(merged.arrivals(), 3);
        let short = merged.short();
        assert_eq!(short["Process"]["W"], 3.0);
        assert_eq!(short["Process"]["n"], 3.0);
        // 2 over 1 time unit and 0 over 2 time units.
        assert!(approx_eq!(f64, short["Process"]["NQ"], 2.0 / 3.0, epsilon = 1e-12));
    }

    #[test]
    fn test_merge_with_itself_keeps_means() {
        let r = result(&[4, 8, 9], &[1, 3, 0, 2], 5);
        let merged = ReplicationResult::merge(&[r.clone(), r.clone()]).unwrap();
        for record in &["W", "NQ"] {
            assert!(approx_eq!(
                f64,
                merged.short()["Process"][*record],
                r.short()["Process"][*record],
                epsilon = 1e-12
            ));
        }
    }

    #[test]
    fn test_merge_of_simulated_runs_is_order_independent() {
        let model: crate::Model = serde_json::from_value(serde_json::json!({
            "nodes": [
                { "id": "s", "type": "Source", "params": { "EI": 10, "CVI": 1 } },
                { "id": "p", "type": "Process", "params": { "ES": 8, "CVS": 1, "c": 1 } },
                { "id": "t", "type": "Throughput" },
                { "id": "d", "type": "Dispose" }
            ],
            "edges": [
                { "from": "s", "to": "p" },
                { "from": "p", "to": "t" },
                { "from": "t", "to": "d" }
            ]
        }))
        .unwrap();
        let runs: Vec<_> = (1..=3)
            .map(|seed| crate::Simulator::new(&model, seed).unwrap().run(5_000))
            .collect();
        let (a, b, c) = (&runs[0], &runs[1], &runs[2]);
        let forward = ReplicationResult::merge(&[a.clone(), b.clone(), c.clone()]).unwrap();
        for permutation in &[[c, b, a], [b, a, c], [c, a, b], [a, c, b], [b, c, a]] {
            let pooled: Vec<_> = permutation.iter().map(|&r| r.clone()).collect();
            assert_eq!(ReplicationResult::merge(&pooled).unwrap(), forward);
        }
        let twice = ReplicationResult::merge(&[a.clone(), a.clone(), b.clone()]).unwrap();
        assert_eq!(
            ReplicationResult::merge(&[b.clone(), a.clone(), a.clone()]).unwrap(),
            twice
        );
    }

    #[quickcheck]
    fn merge_is_order_independent(a: Vec<u16>, b: Vec<u16>, c: Vec<u16>) -> bool {
        let levels = |xs: &[u16]| xs.iter().map(|&x| (x % 16) as u8).collect::<Vec<_>>();
        let a = result(&a, &levels(&a), a.len() as u16);
        let b = result(&b, &levels(&b), b.len() as u16);
        let c = result(&c, &levels(&c), c.len() as u16);
        ReplicationResult::merge(&[a.clone(), b.clone(), c.clone()])
            == ReplicationResult::merge(&[c, b, a])
    }
}
