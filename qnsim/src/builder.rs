//! Compiles a loosely typed model graph into wired stations and a statistics registry.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::distribution::Sampler;
use crate::params::Params;
use crate::report::StatisticsRegistry;
use crate::station::{self, Kind, Policy, RoutingMode, Station, Wiring};
use crate::StationId;

/// Model build error, scoped to the offending station where there is one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// A node's type tag does not name any station kind.
    #[error("unknown station type: {0}")]
    UnknownStationType(String),
    /// The model has nothing generating clients.
    #[error("no source")]
    NoSource,
    /// A parameter is missing or out of range.
    #[error("station {station}: parameter {parameter} must be {requirement}")]
    InvalidParameter {
        /// Station name.
        station: String,
        /// Parameter key.
        parameter: String,
        /// What a valid value looks like.
        requirement: &'static str,
    },
    /// The queueing discipline code is unknown.
    #[error("station {station}: invalid queueing policy {policy}")]
    InvalidPolicy {
        /// Station name.
        station: String,
        /// The rejected code.
        policy: String,
    },
    /// The station has a number of outgoing edges it cannot handle.
    #[error("station {station}: expected {expected} outgoing edges, found {found}")]
    EdgeCount {
        /// Station name.
        station: String,
        /// Accepted counts.
        expected: &'static str,
        /// Actual count.
        found: usize,
    },
    /// Queue-length routing points at a station without a queue.
    #[error("station {station}: successor {successor} must be a Process station")]
    RoutingTarget {
        /// Station name.
        station: String,
        /// Name of the offending successor.
        successor: String,
    },
    /// Two stations share a display name.
    #[error("duplicate station name: {0}")]
    DuplicateName(String),
}

/// Type tag of a model node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::ToString)]
pub enum StationKind {
    /// Random arrival generator.
    Source,
    /// Arrival generator triggered by a signal.
    SignalSource,
    /// Infinite-server delay.
    Delay,
    /// Multi-server queue.
    Process,
    /// Router.
    Decide,
    /// Fan-out.
    Duplicate,
    /// Pass-through counter.
    Counter,
    /// Pass-through rate meter.
    Throughput,
    /// Sink.
    Dispose,
    /// Batch former.
    Batch,
    /// Batch splitter.
    Separate,
    /// Signal emitter.
    Signal,
    /// Signal-controlled gate.
    Barrier,
    /// Annotation without simulation semantics.
    Text,
}

impl StationKind {
    /// Checks if stations of this kind generate clients and therefore need no incoming edge.
    #[must_use]
    pub fn is_source(self) -> bool {
        matches!(self, Self::Source | Self::SignalSource)
    }
}

/// One vertex of the model graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Identity referenced by edges.
    pub id: String,
    /// Type tag, see [`StationKind`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Display name; the identity is used when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form parameter table.
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl NodeSpec {
    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// One directed edge of the model graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    /// Identity of the node the edge leaves.
    pub from: String,
    /// Identity of the node the edge enters.
    pub to: String,
}

/// Externally supplied model graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Vertices.
    pub nodes: Vec<NodeSpec>,
    /// Edges.
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    /// Number of arrivals to simulate in bulk runs.
    #[serde(default)]
    pub count: Option<u64>,
}

/// Built stations, indexed by [`StationId`], and their statistics registry.
pub struct Network {
    pub(crate) stations: Vec<Station>,
    pub(crate) registry: StatisticsRegistry,
}

impl Network {
    /// Stations in model order.
    #[must_use]
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Statistics registry.
    #[must_use]
    pub fn registry(&self) -> &StatisticsRegistry {
        &self.registry
    }
}

/// A node that survived pruning, with edges resolved to station IDs.
struct Candidate<'a> {
    node: &'a NodeSpec,
    kind: StationKind,
    successors: Vec<StationId>,
}

fn edges(station: &str, found: usize, min: usize, max: usize) -> Result<(), BuildError> {
    if found >= min && found <= max {
        return Ok(());
    }
    let expected = match (min, max) {
        (1, 1) => "exactly 1",
        (1, 2) => "1 or 2",
        _ => "at least 1",
    };
    Err(BuildError::EdgeCount {
        station: station.to_string(),
        expected,
        found,
    })
}

fn mean_cv(params: &Params<'_>, mean: &str, cv: &str) -> Result<Sampler, BuildError> {
    let mean = params.positive_float(mean)?;
    let cv = params.non_negative_float(cv)?;
    Ok(Sampler::from_mean_cv(mean, cv))
}

fn rates(params: &Params<'_>, successors: usize) -> Result<Vec<f64>, BuildError> {
    let raw: Vec<Value> = match params.get("rates") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => s.split(';').map(|r| Value::String(r.to_string())).collect(),
        Some(Value::Array(values)) => values.clone(),
        Some(Value::Number(n)) => vec![Value::Number(n.clone())],
        Some(_) => return Err(params.invalid("rates", "a list of non-negative numbers")),
    };
    (0..successors)
        .map(|idx| match raw.get(idx) {
            None => Ok(0.0),
            Some(value) => Params::non_negative_float_value(value)
                .ok_or_else(|| params.invalid("rates", "a list of non-negative numbers")),
        })
        .collect()
}

fn build_station(
    candidate: &Candidate<'_>,
    candidates: &[Candidate<'_>],
) -> Result<Kind, BuildError> {
    let name = candidate.node.display_name();
    let params = Params::new(name, &candidate.node.params);
    let found = candidate.successors.len();
    Ok(match candidate.kind {
        StationKind::Source => {
            edges(name, found, 1, 1)?;
            let interarrival = mean_cv(&params, "EI", "CVI")?;
            Kind::Source(station::Source::new(
                interarrival,
                params.positive_int_or("b", 1)?,
            ))
        }
        StationKind::SignalSource => {
            edges(name, found, 1, 1)?;
            Kind::SignalSource(station::SignalSource::new(
                params.positive_int("signal")?,
                params.positive_int_or("b", 1)?,
            ))
        }
        StationKind::Delay => {
            edges(name, found, 1, 1)?;
            Kind::Delay(station::Delay::new(mean_cv(&params, "ES", "CVS")?))
        }
        StationKind::Process => {
            edges(name, found, 1, 2)?;
            let service = mean_cv(&params, "ES", "CVS")?;
            let batch = params.positive_int_or("b", 1)?;
            let servers = params.positive_int("c")?;
            let policy = match params.code("policy") {
                None => Policy::default(),
                Some(code) => Policy::from_str(code.trim()).map_err(|_| BuildError::InvalidPolicy {
                    station: name.to_string(),
                    policy: code.clone(),
                })?,
            };
            let process = station::Process::new(service, servers, batch, policy);
            if found == 2 {
                let patience = mean_cv(&params, "EWT", "CVWT")?;
                let second = candidates[usize::from(candidate.successors[1])].node;
                let success_is_second = params
                    .text("successNext")
                    .map_or(false, |next| next == second.id);
                let (success, cancel) = if success_is_second { (1, 0) } else { (0, 1) };
                Kind::Process(process.with_patience(patience, success, cancel))
            } else {
                Kind::Process(process)
            }
        }
        StationKind::Decide => {
            edges(name, found, 1, usize::MAX)?;
            let mode = match params.code("mode") {
                None => RoutingMode::default(),
                Some(code) => RoutingMode::from_str(code.trim())
                    .map_err(|_| params.invalid("mode", "a routing mode between 0 and 4"))?,
            };
            if mode.inspects_successors() {
                for &successor in &candidate.successors {
                    let target = &candidates[usize::from(successor)];
                    if target.kind != StationKind::Process {
                        return Err(BuildError::RoutingTarget {
                            station: name.to_string(),
                            successor: target.node.display_name().to_string(),
                        });
                    }
                }
            }
            let weights = if mode == RoutingMode::Random {
                rates(&params, found)?
            } else {
                Vec::new()
            };
            Kind::Decide(station::Decide::new(mode, &weights))
        }
        StationKind::Duplicate => {
            edges(name, found, 1, usize::MAX)?;
            Kind::Duplicate(station::Duplicate::new())
        }
        StationKind::Counter => {
            edges(name, found, 1, usize::MAX)?;
            Kind::Counter(station::Counter::new())
        }
        StationKind::Throughput => {
            edges(name, found, 1, usize::MAX)?;
            Kind::Throughput(station::Throughput::new())
        }
        StationKind::Dispose => Kind::Dispose(station::Dispose::new()),
        StationKind::Batch => {
            edges(name, found, 1, 2)?;
            Kind::Batch(station::Batch::new(params.positive_int("b")?))
        }
        StationKind::Separate => {
            edges(name, found, 1, 2)?;
            Kind::Separate(station::Separate::new())
        }
        StationKind::Signal => {
            edges(name, found, 1, 2)?;
            Kind::Signal(station::Signal::new(params.positive_int("signal")?))
        }
        StationKind::Barrier => {
            edges(name, found, 1, 2)?;
            let permits = params.non_negative_int("release")?;
            let signal = params.positive_int("signal")?;
            let store = params.bool_or("storeRelease", true)?;
            Kind::Barrier(station::Barrier::new(signal, permits, store))
        }
        StationKind::Text => unreachable!("visual nodes are skipped before building"),
    })
}

/// Builds the network described by `model`.
///
/// Visual nodes are skipped, edges touching unknown nodes are ignored, and stations without
/// incoming edges are removed unless they generate clients. Removal is a single pass, so a
/// station fed only by a removed station stays in the network.
///
/// # Errors
///
/// Returns the first problem found: an unknown type tag, no source, an invalid parameter,
/// edge count or routing target, or a display name used twice.
pub fn build(model: &Model) -> Result<Network, BuildError> {
    let mut nodes = Vec::with_capacity(model.nodes.len());
    for node in &model.nodes {
        let kind = StationKind::from_str(&node.kind)
            .map_err(|_| BuildError::UnknownStationType(node.kind.clone()))?;
        if kind != StationKind::Text {
            nodes.push((node, kind));
        }
    }
    if !nodes.iter().any(|(_, kind)| kind.is_source()) {
        return Err(BuildError::NoSource);
    }

    let positions: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(pos, (node, _))| (node.id.as_str(), pos))
        .collect();
    let mut outgoing = vec![Vec::new(); nodes.len()];
    let mut has_incoming = vec![false; nodes.len()];
    for edge in &model.edges {
        match (positions.get(edge.from.as_str()), positions.get(edge.to.as_str())) {
            (Some(&from), Some(&to)) => {
                outgoing[from].push(to);
                has_incoming[to] = true;
            }
            _ => log::debug!("Ignoring edge {} -> {}", edge.from, edge.to),
        }
    }

    let kept: Vec<usize> = (0..nodes.len())
        .filter(|&pos| {
            let keep = nodes[pos].1.is_source() || has_incoming[pos];
            if !keep {
                log::debug!("Removing unconnected station {}", nodes[pos].0.display_name());
            }
            keep
        })
        .collect();
    let ids: HashMap<usize, StationId> = kept
        .iter()
        .enumerate()
        .map(|(id, &pos)| (pos, StationId::from(id)))
        .collect();
    let candidates: Vec<Candidate<'_>> = kept
        .iter()
        .map(|&pos| Candidate {
            node: nodes[pos].0,
            kind: nodes[pos].1,
            successors: outgoing[pos]
                .iter()
                .filter_map(|to| ids.get(to).copied())
                .collect(),
        })
        .collect();

    let mut names = HashSet::new();
    let mut stations = Vec::with_capacity(candidates.len());
    let mut registry = StatisticsRegistry::default();
    for (id, candidate) in candidates.iter().enumerate() {
        let name = candidate.node.display_name();
        if !names.insert(name) {
            return Err(BuildError::DuplicateName(name.to_string()));
        }
        let kind = build_station(candidate, &candidates)?;
        let station = Station::new(
            Wiring {
                id: StationId::from(id),
                successors: candidate.successors.clone(),
            },
            name.to_string(),
            kind,
        );
        registry.register(&station);
        stations.push(station);
    }
    log::debug!("Built {} stations", stations.len());
    Ok(Network { stations, registry })
}
