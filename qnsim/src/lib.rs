//! Open queueing network simulation.
//!
//! A [`Model`] describes a directed graph of stations. [`build`] compiles it into a
//! [`Network`], a [`Simulator`] drives one run of it, and [`Replications`] runs several
//! independent runs in parallel and pools their statistics into one [`ReplicationResult`].
//!
//! ```
//! use qnsim::{Model, Simulator};
//!
//! let model: Model = serde_json::from_str(r#"{
//!     "nodes": [
//!         { "id": "a", "type": "Source", "params": { "EI": 10, "CVI": 1 } },
//!         { "id": "b", "type": "Process", "params": { "ES": 8, "CVS": 1, "c": 1 } },
//!         { "id": "c", "type": "Dispose" }
//!     ],
//!     "edges": [ { "from": "a", "to": "b" }, { "from": "b", "to": "c" } ]
//! }"#).unwrap();
//! let mut simulator = Simulator::new(&model, 17).unwrap();
//! let result = simulator.run(1000);
//! assert_eq!(result.arrivals(), 1000);
//! ```

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

mod builder;
pub use builder::{build, BuildError, EdgeSpec, Model, Network, NodeSpec, StationKind};

mod client;
pub use client::{Body, Client};

pub mod distribution;
pub use distribution::Sampler;

mod event;
pub use event::Event;

mod params;

mod replication;
pub use replication::{Pooled, Progress, ReplicationError, Replications, DEFAULT_ARRIVALS};

mod report;
pub use report::{
    FullResult, FullStation, RegistryEntry, ReplicationResult, ShortResult, StationStatistics,
    StatisticsRegistry,
};

mod simulator;
pub use simulator::Simulator;

mod station;
pub use station::{Move, Occupancy, Policy, RoutingMode, Station};

pub mod statistics;

/// Station ID: the position of the station in the built network.
#[derive(
    From,
    Into,
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Copy,
    Clone,
    Hash,
    Display,
)]
pub struct StationId(usize);

/// Client ID, unique within one run.
#[derive(
    From,
    Into,
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Copy,
    Clone,
    Hash,
    Display,
)]
pub struct ClientId(u64);
