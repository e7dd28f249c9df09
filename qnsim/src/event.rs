use crate::{Client, ClientId, StationId};

/// Simulation events. Each event is executed once and then discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A source generates its next arrival.
    Arrival {
        /// Generating station.
        station: StationId,
    },
    /// One server of a Process station finishes its current service.
    ServiceDone {
        /// Serving station.
        station: StationId,
    },
    /// A waiting client runs out of patience.
    WaitingCancel {
        /// Station at which the client waits.
        station: StationId,
        /// The impatient client.
        client: ClientId,
    },
    /// A client moves along an edge.
    Transfer {
        /// Station the client leaves.
        from: StationId,
        /// Station the client enters.
        to: StationId,
        /// The moving client.
        client: Client,
        /// Occupancy counts were already moved when the transfer was scheduled.
        immediate: bool,
    },
}

impl Event {
    /// The station whose logic handles the event.
    #[must_use]
    pub fn station(&self) -> StationId {
        match self {
            Self::Arrival { station }
            | Self::ServiceDone { station }
            | Self::WaitingCancel { station, .. } => *station,
            Self::Transfer { to, .. } => *to,
        }
    }
}
