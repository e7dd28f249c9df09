use crate::ClientId;

use simcore::EventId;

/// Content of a client: either a single unit or a batch of clients formed at a Batch station.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// Single unit.
    Leaf,
    /// Batch of clients, each possibly composite itself.
    Composite(Vec<Client>),
}

/// A flow unit travelling through the network, carrying its accrued waiting and service times.
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    id: ClientId,
    pub(crate) wait: f64,
    pub(crate) service: f64,
    /// Time at which the client joined its current waiting line.
    pub(crate) entered: f64,
    /// Pending patience timeout while waiting in a Process queue.
    pub(crate) cancel: Option<EventId>,
    pub(crate) body: Body,
}

impl Client {
    /// Constructs a fresh single-unit client.
    #[must_use]
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            wait: 0.0,
            service: 0.0,
            entered: 0.0,
            cancel: None,
            body: Body::Leaf,
        }
    }

    /// Constructs a batch client containing `members`.
    #[must_use]
    pub fn composite(id: ClientId, members: Vec<Client>) -> Self {
        Self {
            body: Body::Composite(members),
            ..Self::new(id)
        }
    }

    /// Client ID.
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Accrued waiting time.
    #[must_use]
    pub fn wait(&self) -> f64 {
        self.wait
    }

    /// Accrued service time.
    #[must_use]
    pub fn service(&self) -> f64 {
        self.service
    }

    /// Members of a batch client, or an empty slice for a single unit.
    #[must_use]
    pub fn members(&self) -> &[Client] {
        match &self.body {
            Body::Leaf => &[],
            Body::Composite(members) => members,
        }
    }

    /// Checks if this is a batch client.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self.body, Body::Composite(_))
    }

    /// Number of single units contained in this client, at any nesting depth.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match &self.body {
            Body::Leaf => 1,
            Body::Composite(members) => members.iter().map(Client::leaf_count).sum(),
        }
    }

    /// Unpacks one level of a batch, adding the batch's own accrued times to each member.
    /// A single unit is returned as the only element.
    #[must_use]
    pub fn into_members(self) -> Vec<Client> {
        match self.body {
            Body::Leaf => vec![Self {
                body: Body::Leaf,
                ..self
            }],
            Body::Composite(members) => {
                let (wait, service) = (self.wait, self.service);
                members
                    .into_iter()
                    .map(|mut member| {
                        member.wait += wait;
                        member.service += service;
                        member
                    })
                    .collect()
            }
        }
    }

    /// Recursively unpacks all batches, propagating accrued times down to every single unit.
    #[must_use]
    pub fn into_leaves(self) -> Vec<Client> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];
        while let Some(client) = stack.pop() {
            if client.is_composite() {
                stack.extend(client.into_members().into_iter().rev());
            } else {
                leaves.push(client);
            }
        }
        leaves
    }

    /// Deep copy of the client structure with fresh IDs and no pending timeout.
    pub(crate) fn duplicate<F>(&self, next_id: &mut F) -> Self
    where
        F: FnMut() -> ClientId,
    {
        let body = match &self.body {
            Body::Leaf => Body::Leaf,
            Body::Composite(members) => {
                Body::Composite(members.iter().map(|m| m.duplicate(next_id)).collect())
            }
        };
        Self {
            id: next_id(),
            wait: self.wait,
            service: self.service,
            entered: self.entered,
            cancel: None,
            body,
        }
    }
}
