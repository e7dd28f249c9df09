//! Helpers shared by the tests of the simulation crates.

#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

use serde_json::{json, Map, Value};

/// Builds the JSON description of a model graph.
///
/// Every node is named after its ID, so statistics can be looked up by the same string that
/// was used to wire the graph.
#[derive(Debug, Default, Clone)]
pub struct GraphBuilder {
    nodes: Vec<Value>,
    edges: Vec<Value>,
    count: Option<u64>,
}

impl GraphBuilder {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node of type `kind` with the given parameter object.
    ///
    /// # Panics
    ///
    /// Panics if `params` is neither an object nor `null`.
    #[must_use]
    pub fn node(mut self, id: &str, kind: &str, params: Value) -> Self {
        let params = match params {
            Value::Object(params) => params,
            Value::Null => Map::new(),
            other => panic!("node parameters must be an object, got {}", other),
        };
        self.nodes.push(json!({
            "id": id,
            "type": kind,
            "name": id,
            "params": params,
        }));
        self
    }

    /// Adds a directed edge.
    #[must_use]
    pub fn edge(mut self, from: &str, to: &str) -> Self {
        self.edges.push(json!({ "from": from, "to": to }));
        self
    }

    /// Adds edges along a path of nodes.
    #[must_use]
    pub fn path(self, ids: &[&str]) -> Self {
        ids.windows(2)
            .fold(self, |graph, pair| graph.edge(pair[0], pair[1]))
    }

    /// Sets the number of arrivals to simulate.
    #[must_use]
    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }

    /// Produces the JSON value of the graph.
    #[must_use]
    pub fn build(self) -> Value {
        let mut graph = json!({ "nodes": self.nodes, "edges": self.edges });
        if let Some(count) = self.count {
            graph["count"] = json!(count);
        }
        graph
    }
}

/// Relative error of `actual` with respect to `expected`; the absolute error if `expected` is 0.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn relative_error(actual: f64, expected: f64) -> f64 {
    if expected == 0.0 {
        actual.abs()
    } else {
        ((actual - expected) / expected).abs()
    }
}

/// Asserts that `actual` is within `tolerance` relative error of `expected`.
///
/// # Panics
///
/// Panics with a message naming `what` if the error is too large.
pub fn assert_within(what: &str, actual: f64, expected: f64, tolerance: f64) {
    let error = relative_error(actual, expected);
    assert!(
        error <= tolerance,
        "{}: got {}, expected {} (relative error {:.4} > {})",
        what,
        actual,
        expected,
        error,
        tolerance
    );
}
