use qnsim::{Model, ReplicationResult, Simulator, StationId};
use serde_json::json;
use testing::GraphBuilder;

fn run_until(simulator: &mut Simulator, horizon: f64) -> ReplicationResult {
    while simulator.peek_next_time().map_or(false, |time| time <= horizon) {
        simulator.step();
    }
    simulator.finish();
    simulator.result()
}

fn gate(store: bool) -> eyre::Result<Model> {
    Ok(serde_json::from_value(
        GraphBuilder::new()
            .node("Clients", "Source", json!({ "EI": 10, "CVI": 0 }))
            .node(
                "Gate",
                "Barrier",
                json!({ "signal": 1, "release": 0, "storeRelease": store }),
            )
            .node("Exit", "Dispose", json!(null))
            .node("Ticks", "Source", json!({ "EI": 25, "CVI": 0 }))
            .node("Signal", "Signal", json!({ "signal": 1 }))
            .node("Tick exit", "Dispose", json!(null))
            .path(&["Clients", "Gate", "Exit"])
            .path(&["Ticks", "Signal", "Tick exit"])
            .build(),
    )?)
}

#[test]
fn test_barrier_releases_one_client_per_signal() -> eyre::Result<()> {
    let mut simulator = Simulator::new(&gate(true)?, 0)?;
    let result = run_until(&mut simulator, 100.0);
    let short = result.short();
    assert_eq!(short["Gate"]["n"], 10.0);
    assert_eq!(short["Tick exit"]["n"], 4.0);
    assert_eq!(short["Exit"]["n"], 4.0);
    // Released in arrival order at 25, 50, 75 and 100.
    assert_eq!(short["Gate"]["W"], (15.0 + 30.0 + 45.0 + 60.0) / 4.0);
    assert_eq!(simulator.occupancy(StationId::from(1)).unwrap().nq, 6);
    Ok(())
}

#[test]
fn test_signals_before_first_client() -> eyre::Result<()> {
    let model: Model = serde_json::from_value(
        GraphBuilder::new()
            .node("Clients", "Source", json!({ "EI": 100, "CVI": 0 }))
            .node(
                "Gate",
                "Barrier",
                json!({ "signal": 1, "release": 0, "storeRelease": false }),
            )
            .node("Exit", "Dispose", json!(null))
            .node("Ticks", "Source", json!({ "EI": 30, "CVI": 0 }))
            .node("Signal", "Signal", json!({ "signal": 1 }))
            .node("Tick exit", "Dispose", json!(null))
            .path(&["Clients", "Gate", "Exit"])
            .path(&["Ticks", "Signal", "Tick exit"])
            .build(),
    )?;
    // Ticks at 30, 60 and 90 find nobody waiting and are dropped.
    let mut simulator = Simulator::new(&model, 0)?;
    let result = run_until(&mut simulator, 110.0);
    assert_eq!(result.short()["Exit"]["n"], 0.0);

    let mut stored = gate(true)?;
    stored.nodes[0].params.insert(String::from("EI"), json!(100));
    stored.nodes[3].params.insert(String::from("EI"), json!(30));
    let mut simulator = Simulator::new(&stored, 0)?;
    let result = run_until(&mut simulator, 110.0);
    assert_eq!(result.short()["Exit"]["n"], 1.0);
    assert_eq!(result.short()["Gate"]["W"], 0.0);
    Ok(())
}

#[test]
fn test_signal_source_follows_signals() -> eyre::Result<()> {
    let model: Model = serde_json::from_value(
        GraphBuilder::new()
            .node("Ticks", "Source", json!({ "EI": 5, "CVI": 1 }))
            .node("Signal", "Signal", json!({ "signal": 3 }))
            .node("Tick exit", "Dispose", json!(null))
            .node("Echo", "SignalSource", json!({ "signal": 3, "b": 3 }))
            .node("Echo exit", "Dispose", json!(null))
            .path(&["Ticks", "Signal", "Tick exit"])
            .path(&["Echo", "Echo exit"])
            .build(),
    )?;
    let mut simulator = Simulator::new(&model, 5)?;
    let result = run_until(&mut simulator, 1_000.0);
    let short = result.short();
    assert!(short["Signal"]["n"] > 0.0);
    assert_eq!(short["Echo"]["n"], 3.0 * short["Signal"]["n"]);
    assert_eq!(short["Echo exit"]["n"], short["Echo"]["n"]);
    Ok(())
}
