use qnsim::{Model, ReplicationResult, Simulator};
use serde_json::json;
use testing::GraphBuilder;

fn run_until(model: &Model, horizon: f64) -> eyre::Result<ReplicationResult> {
    let mut simulator = Simulator::new(model, 0)?;
    while simulator.peek_next_time().map_or(false, |time| time <= horizon) {
        simulator.step();
    }
    simulator.finish();
    Ok(simulator.result())
}

#[test]
fn test_batch_and_separate_propagate_times() -> eyre::Result<()> {
    let model: Model = serde_json::from_value(
        GraphBuilder::new()
            .node("Source", "Source", json!({ "EI": 10, "CVI": 0 }))
            .node("Batch", "Batch", json!({ "b": 3 }))
            .node("Delay", "Delay", json!({ "ES": 5, "CVS": 0 }))
            .node("Separate", "Separate", json!(null))
            .node("Exit", "Dispose", json!(null))
            .path(&["Source", "Batch", "Delay", "Separate", "Exit"])
            .build(),
    )?;
    let result = run_until(&model, 300.0)?;
    let short = result.short();
    assert_eq!(short["Source"]["n"], 30.0);
    // Ten batches formed, the last one is still in the delay.
    assert_eq!(short["Delay"]["n"], 10.0);
    assert_eq!(short["Separate"]["n"], 9.0);
    assert_eq!(short["Exit"]["n"], 27.0);
    // Members wait 20, 10 and 0 for their batch to fill, then share its service.
    assert_eq!(short["Batch"]["W"], 10.0);
    assert_eq!(short["Exit"]["W"], 10.0);
    assert_eq!(short["Exit"]["S"], 5.0);
    assert_eq!(short["Exit"]["V"], 15.0);
    Ok(())
}

#[test]
fn test_nested_batches_are_unfolded() -> eyre::Result<()> {
    let model: Model = serde_json::from_value(
        GraphBuilder::new()
            .node("Source", "Source", json!({ "EI": 1, "CVI": 0 }))
            .node("Pairs", "Batch", json!({ "b": 2 }))
            .node("Sixes", "Batch", json!({ "b": 3 }))
            .node("Exit", "Dispose", json!(null))
            .path(&["Source", "Pairs", "Sixes", "Exit"])
            .build(),
    )?;
    let result = run_until(&model, 12.0)?;
    let short = result.short();
    assert_eq!(short["Source"]["n"], 12.0);
    assert_eq!(short["Exit"]["n"], 12.0);
    Ok(())
}

#[test]
fn test_leaves_are_conserved() -> eyre::Result<()> {
    let model: Model = serde_json::from_value(
        GraphBuilder::new()
            .node("Source", "Source", json!({ "EI": 4, "CVI": 1, "b": 2 }))
            .node("Batch", "Batch", json!({ "b": 5 }))
            .node("Process", "Process", json!({ "ES": 15, "CVS": 0.5, "c": 1 }))
            .node("Separate", "Separate", json!(null))
            .node("Exit", "Dispose", json!(null))
            .path(&["Source", "Batch", "Process", "Separate", "Exit"])
            .build(),
    )?;
    let mut simulator = Simulator::new(&model, 11)?;
    let held_by = |simulator: &Simulator, name: &str| {
        simulator
            .stations()
            .iter()
            .find(|station| station.name() == name)
            .and_then(|station| simulator.occupancy(station.id()))
            .map_or(0, |occupancy| occupancy.n)
    };
    while simulator.arrivals() < 5_000 {
        assert!(simulator.step_instant());
        // Between instants every unit rests in a station: singles in the batch, batches of
        // five in the process, nothing in transit through the separator or the exit.
        assert_eq!(held_by(&simulator, "Separate"), 0);
        assert_eq!(held_by(&simulator, "Exit"), 0);
        let held = held_by(&simulator, "Batch") + 5 * held_by(&simulator, "Process");
        let short = simulator.result().short();
        assert_eq!(short["Source"]["n"], (simulator.arrivals() * 2) as f64);
        assert_eq!(short["Source"]["n"], held as f64 + short["Exit"]["n"]);
    }
    let disposed = simulator.result().short()["Exit"]["n"];
    assert!(disposed > 0.0);
    assert_eq!(disposed % 5.0, 0.0);
    Ok(())
}
