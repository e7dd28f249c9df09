use qnsim::{Model, Replications};
use serde_json::json;
use testing::{assert_within, GraphBuilder};

fn mm1(policy: u8) -> eyre::Result<Model> {
    let graph = GraphBuilder::new()
        .node("Clients", "Source", json!({ "EI": 100, "CVI": 1 }))
        .node(
            "Counter",
            "Process",
            json!({ "ES": 80, "CVS": 1, "c": 1, "policy": policy }),
        )
        .node("Exit", "Dispose", json!(null))
        .path(&["Clients", "Counter", "Exit"])
        .build();
    Ok(serde_json::from_value(graph)?)
}

fn mean(pooled: &qnsim::Pooled, station: &str, record: &str) -> f64 {
    pooled.result.short()[station][record]
}

#[test]
fn test_mm1_matches_erlang_c() -> eyre::Result<()> {
    let pooled = Replications::new(4)
        .seed(2023)
        .arrivals(200_000)
        .run(&mm1(1)?)?;
    assert_eq!(pooled.replications, 4);
    assert_eq!(pooled.result.arrivals(), 800_000);
    // Utilization 0.8: E[W] = 320, E[V] = 400, E[NQ] = 3.2, E[N] = 4.
    assert_within("E[W]", mean(&pooled, "Counter", "W"), 320.0, 0.08);
    assert_within("E[S]", mean(&pooled, "Counter", "S"), 80.0, 0.02);
    assert_within("E[NQ]", mean(&pooled, "Counter", "NQ"), 3.2, 0.08);
    assert_within("E[N]", mean(&pooled, "Counter", "N"), 4.0, 0.08);
    assert_within("busy servers", mean(&pooled, "Counter", "cBusy"), 0.8, 0.03);
    assert_within("E[V]", mean(&pooled, "Exit", "V"), 400.0, 0.08);
    Ok(())
}

#[test]
fn test_discipline_does_not_change_mean_wait() -> eyre::Result<()> {
    let fifo = Replications::new(2).seed(7).arrivals(100_000).run(&mm1(1)?)?;
    let random = Replications::new(2).seed(7).arrivals(100_000).run(&mm1(0)?)?;
    assert_within(
        "E[W] under random order",
        mean(&random, "Counter", "W"),
        mean(&fifo, "Counter", "W"),
        0.2,
    );
    Ok(())
}

#[test]
fn test_full_result_shape() -> eyre::Result<()> {
    let pooled = Replications::new(2).seed(1).arrivals(1_000).run(&mm1(1)?)?;
    let full = serde_json::to_value(pooled.result.full())?;
    let counter = &full["stations"]["Counter"];
    assert_eq!(counter["priority"], 2);
    for key in &["E[W]", "E[S]"] {
        let record = &counter["records"][*key];
        for field in &["count", "mean", "sd", "cv", "min", "max"] {
            assert!(record.get(*field).is_some(), "{} lacks {}", key, field);
        }
    }
    for key in &["E[NQ]", "E[N]", "E[cBusy]"] {
        assert!(counter["records"][*key].get("time").is_some());
    }
    // The last client of each run is still on its way to the counter.
    assert_eq!(counter["records"]["n"]["count"], 1_998);
    assert_eq!(full["stations"]["Clients"]["records"]["n"]["count"], 2_000);
    assert!(full["time"].as_f64().unwrap_or(0.0) > 0.0);
    Ok(())
}
