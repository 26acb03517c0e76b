use anyhow::Result;
use packetflow::engine::{Graph, GraphSpec};
use packetflow::logging;
use std::time::Instant;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    logging::init("info")?;

    // Define a simple graph: generator -> copier -> tracer
    let graph = match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "loading graph");
            Graph::from_spec(GraphSpec::from_path(&path)?)?
        }
        None => Graph::from_json(serde_json::json!({
            "runtime": {
                "component_timeout": "500ms"
            },
            "components": [
                {"id": "numbers", "handler": "generator", "initial": {"length": 10, "interval": 20}},
                {"id": "relay", "handler": "copier"},
                {"id": "console", "handler": "tracer"}
            ],
            "connections": [
                {"from": "numbers", "to": "relay", "capacity": 3, "timeout": "200ms"},
                {"from": "relay", "to": "console", "timeout": "200ms"}
            ]
        }))?,
    };

    let started = Instant::now();
    graph
        .run(|| info!(elapsed = ?started.elapsed(), "all components done"))
        .await?;

    Ok(())
}
