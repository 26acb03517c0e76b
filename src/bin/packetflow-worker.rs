use anyhow::{Context, Result};
use packetflow::logging;
use packetflow::registry::HandlerRegistry;
use packetflow::worker::{self, WorkerArgs};

/// Isolated worker process. Spawned by the graph process; stdout carries
/// protocol messages, logs go to stderr.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    logging::init("warn")?;

    let args = WorkerArgs::parse(std::env::args().skip(1)).context("invalid worker arguments")?;
    let registry = HandlerRegistry::builtin();
    worker::run(args, &registry).await
}
