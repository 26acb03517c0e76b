use anyhow::{anyhow, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{debug, warn};

use super::protocol::{HostMessage, WorkerArgs, WorkerMessage};
use crate::engine::Component;
use crate::registry::{HandlerMetadata, HandlerRegistry};

/// Worker process event loop: mirrors the host component described by
/// `args`, serves host messages from stdin and reports on stdout. Returns
/// when the host closes stdin.
pub async fn run(args: WorkerArgs, registry: &HandlerRegistry) -> Result<()> {
    let metadata = registry
        .get(&args.handler)
        .cloned()
        .ok_or_else(|| anyhow!("unknown handler `{}`", args.handler))?;

    LocalSet::new().run_until(serve(args, metadata)).await
}

async fn serve(args: WorkerArgs, metadata: HandlerMetadata) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<WorkerMessage>();

    let writer = tokio::task::spawn_local(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = rx.recv().await {
            let mut line = serde_json::to_string(&message)?;
            line.push('\n');
            stdout.write_all(line.as_bytes()).await?;
            stdout.flush().await?;
        }
        anyhow::Ok(())
    });

    let component = Component::worker(&args, metadata, tx);
    component.initialize();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let message: HostMessage = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, %line, "malformed host message");
                continue;
            }
        };

        match message {
            HostMessage::Activate => {
                component.activate();
                if component.inputs().is_empty() {
                    component.execute();
                    component.check();
                } else {
                    component.drain();
                }
            }
            HostMessage::In { port, packet } => match component.inputs().connection(&port) {
                Some(connection) => {
                    if connection.put_data(packet.into_packet(None)).is_err() {
                        debug!(%port, "packet for closed port dropped");
                    }
                }
                None => warn!(%port, "packet for unknown input port"),
            },
            HostMessage::Close { port } => match component.inputs().connection(&port) {
                Some(connection) => connection.close(),
                None => warn!(%port, "close for unknown input port"),
            },
        }
    }

    debug!(handler = %args.handler, "host closed stdin");
    // the writer drains once the component and its outbox are gone
    drop(component);
    writer.await??;
    Ok(())
}
