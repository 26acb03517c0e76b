use std::io;
use std::process::Stdio;
use std::rc::Weak;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::protocol::{HostMessage, WorkerArgs, WorkerMessage};
use crate::engine::{Component, WorkerCommand};

/// Parent-side handle on a worker process.
///
/// Host messages are queued to a writer task feeding the child's stdin. A
/// reader task dispatches the child's stdout to the owning component and
/// reports the exit once stdout closes. Stopping drops the outbox, which
/// closes stdin and lets the worker shut down on its own.
pub struct WorkerLink {
    pid: Option<u32>,
    outbox: Option<mpsc::UnboundedSender<HostMessage>>,
}

impl WorkerLink {
    pub fn spawn(
        command: &WorkerCommand,
        args: &WorkerArgs,
        component: Weak<Component>,
    ) -> io::Result<Self> {
        let program = command.resolve();
        let mut child = Command::new(&program)
            .args(&command.args)
            .args(args.to_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id();
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("worker stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("worker stdout unavailable"))?;

        let (tx, mut rx) = mpsc::unbounded_channel::<HostMessage>();

        tokio::task::spawn_local(async move {
            let mut stdin = stdin;
            while let Some(message) = rx.recv().await {
                let mut line = match serde_json::to_string(&message) {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "failed to encode host message");
                        continue;
                    }
                };
                line.push('\n');
                if let Err(e) = stdin.write_all(line.as_bytes()).await {
                    debug!(error = %e, "worker stdin closed");
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        tokio::task::spawn_local(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match serde_json::from_str::<WorkerMessage>(&line) {
                        Ok(message) => {
                            if let Some(component) = component.upgrade() {
                                component.handle_worker_message(message);
                            }
                        }
                        Err(e) => warn!(error = %e, %line, "malformed worker message"),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "worker stdout read failed");
                        break;
                    }
                }
            }

            let status = child.wait().await;
            if let Some(component) = component.upgrade() {
                component.on_worker_exit(status);
            }
        });

        Ok(Self {
            pid,
            outbox: Some(tx),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Queues a message for the worker. Returns `false` after `stop`.
    pub fn send(&self, message: HostMessage) -> bool {
        self.outbox
            .as_ref()
            .is_some_and(|outbox| outbox.send(message).is_ok())
    }

    /// Requests a graceful stop. The link stays attached until the worker
    /// is observed to exit.
    pub fn stop(&mut self) {
        if self.outbox.take().is_some() {
            debug!(pid = ?self.pid, "stopping worker");
        }
    }
}
