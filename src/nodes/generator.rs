use packetflow_macros::FlowHandler;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::core::{Handler, Inputs, Outputs};

/// Emits `{"name": i}` for `i in 0..length`, one every `interval`
/// milliseconds, then ends the stream.
#[derive(FlowHandler, Debug, Default)]
#[handler(name = "generator", category = "Sources", input = "length", input = "interval", output = "out")]
pub struct Generator;

impl Handler for Generator {
    fn process(&mut self, input: &Inputs, output: &Outputs) {
        // only the first execution receives the parameters
        let Some(length) = input.read_port("length").and_then(|v| v.as_u64()) else {
            return;
        };
        let interval = input
            .read_port("interval")
            .and_then(|v| v.as_u64())
            .map(Duration::from_millis)
            .unwrap_or(Duration::ZERO);
        let Some(out) = output.port("out") else {
            return;
        };

        tokio::task::spawn_local(async move {
            for i in 0..length {
                if i > 0 && !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                if !out.send(json!({ "name": i })) {
                    debug!(sent = i, "generator output closed");
                    return;
                }
            }
            out.close();
        });
    }
}
