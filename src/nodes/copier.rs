use packetflow_macros::FlowHandler;
use std::time::Duration;

use crate::core::{Handler, Inputs, Outputs};

/// Pass-through from `in` to `out`, optionally delaying every copy by the
/// `interval` parameter (milliseconds).
#[derive(FlowHandler, Debug, Default)]
#[handler(name = "copier", category = "Processors", input = "in", input = "interval", output = "out")]
pub struct Copier {
    interval: Option<Duration>,
}

impl Handler for Copier {
    fn process(&mut self, input: &Inputs, output: &Outputs) {
        if let Some(ms) = input.read_port("interval").and_then(|v| v.as_u64()) {
            self.interval = Some(Duration::from_millis(ms));
        }
        let (Some(source), Some(out)) = (input.port("in"), output.port("out")) else {
            return;
        };

        while let Some(ip) = source.read() {
            match self.interval {
                None => {
                    out.send_ip(ip);
                }
                Some(delay) => {
                    let out = out.clone();
                    tokio::task::spawn_local(async move {
                        tokio::time::sleep(delay).await;
                        out.send_ip(ip);
                    });
                }
            }
        }
    }
}
