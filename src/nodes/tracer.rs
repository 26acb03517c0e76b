use packetflow_macros::FlowHandler;
use tracing::info;

use crate::core::{Handler, Inputs, Outputs};

/// Logs every packet it reads and forwards it on `out` when wired.
#[derive(FlowHandler, Debug, Default)]
#[handler(name = "tracer", category = "Sinks", input = "in", output = "out")]
pub struct Tracer {
    seen: u64,
}

impl Handler for Tracer {
    fn process(&mut self, input: &Inputs, output: &Outputs) {
        let Some(source) = input.port("in") else {
            return;
        };
        let out = output.port("out");

        while let Some(ip) = source.read() {
            self.seen += 1;
            info!(seq = self.seen, kind = ?ip.kind(), data = %ip.data(), "packet");
            if let Some(out) = &out {
                out.send_ip(ip);
            }
        }
    }
}
