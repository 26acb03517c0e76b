use anyhow::{Context, Result};
use packetflow_macros::FlowHandler;
use serde_json::Value;
use tracing::warn;

use super::record::FileRecord;
use crate::core::{Handler, Inputs, Outputs};

/// Loads the file behind each incoming `FileRecord` and forwards the record
/// with `contents` set. JSON files are parsed; failures produce no output.
#[derive(FlowHandler, Debug, Default)]
#[handler(name = "reader", category = "Processors", input = "in", output = "out")]
pub struct Reader;

impl Handler for Reader {
    fn process(&mut self, input: &Inputs, output: &Outputs) {
        let (Some(source), Some(out)) = (input.port("in"), output.port("out")) else {
            return;
        };

        while let Some(ip) = source.read() {
            let record = match FileRecord::from_value(ip.into_data()) {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "reader input is not a file record");
                    continue;
                }
            };
            let out = out.clone();
            tokio::task::spawn_local(async move {
                match load(record).await {
                    Ok(record) => {
                        out.send(record.to_value());
                    }
                    Err(e) => warn!(error = %e, "read failed"),
                }
            });
        }
    }
}

async fn load(mut record: FileRecord) -> Result<FileRecord> {
    let text = tokio::fs::read_to_string(&record.full_path)
        .await
        .with_context(|| format!("reading {}", record.full_path.display()))?;
    let contents = if record.is_json() {
        serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", record.full_path.display()))?
    } else {
        Value::String(text)
    };
    record.contents = Some(contents);
    Ok(record)
}
