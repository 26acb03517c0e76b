//! Host/worker message contract.
//!
//! Messages travel as one JSON object per line: host to worker over the
//! worker's stdin, worker to host over its stdout.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::core::{InformationPacket, IpKind};
use crate::engine::ComponentId;
use crate::error::ProtocolError;

/// Packet payload as it crosses the process boundary. Ownership is
/// re-established on the receiving side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePacket {
    #[serde(default)]
    pub kind: IpKind,
    pub data: Value,
}

impl WirePacket {
    pub fn into_packet(self, owner: Option<ComponentId>) -> InformationPacket {
        InformationPacket::new(self.data)
            .with_kind(self.kind)
            .with_owner(owner)
    }
}

impl From<&InformationPacket> for WirePacket {
    fn from(ip: &InformationPacket) -> Self {
        Self {
            kind: ip.kind(),
            data: ip.data().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostMessage {
    /// Begin consuming.
    Activate,
    /// A packet for the named input port.
    In { port: String, packet: WirePacket },
    /// The named input port's connection closed.
    Close { port: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// A packet produced on the named output port; `None` is the
    /// end-of-stream sentinel.
    Out {
        port: String,
        packet: Option<WirePacket>,
    },
    /// The worker dequeued one packet from the named input port.
    In { port: String },
    /// The worker's execution timer fired.
    Timeout,
}

/// Command-line contract of the worker executable:
/// `<handler> <timeout-ms|none> <initial> <inputs> <outputs>`, port lists
/// comma separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerArgs {
    pub handler: String,
    pub timeout: Option<Duration>,
    pub initial: Vec<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl WorkerArgs {
    pub fn to_args(&self) -> Vec<String> {
        let timeout = match self.timeout {
            Some(t) => t.as_millis().to_string(),
            None => "none".to_string(),
        };
        vec![
            self.handler.clone(),
            timeout,
            self.initial.join(","),
            self.inputs.join(","),
            self.outputs.join(","),
        ]
    }

    pub fn parse<I>(args: I) -> Result<Self, ProtocolError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut next = |name: &'static str| args.next().ok_or(ProtocolError::MissingArgument(name));

        let handler = next("handler")?;
        if handler.is_empty() {
            return Err(ProtocolError::MissingArgument("handler"));
        }
        let timeout = match next("timeout")?.as_str() {
            "none" => None,
            ms => Some(Duration::from_millis(
                ms.parse()
                    .map_err(|_| ProtocolError::InvalidTimeout(ms.to_string()))?,
            )),
        };
        let initial = split_ports(&next("initial")?);
        let inputs = split_ports(&next("inputs")?);
        let outputs = split_ports(&next("outputs")?);

        if let Some(extra) = args.next() {
            return Err(ProtocolError::UnexpectedArgument(extra));
        }

        Ok(Self {
            handler,
            timeout,
            initial,
            inputs,
            outputs,
        })
    }
}

fn split_ports(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}
