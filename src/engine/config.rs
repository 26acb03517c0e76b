use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::GraphError;

/// Environment variable naming the worker executable.
pub const WORKER_ENV: &str = "PACKETFLOW_WORKER";

const WORKER_BIN: &str = "packetflow-worker";

/// Runtime-wide settings shared by every component of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Execution timeout applied to every loaded component. `None` kills a
    /// closed component as soon as it is scheduled.
    #[serde(with = "humantime_serde")]
    pub component_timeout: Option<Duration>,

    pub worker: WorkerCommand,

    /// How long `Graph::run` waits for isolated workers to exit after
    /// completion.
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            component_timeout: Some(Duration::from_secs(1)),
            worker: WorkerCommand::default(),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

/// How to launch the worker executable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerCommand {
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn program(path: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(path.into()),
            args: Vec::new(),
        }
    }

    /// Explicit program, then `PACKETFLOW_WORKER`, then a `packetflow-worker`
    /// executable next to the current executable or one directory above it
    /// (test harnesses run from `target/<profile>/deps`). Falls back to a
    /// `PATH` lookup.
    pub fn resolve(&self) -> PathBuf {
        if let Some(program) = &self.program {
            return program.clone();
        }
        if let Some(program) = env::var_os(WORKER_ENV) {
            return PathBuf::from(program);
        }

        let file_name = format!("{}{}", WORKER_BIN, env::consts::EXE_SUFFIX);
        if let Ok(exe) = env::current_exe() {
            let mut dir = exe.parent();
            for _ in 0..2 {
                let Some(d) = dir else { break };
                let candidate = d.join(&file_name);
                if candidate.is_file() {
                    return candidate;
                }
                dir = d.parent();
            }
        }
        PathBuf::from(file_name)
    }
}

/// JSON description of a whole graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
}

impl GraphSpec {
    pub fn from_value(value: Value) -> Result<Self, GraphError> {
        serde_json::from_value(value).map_err(|e| GraphError::InvalidConfig(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| GraphError::InvalidConfig(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub id: String,
    pub handler: String,
    #[serde(default)]
    pub isolated: bool,
    /// Overrides `RuntimeConfig::component_timeout`.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    /// Initial packets: an object seeds one port per key, anything else
    /// seeds the `in` port.
    #[serde(default)]
    pub initial: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub from: String,
    #[serde(default = "default_out")]
    pub from_port: String,
    pub to: String,
    #[serde(default = "default_in")]
    pub to_port: String,
    #[serde(default)]
    pub capacity: usize,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

fn default_out() -> String {
    "out".to_string()
}

fn default_in() -> String {
    "in".to_string()
}
