pub mod component;
pub mod config;
pub mod connection;
pub mod graph;
pub mod state;
pub mod timer;

pub use component::{Component, ComponentId, StatusChange};
pub use config::{ComponentSpec, ConnectionSpec, GraphSpec, RuntimeConfig, WorkerCommand};
pub use connection::{Connection, ConnectionKind};
pub use graph::Graph;
pub use state::ComponentStatus;
pub use timer::Deferred;
