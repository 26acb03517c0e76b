pub mod core;
pub mod engine;
pub mod error;
pub mod file;
pub mod logging;
pub mod nodes;
pub mod registry;
pub mod worker;

pub use crate::core::{Handler, HandlerRef, InformationPacket, Inputs, Outputs};
pub use engine::{Component, ComponentStatus, Connection, Graph, RuntimeConfig};
pub use error::GraphError;
