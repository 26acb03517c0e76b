pub mod host;
pub mod protocol;
pub mod runtime;

pub use host::WorkerLink;
pub use protocol::{HostMessage, WirePacket, WorkerArgs, WorkerMessage};
pub use runtime::run;
