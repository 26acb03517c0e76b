pub mod handler;
pub mod ip;
pub mod port;
pub mod queue;

pub use handler::{Handler, HandlerRef};
pub use ip::{InformationPacket, IpKind};
pub use port::{InputPort, Inputs, OutputPort, Outputs};
pub use queue::Queue;
