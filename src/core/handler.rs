use std::fmt;

use super::port::{Inputs, Outputs};

/// Work performed by a component each time it executes.
///
/// A handler reads from its inputs and sends zero or more packets on its
/// outputs. It may return before its work is done: asynchronous handlers
/// move clones of the port collections into a `spawn_local` task and send
/// from there.
pub trait Handler {
    fn process(&mut self, input: &Inputs, output: &Outputs);
}

impl<F> Handler for F
where
    F: FnMut(&Inputs, &Outputs),
{
    fn process(&mut self, input: &Inputs, output: &Outputs) {
        self(input, output)
    }
}

/// How a component's handler is resolved when it is loaded.
pub enum HandlerRef {
    /// A handler registered under this id; may run in an isolated worker.
    Named(String),
    /// An in-process handler value; always runs in-process.
    Local(Box<dyn Handler>),
}

impl HandlerRef {
    pub fn local(handler: impl Handler + 'static) -> Self {
        Self::Local(Box::new(handler))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            Self::Local(_) => None,
        }
    }
}

impl From<&str> for HandlerRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for HandlerRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Local(_) => f.write_str("Local(..)"),
        }
    }
}
