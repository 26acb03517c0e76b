use thiserror::Error;

/// Configuration errors reported while building a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown handler `{0}`")]
    UnknownHandler(String),

    #[error("unknown component `{0}`")]
    UnknownComponent(String),

    #[error("output port `{component}.{port}` already has a consumer")]
    OutputAlreadyConnected { component: String, port: String },

    #[error("input port `{component}.{port}` is already connected")]
    InputAlreadyConnected { component: String, port: String },

    #[error("component `{component}` has no port named `{port}`")]
    UnknownPort { component: String, port: String },

    #[error("graph has components but none of them can start")]
    NoStarter,

    #[error("invalid graph configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("connection is closed")]
    Closed,
}

/// Malformed worker argument contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("missing worker argument `{0}`")]
    MissingArgument(&'static str),

    #[error("invalid worker timeout `{0}`")]
    InvalidTimeout(String),

    #[error("unexpected worker argument `{0}`")]
    UnexpectedArgument(String),
}
