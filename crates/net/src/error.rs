use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },

    #[error("mio poll error: {0}")]
    Poll(#[source] std::io::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("a line exceeded the maximum input length")]
    LineTooLong,

    #[error("a websocket frame exceeded the maximum payload size")]
    FrameTooLarge,

    #[error("malformed websocket frame")]
    MalformedFrame,

    #[error("not a websocket upgrade request")]
    NotAnUpgradeRequest,
}

pub type NetResult<T> = Result<T, NetError>;
