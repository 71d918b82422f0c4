pub type TilewireResult<T> = Result<T, TilewireError>;

#[derive(thiserror::Error, Debug)]
pub enum TilewireError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("truncated stream: {0}")]
    TruncatedStream(String),

    #[error("display sink error: {0}")]
    Sink(String),

    #[error("process error: {0}")]
    Process(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TilewireError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn truncated(msg: impl Into<String>) -> Self {
        Self::TruncatedStream(msg.into())
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process(msg.into())
    }

    /// True for the end-of-stream-mid-chunk condition the driver downgrades
    /// to an early-end summary instead of propagating.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::TruncatedStream(_))
    }
}
