use thiserror::Error;

/// Errors raised while setting up or running a buffer-queue engine.
///
/// Calling `start` on a running engine or `stop` on a stopped one is not an
/// error and has no variant here: engines absorb those as no-ops.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Queue create/enqueue/start/stop/dispose failure.
    #[error("device error: {0}")]
    Device(String),

    /// Container create/open/read/write/close failure.
    #[error("file error: {0}")]
    File(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl EngineError {
    pub fn is_device(&self) -> bool {
        matches!(self, Self::Device(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }
}
