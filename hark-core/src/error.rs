use thiserror::Error;

/// All errors produced by hark-core.
#[derive(Debug, Error)]
pub enum HarkError {
    /// The driver-reported model ceiling is reached, or an external capture
    /// holds the microphone. The caller may retry once resources free up
    /// (a global `on_resources_available` will be delivered).
    #[error("resource contention: model ceiling reached or capture in use")]
    ResourceContention,

    /// The bound driver revision has no entry point for this operation.
    #[error("operation not supported by driver revision {revision}")]
    NotSupported { revision: crate::hal::DriverRevision },

    /// The driver accepted the call but reported a failure status.
    #[error("driver returned status {status}")]
    Driver { status: i32 },

    /// The transport to the driver process failed outright. Not retried
    /// internally; the owner of the recovery action decides what happens next.
    #[error("driver transport failure: {0}")]
    Transport(String),

    /// The endpoint matched none of the supported interface revisions.
    #[error("driver implements no supported interface revision")]
    NoSupportedRevision,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HarkError>;
