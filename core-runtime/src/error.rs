use thiserror::Error;

/// Errors raised while configuring the runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid setting, filter string or repeated initialization.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required host bridge was not injected.
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
