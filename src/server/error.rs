use thiserror::Error;

/// Failure to bring the server up.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MobilizeError {
    #[error("server is already mobilized")]
    AlreadyMobilized,

    #[error("transport failed to bind port {port}")]
    BindFailed { port: u16 },
}
