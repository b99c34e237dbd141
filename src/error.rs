//! Error taxonomy for the recording pipeline

use thiserror::Error;

use crate::hal::PortId;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between the sensor and the output file.
///
/// Construction-time failures (`CreationFailed`, `DeviceNotFound`,
/// `UnsupportedDevice`, `FormatRejected`) abort startup. `PoolExhausted` is
/// transient backpressure and callers retry later. `Hardware` and `Io`
/// surface asynchronously and put the pipeline into draining.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not create hardware {what}")]
    CreationFailed { what: &'static str },

    #[error("camera {index} not present")]
    DeviceNotFound { index: u32 },

    #[error("unsupported sensor model '{model}'")]
    UnsupportedDevice { model: String },

    #[error("format rejected on port {port:?}")]
    FormatRejected { port: PortId },

    #[error("buffer pool exhausted")]
    PoolExhausted,

    #[error("hardware error event (code {0:#x})")]
    Hardware(u32),

    #[error("output sink write failed")]
    Io(#[from] std::io::Error),
}

/// Lightweight discriminant, used where the full error has already been
/// handed to the caller (e.g. the pipeline's `Failed` state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    CreationFailed,
    DeviceNotFound,
    UnsupportedDevice,
    FormatRejected,
    PoolExhausted,
    Hardware,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::CreationFailed { .. } => ErrorKind::CreationFailed,
            Error::DeviceNotFound { .. } => ErrorKind::DeviceNotFound,
            Error::UnsupportedDevice { .. } => ErrorKind::UnsupportedDevice,
            Error::FormatRejected { .. } => ErrorKind::FormatRejected,
            Error::PoolExhausted => ErrorKind::PoolExhausted,
            Error::Hardware(_) => ErrorKind::Hardware,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}
