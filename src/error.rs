//! ## USBTMC Errors
//!
//! The errors used throughout the crate.
//!

/// Result alias over the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed resource string: invalid {field} `{value}`")]
    InvalidResource { field: &'static str, value: String },
    #[error("device not found")]
    DeviceNotFound,
    #[error("device is not compatible with USBTMC")]
    DeviceIncompatible,
    #[error("specified interface not found")]
    InterfaceNotFound,
    #[error("specified interface setting not found")]
    InterfaceSettingNotFound,
    #[error("bulk out endpoint not found")]
    BulkOutEndpointNotFound,
    #[error("bulk in endpoint not found")]
    BulkInEndpointNotFound,
    #[error("control request unexpectedly failed with status {0:#04x}")]
    StatusUnexpectedFailure(u8),
    #[error("short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },
    #[error("short write: transport accepted {accepted} of {expected} bytes")]
    ShortWrite { expected: usize, accepted: usize },
    #[error("buffer too small: device declared {declared} bytes, {copied} fit in the buffer")]
    BufferTooSmall { declared: usize, copied: usize },
    #[error("maximum transfer size {0} cannot hold a header and an aligned payload")]
    InvalidTransferSize(usize),
    #[error("invalid bulk in header: {0}")]
    InvalidHeader(&'static str),
    #[error("bTag mismatch: sent {expected}, device answered {received}")]
    TagMismatch { expected: u8, received: u8 },
    #[error("transfer interrupted after {written} payload bytes")]
    PartialWrite {
        written: usize,
        #[source]
        source: Box<Error>,
    },
    #[error(transparent)]
    Transport(anyhow::Error),
    #[error("response is not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("device is closed")]
    Closed,
    #[error("a default driver is already registered")]
    DriverAlreadyRegistered,
    #[error("no default driver registered")]
    NoDriverRegistered,
}

impl Error {
    /// Payload bytes that reached the device before the error, if known.
    pub fn bytes_written(&self) -> usize {
        match self {
            Error::PartialWrite { written, .. } => *written,
            _ => 0,
        }
    }
}

