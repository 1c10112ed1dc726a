// Error types reported by every synchronous connection operation
use crate::types::Endpoint;
use std::io;
use thiserror::Error;

/// Plain classification of an [`Error`], convenient for matching and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    AlreadyConnected,
    SocketCreateFailed,
    ConnectFailed,
    NotConnected,
    SendFailed,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("connection is already established")]
    AlreadyConnected,

    #[error("socket creation failed: {0}")]
    SocketCreateFailed(#[source] io::Error),

    #[error("connect to {endpoint} failed: {source}")]
    ConnectFailed {
        endpoint: Endpoint,
        #[source]
        source: io::Error,
    },

    #[error("not connected")]
    NotConnected,

    #[error("send failed after {written} bytes: {source}")]
    SendFailed {
        written: usize,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::AlreadyConnected => ErrorKind::AlreadyConnected,
            Error::SocketCreateFailed(_) => ErrorKind::SocketCreateFailed,
            Error::ConnectFailed { .. } => ErrorKind::ConnectFailed,
            Error::NotConnected => ErrorKind::NotConnected,
            Error::SendFailed { .. } => ErrorKind::SendFailed,
        }
    }

    /// Bytes that reached the transport before the failure. Only a
    /// `SendFailed` can have a non-zero count.
    pub fn bytes_written(&self) -> usize {
        match self {
            Error::SendFailed { written, .. } => *written,
            _ => 0,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_failure_reports_partial_count() {
        let err = Error::SendFailed {
            written: 7,
            source: io::Error::from(io::ErrorKind::BrokenPipe),
        };
        assert_eq!(err.kind(), ErrorKind::SendFailed);
        assert_eq!(err.bytes_written(), 7);
        assert!(err.to_string().starts_with("send failed after 7 bytes"));
        assert_eq!(Error::NotConnected.bytes_written(), 0);
    }

    #[test]
    fn connect_failure_names_endpoint() {
        let endpoint = Endpoint::new("127.0.0.1", 9000).unwrap();
        let err = Error::ConnectFailed {
            endpoint,
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(err.kind(), ErrorKind::ConnectFailed);
        assert!(err.to_string().contains("127.0.0.1:9000"));
    }
}
