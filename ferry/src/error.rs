use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Wrong usage of an operation, e.g. too many positional arguments.
    #[error("{0}")]
    Argument(String),

    #[error("could not connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("could not listen on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Malformed, truncated or oversized wire message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The connection broke after it was established.
    #[error("transfer failed: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub fn argument(msg: impl Into<String>) -> Self {
        Self::Argument(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Everything but a usage error may be reported and skipped by a looping pipeline.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Argument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_argument_errors_are_fatal() {
        assert!(!Error::argument("-send takes at most two arguments").is_recoverable());
        assert!(Error::protocol("truncated message").is_recoverable());
        assert!(
            Error::Bind {
                port: 5678,
                source: io::Error::from(io::ErrorKind::AddrInUse),
            }
            .is_recoverable()
        );
        assert!(
            Error::Connect {
                endpoint: "127.0.0.1:5678".to_owned(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }
            .is_recoverable()
        );
    }

    #[test]
    fn messages_name_the_endpoint() {
        let e = Error::Bind {
            port: 80,
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert!(e.to_string().starts_with("could not listen on port 80"));
    }
}
