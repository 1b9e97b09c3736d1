use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;

use crate::stomp::frame::Headers;

#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Error related to the underlying transport (network drop, remote close, failed open)
    Transport,
    /// Error reported by the server through a STOMP `ERROR` frame
    Protocol,
    /// Error related to invalid input or configuration
    Validation,
    /// Internal error from dependencies
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    backtrace: Backtrace,
}

impl Error {
    pub fn with_source<S: StdError + Send + Sync + 'static>(kind: Kind, source: S) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
            backtrace: Backtrace::capture(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    #[must_use]
    pub fn inner(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        let e = self.source.as_deref()?;
        e.downcast_ref::<E>()
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Validation {
            reason: message.into(),
        }
        .into()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "{:?}: {}", self.kind, src),
            None => write!(f, "{:?}", self.kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct Validation {
    pub reason: String,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid: {}", self.reason)
    }
}

impl StdError for Validation {}

/// A STOMP `ERROR` frame received from the server.
///
/// `message` is the frame body, or `STOMP ERROR` when the server sent none. The full header set
/// is kept so callers can inspect e.g. the `message` or `receipt-id` headers.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ServerError {
    pub message: String,
    pub headers: Headers,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server error: {}", self.message)
    }
}

impl StdError for ServerError {}

impl From<Validation> for Error {
    fn from(err: Validation) -> Self {
        Error::with_source(Kind::Validation, err)
    }
}

impl From<ServerError> for Error {
    fn from(err: ServerError) -> Self {
        Error::with_source(Kind::Protocol, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::with_source(Kind::Internal, e)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::with_source(Kind::Validation, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_display_should_succeed() {
        let error = ServerError {
            message: "destination not allowed".to_owned(),
            headers: Headers::new(),
        };

        assert_eq!(error.to_string(), "server error: destination not allowed");
    }

    #[test]
    fn server_error_into_error_should_be_protocol() {
        let error: Error = ServerError {
            message: "boom".to_owned(),
            headers: Headers::new(),
        }
        .into();

        assert_eq!(error.kind(), Kind::Protocol);
        assert!(error.to_string().contains("boom"), "display carries the body");
        assert!(error.downcast_ref::<ServerError>().is_some(), "source is kept");
    }

    #[test]
    fn validation_should_succeed() {
        let error = Error::validation("outbound queue is full");

        assert_eq!(error.kind(), Kind::Validation);
        assert_eq!(error.to_string(), "Validation: invalid: outbound queue is full");
    }
}
