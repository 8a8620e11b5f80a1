//! Error handling for wnp-relay.
//!
//! Every fallible operation in the crate returns [`Result`], whose error
//! carries an [`ErrorKind`] category and the underlying cause.
//!
//! Categories follow the gRPC status codes, which maps cleanly onto the
//! three families of failures the relay deals with:
//! * Transport failures (listener not running, socket reset) are
//!   `Unavailable`, `Aborted` or `Cancelled` and are always retried
//! * Protocol failures (malformed command, capability error) are
//!   `InvalidArgument`, `FailedPrecondition` or `Unknown` and are reported
//!   back over the wire
//! * Configuration failures are `InvalidArgument` or `NotFound`
//!
//! # Example
//!
//! ```rust
//! use wnp_relay::error::{Error, ErrorKind, Result};
//!
//! fn parse_volume(data: &str) -> Result<u8> {
//!     let volume = data.trim().parse::<u8>()?;
//!     if volume > 100 {
//!         return Err(Error::out_of_range(format!("volume {volume} above 100")));
//!     }
//!     Ok(volume)
//! }
//! ```

#![allow(clippy::enum_glob_use)]

use std::fmt;
use thiserror::Error;

/// Main error type combining error kind and details.
#[derive(Debug)]
pub struct Error {
    /// Classification of the error
    pub kind: ErrorKind,

    /// Details of the underlying error
    pub error: Box<dyn std::error::Error + Send + Sync>,
}

impl Error {
    /// Attempts to downcast the underlying error to a concrete type.
    #[must_use]
    pub fn downcast<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    /// Returns `true` for failures of the socket transport itself.
    ///
    /// These are recovered by reconnecting and never surface on the wire.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Unavailable
                | ErrorKind::Aborted
                | ErrorKind::Cancelled
                | ErrorKind::DataLoss
                | ErrorKind::DeadlineExceeded
        )
    }
}

/// Standard result type for wnp-relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories based on gRPC status codes.
///
/// See [gRPC status codes](https://github.com/googleapis/googleapis/blob/master/google/rpc/code.proto)
/// for the original definitions.
#[expect(clippy::module_name_repetitions)]
#[derive(Clone, Copy, Debug, Eq, Error, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u32)]
pub enum ErrorKind {
    #[error("operation was cancelled")]
    Cancelled = 1,

    #[error("unknown error")]
    Unknown = 2,

    #[error("invalid argument specified")]
    InvalidArgument = 3,

    #[error("operation timed out")]
    DeadlineExceeded = 4,

    #[error("not found")]
    NotFound = 5,

    #[error("attempt to create what already exists")]
    AlreadyExists = 6,

    #[error("permission denied")]
    PermissionDenied = 7,

    #[error("resource has been exhausted")]
    ResourceExhausted = 8,

    #[error("invalid state")]
    FailedPrecondition = 9,

    #[error("operation aborted")]
    Aborted = 10,

    #[error("out of range")]
    OutOfRange = 11,

    #[error("not implemented")]
    Unimplemented = 12,

    #[error("internal error")]
    Internal = 13,

    #[error("service unavailable")]
    Unavailable = 14,

    #[error("unrecoverable data loss or corruption")]
    DataLoss = 15,
}

macro_rules! constructor {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        pub fn $name<E>(error: E) -> Self
        where
            E: Into<Box<dyn std::error::Error + Send + Sync>>,
        {
            Self {
                kind: ErrorKind::$kind,
                error: error.into(),
            }
        }
    };
}

impl Error {
    /// Creates a new error with specified kind and details.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let err = Error::new(ErrorKind::NotFound, "no player selected");
    /// assert_eq!(err.kind, ErrorKind::NotFound);
    /// ```
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            error: error.into(),
        }
    }

    constructor!(
        /// Creates an error for operations that were interrupted mid-execution,
        /// such as a socket reset by the listener.
        aborted => Aborted
    );
    constructor!(
        /// Creates an error for duplicate resource creation attempts.
        already_exists => AlreadyExists
    );
    constructor!(
        /// Creates an error for cancelled operations.
        cancelled => Cancelled
    );
    constructor!(
        /// Creates an error for data lost in transit.
        data_loss => DataLoss
    );
    constructor!(
        /// Creates an error for operations that exceeded their deadline.
        deadline_exceeded => DeadlineExceeded
    );
    constructor!(
        /// Creates an error for operations that failed due to current state,
        /// e.g. a command arriving while no site is ready.
        failed_precondition => FailedPrecondition
    );
    constructor!(
        /// Creates an error for unexpected internal failures.
        internal => Internal
    );
    constructor!(
        /// Creates an error for malformed input, e.g. an undecodable command.
        invalid_argument => InvalidArgument
    );
    constructor!(
        /// Creates an error for missing resources.
        not_found => NotFound
    );
    constructor!(
        /// Creates an error for values outside their valid range.
        out_of_range => OutOfRange
    );
    constructor!(
        /// Creates an error for permission denied conditions.
        permission_denied => PermissionDenied
    );
    constructor!(
        /// Creates an error for exhausted resources.
        resource_exhausted => ResourceExhausted
    );
    constructor!(
        /// Creates an error for unreachable services, such as a listener
        /// that is not running.
        unavailable => Unavailable
    );
    constructor!(
        /// Creates an error for unimplemented features.
        unimplemented => Unimplemented
    );
    constructor!(
        /// Creates an error that doesn't fit any other category.
        unknown => Unknown
    );
}

/// Returns the underlying error source.
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

/// Formats the error for display, showing both kind and details.
///
/// Format: "{kind}: {details}"
impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: ", self.kind)?;
        self.error.fmt(fmt)
    }
}

/// Converts IO errors into appropriate error kinds.
///
/// Maps standard IO errors to their logical equivalents:
/// * `ConnectionRefused` -> `Unavailable` (listener not running)
/// * `ConnectionReset` -> `Aborted` (listener went away)
/// * `NotFound` -> `NotFound` (configuration file missing)
/// * etc.
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            NotFound => Self::not_found(err),
            PermissionDenied => Self::permission_denied(err),
            AddrInUse | AlreadyExists => Self::already_exists(err),
            AddrNotAvailable | ConnectionRefused | NotConnected => Self::unavailable(err),
            BrokenPipe | ConnectionReset | ConnectionAborted => Self::aborted(err),
            Interrupted | WouldBlock => Self::cancelled(err),
            UnexpectedEof => Self::data_loss(err),
            TimedOut => Self::deadline_exceeded(err),
            InvalidInput | InvalidData => Self::invalid_argument(err),
            WriteZero => Self::resource_exhausted(err),
            _ => Self::unknown(err),
        }
    }
}

/// Converts HTTP client errors into appropriate error kinds.
///
/// * Body errors -> `DataLoss`
/// * Decode errors -> `InvalidArgument`
/// * Connect errors -> `Unavailable`
/// * Status errors -> `FailedPrecondition`
/// * Timeout errors -> `DeadlineExceeded`
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_body() {
            return Self::data_loss(err);
        }

        if err.is_decode() {
            return Self::invalid_argument(err);
        }

        if err.is_builder() {
            return Self::internal(err);
        }

        if err.is_connect() {
            return Self::unavailable(err);
        }

        if err.is_redirect() {
            return Self::resource_exhausted(err);
        }

        if err.is_status() {
            return Self::failed_precondition(err);
        }

        if err.is_timeout() {
            return Self::deadline_exceeded(err);
        }

        Self::unknown(err)
    }
}

/// Converts version parsing errors to `InvalidArgument`.
impl From<semver::Error> for Error {
    fn from(err: semver::Error) -> Self {
        Self::invalid_argument(err)
    }
}

/// Converts WebSocket errors into appropriate error kinds.
///
/// * `ConnectionClosed` -> `Cancelled`
/// * `AlreadyClosed` -> `Unavailable`
/// * `Io` -> mapped like any IO error
/// * `Capacity` -> `OutOfRange`
/// * handshake, URL and protocol failures -> `Unavailable`
impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error::*;
        match err {
            ConnectionClosed => Self::cancelled(err),
            AlreadyClosed => Self::unavailable(err),
            Io(err) => err.into(),
            Capacity(err) => Self::out_of_range(err),
            WriteBufferFull(..) => Self::resource_exhausted(err.to_string()),
            AttackAttempt => Self::permission_denied(err),
            other => Self::unavailable(other),
        }
    }
}

/// Converts JSON errors through IO error mapping.
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        std::io::Error::from(err).into()
    }
}

/// Converts configuration parsing errors to `InvalidArgument`.
impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts URL parsing errors to `Internal`.
impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::internal(e.to_string())
    }
}

/// Converts integer parsing errors to `InvalidArgument`.
impl From<std::num::ParseIntError> for Error {
    fn from(e: std::num::ParseIntError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

/// Converts float parsing errors to `InvalidArgument`.
impl From<std::num::ParseFloatError> for Error {
    fn from(e: std::num::ParseFloatError) -> Self {
        Self::invalid_argument(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_connection_is_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::from(io);
        assert_eq!(err.kind, ErrorKind::Unavailable);
        assert!(err.is_transport());
    }

    #[test]
    fn parse_failure_is_protocol() {
        let err = Error::from("abc".parse::<u8>().unwrap_err());
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(!err.is_transport());
    }

    #[test]
    fn display_shows_kind_and_details() {
        let err = Error::failed_precondition("site not ready");
        assert_eq!(err.to_string(), "invalid state: site not ready");
    }
}
