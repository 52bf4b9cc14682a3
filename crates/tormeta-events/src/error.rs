//! Live feed error primitives.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

/// Result wrapper for live feed operations.
pub type EventsResult<T> = Result<T, EventsError>;

/// Errors raised while preparing live feed frames.
#[derive(Debug)]
pub enum EventsError {
    /// Encoding a message to JSON failed.
    Encode {
        /// Message kind being encoded.
        kind: &'static str,
        /// Underlying serde error.
        source: serde_json::Error,
    },
}

impl Display for EventsError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode { .. } => formatter.write_str("failed to encode live feed message"),
        }
    }
}

impl Error for EventsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode { source, .. } => Some(source),
        }
    }
}

/// Failure delivering a frame to a single subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberError {
    /// The receiving side of the subscriber has gone away.
    Closed,
    /// The subscriber did not accept the frame in time.
    TimedOut {
        /// Send budget that elapsed.
        after: Duration,
    },
}

impl Display for SubscriberError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => formatter.write_str("subscriber channel closed"),
            Self::TimedOut { .. } => formatter.write_str("subscriber send timed out"),
        }
    }
}

impl Error for SubscriberError {}
