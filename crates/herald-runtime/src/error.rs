#![forbid(unsafe_code)]

//! Error types for the runtime.
//!
//! Template anomalies are not errors (unknown tokens stay literal) and an
//! empty weighted pool is a programming error that panics, so neither appears
//! here.

use std::fmt;
use std::time::Duration;

/// Result alias for broadcaster operations.
pub type BroadcastResult<T> = Result<T, BroadcastError>;

/// A descriptor or configuration file that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// TOML syntax or shape error.
    Parse(String),
    /// A content-set has an empty id.
    EmptyId,
    /// A content-set has no messages.
    NoMessages(String),
    /// A content-set interval converts to zero ticks.
    ZeroInterval(String),
    /// Two content-sets share an id.
    DuplicateId(String),
    /// A weighted alternative set has no entry with positive weight.
    NoAlternatives,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "config parse error: {msg}"),
            Self::EmptyId => write!(f, "content-set id must not be empty"),
            Self::NoMessages(id) => write!(f, "content-set '{id}' has no messages"),
            Self::ZeroInterval(id) => write!(f, "content-set '{id}' has a zero interval"),
            Self::DuplicateId(id) => write!(f, "content-set '{id}' is defined more than once"),
            Self::NoAlternatives => write!(f, "no alternative has a positive weight"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

/// Failure of a main-context hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffError {
    /// Requested from the main context itself, which would deadlock.
    CalledFromMain,
    /// The main context did not service the request in time.
    TimedOut(Duration),
    /// The scheduler shut down before the request was serviced.
    Cancelled,
}

impl fmt::Display for HandoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CalledFromMain => {
                write!(f, "main-context hand-off requested from the main context")
            }
            Self::TimedOut(after) => write!(f, "main-context hand-off timed out after {after:?}"),
            Self::Cancelled => write!(f, "main-context hand-off cancelled by shutdown"),
        }
    }
}

impl std::error::Error for HandoffError {}

/// Errors surfaced by [`Broadcaster`](crate::broadcast::Broadcaster).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// A descriptor failed validation.
    Config(ConfigError),
    /// A content-set with this id is already running.
    AlreadyRunning(String),
}

impl fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid content-set: {e}"),
            Self::AlreadyRunning(id) => write!(f, "content-set '{id}' is already running"),
        }
    }
}

impl std::error::Error for BroadcastError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::AlreadyRunning(_) => None,
        }
    }
}

impl From<ConfigError> for BroadcastError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
