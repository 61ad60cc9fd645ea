//! Error types and handling for the patch pipeline
//!
//! This module defines all error types used throughout the system. The
//! taxonomy follows the failure policy of the patch lifecycle: transient
//! conditions are retried before they ever become errors, unsafe edits and
//! rejected compiles are outcomes rather than errors, and everything here is
//! either fatal for one attempt or fatal for the session - never for the
//! patched process.

use std::path::PathBuf;
use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the patch pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Baseline snapshot errors
    #[error("Baseline error: {0}")]
    Baseline(#[from] BaselineError),

    /// Patch production errors
    #[error("Patch production error: {0}")]
    Produce(#[from] ProduceError),

    /// Channel transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Consumer-side apply errors
    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Errors reported by the project collaborator
    #[error("Project error: {0}")]
    Project(String),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prometheus metrics errors
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Internal system errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Baseline snapshot errors
#[derive(Error, Debug)]
pub enum BaselineError {
    /// The on-disk module image could not be read (missing or locked)
    #[error("Module image unavailable at {path}: {source}")]
    Unavailable {
        /// Path of the module image that could not be read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The on-disk module image is not a loadable module
    #[error("Module image at {path} is not a loadable module")]
    WrongFormat {
        /// Path of the rejected module image
        path: PathBuf,
    },
}

/// Patch production errors
#[derive(Error, Debug)]
pub enum ProduceError {
    /// A changed file stayed unreadable through the whole retry budget
    #[error("File unavailable after {attempts} attempts: {path}")]
    FileUnavailable {
        /// Path of the unreadable file
        path: PathBuf,
        /// Number of read attempts made before giving up
        attempts: u32,
    },
}

/// Channel transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// The shared channel to the target process is closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The channel rejected the outbound frame
    #[error("Send failed: {0}")]
    Send(String),

    /// The channel connection could not be established
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Consumer-side apply errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ApplyError {
    /// The host runtime was not launched with hot-swap support
    #[error("Host runtime offers no hot-swap capability")]
    UnsupportedCapability,

    /// No currently loaded module matches the delta's module name
    #[error("No loaded module named {name}")]
    ModuleNotFound {
        /// Module name carried by the rejected delta
        name: String,
    },

    /// The host runtime rejected the patch
    #[error("Host runtime rejected the patch: {0}")]
    Runtime(String),
}

/// Serialization/deserialization errors
#[derive(Error, Debug)]
pub enum SerializationError {
    /// MessagePack serialization error
    #[error("MessagePack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack deserialization error
    #[error("MessagePack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a project collaborator error
    pub fn project(msg: impl Into<String>) -> Self {
        Self::Project(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error ends only the current patch attempt.
    ///
    /// The session survives these: the next file change starts a fresh
    /// attempt against the same baseline state.
    pub fn is_attempt_fatal(&self) -> bool {
        matches!(
            self,
            Error::Baseline(_) | Error::Produce(_) | Error::Apply(_) | Error::Serialization(_)
        )
    }

    /// Check if this error ends the whole patch session.
    ///
    /// A closed channel cannot deliver any further patch, so the producer's
    /// view of live code can no longer advance.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::ChannelClosed)
                | Error::Transport(TransportError::Connection(_))
                | Error::Config(_)
        )
    }
}
