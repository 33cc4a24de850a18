//! Error types for the hangouts engine
//!
//! This module contains all error types used throughout the engine: storage,
//! reconciliation, connection, fetch and channel-lifecycle errors, and the
//! `HangoutError` type that unifies them all.

use crate::channel::ChannelState;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Durable store errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Durable store is not available")]
    NotAvailable,
    #[error("Invalid storage key: {key}")]
    InvalidKey { key: String },
    #[error("Stored value under {key} is not well-formed: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage error: {0}")]
    Generic(String),
}

/// Errors raised while folding an inbound frame into local state
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Malformed inbound frame: {reason}")]
    MalformedFrame { reason: String },
    #[error("Inbound hangout has an empty peer identity")]
    EmptyPeer,
}

/// Channel-level failures
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },
    #[error("Channel is not open (current state: {state})")]
    NotOpen { state: ChannelState },
    #[error("Send failed: {reason}")]
    SendFailed { reason: String },
    #[error("Connection lost: {reason}")]
    Lost { reason: String },
}

/// Peer search failures
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Search request failed: {reason}")]
    RequestFailed { reason: String },
    #[error("Search endpoint returned status {status}")]
    Status { status: u16 },
    #[error("Search response could not be decoded: {reason}")]
    Decode { reason: String },
}

/// Invalid channel lifecycle transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid channel transition from {from} on {event}")]
pub struct LifecycleError {
    pub from: ChannelState,
    pub event: String,
}

// ----------------------------------------------------------------------------
// Unified Error
// ----------------------------------------------------------------------------

/// Core error type for the hangouts engine
#[derive(Debug, thiserror::Error)]
pub enum HangoutError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Channel communication error between engine tasks
    #[error("Channel error: {message}")]
    Channel { message: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl HangoutError {
    /// Create a generic storage error
    pub fn storage_error<T: Into<String>>(message: T) -> Self {
        HangoutError::Storage(StorageError::Generic(message.into()))
    }

    /// Create a channel error with a message
    pub fn channel_error<T: Into<String>>(message: T) -> Self {
        HangoutError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        HangoutError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create a malformed frame error
    pub fn malformed_frame<T: Into<String>>(reason: T) -> Self {
        HangoutError::Reconcile(ReconcileError::MalformedFrame {
            reason: reason.into(),
        })
    }

    /// Whether the engine loop must stop after this error
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            HangoutError::Channel { .. } | HangoutError::Configuration { .. }
        )
    }
}

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, HangoutError>;
