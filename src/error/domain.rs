//! Domain-specific error types using `thiserror`.
//!
//! Every failure that crosses the adapter boundary is one of these enums.
//! None of them are raised as panics; callers match on the variant to show
//! a specific diagnostic.

use std::result::Result as StdResult;

use {reqwest::Error as ReqwestError, serde_json::Error as SerdeJsonError, thiserror::Error};

/// Errors raised while discovering the host's state container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// The root DOM element never appeared before the timeout.
    #[error("DOM element not found: {selector}")]
    DomElementNotFound { selector: String },
    /// The root element appeared, but no discovery strategy produced a store.
    #[error("Redux store not found after trying: {}", attempted.join(", "))]
    StoreNotFound { attempted: Vec<String> },
}

/// Errors surfaced by the adapter facade and its reconcilers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// State container discovery failed.
    #[error(transparent)]
    Locator(#[from] LocatorError),
    /// No song is active, or the active song has no readable metadata.
    #[error("Song not found: {reason}")]
    SongNotFound { reason: String },
    /// Timeline information cannot be derived yet.
    #[error("Timeline not available")]
    TimelineNotAvailable,
    /// Two state slices disagree about the active track.
    #[error("Inconsistent state: expected track {expected}, found {found}")]
    InconsistentState { expected: String, found: String },
    /// The host reported a version this crate cannot drive.
    #[error("Unsupported host version: {version}")]
    UnsupportedVersion { version: String },
    /// A command or query was issued before `initialize` succeeded.
    #[error("Adapter not initialized")]
    NotInitialized,
    /// A host primitive the command needs is missing.
    #[error("Host capability unavailable: {capability}")]
    CapabilityUnavailable { capability: String },
}

/// Errors raised while talking to the native transport-control bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Failed to serialize an envelope or parse a reply.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerdeJsonError),
    /// The native side returned no reply at all.
    #[error("No reply from native command {command}")]
    NoReply { command: String },
    /// The native side reported an error status.
    #[error("Native command failed: {message}")]
    Rejected { message: String },
}

/// Errors raised while fetching or transcoding cover artwork.
#[derive(Error, Debug)]
pub enum ArtworkError {
    /// The HTTP client could not be built or the request failed.
    #[error("Artwork request failed: {0}")]
    Http(#[from] ReqwestError),
    /// The image proxy answered with a non-success status.
    #[error("Artwork request returned status {status}")]
    Status { status: u16 },
    /// The response carried no image data.
    #[error("Artwork response was empty")]
    EmptyBody,
}

/// Result type for facade queries and commands.
pub type Result<T> = StdResult<T, AdapterError>;

#[cfg(test)]
mod tests {
    use crate::error::domain::{AdapterError, ArtworkError, LocatorError};

    #[test]
    fn test_locator_error_display() {
        let dom_error = LocatorError::DomElementNotFound {
            selector: "#root".to_string(),
        };
        assert_eq!(dom_error.to_string(), "DOM element not found: #root");

        let store_error = LocatorError::StoreNotFound {
            attempted: vec!["fixed-path".to_string(), "fiber-walk".to_string()],
        };
        assert_eq!(
            store_error.to_string(),
            "Redux store not found after trying: fixed-path, fiber-walk"
        );
    }

    #[test]
    fn test_adapter_error_display() {
        let inconsistent = AdapterError::InconsistentState {
            expected: "42".to_string(),
            found: "7".to_string(),
        };
        assert_eq!(
            inconsistent.to_string(),
            "Inconsistent state: expected track 42, found 7"
        );

        let wrapped: AdapterError = LocatorError::DomElementNotFound {
            selector: "#root".to_string(),
        }
        .into();
        assert_eq!(wrapped.to_string(), "DOM element not found: #root");
        assert_eq!(
            AdapterError::TimelineNotAvailable.to_string(),
            "Timeline not available"
        );
    }

    #[test]
    fn test_artwork_error_display() {
        assert_eq!(
            ArtworkError::Status { status: 404 }.to_string(),
            "Artwork request returned status 404"
        );
        assert_eq!(ArtworkError::EmptyBody.to_string(), "Artwork response was empty");
    }
}
