//! Credential port
//!
//! The API token lives in the host's secure storage; the sync core only
//! asks whether one exists and reads it right before a run.

/// Read-only access to the API token
pub trait SecretProvider: Send + Sync {
    /// Whether a token is configured
    fn has_token(&self) -> bool;

    /// Read the token, None if absent
    fn read_token(&self) -> Option<String>;
}
