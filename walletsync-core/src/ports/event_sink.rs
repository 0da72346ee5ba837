//! Analytics event port
//!
//! Events are fire-and-forget: a sink must never fail the caller.

/// A named event with optional, privacy-safe context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub name: &'static str,
    pub integration: Option<String>,
    pub error_message: Option<String>,
}

impl SyncEvent {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            integration: None,
            error_message: None,
        }
    }

    pub fn with_integration(mut self, integration: impl Into<String>) -> Self {
        self.integration = Some(integration.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Destination for analytics events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

/// Sink that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: SyncEvent) {}
}
