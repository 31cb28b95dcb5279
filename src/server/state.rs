//! Application State
//!
//! Shared state accessible by all HTTP handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::{HubSettings, TransformKind};
use crate::hub::{EchoTransform, EnvelopeTransform, Registry, Transform};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Session registry every connection is admitted into
    pub registry: Arc<Registry>,
    /// Transform handed to every admitted session
    pub transform: Arc<dyn Transform>,
    /// Group for connections that name none
    pub default_group: String,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        registry: Arc<Registry>,
        transform: Arc<dyn Transform>,
        default_group: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            transform,
            default_group: default_group.into(),
            start_time: Instant::now(),
        }
    }

    /// Build the registry and transform described by the `[hub]` section
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_settings(settings: &HubSettings) -> Self {
        let transform: Arc<dyn Transform> = match settings.transform {
            TransformKind::Echo => Arc::new(EchoTransform),
            TransformKind::Envelope => Arc::new(EnvelopeTransform),
        };
        Self::new(
            Registry::with_config(settings.hub_config()),
            transform,
            settings.default_group.clone(),
        )
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
