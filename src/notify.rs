//! Notification dispatch.
//!
//! Events are handed over after their transaction commits. Delivery is best
//! effort: a failed publish is logged and never surfaces to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::events::DomainEvent;
use crate::{Result, ShopError};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &DomainEvent) -> Result<()>;
}

pub type DynNotifier = Arc<dyn Notifier>;

/// Publishes JSON events on `<prefix>.<event subject>`.
#[derive(Clone)]
pub struct NatsNotifier {
    client: async_nats::Client,
    prefix: String,
}

impl NatsNotifier {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }

    pub fn subject_for(&self, event: &DomainEvent) -> String {
        format!("{}.{}", self.prefix, event.subject())
    }
}

#[async_trait]
impl Notifier for NatsNotifier {
    async fn notify(&self, event: &DomainEvent) -> Result<()> {
        let payload = serde_json::to_vec(event).map_err(|e| ShopError::Internal(e.to_string()))?;
        self.client
            .publish(self.subject_for(event), payload.into())
            .await
            .map_err(|e| ShopError::Internal(format!("publish failed: {e}")))
    }
}

/// Used when no broker is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &DomainEvent) -> Result<()> {
        info!(subject = event.subject(), ?event, "domain event");
        Ok(())
    }
}

/// Fire-and-forget delivery of committed events.
pub async fn dispatch(notifier: &dyn Notifier, events: &[DomainEvent]) {
    for event in events {
        if let Err(e) = notifier.notify(event).await {
            warn!(subject = event.subject(), error = %e, "notification dispatch failed");
        }
    }
}
