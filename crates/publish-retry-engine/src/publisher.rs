use crate::PublishError;
use async_trait::async_trait;
use std::sync::Arc;

/// The remote "publish" action.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// What gets published (a message reference, a webhook payload, ...).
    type Target: Send + Sync;

    async fn publish(&self, target: &Self::Target) -> Result<(), PublishError>;
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    type Target = P::Target;

    async fn publish(&self, target: &Self::Target) -> Result<(), PublishError> {
        (**self).publish(target).await
    }
}

/// One event's delivery request.
#[derive(Debug, Clone)]
pub struct DeliveryJob<T> {
    /// Dedup key; also the ledger key.
    pub event_id: String,
    /// Destination label stored with failure records.
    pub label: String,
    pub target: T,
}

impl<T> DeliveryJob<T> {
    pub fn new(event_id: impl Into<String>, label: impl Into<String>, target: T) -> Self {
        Self {
            event_id: event_id.into(),
            label: label.into(),
            target,
        }
    }
}
