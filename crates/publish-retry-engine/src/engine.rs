//! Delivery loop.

use crate::{DeliveryJob, DeliveryOutcome, EngineError, EngineResult, ErrorClass, Publisher, RetryPolicy};
use chrono::Utc;
use delivery_ledger::{DeliveryStore, FailureRecord};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Drives deliveries through the retry policy and records terminal outcomes.
#[derive(Debug, Clone)]
pub struct RetryEngine {
    store: DeliveryStore,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RetryEngine {
    pub fn new(store: DeliveryStore, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            store,
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn store(&self) -> &DeliveryStore {
        &self.store
    }

    /// Deliver one job.
    ///
    /// Returns the terminal outcome, which has already been written to the
    /// ledger. Returns [`EngineError::Cancelled`] if shutdown interrupts the
    /// cycle first; nothing is recorded in that case.
    pub async fn deliver<P>(
        &self,
        publisher: &P,
        job: &DeliveryJob<P::Target>,
    ) -> EngineResult<DeliveryOutcome>
    where
        P: Publisher + ?Sized,
    {
        let attempts = self.policy.attempts();

        for attempt in 0..attempts {
            let is_last = attempt + 1 == attempts;

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(EngineError::Cancelled),
                r = publisher.publish(&job.target) => r,
            };

            let err = match result {
                Ok(()) => {
                    self.store.record_success(&job.event_id, Utc::now());
                    info!(
                        event_id = %job.event_id,
                        destination = %job.label,
                        attempt = attempt + 1,
                        "published"
                    );
                    return Ok(DeliveryOutcome::Succeeded);
                }
                Err(e) => e,
            };

            let delay = match err.class() {
                ErrorClass::Permanent => {
                    let reason = err.permanent_reason().unwrap_or("forbidden").to_string();
                    warn!(
                        event_id = %job.event_id,
                        destination = %job.label,
                        error = %err,
                        "publish permanently denied"
                    );
                    self.record_failure(job, &reason);
                    return Ok(DeliveryOutcome::PermanentlyDenied(reason));
                }
                ErrorClass::RateLimited { retry_after } => {
                    retry_after.unwrap_or(self.policy.default_rate_limit)
                }
                ErrorClass::Transient => self.policy.backoff_for(attempt),
            };

            if is_last {
                let summary = match err.class() {
                    ErrorClass::RateLimited { .. } => "rate limited on final attempt".to_string(),
                    _ => err.to_string(),
                };
                error!(
                    event_id = %job.event_id,
                    destination = %job.label,
                    attempts,
                    error = %summary,
                    "publish failed after all retries"
                );
                self.record_failure(job, &summary);
                return Ok(DeliveryOutcome::ExhaustedRetries(summary));
            }

            warn!(
                event_id = %job.event_id,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "publish failed, retrying"
            );
            self.sleep(delay).await?;
        }

        // attempts() is never zero, so the loop always returns.
        let summary = "no attempts made".to_string();
        self.record_failure(job, &summary);
        Ok(DeliveryOutcome::ExhaustedRetries(summary))
    }

    fn record_failure<T>(&self, job: &DeliveryJob<T>, summary: &str) {
        self.store.record_failure(FailureRecord::new(
            job.event_id.clone(),
            job.label.clone(),
            summary,
            Utc::now(),
        ));
    }

    async fn sleep(&self, delay: Duration) -> EngineResult<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("backoff interrupted by shutdown");
                Err(EngineError::Cancelled)
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
