//! Retry/backoff engine for herald deliveries.
//!
//! [`RetryEngine::deliver`] drives one event through at most
//! `max_retries` calls to a [`Publisher`], classifying each failure:
//!
//! - rate limited: wait the server-advised delay, then try again
//! - permanent (forbidden, not found): record a failure and stop
//! - transient: back off `min(2^attempt, cap)` seconds, then try again
//!
//! Terminal outcomes are written to the shared
//! [`DeliveryStore`](delivery_ledger::DeliveryStore). Cancellation interrupts
//! any in-flight call or sleep and leaves the ledger untouched.

mod engine;
mod error;
mod outcome;
mod policy;
mod publisher;

pub use engine::RetryEngine;
pub use error::{
    parse_retry_after, EngineError, EngineResult, ErrorClass, PublishError, MAX_RETRY_AFTER,
};
pub use outcome::DeliveryOutcome;
pub use policy::RetryPolicy;
pub use publisher::{DeliveryJob, Publisher};
