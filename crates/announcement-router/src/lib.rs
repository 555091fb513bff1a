//! Event dedup and routing for herald.
//!
//! Message notifications arrive on two paths: the cached path (full
//! [`Event`], delivered when the platform cache already knows the channel)
//! and the raw path ([`RawEvent`], ids only, delivered for every message).
//! Both funnel into [`Router::on_event`], which filters, resolves raw events,
//! checks eligibility, runs the dedup gate and hands the survivors to the
//! retry engine.

mod error;
mod event;
mod fetch;
mod router;

#[cfg(test)]
mod tests;

pub use error::{FetchError, RouteError, RouteResult};
pub use event::{ChannelClass, Event, Ingress, MessageRef, OriginPath, RawEvent};
pub use fetch::{fetch_with_retry, EventFetcher};
pub use router::{RouteDecision, Router};
