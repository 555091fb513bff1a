//! Delivery bookkeeping for herald.
//!
//! Two structures live behind one lock in [`DeliveryStore`]:
//!
//! - [`ProcessedSet`]: event ids accepted for processing, used as the dedup gate
//! - [`DeliveryLedger`]: successful delivery timestamps plus an ordered list of
//!   failure records
//!
//! Nothing is persisted. Memory stays bounded only through
//! [`DeliveryStore::evict_older_than`], which the lifecycle coordinator calls
//! on a fixed schedule.

mod ledger;
mod processed;
mod store;

pub use ledger::{DeliveryLedger, FailureRecord};
pub use processed::ProcessedSet;
pub use store::{DeliveryStore, EvictionReport, WindowSnapshot};
