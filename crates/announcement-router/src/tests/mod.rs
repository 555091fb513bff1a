//! Scenario tests for the router.
//!
//! - `harness.rs`   - mock publisher, mock fetcher, router builder
//! - `dedup.rs`     - one delivery per event id across both paths
//! - `filtering.rs` - channel class and author eligibility
//! - `fetch.rs`     - raw event resolution and its retry budget
//! - `shutdown.rs`  - behavior once shutdown begins

mod fetch;
mod filtering;
mod shutdown;
