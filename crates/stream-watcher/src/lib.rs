//! Streaming-platform watcher for herald.
//!
//! Polls the Helix streams endpoint for each configured streamer and, on an
//! offline to live transition, delivers an announcement to a webhook through
//! the shared retry engine. Live announcements are deduplicated by stream id
//! in the same processed set as chat events.

mod error;
mod helix;
mod watcher;
mod webhook;

pub use error::{WatcherError, WatcherResult};
pub use helix::{HelixClient, LiveStream, StreamSource, HELIX_API_BASE, TWITCH_TOKEN_URL};
pub use watcher::{spawn_stream_watcher, PollOutcome, StreamWatcher, Transition};
pub use webhook::{render_live_message, WebhookMessage, WebhookPublisher};
