//! Chat platform collaborator for herald.
//!
//! - [`GatewaySession`]: websocket session (HELLO, heartbeat, IDENTIFY or
//!   RESUME, dispatch) emitting [`GatewayEvent`]s, reconnecting with capped
//!   backoff until shutdown
//! - [`RestClient`]: publish (crosspost), message and channel fetch, message
//!   create and identity check; implements the engine's `Publisher`
//! - [`ChannelCache`]: guild and channel names and kinds; implements the
//!   status reporter's `PlatformDirectory`
//! - [`MessageResolver`]: turns raw notifications into full events

mod cache;
mod error;
mod model;
mod resolver;
mod rest;
mod session;

pub use cache::{CachedChannel, ChannelCache, ANNOUNCEMENT_CHANNEL};
pub use error::{GatewayError, GatewayResult};
pub use model::{
    intents, ChannelData, GatewayPayload, GuildData, MessageData, OpCode, ReadyData, UserData,
};
pub use resolver::MessageResolver;
pub use rest::{RestClient, RestFailure, API_BASE};
pub use session::{ChatMessage, GatewayConfig, GatewayEvent, GatewaySession};
