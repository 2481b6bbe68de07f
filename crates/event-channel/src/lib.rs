//! In-process, topic-based event channel.
//!
//! This crate provides the asynchronous notification boundary between a
//! backend that performs work and the components that display its progress.
//! Payloads travel as JSON values, the same way they would cross a webview
//! IPC bridge, so producers and consumers only agree on the wire shape.
//!
//! # Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use textlingo_event_channel::{Event, EventChannel};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Tick {
//!     count: u32,
//! }
//!
//! impl Event for Tick {
//!     const NAME: &'static str = "tick";
//! }
//!
//! let channel = EventChannel::new();
//! let subscription = Tick::listen(&channel, |tick| println!("tick {}", tick.count));
//!
//! Tick { count: 1 }.emit(&channel).unwrap();
//!
//! // Dropping the subscription unregisters the handler.
//! drop(subscription);
//! assert_eq!(channel.listener_count(Tick::NAME), 0);
//! ```

mod channel;
mod event;
mod subscription;

pub use channel::EventChannel;
pub use event::Event;
pub use subscription::{Subscription, SubscriptionId};

use thiserror::Error;

/// Errors that can occur when emitting an event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EmitError {
    /// The payload could not be converted to JSON.
    #[error("Failed to serialize payload for '{topic}': {source}")]
    Serialize {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}
