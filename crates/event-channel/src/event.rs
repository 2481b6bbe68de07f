//! Typed events bound to a topic name.

use serde::{de::DeserializeOwned, Serialize};

use crate::{EmitError, EventChannel, Subscription};

/// A payload type that always travels on the same topic.
///
/// Implementors only name the topic; emitting and listening are provided.
pub trait Event: Serialize + DeserializeOwned + Clone {
    /// Topic name on the channel (e.g. `"plugin-install-progress"`).
    const NAME: &'static str;

    /// Publish this event to every current listener of [`Self::NAME`].
    ///
    /// Returns the number of handlers that were invoked.
    fn emit(&self, channel: &EventChannel) -> Result<usize, EmitError> {
        channel.emit(Self::NAME, self)
    }

    /// Register a handler for this event type.
    ///
    /// The handler stays registered until the returned [`Subscription`] is
    /// dropped or explicitly unsubscribed.
    fn listen<F>(channel: &EventChannel, handler: F) -> Subscription
    where
        F: Fn(Self) + Send + Sync + 'static,
    {
        channel.listen(Self::NAME, handler)
    }
}
