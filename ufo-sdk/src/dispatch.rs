//! Device sends that report themselves on the event bus
//!
//! Every query that leaves the SDK is announced as a `RawExecuted` event,
//! whether it succeeded or not, so subscribers see exactly what the device
//! was told.

use std::sync::Arc;

use ufo_client::{ClientError, DeviceClient};
use ufo_state::EventBroadcaster;

/// Result label for a plain successful send
pub(crate) const OK: &str = "OK";

/// Result label after re-sending a restored layer
pub(crate) const OK_RESTORED: &str = "OK (restored)";

/// Result label after clearing the device
pub(crate) const OK_CLEARED: &str = "OK (cleared)";

#[derive(Clone)]
pub(crate) struct Dispatcher {
    client: Arc<dyn DeviceClient>,
    events: EventBroadcaster,
}

impl Dispatcher {
    pub(crate) fn new(client: Arc<dyn DeviceClient>, events: EventBroadcaster) -> Self {
        Self { client, events }
    }

    /// Run `send` and publish `query` with `ok` or the error
    pub(crate) fn send<F>(&self, query: &str, ok: &str, send: F) -> Result<(), ClientError>
    where
        F: FnOnce(&dyn DeviceClient) -> Result<(), ClientError>,
    {
        match send(self.client.as_ref()) {
            Ok(()) => {
                self.events.publish_raw_executed(query, ok);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Device rejected '{}': {}", query, e);
                self.events.publish_raw_executed(query, format!("ERROR: {}", e));
                Err(e)
            }
        }
    }

    /// Send `pattern` verbatim
    pub(crate) fn play(&self, pattern: &str, ok: &str) -> Result<(), ClientError> {
        self.send(pattern, ok, |client| client.play_pattern(pattern))
    }

    /// Send a raw query and publish the device's response body
    pub(crate) fn send_raw(&self, query: &str) -> Result<String, ClientError> {
        match self.client.send_raw_query(query) {
            Ok(body) => {
                self.events.publish_raw_executed(query, body.as_str());
                Ok(body)
            }
            Err(e) => {
                tracing::warn!("Device rejected '{}': {}", query, e);
                self.events.publish_raw_executed(query, format!("ERROR: {}", e));
                Err(e)
            }
        }
    }
}
