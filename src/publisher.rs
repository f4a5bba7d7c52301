use crate::dto::Bmp180Reading;
use crate::store::TelemetryStore;
use log::{debug, error};
use std::sync::Arc;

/// Fire-and-forget append into the shared store.
///
/// The sampling flow never waits on the outcome; a failed append is logged
/// and the reading is dropped, not queued.
pub struct TelemetryPublisher {
    store: Arc<dyn TelemetryStore>,
    collection: String,
}

impl TelemetryPublisher {
    pub fn new(store: Arc<dyn TelemetryStore>, collection: &str) -> TelemetryPublisher {
        TelemetryPublisher {
            store,
            collection: collection.to_owned(),
        }
    }

    pub fn publish(&self, reading: &Bmp180Reading) {
        match self.store.append(&self.collection, reading) {
            Ok(()) => debug!(
                "{} saved into {}",
                serde_json::to_string(reading).unwrap_or_default(),
                self.collection
            ),
            Err(e) => error!("Could not append reading to '{}': {}", self.collection, e),
        }
    }
}
