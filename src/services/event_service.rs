use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::utils::time;

pub const LISTING_CREATED: &str = "listing_created";
pub const LISTING_VIEWED: &str = "listing_viewed";
pub const LISTING_SHARED: &str = "listing_shared";
pub const LISTING_APPLIED: &str = "listing_applied";
pub const LISTING_SAVED: &str = "listing_saved";
pub const LISTING_UPDATED: &str = "listing_updated";
pub const LISTING_DELETED: &str = "listing_deleted";
pub const LISTINGS_IMPORTED: &str = "listings_imported";
pub const LISTINGS_CLEANED: &str = "listings_cleaned";
pub const LISTINGS_CLEARED: &str = "listings_cleared";

/// Destination for analytics events. Services call `emit` unconditionally;
/// what happens to the event is the sink's business.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn emit(&self, name: &str, attributes: JsonValue);
}

/// Writes events to the log. Used when no analytics endpoint is configured.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, name: &str, attributes: JsonValue) {
        info!(event = name, %attributes, "analytics event");
    }
}

pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _name: &str, _attributes: JsonValue) {}
}

/// Posts each event to a collector endpoint without waiting for the
/// response. Delivery failures are logged and dropped.
#[derive(Clone)]
pub struct HttpEventSink {
    client: Client,
    endpoint: String,
}

impl HttpEventSink {
    pub fn new(client: Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

impl EventSink for HttpEventSink {
    fn emit(&self, name: &str, attributes: JsonValue) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(event = name, "no runtime available, analytics event dropped");
            return;
        };
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let body = json!({
            "event": name,
            "attributes": attributes,
            "timestamp": time::now().timestamp_millis(),
        });
        let name = name.to_string();
        handle.spawn(async move {
            match client.post(&endpoint).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(event = %name, "analytics event delivered");
                }
                Ok(resp) => {
                    warn!(event = %name, status = %resp.status(), "analytics collector rejected event");
                }
                Err(err) => {
                    warn!(event = %name, error = %err, "analytics event delivery failed");
                }
            }
        });
    }
}
