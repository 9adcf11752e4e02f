//! Optional analytics sink.

use serde_json::Value;

/// Emitted once the receptivity engine is ready.
pub const RX_ENGINE_READY_EVENT: &str = "rxEngineIsReady";

/// Emitted after each bid request enrichment.
pub const RX_BID_REQUEST_DATA_EVENT: &str = "rxBidRequestData";

/// Fire-and-forget analytics emitter provided by the host.
pub trait AnalyticsEmitter {
    fn emit(&self, event_name: &str, payload: &Value);
}
