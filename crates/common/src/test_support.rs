#[cfg(test)]
pub mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use error_stack::Report;
    use serde_json::{json, Value};

    use crate::analytics::AnalyticsEmitter;
    use crate::clock::Clock;
    use crate::connector::{
        ConnectorRegistry, RxApi, RxConnector, ScriptEventListener, ScriptHandle, ScriptLoader,
    };
    use crate::error::RtdError;
    use crate::events::{Point, ScreenGeometry, Viewport};
    use crate::receptivity::Receptivity;
    use crate::settings::{ModuleConfig, RtdConfig, RtdParams};

    pub const VERSION: &str = "v1";
    pub const CUSTOMER: &str = "CUSTOMER";
    pub const BIDDER: &str = "mock-bidder-code";
    pub const CONNECTOR_ENDPOINT: &str =
        "https://api.receptivity.io/v1/prebid/CUSTOMER/connector/rxConnector.js";

    /// Receptivity value with the given state.
    pub fn rx(state: &str) -> Receptivity {
        Receptivity::from_value(json!({ "ReceptivityState": state })).expect("object literal")
    }

    pub fn rx_from_api() -> Receptivity {
        Receptivity::from_value(json!({
            "ReceptivityState": "Receptive",
            "test_info": "rx_from_engine"
        }))
        .expect("object literal")
    }

    pub fn rx_from_session_storage() -> Receptivity {
        Receptivity::from_value(json!({
            "ReceptivityState": "Receptive",
            "test_info": "rx_from_session_storage"
        }))
        .expect("object literal")
    }

    pub fn build_init_config(version: &str, customer: &str) -> ModuleConfig {
        ModuleConfig {
            name: "contxtful".to_string(),
            params: Some(RtdParams {
                version: Some(version.to_string()),
                customer: Some(customer.to_string()),
                hostname: Some("api.receptivity.io".to_string()),
                bidders: Some(vec![BIDDER.to_string()]),
                ad_server_targeting: Some(true),
            }),
        }
    }

    pub fn test_rtd_config() -> RtdConfig {
        RtdConfig {
            version: VERSION.to_string(),
            customer: CUSTOMER.to_string(),
            hostname: "api.receptivity.io".to_string(),
            bidders: vec![BIDDER.to_string()],
            ad_server_targeting: true,
        }
    }

    /// Decode a base64 JSON behavioral payload.
    pub fn decode_events(encoded: &str) -> Value {
        let bytes = STANDARD.decode(encoded).expect("valid base64");
        serde_json::from_slice(&bytes).expect("valid json")
    }

    pub fn registry(customer: &str, connector: &Rc<MockConnector>) -> ConnectorRegistry {
        let mut registry: ConnectorRegistry = HashMap::new();
        registry.insert(customer.to_string(), connector.clone());
        registry
    }

    #[derive(Debug)]
    pub struct ManualClock {
        now_ms: Cell<i64>,
    }

    impl ManualClock {
        pub fn new(now_ms: i64) -> Self {
            Self {
                now_ms: Cell::new(now_ms),
            }
        }

        pub fn advance(&self, ms: i64) {
            self.now_ms.set(self.now_ms.get() + ms);
        }
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> i64 {
            self.now_ms.get()
        }
    }

    /// Viewport with a fixed size anchored at the origin.
    pub struct FixedViewport {
        pub width: u32,
        pub height: u32,
    }

    impl Viewport for FixedViewport {
        fn geometry(&self) -> ScreenGeometry {
            ScreenGeometry {
                top_left: Point { x: 0.0, y: 0.0 },
                width: self.width,
                height: self.height,
            }
        }
    }

    /// Script element stand-in that lets tests fire events on it.
    #[derive(Default, Clone)]
    pub struct FakeScriptTag {
        listeners: Rc<RefCell<Vec<(String, ScriptEventListener)>>>,
    }

    impl FakeScriptTag {
        pub fn dispatch(&self, event_type: &str, detail: Option<&Value>) {
            for (registered, listener) in self.listeners.borrow().iter() {
                if registered == event_type {
                    listener(detail);
                }
            }
        }
    }

    impl ScriptHandle for FakeScriptTag {
        fn add_event_listener(&self, event_type: &str, listener: ScriptEventListener) {
            self.listeners
                .borrow_mut()
                .push((event_type.to_string(), listener));
        }
    }

    #[derive(Default)]
    pub struct RecordingLoader {
        calls: RefCell<Vec<(String, String)>>,
        tag: FakeScriptTag,
        fail: bool,
    }

    impl RecordingLoader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<(String, String)> {
            self.calls.borrow().clone()
        }

        pub fn tag(&self) -> FakeScriptTag {
            self.tag.clone()
        }
    }

    impl ScriptLoader for RecordingLoader {
        fn load(
            &self,
            url: &str,
            module_id: &str,
        ) -> Result<Box<dyn ScriptHandle>, Report<RtdError>> {
            self.calls
                .borrow_mut()
                .push((url.to_string(), module_id.to_string()));
            if self.fail {
                return Err(Report::new(RtdError::ConnectorLoad {
                    message: "script blocked".to_string(),
                }));
            }
            Ok(Box::new(self.tag.clone()))
        }
    }

    #[derive(Default)]
    pub struct RecordingAnalytics {
        events: RefCell<Vec<(String, Value)>>,
    }

    impl RecordingAnalytics {
        pub fn event_names(&self) -> Vec<String> {
            self.events
                .borrow()
                .iter()
                .map(|(name, _)| name.clone())
                .collect()
        }

        pub fn events(&self) -> Vec<(String, Value)> {
            self.events.borrow().clone()
        }
    }

    impl AnalyticsEmitter for RecordingAnalytics {
        fn emit(&self, event_name: &str, payload: &Value) {
            self.events
                .borrow_mut()
                .push((event_name.to_string(), payload.clone()));
        }
    }

    /// Receptivity API returning [`rx_from_api`] for every query.
    #[derive(Default)]
    pub struct MockRxApi {
        receptivity_calls: Cell<usize>,
        batched_calls: Cell<usize>,
        fail_batched: Cell<bool>,
    }

    impl MockRxApi {
        pub fn receptivity_calls(&self) -> usize {
            self.receptivity_calls.get()
        }

        pub fn batched_calls(&self) -> usize {
            self.batched_calls.get()
        }

        pub fn fail_batched(&self) {
            self.fail_batched.set(true);
        }
    }

    #[async_trait(?Send)]
    impl RxApi for MockRxApi {
        fn receptivity(&self) -> Result<Receptivity, Report<RtdError>> {
            self.receptivity_calls.set(self.receptivity_calls.get() + 1);
            Ok(rx_from_api())
        }

        async fn receptivity_batched(
            &self,
            bidders: &[String],
        ) -> Result<HashMap<String, Receptivity>, Report<RtdError>> {
            self.batched_calls.set(self.batched_calls.get() + 1);
            if self.fail_batched.get() {
                return Err(Report::new(RtdError::Connector {
                    message: "batched query rejected".to_string(),
                }));
            }
            Ok(bidders
                .iter()
                .map(|bidder| (bidder.clone(), rx_from_api()))
                .collect())
        }
    }

    /// Connector whose `fetch_config` answers `{ "tag_id": <tag> }`.
    pub struct MockConnector {
        pub api: Rc<MockRxApi>,
        fetch_calls: Cell<usize>,
        builder_calls: Cell<usize>,
        last_config: RefCell<Option<Value>>,
        fail_fetch: bool,
        fail_builder: bool,
        empty_config: bool,
    }

    impl MockConnector {
        pub fn new() -> Self {
            Self {
                api: Rc::new(MockRxApi::default()),
                fetch_calls: Cell::new(0),
                builder_calls: Cell::new(0),
                last_config: RefCell::new(None),
                fail_fetch: false,
                fail_builder: false,
                empty_config: false,
            }
        }

        pub fn with_failing_fetch(mut self) -> Self {
            self.fail_fetch = true;
            self
        }

        pub fn with_failing_builder(mut self) -> Self {
            self.fail_builder = true;
            self
        }

        pub fn with_empty_config(mut self) -> Self {
            self.empty_config = true;
            self
        }

        pub fn fetch_calls(&self) -> usize {
            self.fetch_calls.get()
        }

        pub fn builder_calls(&self) -> usize {
            self.builder_calls.get()
        }

        pub fn last_config(&self) -> Option<Value> {
            self.last_config.borrow().clone()
        }
    }

    #[async_trait(?Send)]
    impl RxConnector for MockConnector {
        async fn fetch_config(&self, tag_id: &str) -> Result<Option<Value>, Report<RtdError>> {
            self.fetch_calls.set(self.fetch_calls.get() + 1);
            if self.fail_fetch {
                return Err(Report::new(RtdError::Connector {
                    message: "fetchConfig rejected".to_string(),
                }));
            }
            if self.empty_config {
                return Ok(None);
            }
            Ok(Some(json!({ "tag_id": tag_id })))
        }

        async fn rx_api_builder(
            &self,
            config: Value,
        ) -> Result<Rc<dyn RxApi>, Report<RtdError>> {
            self.builder_calls.set(self.builder_calls.get() + 1);
            *self.last_config.borrow_mut() = Some(config);
            if self.fail_builder {
                return Err(Report::new(RtdError::Connector {
                    message: "rxApiBuilder rejected".to_string(),
                }));
            }
            Ok(self.api.clone())
        }
    }
}
