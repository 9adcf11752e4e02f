//! Real-time data provider that enriches ad targeting and bid requests with
//! receptivity.
//!
//! One [`ContxtfulRtdProvider`] is created per customer configuration. It
//! owns the receptivity cache, the connector proxy and the behavioral event
//! collector, and exposes the three host-facing operations: [`init`],
//! [`get_targeting_data`] and [`get_bid_request_data`].
//!
//! [`init`]: ContxtfulRtdProvider::init
//! [`get_targeting_data`]: ContxtfulRtdProvider::get_targeting_data
//! [`get_bid_request_data`]: ContxtfulRtdProvider::get_bid_request_data

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::analytics::{AnalyticsEmitter, RX_BID_REQUEST_DATA_EVENT, RX_ENGINE_READY_EVENT};
use crate::cache::ReceptivityCache;
use crate::clock::{Clock, SystemClock};
use crate::connector::{ConnectorProxy, ConnectorRegistry, ReadinessState, ScriptLoader};
use crate::constants::{CONNECTOR_READY_EVENT, DEFAULT_CACHE_TTL_MS, MODULE_NAME};
use crate::events::{EventCollector, UiEvent, Viewport};
use crate::openrtb::{Data, Ortb2Fragments};
use crate::receptivity::Receptivity;
use crate::resolver::resolve;
use crate::settings::{extract_parameters, ModuleConfig, RtdConfig, Settings};
use crate::storage::SessionStorage;

/// `ext.params` of the user data entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContxtfulParams {
    /// Connector version.
    pub ev: String,
    /// Customer id.
    pub ci: String,
}

/// `ext` of the user data entry written for each bidder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContxtfulExt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rx: Option<Receptivity>,
    pub params: ContxtfulParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<String>,
}

impl ContxtfulExt {
    fn into_user_data(self) -> Option<Data> {
        match serde_json::to_value(&self) {
            Ok(ext) => Some(Data {
                name: Some(MODULE_NAME.to_string()),
                ext: Some(ext),
                ..Data::default()
            }),
            Err(e) => {
                log::warn!("Failed to serialize receptivity user data: {}", e);
                None
            }
        }
    }
}

/// Builder for [`ContxtfulRtdProvider`], created by [`ContxtfulRtdProvider::builder`].
pub struct ContxtfulRtdProviderBuilder {
    storage: Rc<dyn SessionStorage>,
    loader: Rc<dyn ScriptLoader>,
    clock: Rc<dyn Clock>,
    analytics: Option<Rc<dyn AnalyticsEmitter>>,
    viewport: Option<Rc<dyn Viewport>>,
    cache_ttl_ms: u64,
}

impl ContxtfulRtdProviderBuilder {
    #[must_use]
    pub fn with_clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_analytics(mut self, analytics: Rc<dyn AnalyticsEmitter>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Capture the viewport geometry from `viewport` when `init` succeeds.
    #[must_use]
    pub fn with_viewport(mut self, viewport: Rc<dyn Viewport>) -> Self {
        self.viewport = Some(viewport);
        self
    }

    #[must_use]
    pub fn with_cache_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.cache_ttl_ms = ttl_ms;
        self
    }

    #[must_use]
    pub fn build(self) -> ContxtfulRtdProvider {
        let cache = Rc::new(ReceptivityCache::new(
            self.storage,
            Rc::clone(&self.clock),
            self.cache_ttl_ms,
        ));

        ContxtfulRtdProvider {
            loader: self.loader,
            analytics: self.analytics,
            viewport: self.viewport,
            collector: EventCollector::new(self.clock),
            cache,
            proxy: RefCell::new(None),
        }
    }
}

/// Receptivity real-time data provider for one customer configuration.
pub struct ContxtfulRtdProvider {
    loader: Rc<dyn ScriptLoader>,
    analytics: Option<Rc<dyn AnalyticsEmitter>>,
    viewport: Option<Rc<dyn Viewport>>,
    cache: Rc<ReceptivityCache>,
    collector: EventCollector,
    proxy: RefCell<Option<Rc<ConnectorProxy>>>,
}

impl ContxtfulRtdProvider {
    pub fn builder(
        storage: Rc<dyn SessionStorage>,
        loader: Rc<dyn ScriptLoader>,
    ) -> ContxtfulRtdProviderBuilder {
        ContxtfulRtdProviderBuilder {
            storage,
            loader,
            clock: Rc::new(SystemClock),
            analytics: None,
            viewport: None,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
        }
    }

    /// Build a provider using the cache TTL from `settings`.
    pub fn from_settings(
        settings: &Settings,
        storage: Rc<dyn SessionStorage>,
        loader: Rc<dyn ScriptLoader>,
    ) -> Self {
        Self::builder(storage, loader)
            .with_cache_ttl_ms(settings.cache.ttl_ms)
            .build()
    }

    /// Validate `config` and start loading the connector.
    ///
    /// Returns `false` without side effects when the configuration is
    /// invalid. A valid configuration returns `true` even if the connector
    /// script cannot be loaded; reads then fall back to the cache.
    ///
    /// Calling `init` again for the customer whose connector is already
    /// loading or ready keeps the existing connector.
    pub fn init(&self, config: &ModuleConfig) -> bool {
        let rtd_config = match extract_parameters(config) {
            Ok(rtd_config) => rtd_config,
            Err(report) => {
                log::error!("Invalid {} module configuration: {:?}", MODULE_NAME, report);
                return false;
            }
        };

        if let Some(current) = self.current_proxy() {
            if current.customer() == rtd_config.customer
                && current.state() != ReadinessState::Uninitialized
            {
                log::info!(
                    "{} module already initialized for '{}' ({:?})",
                    MODULE_NAME,
                    rtd_config.customer,
                    current.state()
                );
                return true;
            }
        }

        self.capture_viewport();

        let prebid_config = serde_json::to_value(config).unwrap_or(Value::Null);
        let proxy = Rc::new(ConnectorProxy::new(
            rtd_config.customer.clone(),
            prebid_config,
            Rc::clone(&self.cache),
        ));

        if let Err(report) = proxy.start(&rtd_config, self.loader.as_ref()) {
            log::warn!("Receptivity connector failed to load: {:?}", report);
        }

        if self.proxy.borrow_mut().replace(proxy).is_some() {
            log::warn!("Re-initialized {} module for '{}'", MODULE_NAME, rtd_config.customer);
        }
        log::info!("Initialized {} module for '{}'", MODULE_NAME, rtd_config.customer);

        true
    }

    fn capture_viewport(&self) {
        if let Some(viewport) = &self.viewport {
            self.collector.record(viewport.geometry().into());
        }
    }

    fn current_proxy(&self) -> Option<Rc<ConnectorProxy>> {
        self.proxy.borrow().clone()
    }

    /// The connector proxy, only once it is ready.
    fn ready_proxy(&self) -> Option<Rc<ConnectorProxy>> {
        self.current_proxy().filter(|proxy| proxy.is_ready())
    }

    pub fn readiness(&self) -> ReadinessState {
        self.current_proxy()
            .map_or(ReadinessState::Uninitialized, |proxy| proxy.state())
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == ReadinessState::Ready
    }

    /// Forward the global `rxConnectorIsReady` notification.
    ///
    /// Once the engine is ready, behavioral collection stops for good.
    pub async fn handle_connector_ready(&self, detail: Option<&ConnectorRegistry>) {
        let Some(proxy) = self.current_proxy() else {
            log::debug!("{} received before init", CONNECTOR_READY_EVENT);
            return;
        };

        if proxy.handle_connector_ready(detail).await {
            self.collector.stop();
            self.emit(RX_ENGINE_READY_EVENT, &json!({ "customer": proxy.customer() }));
        }
    }

    /// Forward a pointer or viewport event from the page.
    pub fn handle_ui_event(&self, event: UiEvent) {
        if self.is_ready() {
            return;
        }
        self.collector.record(event);
    }

    /// Receptivity per ad slot for the ad server.
    ///
    /// Every slot gets the same value: the live reading when the engine is
    /// ready, otherwise the cached customer reading. Slots are omitted when
    /// neither exists.
    pub fn get_targeting_data(
        &self,
        ad_slot_ids: Option<&[String]>,
        config: &ModuleConfig,
    ) -> HashMap<String, Receptivity> {
        let rtd_config = match extract_parameters(config) {
            Ok(rtd_config) => rtd_config,
            Err(report) => {
                log::warn!("Cannot resolve targeting data: {:?}", report);
                return HashMap::new();
            }
        };

        if !rtd_config.ad_server_targeting {
            log::debug!("Ad server targeting disabled");
            return HashMap::new();
        }

        let Some(slots) = ad_slot_ids.filter(|slots| !slots.is_empty()) else {
            return HashMap::new();
        };

        let live = self
            .ready_proxy()
            .and_then(|proxy| match proxy.receptivity() {
                Ok(receptivity) => Some(receptivity),
                Err(report) => {
                    log::warn!("Live receptivity query failed: {:?}", report);
                    None
                }
            });

        let customer_key = ReceptivityCache::customer_key(&rtd_config.customer);
        resolve(slots, |_| live.clone(), &self.cache, |_| customer_key.clone())
    }

    /// Append receptivity user data to each configured bidder's fragment,
    /// then call `on_done`.
    ///
    /// `on_done` runs exactly once, after enrichment, whatever the outcome
    /// of the individual lookups.
    pub async fn get_bid_request_data<F>(
        &self,
        fragments: &mut Ortb2Fragments,
        on_done: F,
        config: &ModuleConfig,
    ) where
        F: FnOnce(),
    {
        self.enrich_bid_request(fragments, config).await;
        on_done();
    }

    async fn enrich_bid_request(&self, fragments: &mut Ortb2Fragments, config: &ModuleConfig) {
        let rtd_config = match extract_parameters(config) {
            Ok(rtd_config) => rtd_config,
            Err(report) => {
                log::warn!("Cannot resolve bid request data: {:?}", report);
                return;
            }
        };

        if rtd_config.bidders.is_empty() {
            log::debug!("No bidders configured for receptivity");
            return;
        }

        let mut batch = self.live_batch(&rtd_config).await;
        let resolved = resolve(
            &rtd_config.bidders,
            |bidder| batch.remove(bidder),
            &self.cache,
            |bidder| ReceptivityCache::bidder_key(&rtd_config.customer, bidder),
        );

        let events = if self.is_ready() {
            None
        } else {
            self.collector.encode()
        };

        let mut enriched = Vec::new();
        for bidder in &rtd_config.bidders {
            let rx = resolved.get(bidder).cloned();
            if rx.is_none() && events.is_none() {
                continue;
            }

            let ext = ContxtfulExt {
                rx,
                params: ContxtfulParams {
                    ev: rtd_config.version.clone(),
                    ci: rtd_config.customer.clone(),
                },
                events: events.clone(),
            };

            if let Some(data) = ext.into_user_data() {
                fragments.push_bidder_user_data(bidder, data);
                enriched.push(bidder.as_str());
            }
        }

        log::debug!(
            "Receptivity added for {} of {} bidders",
            enriched.len(),
            rtd_config.bidders.len()
        );
        self.emit(
            RX_BID_REQUEST_DATA_EVENT,
            &json!({ "customer": rtd_config.customer, "bidders": enriched }),
        );
    }

    async fn live_batch(&self, rtd_config: &RtdConfig) -> HashMap<String, Receptivity> {
        let Some(proxy) = self.ready_proxy() else {
            return HashMap::new();
        };

        match proxy.receptivity_batched(&rtd_config.bidders).await {
            Ok(batch) => batch,
            Err(report) => {
                log::warn!("Batched receptivity query failed: {:?}", report);
                HashMap::new()
            }
        }
    }

    fn emit(&self, event_name: &str, payload: &Value) {
        if let Some(analytics) = &self.analytics {
            analytics.emit(event_name, payload);
        }
    }
}
