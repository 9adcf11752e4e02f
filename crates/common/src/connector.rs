//! Proxy in front of the externally loaded receptivity connector.
//!
//! The connector script is fetched through a host-supplied [`ScriptLoader`].
//! Once it has registered itself, the host forwards the
//! `rxConnectorIsReady` notification to [`ConnectorProxy::handle_connector_ready`],
//! which builds the live [`RxApi`] and flips the proxy to
//! [`ReadinessState::Ready`]. Readiness is monotonic: there is no way back.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use error_stack::{Report, ResultExt};
use once_cell::unsync::OnceCell;
use serde_json::Value;
use url::Url;

use crate::cache::ReceptivityCache;
use crate::constants::{INITIAL_RECEPTIVITY_EVENT, MODULE_NAME};
use crate::error::RtdError;
use crate::receptivity::{parse_initial_receptivity, Receptivity};
use crate::settings::RtdConfig;

/// Listener invoked with the `detail` of an event fired on a script element.
pub type ScriptEventListener = Box<dyn Fn(Option<&Value>)>;

/// Element-like handle returned by the script loader.
pub trait ScriptHandle {
    fn add_event_listener(&self, event_type: &str, listener: ScriptEventListener);
}

/// Loads external scripts on behalf of the module.
pub trait ScriptLoader {
    /// Start loading the script at `url` for `module_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host refuses to load the script.
    fn load(&self, url: &str, module_id: &str)
        -> Result<Box<dyn ScriptHandle>, Report<RtdError>>;
}

/// Live receptivity API built by the connector.
#[async_trait(?Send)]
pub trait RxApi {
    /// Current receptivity for the page.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot produce a reading.
    fn receptivity(&self) -> Result<Receptivity, Report<RtdError>>;

    /// Receptivity for each of `bidders`, keyed by bidder code.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot produce the batch.
    async fn receptivity_batched(
        &self,
        bidders: &[String],
    ) -> Result<HashMap<String, Receptivity>, Report<RtdError>>;
}

/// Connector object published by the external script for one customer.
#[async_trait(?Send)]
pub trait RxConnector {
    /// Fetch the engine configuration for `tag_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be fetched.
    async fn fetch_config(&self, tag_id: &str) -> Result<Option<Value>, Report<RtdError>>;

    /// Build the live API from a fetched configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine refuses the configuration.
    async fn rx_api_builder(&self, config: Value) -> Result<Rc<dyn RxApi>, Report<RtdError>>;
}

/// Detail of the readiness notification: connectors keyed by customer.
pub type ConnectorRegistry = HashMap<String, Rc<dyn RxConnector>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Uninitialized,
    Loading,
    Ready,
}

/// Build the connector script URL for a validated configuration.
///
/// # Errors
///
/// Returns a [`RtdError::ConnectorLoad`] if the hostname does not form a
/// valid URL.
pub fn connector_url(config: &RtdConfig) -> Result<Url, Report<RtdError>> {
    let raw = format!(
        "https://{}/{}/prebid/{}/connector/rxConnector.js",
        config.hostname, config.version, config.customer
    );
    Url::parse(&raw).change_context(RtdError::ConnectorLoad {
        message: format!("Invalid connector URL: {raw}"),
    })
}

pub struct ConnectorProxy {
    customer: String,
    prebid_config: Value,
    cache: Rc<ReceptivityCache>,
    state: Cell<ReadinessState>,
    subscribed: Cell<bool>,
    api: OnceCell<Rc<dyn RxApi>>,
    script: RefCell<Option<Box<dyn ScriptHandle>>>,
}

impl ConnectorProxy {
    /// Create a proxy for `customer`.
    ///
    /// `prebid_config` is attached to the engine configuration under the
    /// `prebid` key before the API is built.
    pub fn new(customer: impl Into<String>, prebid_config: Value, cache: Rc<ReceptivityCache>) -> Self {
        Self {
            customer: customer.into(),
            prebid_config,
            cache,
            state: Cell::new(ReadinessState::Uninitialized),
            subscribed: Cell::new(false),
            api: OnceCell::new(),
            script: RefCell::new(None),
        }
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    pub fn state(&self) -> ReadinessState {
        self.state.get()
    }

    pub fn is_ready(&self) -> bool {
        self.state.get() == ReadinessState::Ready
    }

    /// Subscribe to readiness and load the connector script.
    ///
    /// The proxy moves to [`ReadinessState::Loading`] before the script is
    /// requested and stays there if the load fails.
    ///
    /// # Errors
    ///
    /// Returns a [`RtdError::ConnectorLoad`] if the URL is invalid or the
    /// loader refuses the script.
    pub fn start(&self, config: &RtdConfig, loader: &dyn ScriptLoader) -> Result<(), Report<RtdError>> {
        if self.state.get() != ReadinessState::Uninitialized {
            log::warn!("Connector for '{}' already started", self.customer);
            return Ok(());
        }

        self.state.set(ReadinessState::Loading);
        self.subscribed.set(true);

        let url = connector_url(config)?;
        log::info!("Loading receptivity connector from: {}", url);

        let handle = loader
            .load(url.as_str(), MODULE_NAME)
            .change_context(RtdError::ConnectorLoad {
                message: format!("Failed to load connector script {url}"),
            })?;

        let cache = Rc::clone(&self.cache);
        let key = ReceptivityCache::customer_key(&self.customer);
        handle.add_event_listener(
            INITIAL_RECEPTIVITY_EVENT,
            Box::new(move |detail: Option<&Value>| match parse_initial_receptivity(detail) {
                Some(receptivity) => {
                    log::debug!("Caching initial receptivity for '{}'", key);
                    cache.store(&key, &receptivity);
                }
                None => log::debug!("Ignoring invalid initial receptivity"),
            }),
        );
        *self.script.borrow_mut() = Some(handle);

        Ok(())
    }

    /// Handle the `rxConnectorIsReady` notification.
    ///
    /// Notifications without a detail or without a connector for this
    /// customer are ignored. The first one carrying this customer's
    /// connector consumes the subscription; if building the API fails the
    /// proxy stays in [`ReadinessState::Loading`] for the rest of the
    /// session. Returns `true` when the proxy became ready.
    pub async fn handle_connector_ready(&self, detail: Option<&ConnectorRegistry>) -> bool {
        if !self.subscribed.get() || self.state.get() != ReadinessState::Loading {
            log::debug!("Ignoring connector notification for '{}'", self.customer);
            return false;
        }

        let Some(connector) = detail.and_then(|registry| registry.get(&self.customer)) else {
            log::debug!("Connector notification carries no connector for '{}'", self.customer);
            return false;
        };
        let connector = Rc::clone(connector);
        self.subscribed.set(false);

        let api = match self.build_api(connector.as_ref()).await {
            Ok(api) => api,
            Err(report) => {
                log::warn!("Receptivity API unavailable for '{}': {:?}", self.customer, report);
                return false;
            }
        };

        match api.receptivity() {
            Ok(receptivity) => self
                .cache
                .store(&ReceptivityCache::customer_key(&self.customer), &receptivity),
            Err(report) => log::warn!("Failed to seed receptivity cache: {:?}", report),
        }

        if self.api.set(api).is_err() {
            log::warn!("Receptivity API for '{}' was already set", self.customer);
        }
        self.state.set(ReadinessState::Ready);
        log::info!("Receptivity engine ready for '{}'", self.customer);

        true
    }

    async fn build_api(&self, connector: &dyn RxConnector) -> Result<Rc<dyn RxApi>, Report<RtdError>> {
        let config = connector
            .fetch_config(&self.customer)
            .await
            .change_context(RtdError::Connector {
                message: format!("fetchConfig failed for '{}'", self.customer),
            })?;

        let mut config = match config {
            Some(Value::Object(config)) => config,
            Some(other) => {
                return Err(Report::new(RtdError::Connector {
                    message: format!("fetchConfig returned a non-object config: {other}"),
                }))
            }
            None => {
                return Err(Report::new(RtdError::Connector {
                    message: format!("fetchConfig returned no config for '{}'", self.customer),
                }))
            }
        };
        config.insert("prebid".to_string(), self.prebid_config.clone());

        connector
            .rx_api_builder(Value::Object(config))
            .await
            .change_context(RtdError::Connector {
                message: format!("rxApiBuilder failed for '{}'", self.customer),
            })
    }

    fn live_api(&self) -> Result<&Rc<dyn RxApi>, Report<RtdError>> {
        self.api.get().ok_or_else(|| {
            Report::new(RtdError::Connector {
                message: format!("Receptivity engine for '{}' is not ready", self.customer),
            })
        })
    }

    /// Current receptivity from the live engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy is not ready or the engine fails.
    pub fn receptivity(&self) -> Result<Receptivity, Report<RtdError>> {
        self.live_api()?.receptivity()
    }

    /// Per-bidder receptivity from the live engine.
    ///
    /// Every returned entry is cached under `customer_bidder`.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy is not ready or the engine fails.
    pub async fn receptivity_batched(
        &self,
        bidders: &[String],
    ) -> Result<HashMap<String, Receptivity>, Report<RtdError>> {
        let api = Rc::clone(self.live_api()?);
        let batch = api.receptivity_batched(bidders).await?;

        for (bidder, receptivity) in &batch {
            self.cache
                .store(&ReceptivityCache::bidder_key(&self.customer, bidder), receptivity);
        }

        Ok(batch)
    }
}
