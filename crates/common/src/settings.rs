use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::constants::{DEFAULT_CACHE_TTL_MS, DEFAULT_HOSTNAME};
use crate::error::RtdError;

/// Raw module parameters as handed over by the host framework.
///
/// Every field is optional here; [`extract_parameters`] turns them into a
/// validated [`RtdConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RtdParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bidders: Option<Vec<String>>,
    #[serde(
        default,
        alias = "adservertargeting",
        alias = "ad_server_targeting",
        skip_serializing_if = "Option::is_none"
    )]
    pub ad_server_targeting: Option<bool>,
}

/// Module configuration block (`{ name, params }`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RtdParams>,
}

impl ModuleConfig {
    /// Whether ad-server targeting is enabled. Only an explicit `false`
    /// disables it.
    pub fn ad_server_targeting(&self) -> bool {
        self.params
            .as_ref()
            .and_then(|params| params.ad_server_targeting)
            .unwrap_or(true)
    }
}

/// Validated module configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtdConfig {
    pub version: String,
    pub customer: String,
    pub hostname: String,
    pub bidders: Vec<String>,
    pub ad_server_targeting: bool,
}

fn non_empty(value: Option<&String>, field: &str) -> Result<String, Report<RtdError>> {
    match value {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(Report::new(RtdError::Configuration {
            message: format!("params.{field} should be a non-empty string"),
        })),
    }
}

/// Validate the module configuration.
///
/// `version` is checked before `customer`, so the error names the first
/// missing field in that order.
///
/// # Errors
///
/// Returns a [`RtdError::Configuration`] when `version` or `customer` is
/// missing or empty.
pub fn extract_parameters(config: &ModuleConfig) -> Result<RtdConfig, Report<RtdError>> {
    let params = config.params.as_ref();

    let version = non_empty(params.and_then(|p| p.version.as_ref()), "version")?;
    let customer = non_empty(params.and_then(|p| p.customer.as_ref()), "customer")?;

    let hostname = params
        .and_then(|p| p.hostname.clone())
        .filter(|hostname| !hostname.is_empty())
        .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string());

    Ok(RtdConfig {
        version,
        customer,
        hostname,
        bidders: params.and_then(|p| p.bidders.clone()).unwrap_or_default(),
        ad_server_targeting: config.ad_server_targeting(),
    })
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CacheSettings {
    /// Lifetime of cached receptivity values in milliseconds.
    #[serde(default = "default_ttl_ms")]
    #[validate(range(min = 1, max = 86_400_000))]
    pub ttl_ms: u64,
}

fn default_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
        }
    }
}

/// Deployment settings: the module block plus cache tuning.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    pub module: ModuleConfig,
    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheSettings,
}

impl Settings {
    /// Load settings from a TOML document, with `CONTXTFUL_RTD__*`
    /// environment variables taking precedence.
    ///
    /// # Errors
    ///
    /// Returns a [`RtdError::Configuration`] when the TOML is invalid,
    /// required sections are missing, or values are out of range.
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<RtdError>> {
        let environment = Environment::default()
            .prefix("CONTXTFUL_RTD")
            .separator("__")
            .try_parsing(true);

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(RtdError::Configuration {
                message: "Failed to build configuration".to_string(),
            })?;

        let settings: Self = config
            .try_deserialize()
            .change_context(RtdError::Configuration {
                message: "Failed to deserialize configuration".to_string(),
            })?;

        settings.validate().change_context(RtdError::Configuration {
            message: "Settings validation failed".to_string(),
        })?;

        Ok(settings)
    }
}
