use derive_more::{Display, Error};

/// Errors raised inside the receptivity enrichment core.
///
/// None of these are surfaced to the host framework: the provider logs the
/// report and degrades to cached or empty data.
#[derive(Debug, Display, Error)]
pub enum RtdError {
    /// Module parameters are missing or invalid.
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// The connector script could not be addressed or loaded.
    #[display("Connector load error: {message}")]
    ConnectorLoad { message: String },

    /// The connector or its receptivity API failed or is not ready yet.
    #[display("Connector error: {message}")]
    Connector { message: String },

    /// Session storage rejected a read or write.
    #[display("Storage error: {message}")]
    Storage { message: String },

    /// A payload could not be serialized.
    #[display("Serialization error: {message}")]
    Serialization { message: String },
}
