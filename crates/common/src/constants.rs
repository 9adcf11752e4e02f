/// Name under which the module registers with the host framework and tags
/// the OpenRTB user data it writes.
pub const MODULE_NAME: &str = "contxtful";

pub const DEFAULT_HOSTNAME: &str = "api.receptivity.io";

/// Lifetime of a cached receptivity value when no settings override it.
pub const DEFAULT_CACHE_TTL_MS: u64 = 60_000;

/// Event fired on the global event source once the connector script has
/// registered itself.
pub const CONNECTOR_READY_EVENT: &str = "rxConnectorIsReady";

/// Event fired on the connector script element with the first receptivity
/// reading.
pub const INITIAL_RECEPTIVITY_EVENT: &str = "initialReceptivity";

pub const RECEPTIVITY_STATE_FIELD: &str = "ReceptivityState";
