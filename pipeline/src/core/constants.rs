// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME: &str = "ragmill";

/// Prefix for consumer names: `worker_{stage}_{id}`
pub const WORKER_NAME_PREFIX: &str = "worker";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name, looked up in the working directory by default
pub const CONFIG_FILE_NAME: &str = "ragmill.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "RAGMILL_CONFIG";

// =============================================================================
// Environment Variables - Logging
// =============================================================================

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "RAGMILL_LOG";

// =============================================================================
// Environment Variables - Queue
// =============================================================================

/// Environment variable for the Redis host
pub const ENV_REDIS_HOST: &str = "RAGMILL_REDIS_HOST";

/// Environment variable for the Redis port
pub const ENV_REDIS_PORT: &str = "RAGMILL_REDIS_PORT";

/// Default Redis host
pub const DEFAULT_REDIS_HOST: &str = "localhost";

/// Default Redis port
pub const DEFAULT_REDIS_PORT: u16 = 6379;

// =============================================================================
// Environment Variables - External Services
// =============================================================================

/// Environment variable for the embedding inference endpoint
pub const ENV_EMBED_API_URL: &str = "Embed_API_URL";

/// Environment variable for the vector-store server URL
pub const ENV_VECTOR_SERVER_URL: &str = "CHROMA_SERVER_URL";

// =============================================================================
// Worker Defaults
// =============================================================================

/// Sleep between polls when the topic is empty, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 1.0;

/// Redis key prefix for the shared status registry
pub const REGISTRY_KEY_PREFIX: &str = "ragmill";
