/// Full device status, JSON
pub const STATUS_COMMAND: &str = "ubntbox status";

/// Associated stations (peers), JSON array
pub const PEERS_COMMAND: &str = "wstalist";

/// Aggregate status, `key=value` pairs separated by newlines or commas
pub const AGGREGATE_COMMAND: &str = "ubntbox mca-status";

/// Default management login on airOS devices
pub const DEFAULT_USER: &str = "ubnt";
pub const SSH_PORT: u16 = 22;

/// Tokens stored for boolean values in a `Store`
pub const ENABLED: &str = "enabled";
pub const DISABLED: &str = "disabled";

/// Scrape endpoint path, takes `?target=<host>`
pub const METRICS_PATH: &str = "/metrics";

/// Name of the always-present scrape status series
pub const ERROR_METRIC: &str = "airos_error";
