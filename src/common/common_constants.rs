pub const CUSTOM_DASHBOARDS_PATH: &str = "/api/custom-dashboard";
pub const SHAREABLE_USERS_PATH: &str = "/api/settings/users";
pub const CUSTOM_EVENTS_PATH: &str = "/api/events/settings/event-specifications/custom";
pub const ALERT_CHANNELS_PATH: &str = "/api/events/settings/alertingChannels";
pub const ALERT_CONFIGS_PATH: &str = "/api/events/settings/alerts";
pub const WEBSITE_CONFIGS_PATH: &str = "/api/website-monitoring/config";

pub const DEFAULT_CONFIG_PATH: &str = "config/confmig.yaml";
pub const ENV_PREFIX: &str = "CONFMIG";

// Connection reuse ceiling per backend host for the shared transport.
pub const POOL_MAX_IDLE_PER_HOST: usize = 30;
