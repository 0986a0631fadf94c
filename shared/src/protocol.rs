/// mDNS service type for hostwatch self-advertisement
pub const SELF_SERVICE_TYPE: &str = "_hostwatch._tcp.local.";

/// DNS-SD meta-query used to enumerate every advertised service type
pub const META_QUERY_TYPE: &str = "_services._dns-sd._udp.local.";

/// Service types, without domain, that carry meaning for naming or URLs
pub const TYPE_AIRPLAY: &str = "_airplay._tcp";
pub const TYPE_AIRPORT: &str = "_airport._tcp";
pub const TYPE_SLEEP_PROXY: &str = "_sleep-proxy._udp";
pub const TYPE_HOME_ASSISTANT: &str = "_home-assistant._tcp";
pub const TYPE_HOMEKIT: &str = "_hap._tcp";
pub const TYPE_SSH: &str = "_ssh._tcp";
pub const TYPE_SMB: &str = "_smb._tcp";
pub const TYPE_IPP: &str = "_ipp._tcp";
pub const TYPE_GOOGLECAST: &str = "_googlecast._tcp";
pub const TYPE_HOSTWATCH: &str = "_hostwatch._tcp";
pub const TYPE_SONOS: &str = "_sonos._tcp";
pub const TYPE_HTTP: &str = "_http._tcp";
pub const TYPE_HTTPS: &str = "_https._tcp";

/// TXT record keys read by the naming heuristics and URL derivation
pub const TXT_FRIENDLY_NAME: &str = "fn";
pub const TXT_MODEL: &str = "model";
pub const TXT_MODEL_SHORT: &str = "md";
pub const TXT_MANUFACTURER: &str = "manufacturer";
pub const TXT_LOCATION_NAME: &str = "location_name";
pub const TXT_PATH: &str = "path";

/// TXT record key used in hostwatch self-advertisement
pub const TXT_API: &str = "api";

/// API path prefix
pub const API_PREFIX: &str = "/v1";
