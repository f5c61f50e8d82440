use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::models::{FilterDescriptor, FilterKind, ForcedFilter, Pager, SortDirection};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Search provider configuration
    pub provider: ProviderConfig,

    /// Backend channel configuration
    pub channel: ChannelConfig,
}

impl Config {
    /// Load configuration from embedded defaults, file and environment
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("SEARCHBOX_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: SEARCHBOX_)
            .add_source(
                config::Environment::with_prefix("SEARCHBOX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<()> {
        self.provider.validate()?;
        self.channel.validate()
    }
}

/// What one search provider offers and how its requests are shaped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Index the provider searches
    pub index: String,

    /// Fields the text clause matches over
    pub fields: Vec<String>,

    /// Analyzer for the text clause
    #[serde(default = "default_analyzer")]
    pub analyzer: String,

    /// Per-field boost factors; fields without an entry stay unboosted
    #[serde(default)]
    pub boost: BTreeMap<String, f32>,

    /// Default sort order; query sort overrides it per field
    #[serde(default)]
    pub sorting: BTreeMap<String, SortDirection>,

    /// Default result window for queries that carry none
    #[serde(default)]
    pub pager: Option<Pager>,

    /// Facets offered for filtering
    #[serde(default)]
    pub filters: Vec<FilterDescriptor>,

    /// Selections applied to every request, invisible to published state
    #[serde(default)]
    pub force: Vec<ForcedFilter>,

    /// Fields interval selections are accepted for; empty disables intervals
    #[serde(default)]
    pub intervals: Vec<String>,

    /// Logical date field -> physical from/to columns
    #[serde(default)]
    pub dates: BTreeMap<String, DateFieldMapping>,

    /// Autocomplete block; absent disables the capability
    #[serde(default)]
    pub autocomplete: Option<AutocompleteConfig>,

    /// Search result cache TTL (seconds)
    #[serde(default = "default_cache_expire")]
    pub cache_expire_secs: u64,
}

impl ProviderConfig {
    /// Minimal provider over one index and a set of text fields
    pub fn new(index: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            index: index.into(),
            fields,
            analyzer: default_analyzer(),
            boost: BTreeMap::new(),
            sorting: BTreeMap::new(),
            pager: None,
            filters: Vec::new(),
            force: Vec::new(),
            intervals: Vec::new(),
            dates: BTreeMap::new(),
            autocomplete: None,
            cache_expire_secs: default_cache_expire(),
        }
    }

    /// Whether interval selections on this field are accepted
    pub fn accepts_interval(&self, field: &str) -> bool {
        self.intervals.iter().any(|f| f == field)
    }

    pub fn validate(&self) -> Result<()> {
        if self.index.trim().is_empty() {
            return Err(Error::Configuration(
                "provider.index must not be empty".to_string(),
            ));
        }
        if self.fields.is_empty() {
            return Err(Error::Configuration(
                "provider.fields must name at least one text field".to_string(),
            ));
        }
        for forced in &self.force {
            if forced.kind == FilterKind::Taxonomy && forced.values.is_empty() {
                return Err(Error::Configuration(format!(
                    "forced taxonomy filter on '{}' has no values",
                    forced.field
                )));
            }
        }
        for (field, mapping) in &self.dates {
            if mapping.from.trim().is_empty() || mapping.to.trim().is_empty() {
                return Err(Error::Configuration(format!(
                    "date mapping for '{field}' needs both physical columns"
                )));
            }
        }
        if let Some(autocomplete) = &self.autocomplete {
            if autocomplete.field.trim().is_empty() {
                return Err(Error::Configuration(
                    "autocomplete.field must not be empty".to_string(),
                ));
            }
            if autocomplete.size == 0 {
                return Err(Error::Configuration(
                    "autocomplete.size must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Physical columns backing a logical date field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateFieldMapping {
    pub from: String,
    pub to: String,
}

/// Autocomplete capability settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteConfig {
    /// Index override; falls back to the provider index
    #[serde(default)]
    pub index: Option<String>,

    /// Field the prefix matches and suggestions are read from
    #[serde(default = "default_autocomplete_field")]
    pub field: String,

    /// Number of suggestions per request
    #[serde(default = "default_autocomplete_size")]
    pub size: u32,

    /// Suggestion cache TTL (seconds)
    #[serde(default = "default_autocomplete_cache_expire")]
    pub cache_expire_secs: u64,
}

impl Default for AutocompleteConfig {
    fn default() -> Self {
        Self {
            index: None,
            field: default_autocomplete_field(),
            size: default_autocomplete_size(),
            cache_expire_secs: default_autocomplete_cache_expire(),
        }
    }
}

/// How the backend channel dials and authenticates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// WebSocket endpoint of the search backend
    pub host: String,

    /// Token service configuration
    pub auth: AuthConfig,

    /// Dial + upgrade timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-request response timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ChannelConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.host.starts_with("ws://") && !self.host.starts_with("wss://") {
            return Err(Error::Configuration(format!(
                "channel.host must be a ws:// or wss:// URL, got '{}'",
                self.host
            )));
        }
        self.auth.validate()
    }
}

/// Token service settings. The api key may live directly in config or in
/// the environment variable named by `apikey_env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Token endpoint (POST)
    pub endpoint: String,

    /// Api key exchanged for a session token
    #[serde(default)]
    pub apikey: Option<String>,

    /// Environment variable holding the api key
    #[serde(default)]
    pub apikey_env: Option<String>,

    /// Token max age before refresh (seconds); absent reuses the token
    /// until the backend rejects it
    #[serde(default)]
    pub token_max_age_secs: Option<u64>,
}

impl AuthConfig {
    /// The api key, from config or the environment
    pub fn resolve_apikey(&self) -> Result<String> {
        if let Some(key) = self.apikey.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        if let Some(var) = &self.apikey_env {
            return std::env::var(var).map_err(|_| {
                Error::Configuration(format!("api key environment variable '{var}' is not set"))
            });
        }
        Err(Error::Configuration(
            "channel.auth needs apikey or apikey_env".to_string(),
        ))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(Error::Configuration(format!(
                "channel.auth.endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.apikey.is_none() && self.apikey_env.is_none() {
            return Err(Error::Configuration(
                "channel.auth needs apikey or apikey_env".to_string(),
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_analyzer() -> String {
    "string_search".to_string()
}

fn default_cache_expire() -> u64 {
    60
}

fn default_autocomplete_field() -> String {
    "title".to_string()
}

fn default_autocomplete_size() -> u32 {
    10
}

fn default_autocomplete_cache_expire() -> u64 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderConfig {
        ProviderConfig::new("documents", vec!["title".to_string(), "body".to_string()])
    }

    #[test]
    fn test_default_config_values() {
        assert_eq!(default_analyzer(), "string_search");
        assert_eq!(default_cache_expire(), 60);
        assert_eq!(default_autocomplete_cache_expire(), 5);
        assert_eq!(default_request_timeout(), 30);
    }

    #[test]
    fn test_provider_validation() {
        assert!(provider().validate().is_ok());

        let mut empty_index = provider();
        empty_index.index = "  ".to_string();
        assert!(empty_index.validate().is_err());

        let mut no_fields = provider();
        no_fields.fields.clear();
        assert!(no_fields.validate().is_err());

        let mut bad_force = provider();
        bad_force.force.push(ForcedFilter {
            kind: FilterKind::Taxonomy,
            field: "topic".to_string(),
            values: Vec::new(),
        });
        assert!(bad_force.validate().is_err());
    }

    #[test]
    fn test_channel_validation() {
        let channel = ChannelConfig {
            host: "wss://search.internal/socket".to_string(),
            auth: AuthConfig {
                endpoint: "https://search.internal/auth".to_string(),
                apikey: Some("k".to_string()),
                apikey_env: None,
                token_max_age_secs: None,
            },
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        };
        assert!(channel.validate().is_ok());

        let mut plain_http = channel.clone();
        plain_http.host = "https://search.internal/socket".to_string();
        assert!(plain_http.validate().is_err());

        let mut keyless = channel;
        keyless.auth.apikey = None;
        assert!(keyless.validate().is_err());
    }

    #[test]
    fn test_apikey_resolution_prefers_direct_value() {
        let auth = AuthConfig {
            endpoint: "https://search.internal/auth".to_string(),
            apikey: Some("direct".to_string()),
            apikey_env: Some("SEARCHBOX_TEST_APIKEY_UNSET".to_string()),
            token_max_age_secs: None,
        };
        assert_eq!(auth.resolve_apikey().unwrap(), "direct");
    }

    #[test]
    fn test_accepts_interval_gate() {
        let mut provider = provider();
        assert!(!provider.accepts_interval("pages"));
        provider.intervals.push("pages".to_string());
        assert!(provider.accepts_interval("pages"));
    }
}
