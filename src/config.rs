//! Search configuration
//!
//! Tuning values arrive as plain numbers keyed by name, from whatever store
//! the host uses. [`SearchConfig::from_provider`] reads them once per
//! transaction and fills in defaults for anything missing.

use std::{fs, path::Path, time::Duration};

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Configuration keys
pub mod keys {
    /// Pricing unit factory short-circuit timeout, milliseconds
    pub const PU_TIMEOUT_MS: &str = "pu_short_circuit_timeout_ms";

    /// Fare path factory short-circuit timeout, milliseconds
    pub const FARE_PATH_TIMEOUT_MS: &str = "fare_path_short_circuit_timeout_ms";

    /// Multi-passenger short-circuit timeout, milliseconds
    pub const MULTI_PAX_TIMEOUT_MS: &str = "multi_pax_short_circuit_timeout_ms";

    /// Transaction-wide deadline, milliseconds
    pub const GLOBAL_TIMEOUT_MS: &str = "global_timeout_ms";

    /// Pricing unit combinations tried per factory
    pub const MAX_PU_COMBINATIONS: &str = "max_pu_combinations";

    /// Fare path combinations tried per factory
    pub const MAX_FARE_PATH_COMBINATIONS: &str = "max_fare_path_combinations";

    /// Group combinations popped per search
    pub const MAX_GROUP_COMBINATIONS: &str = "max_group_combinations";

    /// Side trip pricing unit combinations tried
    pub const MAX_SIDE_TRIP_SEARCH: &str = "max_side_trip_search";

    /// Circle trip pricing unit combinations tried
    pub const MAX_CIRCLE_TRIP_SEARCH: &str = "max_circle_trip_search";

    /// Fare components allowed in a special fare circle trip
    pub const MAX_SPECIAL_CT_COMPONENTS: &str = "max_special_ct_fare_components";

    /// Fare path combinations tried per request before pausing
    pub const MAX_SEARCH_PER_REQUEST: &str = "max_search_per_request";

    /// Non-zero seeds one search per carrier and fare type bucket
    pub const CARRIER_FARE_SEARCH: &str = "carrier_fare_search";

    /// Non-zero allows pricing units mixing currencies
    pub const ALLOW_MIXED_CURRENCY: &str = "allow_mixed_currency_units";

    /// Alternate date solutions more expensive than the cheapest by this percentage are cut off
    pub const ALT_DATE_PRICE_JUMP_PERCENT: &str = "alt_date_price_jump_percent";

    /// Factory initialisation pool size
    pub const FACTORY_INIT_THREADS: &str = "factory_init_threads";

    /// Group fetch pool size
    pub const GROUP_FETCH_THREADS: &str = "group_fetch_threads";

    /// Itinerary pool size
    pub const ITINERARY_THREADS: &str = "itinerary_threads";

    /// Brand pool size
    pub const BRAND_THREADS: &str = "brand_threads";
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the configuration file
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),
}

/// Source of numeric configuration values.
pub trait ConfigProvider {
    /// Value for `key`, if set.
    fn value(&self, key: &str) -> Option<u64>;

    /// Value for `key` as a flag.
    fn flag(&self, key: &str) -> Option<bool> {
        self.value(key).map(|value| value != 0)
    }
}

/// In-memory configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    values: FxHashMap<String, u64>,
}

impl StaticConfig {
    /// Sets a value
    pub fn set(&mut self, key: impl Into<String>, value: u64) -> &mut Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl<K: Into<String>> FromIterator<(K, u64)> for StaticConfig {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        StaticConfig {
            values: iter.into_iter().map(|(key, value)| (key.into(), value)).collect(),
        }
    }
}

impl ConfigProvider for StaticConfig {
    fn value(&self, key: &str) -> Option<u64> {
        self.values.get(key).copied()
    }
}

/// Configuration read from a flat YAML mapping of key to number.
#[derive(Debug, Clone, Default)]
pub struct YamlConfig {
    values: FxHashMap<String, u64>,
}

impl YamlConfig {
    /// Parses configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a mapping of keys to unsigned numbers.
    pub fn from_str(yaml: &str) -> Result<Self, ConfigError> {
        let values: FxHashMap<String, u64> = serde_norway::from_str(yaml)?;

        Ok(YamlConfig { values })
    }

    /// Reads configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_str(&contents)
    }
}

impl ConfigProvider for YamlConfig {
    fn value(&self, key: &str) -> Option<u64> {
        self.values.get(key).copied()
    }
}

/// Worker pool sizes; zero runs that category synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizes {
    /// Pricing unit factory initialisation
    pub factory_init: usize,

    /// Parallel fare path fetch inside the group search
    pub group_fetch: usize,

    /// One task per itinerary
    pub itinerary: usize,

    /// One task per brand
    pub brand: usize,
}

impl Default for PoolSizes {
    fn default() -> Self {
        PoolSizes {
            factory_init: 4,
            group_fetch: 4,
            itinerary: 4,
            brand: 2,
        }
    }
}

/// Search tuning shared by every factory of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Pricing unit factory deadline, measured from its initialisation
    pub pu_timeout: Option<Duration>,

    /// Fare path factory deadline, measured from its initialisation
    pub fare_path_timeout: Option<Duration>,

    /// Elapsed time after which the group search switches to the same fare
    /// break heuristic
    pub multi_pax_timeout: Option<Duration>,

    /// Transaction deadline armed on the abort signal
    pub global_timeout: Option<Duration>,

    /// Pricing unit combinations tried per factory
    pub max_pu_combinations: u64,

    /// Fare path combinations tried per factory
    pub max_fare_path_combinations: u64,

    /// Group combinations popped per search
    pub max_group_combinations: u64,

    /// Side trip pricing unit combinations tried
    pub max_side_trip_search: u64,

    /// Circle trip pricing unit combinations tried
    pub max_circle_trip_search: u64,

    /// Fare components allowed in an international special fare circle trip
    pub max_special_ct_components: usize,

    /// Fare path combinations tried per request before pausing
    pub max_search_per_request: Option<u64>,

    /// Seed one search per carrier and fare type bucket
    pub carrier_fare_search: bool,

    /// Allow pricing units mixing currencies
    pub allow_mixed_currency_units: bool,

    /// Alternate date cut-off percentage above the cheapest date pair
    pub alt_date_price_jump: Option<u64>,

    /// Worker pool sizes
    pub pools: PoolSizes,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            pu_timeout: None,
            fare_path_timeout: None,
            multi_pax_timeout: None,
            global_timeout: None,
            max_pu_combinations: 100_000,
            max_fare_path_combinations: 100_000,
            max_group_combinations: 100_000,
            max_side_trip_search: 2_000,
            max_circle_trip_search: 5_000,
            max_special_ct_components: 4,
            max_search_per_request: None,
            carrier_fare_search: false,
            allow_mixed_currency_units: false,
            alt_date_price_jump: None,
            pools: PoolSizes::default(),
        }
    }
}

impl SearchConfig {
    /// Reads every known key from `provider`, keeping defaults for unset ones.
    pub fn from_provider(provider: &dyn ConfigProvider) -> Self {
        let defaults = SearchConfig::default();
        let millis = |key| provider.value(key).map(Duration::from_millis);
        let count = |key, default| provider.value(key).unwrap_or(default);
        let threads = |key, default| {
            provider
                .value(key)
                .and_then(|value| usize::try_from(value).ok())
                .unwrap_or(default)
        };

        SearchConfig {
            pu_timeout: millis(keys::PU_TIMEOUT_MS),
            fare_path_timeout: millis(keys::FARE_PATH_TIMEOUT_MS),
            multi_pax_timeout: millis(keys::MULTI_PAX_TIMEOUT_MS),
            global_timeout: millis(keys::GLOBAL_TIMEOUT_MS),
            max_pu_combinations: count(keys::MAX_PU_COMBINATIONS, defaults.max_pu_combinations),
            max_fare_path_combinations: count(keys::MAX_FARE_PATH_COMBINATIONS, defaults.max_fare_path_combinations),
            max_group_combinations: count(keys::MAX_GROUP_COMBINATIONS, defaults.max_group_combinations),
            max_side_trip_search: count(keys::MAX_SIDE_TRIP_SEARCH, defaults.max_side_trip_search),
            max_circle_trip_search: count(keys::MAX_CIRCLE_TRIP_SEARCH, defaults.max_circle_trip_search),
            max_special_ct_components: threads(keys::MAX_SPECIAL_CT_COMPONENTS, defaults.max_special_ct_components),
            max_search_per_request: provider.value(keys::MAX_SEARCH_PER_REQUEST).filter(|budget| *budget > 0),
            carrier_fare_search: provider.flag(keys::CARRIER_FARE_SEARCH).unwrap_or(false),
            allow_mixed_currency_units: provider.flag(keys::ALLOW_MIXED_CURRENCY).unwrap_or(false),
            alt_date_price_jump: provider.value(keys::ALT_DATE_PRICE_JUMP_PERCENT),
            pools: PoolSizes {
                factory_init: threads(keys::FACTORY_INIT_THREADS, defaults.pools.factory_init),
                group_fetch: threads(keys::GROUP_FETCH_THREADS, defaults.pools.group_fetch),
                itinerary: threads(keys::ITINERARY_THREADS, defaults.pools.itinerary),
                brand: threads(keys::BRAND_THREADS, defaults.pools.brand),
            },
        }
    }

    /// Configuration with every worker pool disabled, for callers that want
    /// the whole search on the calling thread.
    #[must_use]
    pub fn synchronous(mut self) -> Self {
        self.pools = PoolSizes {
            factory_init: 0,
            group_fetch: 0,
            itinerary: 0,
            brand: 0,
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use testresult::TestResult;

    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = SearchConfig::from_provider(&StaticConfig::default());

        assert_eq!(config, SearchConfig::default());
    }

    #[test]
    fn reads_timeouts_and_limits() {
        let provider: StaticConfig = [
            (keys::MULTI_PAX_TIMEOUT_MS, 250),
            (keys::PU_TIMEOUT_MS, 0),
            (keys::MAX_GROUP_COMBINATIONS, 12),
            (keys::CARRIER_FARE_SEARCH, 1),
            (keys::MAX_SEARCH_PER_REQUEST, 0),
            (keys::GROUP_FETCH_THREADS, 0),
        ]
        .into_iter()
        .collect();

        let config = SearchConfig::from_provider(&provider);

        assert_eq!(config.multi_pax_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.pu_timeout, Some(Duration::ZERO));
        assert_eq!(config.fare_path_timeout, None);
        assert_eq!(config.max_group_combinations, 12);
        assert!(config.carrier_fare_search);
        assert_eq!(config.max_search_per_request, None);
        assert_eq!(config.pools.group_fetch, 0);
        assert_eq!(config.pools.itinerary, PoolSizes::default().itinerary);
    }

    #[test]
    fn yaml_provider_reads_file() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;

        writeln!(file, "max_pu_combinations: 10")?;
        writeln!(file, "allow_mixed_currency_units: 1")?;

        let config = SearchConfig::from_provider(&YamlConfig::from_path(file.path())?);

        assert_eq!(config.max_pu_combinations, 10);
        assert!(config.allow_mixed_currency_units);

        Ok(())
    }

    #[test]
    fn yaml_provider_rejects_non_numeric_values() {
        assert!(matches!(
            YamlConfig::from_str("max_pu_combinations: lots"),
            Err(ConfigError::Yaml(_))
        ));
    }
}
