//! Configuration module for the dbroute router

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::datasource::DataSourceDescriptor;
use crate::error::ConfigError;
use crate::shard;

/// Environment variable prefix used by [`RouterSettings::from_env`]
pub const ENV_PREFIX: &str = "DB_ROUTER_";

/// Content hash applied to routing key values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashFunction {
    /// First 8 bytes of the blake3 digest of the key
    #[default]
    Blake3,
    /// 31-polynomial over UTF-16 code units, as computed by JVM strings.
    /// Keeps shard placement compatible with data written by JVM routers.
    JavaString,
}

impl fmt::Display for HashFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashFunction::Blake3 => write!(f, "blake3"),
            HashFunction::JavaString => write!(f, "java_string"),
        }
    }
}

impl FromStr for HashFunction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blake3" => Ok(HashFunction::Blake3),
            "java_string" | "java" => Ok(HashFunction::JavaString),
            other => Err(ConfigError::InvalidProperty {
                key: "hash_function".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Sharding layout: how many databases, how many tables per database,
/// and which argument field carries the routing key.
///
/// Immutable once constructed; both [`RouterConfig::new`] and
/// deserialization go through the same validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRouterConfig")]
pub struct RouterConfig {
    db_count: u32,
    tb_count: u32,
    router_key: String,
    hash_function: HashFunction,
}

#[derive(Deserialize)]
struct RawRouterConfig {
    db_count: u32,
    tb_count: u32,
    router_key: String,
    #[serde(default)]
    hash_function: HashFunction,
}

impl TryFrom<RawRouterConfig> for RouterConfig {
    type Error = ConfigError;

    fn try_from(raw: RawRouterConfig) -> Result<Self, Self::Error> {
        Ok(RouterConfig::new(raw.db_count, raw.tb_count, raw.router_key)?
            .with_hash_function(raw.hash_function))
    }
}

impl RouterConfig {
    /// Create a validated config using the default hash function
    pub fn new(db_count: u32, tb_count: u32, router_key: impl Into<String>) -> Result<Self, ConfigError> {
        if db_count == 0 {
            return Err(ConfigError::InvalidCount { field: "db_count", value: db_count });
        }
        if tb_count == 0 {
            return Err(ConfigError::InvalidCount { field: "tb_count", value: tb_count });
        }

        let router_key = router_key.into();
        if router_key.trim().is_empty() {
            return Err(ConfigError::MissingRouterKey);
        }

        Ok(Self {
            db_count,
            tb_count,
            router_key,
            hash_function: HashFunction::default(),
        })
    }

    /// Select the hash function
    pub fn with_hash_function(mut self, hash_function: HashFunction) -> Self {
        self.hash_function = hash_function;
        self
    }

    pub fn db_count(&self) -> u32 {
        self.db_count
    }

    pub fn tb_count(&self) -> u32 {
        self.tb_count
    }

    /// Default routing key field name
    pub fn router_key(&self) -> &str {
        &self.router_key
    }

    pub fn hash_function(&self) -> HashFunction {
        self.hash_function
    }

    /// Identifiers of every routed pool this layout can select
    pub fn routed_pool_names(&self) -> impl Iterator<Item = String> {
        shard::routed_pool_names(self.db_count)
    }
}

/// Complete router settings: shard layout plus connection descriptors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Shard layout
    pub router: RouterConfig,

    /// Connection descriptors keyed by pool identifier
    pub pools: BTreeMap<String, DataSourceDescriptor>,

    /// Pool used by operations outside routing control
    pub default_pool: String,
}

impl RouterSettings {
    /// Parse and validate settings from JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: RouterSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `DB_ROUTER_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup using the environment
    /// variable naming scheme.
    ///
    /// Recognized keys (all prefixed with [`ENV_PREFIX`]): `DB_COUNT`,
    /// `TB_COUNT`, `ROUTER_KEY`, `HASH`, `LIST`, `DEFAULT`, and for every
    /// pool named in `LIST` or `DEFAULT`: `<NAME>_URL`, `<NAME>_USERNAME`,
    /// `<NAME>_PASSWORD`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| {
            optional(name).ok_or_else(|| ConfigError::MissingProperty(format!("{}{}", ENV_PREFIX, name)))
        };

        let db_count = parse_count("DB_COUNT", &required("DB_COUNT")?)?;
        let tb_count = parse_count("TB_COUNT", &required("TB_COUNT")?)?;
        let mut router = RouterConfig::new(db_count, tb_count, required("ROUTER_KEY")?)?;
        if let Some(hash) = optional("HASH") {
            router = router.with_hash_function(hash.parse()?);
        }

        let list = required("LIST")?;
        let default_pool = required("DEFAULT")?;

        let mut pools = BTreeMap::new();
        let names = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .chain(std::iter::once(default_pool.as_str()));
        for name in names {
            if pools.contains_key(name) {
                continue;
            }
            let upper = name.to_ascii_uppercase();
            let descriptor = DataSourceDescriptor {
                url: required(&format!("{}_URL", upper))?,
                username: required(&format!("{}_USERNAME", upper))?,
                password: optional(&format!("{}_PASSWORD", upper)).unwrap_or_default(),
            };
            pools.insert(name.to_string(), descriptor);
        }

        let settings = Self { router, pools, default_pool };
        settings.validate()?;

        debug!(
            db_count = settings.router.db_count(),
            tb_count = settings.router.tb_count(),
            pools = settings.pools.len(),
            default_pool = %settings.default_pool,
            "Loaded router settings"
        );

        Ok(settings)
    }

    /// Check that the default pool and every routed pool have a descriptor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.pools.contains_key(&self.default_pool) {
            return Err(ConfigError::UnknownDefaultPool(self.default_pool.clone()));
        }
        if let Some(missing) = self.router.routed_pool_names().find(|name| !self.pools.contains_key(name)) {
            return Err(ConfigError::MissingDescriptor(missing));
        }
        Ok(())
    }
}

fn parse_count(name: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidProperty {
        key: format!("{}{}", ENV_PREFIX, name),
        value: value.to_string(),
    })
}
