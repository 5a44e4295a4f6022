//! Layered configuration loading
//!
//! Priority (highest to lowest):
//! 1. Environment variables (`{PREFIX}_SECTION__FIELD`)
//! 2. Config file (YAML, JSON or TOML by extension; skipped when absent)
//! 3. `T::default()`

use errors::{CityError, CityResult};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tracing::debug;

/// Separator between nested keys in environment variable names
pub const ENV_NESTING_SEPARATOR: &str = "__";

/// Build the figment for `T` without extracting it
pub fn figment_for<T>(config_path: Option<&Path>, env_prefix: &str) -> CityResult<Figment>
where
    T: Serialize + Default,
{
    let mut figment = Figment::from(Serialized::defaults(T::default()));

    if let Some(path) = config_path {
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("yaml");
        figment = match extension {
            "yaml" | "yml" => figment.merge(Yaml::file(path)),
            "json" => figment.merge(Json::file(path)),
            "toml" => figment.merge(Toml::file(path)),
            other => {
                return Err(CityError::Configuration(format!(
                    "Unsupported config file format: {}",
                    other
                )))
            },
        };
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
        }
    }

    Ok(figment.merge(Env::prefixed(env_prefix).split(ENV_NESTING_SEPARATOR)))
}

/// Load configuration: defaults < file < environment
///
/// `env_prefix` includes the trailing underscore, e.g. `"SENSORSRV_"`.
pub fn load_config<T>(config_path: Option<&Path>, env_prefix: &str) -> CityResult<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    figment_for::<T>(config_path, env_prefix)?
        .extract()
        .map_err(|e| CityError::Configuration(format!("Failed to load configuration: {}", e)))
}
