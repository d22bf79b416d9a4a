use std::collections::HashMap;
use std::time::Duration;
use clap::ValueEnum;
use reqwest::Url;
use serde::Deserialize;
use strum::{Display, EnumIter, EnumString};
use crate::consts;
use crate::errors::VltError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Display, EnumString, EnumIter, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Region {
    Kerala,
    Karnataka,
    /// West Bengal
    Bengal,
}

impl Region {
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Region::Kerala => consts::ENDPOINT_KERALA,
            Region::Karnataka => consts::ENDPOINT_KARNATAKA,
            Region::Bengal => consts::ENDPOINT_BENGAL,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, ValueEnum)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Compliance {
    #[default]
    Cdac,
    Ais,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Overrides for the built-in region endpoints.
    pub(crate) endpoints: HashMap<Region, String>,
    pub(crate) request_timeout_secs: u64,
    pub(crate) default_interval_secs: u64,
    pub(crate) metrics_port: Option<u16>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            endpoints: HashMap::new(),
            request_timeout_secs: consts::DEFAULT_REQUEST_TIMEOUT_SECS,
            default_interval_secs: consts::DEFAULT_INTERVAL_SECS,
            metrics_port: None,
        }
    }
}

impl AppConfig {
    pub fn from_yaml(yaml: &str) -> Result<AppConfig, serde_yaml::Error> {
        // an empty document deserializes to unit, not to a map
        if yaml.trim().is_empty() {
            return Ok(AppConfig::default());
        }
        serde_yaml::from_str(yaml)
    }

    pub fn endpoint(&self, region: Region) -> Result<Url, VltError> {
        let raw = self
            .endpoints
            .get(&region)
            .map(String::as_str)
            .unwrap_or_else(|| region.default_endpoint());
        Url::parse(raw).map_err(|e| VltError::InvalidEndpoint {
            url: raw.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
