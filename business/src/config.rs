use serde::Deserialize;
use thiserror::Error;
use ustr::Ustr;

use crate::view::{LoadMoreGuard, SearchPagePolicy};

pub const DEFAULT_API_BASE_URL: &str = "https://jsonplaceholder.typicode.com";
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Prefix of the environment variables read by [`DirectoryConfig::from_env`].
pub const ENV_PREFIX: &str = "ROSTER_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid environment configuration: {0}")]
    Env(String),
    #[error("page size must be at least 1")]
    ZeroPageSize,
    #[error("api base url must not be empty")]
    EmptyBaseUrl,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    pub api_base_url: String,
    pub page_size: usize,
    pub search_page_policy: SearchPagePolicy,
    pub load_more_guard: LoadMoreGuard,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    api_base_url: Option<String>,
    page_size: Option<usize>,
    search_page_policy: Option<SearchPagePolicy>,
    load_more_guard: Option<LoadMoreGuard>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            page_size: DEFAULT_PAGE_SIZE,
            search_page_policy: SearchPagePolicy::default(),
            load_more_guard: LoadMoreGuard::default(),
        }
    }
}

impl DirectoryConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Read `ROSTER_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Build from `(name, value)` pairs; names without the `ROSTER_` prefix are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let scoped: Vec<(String, String)> = vars
            .into_iter()
            .filter_map(|(k, v)| {
                k.as_ref()
                    .strip_prefix(ENV_PREFIX)
                    .map(|name| (name.to_owned(), v.as_ref().to_owned()))
            })
            .collect();

        let raw: RawConfig = if scoped.is_empty() {
            RawConfig::default()
        } else {
            serde_env::from_iter(scoped).map_err(|e| ConfigError::Env(e.to_string()))?
        };

        let defaults = Self::default();
        let config = Self {
            api_base_url: raw.api_base_url.unwrap_or(defaults.api_base_url),
            page_size: raw.page_size.unwrap_or(defaults.page_size),
            search_page_policy: raw
                .search_page_policy
                .unwrap_or(defaults.search_page_policy),
            load_more_guard: raw.load_more_guard.unwrap_or(defaults.load_more_guard),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn api_url(&self) -> Ustr {
        Ustr::from(self.api_base_url.trim_end_matches('/'))
    }
}
