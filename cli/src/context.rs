//! Store construction and task management for the CLI.

use anyhow::{Context as _, Result};
use roster_business::{DirectoryConfig, DirectoryStore, SearchPagePolicy};
use tracing::instrument;

/// Environment configuration with command-line overrides applied on top.
pub fn resolve_config(
    api_url: Option<String>,
    page_size: Option<usize>,
    reset_page_on_search: bool,
) -> Result<DirectoryConfig> {
    let mut config =
        DirectoryConfig::from_env().context("Failed to read ROSTER_* environment variables")?;
    if let Some(url) = api_url {
        config.api_base_url = url;
    }
    if let Some(size) = page_size {
        config.page_size = size;
    }
    if reset_page_on_search {
        config.search_page_policy = SearchPagePolicy::ResetToFirstPage;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

pub fn build_store(config: DirectoryConfig) -> Result<DirectoryStore> {
    DirectoryStore::new(config).context("Failed to create the directory store")
}

/// Wait for every load in flight and apply the results.
#[instrument(skip_all, name = "await_loads")]
pub async fn settle(store: &mut DirectoryStore) -> Result<()> {
    store
        .settle()
        .await
        .context("Directory store is missing a registered load")
}
