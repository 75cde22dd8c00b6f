use anyhow::{Context, Result};
use catalog_search::prefs::MAX_PAGE_SIZE;
use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub listen_addr: SocketAddr,
    /// Base URL of the course API. Without one the embedded demo catalog is served.
    #[serde(default)]
    pub upstream_url: Option<String>,
    pub demo_fallback: bool,
    pub page_size: u32,
    pub template_dir: PathBuf,
    pub theme: String,
    pub category_cache_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("upstream_url is not a valid URL: {0}")]
    Upstream(#[from] url::ParseError),

    #[error("page_size must be between 1 and {max}, got {got}")]
    PageSize { got: u32, max: u32 },
}

impl Settings {
    /// Defaults, then `catalog.toml` if present, then `CATALOG__*` variables.
    pub fn load() -> Result<Self> {
        let builder = defaults()?
            .add_source(File::with_name("catalog").required(false))
            .add_source(
                Environment::with_prefix("CATALOG")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings: Settings = builder
            .build()
            .context("building settings")?
            .try_deserialize()
            .context("deserializing settings")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(SettingsError::PageSize {
                got: self.page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        self.upstream()?;
        Ok(())
    }

    /// The parsed upstream base URL, always ending in `/` so that endpoint
    /// paths join beneath it.
    pub fn upstream(&self) -> Result<Option<Url>, SettingsError> {
        let Some(raw) = self.upstream_url.as_deref().filter(|raw| !raw.trim().is_empty()) else {
            return Ok(None);
        };
        let mut url = Url::parse(raw.trim())?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Some(url))
    }

    pub fn category_ttl(&self) -> Duration {
        Duration::from_secs(self.category_cache_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("listen_addr", "0.0.0.0:8080")?
        .set_default("demo_fallback", false)?
        .set_default("page_size", 12)?
        .set_default("template_dir", "templates")?
        .set_default("theme", "default")?
        .set_default("category_cache_secs", 300)?
        .set_default("request_timeout_secs", 10)?)
}
