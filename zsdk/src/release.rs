use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::Deserialize;

pub const DEFAULT_API_URL: &str = "https://api.github.com/repos/zephyrproject-rtos/sdk-ng/releases";

/// A release asset. Does not contain all fields.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

impl Asset {
    pub fn new(name: impl Into<String>, browser_download_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            browser_download_url: browser_download_url.into(),
        }
    }
}

/// A github release. Does not contain all fields.
#[derive(Clone, Debug, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    assets: Option<Vec<Asset>>,
}

impl Release {
    /// A missing or `null` asset list reads as empty.
    pub fn assets(&self) -> &[Asset] {
        self.assets.as_deref().unwrap_or_default()
    }
}

/// Strips whitespace and a single leading `v`.
pub fn bare_version(version: &str) -> &str {
    let version = version.trim();
    version.strip_prefix('v').unwrap_or(version)
}

pub fn tag_for(version: &str) -> String {
    format!("v{}", bare_version(version))
}

pub struct ReleaseResolver {
    client: Client,
    api_url: String,
}

impl ReleaseResolver {
    pub fn new(api_url: &str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) {
            headers.insert(AUTHORIZATION, format!("Bearer {}", token).parse()?);
        }
        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("zsdk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    /// The tagged endpoint for a non-empty version, otherwise `latest`.
    pub fn url(&self, version: Option<&str>) -> String {
        match version.map(bare_version).filter(|v| !v.is_empty()) {
            Some(version) => format!("{}/tags/{}", self.api_url, tag_for(version)),
            None => format!("{}/latest", self.api_url),
        }
    }

    pub fn resolve(&self, version: Option<&str>) -> Result<Release> {
        let url = self.url(version);
        tracing::info!("resolving release from {}", url);
        let release = self
            .fetch(&url)
            .with_context(|| format!("failed to fetch release metadata from {}", url))?;
        tracing::debug!(
            "release {} has {} assets",
            release.tag_name,
            release.assets().len()
        );
        Ok(release)
    }

    fn fetch(&self, url: &str) -> Result<Release> {
        let resp = self.client.get(url).send()?.error_for_status()?;
        Ok(serde_json::from_reader(resp)?)
    }
}
