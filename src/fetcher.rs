use bytes::Bytes;
use elsa::FrozenMap;
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;

use crate::error::{Result, SpmError};
use crate::reference::{Reference, ReferenceKind};

pub const DEFAULT_REGISTRY: &str = "https://registry.yarnpkg.com";

#[derive(Debug, Deserialize)]
struct RegistryPackage {
    #[serde(default)]
    versions: std::collections::HashMap<String, serde_json::Value>,
}

/// Retrieves package tarballs and version lists. Holds a
/// retrying HTTP client and per-process caches so a package that's visited
/// from multiple branches of the resolution fan-out is only fetched once.
pub struct Fetcher {
    registry: String,
    client: ClientWithMiddleware,
    tarball_cache: FrozenMap<String, Box<Bytes>>,
    versions_cache: FrozenMap<String, Box<Vec<String>>>,
}

impl Fetcher {
    pub fn new() -> Self {
        Self::with_registry(DEFAULT_REGISTRY)
    }

    pub fn with_registry(registry: impl Into<String>) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Fetcher {
            registry: registry.into(),
            client,
            tarball_cache: FrozenMap::new(),
            versions_cache: FrozenMap::new(),
        }
    }

    /// Dispatches on the reference's shape: a path is read from disk, an
    /// exact version is turned into a registry tarball URL, anything else
    /// is fetched as a URL directly.
    pub async fn fetch_tarball(&self, name: &str, reference: &Reference) -> Result<Bytes> {
        match reference.kind() {
            ReferenceKind::Path(path) => {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| SpmError::io(path.clone(), e))?;
                Ok(Bytes::from(bytes))
            }
            ReferenceKind::Exact(version) => {
                let url = format!("{}/{}/-/{}-{}.tgz", self.registry, name, name, version);
                self.fetch_url(&url).await
            }
            ReferenceKind::Url(url) => self.fetch_url(&url).await,
            ReferenceKind::Range(range) => Err(SpmError::UnsatisfiedRange {
                name: name.to_string(),
                range,
            }),
        }
    }

    async fn fetch_url(&self, url: &str) -> Result<Bytes> {
        if let Some(cached) = self.tarball_cache.get(url) {
            return Ok(cached.clone());
        }

        let response = self
            .client
            .get(url)
            .header("User-Agent", "spm (minimal registry package installer)")
            .send()
            .await
            .map_err(|e| SpmError::Fetch {
                reference: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(SpmError::FetchStatus {
                reference: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| SpmError::FetchBody {
            reference: url.to_string(),
            source: e,
        })?;

        Ok(self
            .tarball_cache
            .insert(url.to_string(), Box::new(bytes))
            .clone())
    }

    /// `GET https://<registry>/<name>`, returning the keys of `versions`.
    pub async fn fetch_versions(&self, name: &str) -> Result<Vec<String>> {
        if let Some(cached) = self.versions_cache.get(name) {
            return Ok(cached.clone());
        }

        let url = format!("{}/{}", self.registry, name);
        let response = self
            .client
            .get(&url)
            .header("User-Agent", "spm (minimal registry package installer)")
            .send()
            .await
            .map_err(|e| SpmError::Fetch {
                reference: url.clone(),
                source: e,
            })?;

        match response.status() {
            StatusCode::OK => {}
            status => {
                return Err(SpmError::FetchStatus {
                    reference: url,
                    status: status.as_u16(),
                })
            }
        }

        let package: RegistryPackage = response.json().await.map_err(|e| SpmError::FetchBody {
            reference: url.clone(),
            source: e,
        })?;

        let versions: Vec<String> = package.versions.into_keys().collect();

        Ok(self
            .versions_cache
            .insert(name.to_string(), Box::new(versions))
            .clone())
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}
