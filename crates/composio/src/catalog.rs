use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hedgeflow_core::errors::IntegrationError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub toolkit: Option<ToolkitRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolkitRef {
    pub slug: String,
}

#[async_trait]
pub trait ToolSource: Send + Sync {
    async fn list_tools(&self, toolkit: &str) -> Result<Vec<ToolDescriptor>, IntegrationError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    /// Unix seconds when the entry was written.
    ts: i64,
    value: Vec<ToolDescriptor>,
}

type CacheFile = BTreeMap<String, CacheEntry>;

/// Tools available for a toolkit whitelist, cached on disk per whitelist.
pub struct ToolCatalog {
    source: Arc<dyn ToolSource>,
    toolkits: Vec<String>,
    cache_path: PathBuf,
    ttl_secs: u64,
}

impl ToolCatalog {
    pub fn new(
        source: Arc<dyn ToolSource>,
        toolkits: &[String],
        cache_path: impl Into<PathBuf>,
        ttl_secs: u64,
    ) -> Self {
        let toolkits = toolkits
            .iter()
            .map(|toolkit| toolkit.trim().to_ascii_lowercase())
            .filter(|toolkit| !toolkit.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self { source, toolkits, cache_path: cache_path.into(), ttl_secs }
    }

    pub fn toolkits(&self) -> &[String] {
        &self.toolkits
    }

    pub fn cache_key(&self) -> String {
        self.toolkits.join(",")
    }

    /// Returns the cached list when fresh, otherwise fetches and rewrites the
    /// cache. `refresh` skips the cache lookup.
    pub async fn tools(&self, refresh: bool) -> Result<Vec<ToolDescriptor>, IntegrationError> {
        let key = self.cache_key();
        let now = Utc::now();

        if !refresh {
            if let Some(cached) = self.read_cached(&key, now) {
                debug!(event_name = "catalog.cache_hit", key = %key, tools = cached.len(), "using cached tool catalog");
                return Ok(cached);
            }
        }

        let tools = self.fetch().await?;
        self.write_cached(&key, &tools, now);
        info!(event_name = "catalog.refreshed", key = %key, tools = tools.len(), "tool catalog refreshed");
        Ok(tools)
    }

    async fn fetch(&self) -> Result<Vec<ToolDescriptor>, IntegrationError> {
        let mut seen = HashSet::new();
        let mut tools = Vec::new();
        let mut last_error = None;
        let mut any_succeeded = self.toolkits.is_empty();

        for toolkit in &self.toolkits {
            match self.source.list_tools(toolkit).await {
                Ok(listed) => {
                    any_succeeded = true;
                    for tool in listed {
                        if seen.insert(tool.slug.clone()) {
                            tools.push(tool);
                        }
                    }
                }
                Err(error) => {
                    warn!(event_name = "catalog.toolkit_failed", toolkit = %toolkit, error = %error, "skipping toolkit");
                    last_error = Some(error);
                }
            }
        }

        match (any_succeeded, last_error) {
            (false, Some(error)) => Err(error),
            _ => Ok(tools),
        }
    }

    fn read_cached(&self, key: &str, now: DateTime<Utc>) -> Option<Vec<ToolDescriptor>> {
        let mut cache = read_cache_file(&self.cache_path)?;
        let entry = cache.remove(key)?;
        let age = now.timestamp().saturating_sub(entry.ts);
        let ttl = i64::try_from(self.ttl_secs).unwrap_or(i64::MAX);
        (age >= 0 && age < ttl).then_some(entry.value)
    }

    fn write_cached(&self, key: &str, tools: &[ToolDescriptor], now: DateTime<Utc>) {
        let mut cache = read_cache_file(&self.cache_path).unwrap_or_default();
        cache.insert(key.to_string(), CacheEntry { ts: now.timestamp(), value: tools.to_vec() });

        if let Err(error) = write_cache_file(&self.cache_path, &cache) {
            warn!(event_name = "catalog.cache_write_failed", path = %self.cache_path.display(), error = %error, "could not persist tool catalog");
        }
    }
}

fn read_cache_file(path: &Path) -> Option<CacheFile> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(cache) => Some(cache),
        Err(error) => {
            warn!(event_name = "catalog.cache_corrupt", path = %path.display(), error = %error, "ignoring unreadable tool catalog cache");
            None
        }
    }
}

fn write_cache_file(path: &Path, cache: &CacheFile) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(cache).map_err(std::io::Error::other)?;
    fs::write(path, raw)
}
