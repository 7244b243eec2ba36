use super::MarketData;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Default freshness window for saved data (one day)
pub const DEFAULT_CACHE_EXPIRATION: Duration = Duration::from_secs(86_400);

/// JSON file store for market data
///
/// Each dataset lives in `{dir}/{name}.json`. Files older than the
/// freshness window are reported as expired so the caller can refresh them.
#[derive(Debug, Clone)]
pub struct DataStore {
    dir: PathBuf,
    max_age: Duration,
}

impl DataStore {
    /// Create a store rooted at `dir`
    ///
    /// The directory is created lazily on the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_age: DEFAULT_CACHE_EXPIRATION,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// True when the dataset is missing or older than the freshness window
    pub fn is_cache_expired(&self, name: &str) -> bool {
        let modified = fs::metadata(self.path_for(name)).and_then(|m| m.modified());
        match modified {
            Ok(modified) => SystemTime::now()
                .duration_since(modified)
                .map(|age| age > self.max_age)
                .unwrap_or(false),
            Err(_) => true,
        }
    }

    /// Save a dataset, replacing any previous file
    pub fn save(&self, name: &str, data: &MarketData) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(name);
        let json = serde_json::to_string(data)?;
        fs::write(&path, json)?;

        tracing::debug!(
            "Saved {} return rows for {} instruments to {}",
            data.returns.len(),
            data.returns.instruments().len(),
            path.display()
        );

        Ok(path)
    }

    /// Load a dataset regardless of its age
    pub fn load(&self, name: &str) -> Result<MarketData> {
        let path = self.path_for(name);
        let json = fs::read_to_string(&path)?;
        let data: MarketData = serde_json::from_str(&json)?;

        data.returns.validate()?;
        if let Some(prices) = &data.prices {
            prices.validate()?;
        }

        tracing::info!(
            "Loaded {} return rows for {} instruments from {}",
            data.returns.len(),
            data.returns.instruments().len(),
            path.display()
        );

        Ok(data)
    }

    /// Load a dataset only if it is still fresh
    pub fn load_fresh(&self, name: &str) -> Result<Option<MarketData>> {
        if self.is_cache_expired(name) {
            tracing::warn!("Cached data for {} is missing or expired", name);
            return Ok(None);
        }
        self.load(name).map(Some)
    }
}
