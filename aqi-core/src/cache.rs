use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};
use tracing::debug;

use crate::model::CurrentConditions;

/// Entries older than this are ignored by the resolver.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(60 * 60);

/// A cached reading together with how old it is.
#[derive(Debug, Clone)]
pub struct CachedReading {
    pub value: CurrentConditions,
    pub age: Duration,
}

/// Read-through store for live readings. Writes are last-writer-wins.
pub trait ReadingCache: Send + Sync {
    /// `None` on miss or on an unreadable entry.
    fn read(&self, key: &str) -> Option<CachedReading>;

    fn write(&self, key: &str, value: &CurrentConditions) -> Result<()>;
}

/// One JSON file per key; the age is the file's modification age.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache under the platform cache directory.
    pub fn default_location() -> Result<Self> {
        let dirs = ProjectDirs::from("dev", "aqi", "aqi-cli")
            .ok_or_else(|| anyhow!("Could not determine platform cache directory"))?;

        Ok(Self::new(dirs.cache_dir().join("readings")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl ReadingCache for FileCache {
    fn read(&self, key: &str) -> Option<CachedReading> {
        let path = self.path_for(key);

        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        // A clock that went backwards counts as brand new.
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("Cache entry {} unreadable: {e}", path.display());
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Some(CachedReading { value, age }),
            Err(e) => {
                debug!("Cache entry {} is corrupt: {e}", path.display());
                None
            }
        }
    }

    fn write(&self, key: &str, value: &CurrentConditions) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create cache directory: {}", self.dir.display())
        })?;

        let path = self.path_for(key);
        let json = serde_json::to_string(value).context("Failed to serialize cached reading")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write cache file: {}", path.display()))?;

        Ok(())
    }
}
