use crate::collection::DEFAULT_SAVE_DEBOUNCE;
use crate::core::{DbError, Result};
use std::path::PathBuf;
use std::time::Duration;

const URL_SCHEME: &str = "quill:";

/// Where a container keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Lost when the container is dropped
    InMemory,
    /// Single store file, created on first commit
    File(PathBuf),
}

/// Container configuration
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Store location
    pub location: StoreLocation,

    /// Quiet period before a deferred save is issued
    pub save_debounce: Duration,

    /// Entries in each collection's `uid -> InternalId` cache, 0 disables it
    pub fetch_cache_capacity: usize,
}

impl ContainerConfig {
    pub fn new(location: StoreLocation) -> Self {
        Self {
            location,
            save_debounce: DEFAULT_SAVE_DEBOUNCE,
            fetch_cache_capacity: 1,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(StoreLocation::InMemory)
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self::new(StoreLocation::File(path.into()))
    }

    /// Set the debounce delay of `update_and_save_later`
    pub fn save_debounce(mut self, delay: Duration) -> Self {
        self.save_debounce = delay;
        self
    }

    /// Set the fetch cache capacity
    pub fn fetch_cache_capacity(mut self, capacity: usize) -> Self {
        self.fetch_cache_capacity = capacity;
        self
    }

    /// Parse from a store URL
    ///
    /// Format: `quill:memory` or `quill:///absolute/path/to/store`
    ///
    /// # Examples
    ///
    /// ```
    /// use quilldb::{ContainerConfig, StoreLocation};
    ///
    /// let config = ContainerConfig::from_url("quill:///var/lib/todo.quill").unwrap();
    /// assert_eq!(config.location, StoreLocation::File("/var/lib/todo.quill".into()));
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url.strip_prefix(URL_SCHEME).ok_or_else(|| {
            DbError::Configuration(format!("Store URL must start with '{}': {}", URL_SCHEME, url))
        })?;

        if rest == "memory" {
            return Ok(Self::in_memory());
        }

        match rest.strip_prefix("//") {
            Some(path) if path.starts_with('/') && path.len() > 1 => Ok(Self::at_path(path)),
            _ => Err(DbError::Configuration(format!(
                "Store URL must be 'quill:memory' or 'quill:///path': {}",
                url
            ))),
        }
    }

    /// Convert to a store URL. Relative paths have no URL form.
    pub fn to_url(&self) -> Option<String> {
        match &self.location {
            StoreLocation::InMemory => Some(format!("{}memory", URL_SCHEME)),
            StoreLocation::File(path) if path.is_absolute() => {
                Some(format!("{}//{}", URL_SCHEME, path.display()))
            }
            StoreLocation::File(_) => None,
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}
