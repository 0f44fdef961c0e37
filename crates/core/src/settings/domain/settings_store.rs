use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::shared::store_error::StoreError;

use super::setting_key::SettingKey;
use super::settings_source::SettingsSource;

/// How long a fetched value is trusted before the source is asked again.
/// Writes made by another process become visible after at most this long.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

struct CachedValue {
    value: Option<String>,
    fetched_at: Instant,
}

/// Typed, cached access to the settings source.
///
/// Reads never fail: a missing, empty or unparseable value yields the
/// caller's fallback, and a source error yields the fallback without
/// caching anything so the next read retries.
pub struct SettingsStore {
    source: Arc<dyn SettingsSource>,
    cache: Mutex<HashMap<SettingKey, CachedValue>>,
    ttl: Duration,
}

impl SettingsStore {
    pub fn new(source: Arc<dyn SettingsSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Raw stored value, `None` when unset or unavailable.
    pub fn get_raw(&self, key: SettingKey) -> Option<String> {
        if let Some(cached) = self.lock_cache().get(&key) {
            if cached.fetched_at.elapsed() < self.ttl {
                return cached.value.clone();
            }
        }

        match self.source.fetch(key.as_str()) {
            Ok(value) => {
                self.lock_cache().insert(
                    key,
                    CachedValue {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                value
            }
            Err(e) => {
                log::warn!("Failed to read setting {key}: {e}");
                None
            }
        }
    }

    pub fn get<T: FromStr>(&self, key: SettingKey, fallback: T) -> T {
        let Some(raw) = self.get_raw(key) else {
            return fallback;
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return fallback;
        }
        match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Setting {key} has unusable value '{raw}', keeping previous");
                fallback
            }
        }
    }

    /// Persist `value` and refresh the cached entry.
    pub fn set(&self, key: SettingKey, value: impl Display) -> Result<(), StoreError> {
        let value = value.to_string();
        self.source.store(key.as_str(), &value)?;
        self.lock_cache().insert(
            key,
            CachedValue {
                value: Some(value),
                fetched_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Drop every cached value so the next reads hit the source.
    pub fn invalidate(&self) {
        self.lock_cache().clear();
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<SettingKey, CachedValue>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
