//! The persisted slice of catalog state: UI preferences only. Fetched course
//! data and in-progress filters are never stored.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::{error::StoreError, facets::SortKey, query::DEFAULT_PAGE_SIZE};

/// Largest page size a stored preference may ask for.
pub const MAX_PAGE_SIZE: u32 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub sort_key: SortKey,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            sort_key: SortKey::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Preferences {
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        let prefs: Preferences =
            serde_json::from_str(raw).map_err(|err| StoreError::Parse(err.to_string()))?;
        Ok(prefs.sanitized())
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string(self).map_err(|err| StoreError::Parse(err.to_string()))
    }

    /// Clamps the page size into `1..=MAX_PAGE_SIZE`.
    pub fn sanitized(self) -> Self {
        Self {
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
            ..self
        }
    }
}

/// Where preferences live between sessions.
pub trait PreferenceStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Preferences>, StoreError>;
    fn save(&self, prefs: &Preferences) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferences {
    slot: Mutex<Option<Preferences>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(prefs: Preferences) -> Self {
        Self {
            slot: Mutex::new(Some(prefs)),
        }
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self) -> Result<Option<Preferences>, StoreError> {
        let slot = self
            .slot
            .lock()
            .map_err(|err| StoreError::Io(err.to_string()))?;
        Ok(*slot)
    }

    fn save(&self, prefs: &Preferences) -> Result<(), StoreError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|err| StoreError::Io(err.to_string()))?;
        *slot = Some(*prefs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let prefs = Preferences::from_json("{}").unwrap();
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn page_size_is_clamped() {
        let prefs = Preferences::from_json(r#"{"sort_key":"newest","page_size":5000}"#).unwrap();
        assert_eq!(prefs.sort_key, SortKey::Newest);
        assert_eq!(prefs.page_size, MAX_PAGE_SIZE);

        let zero = Preferences::from_json(r#"{"page_size":0}"#).unwrap();
        assert_eq!(zero.page_size, 1);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            Preferences::from_json("not json"),
            Err(StoreError::Parse(_))
        ));
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryPreferences::new();
        assert_eq!(store.load().unwrap(), None);

        let prefs = Preferences {
            sort_key: SortKey::PriceAsc,
            page_size: 24,
        };
        store.save(&prefs).unwrap();
        assert_eq!(store.load().unwrap(), Some(prefs));
    }
}
