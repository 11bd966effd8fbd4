use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex, RwLock};

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::domain::DatasetId;
use crate::error::GeoportalError;

/// Opaque serialized presentation settings for one dataset. The loader never
/// interprets the content; it only hands it to the host with the layer and
/// keeps the last applied value per dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleDefinition(String);

impl StyleDefinition {
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Keyed style cache shared by concurrent load invocations. Access for the
/// same dataset id serializes around get/put; different ids do not contend.
pub trait StyleStore: Send + Sync {
    fn get(&self, dataset: &DatasetId) -> Result<Option<StyleDefinition>, GeoportalError>;
    fn put(&self, dataset: &DatasetId, style: StyleDefinition) -> Result<(), GeoportalError>;
}

type StyleSlot = Arc<Mutex<Option<StyleDefinition>>>;

/// In-process store. The outer map lock is only taken for writing when a
/// dataset id is seen for the first time; steady-state traffic holds the
/// per-dataset slot mutex.
#[derive(Default)]
pub struct MemoryStyleStore {
    slots: RwLock<HashMap<DatasetId, StyleSlot>>,
}

impl MemoryStyleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, dataset: &DatasetId) -> Result<StyleSlot, GeoportalError> {
        if let Some(slot) = self.slots.read().map_err(|_| poisoned_lock())?.get(dataset) {
            return Ok(Arc::clone(slot));
        }
        let mut map = self.slots.write().map_err(|_| poisoned_lock())?;
        Ok(Arc::clone(
            map.entry(dataset.clone())
                .or_insert_with(|| Arc::new(Mutex::new(None))),
        ))
    }
}

fn poisoned_lock() -> GeoportalError {
    GeoportalError::StylePersistence("style cache lock poisoned".to_string())
}

impl StyleStore for MemoryStyleStore {
    fn get(&self, dataset: &DatasetId) -> Result<Option<StyleDefinition>, GeoportalError> {
        let slot = self.slot(dataset)?;
        let guard = slot.lock().map_err(|_| poisoned_lock())?;
        Ok(guard.clone())
    }

    fn put(&self, dataset: &DatasetId, style: StyleDefinition) -> Result<(), GeoportalError> {
        let slot = self.slot(dataset)?;
        let mut guard = slot.lock().map_err(|_| poisoned_lock())?;
        *guard = Some(style);
        Ok(())
    }
}

/// Durable store backed by one JSON file per dataset under the per-user
/// settings directory. Writes go through a temp file and rename so a reader
/// never observes a half-written style.
pub struct SettingsStyleStore {
    root: Utf8PathBuf,
    locks: MemoryStyleStore,
}

impl SettingsStyleStore {
    pub fn new() -> Result<Self, GeoportalError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.home_dir()
                        .join(".config")
                        .join("moe-geoportal-loader")
                        .join("styles"),
                )
                .ok()
            })
            .ok_or_else(|| {
                GeoportalError::StylePersistence("unable to resolve settings directory".to_string())
            })?;
        Ok(Self::with_root(root))
    }

    pub fn with_root(root: Utf8PathBuf) -> Self {
        Self {
            root,
            locks: MemoryStyleStore::new(),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn style_path(&self, dataset: &DatasetId) -> Utf8PathBuf {
        self.root.join(format!("{}.json", dataset.as_str()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredStyle {
    dataset: String,
    saved_at: String,
    style: StyleDefinition,
}

impl StyleStore for SettingsStyleStore {
    fn get(&self, dataset: &DatasetId) -> Result<Option<StyleDefinition>, GeoportalError> {
        let slot = self.locks.slot(dataset)?;
        let _guard = slot.lock().map_err(|_| poisoned_lock())?;

        let path = self.style_path(dataset);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| GeoportalError::StylePersistence(err.to_string()))?;
        let stored: StoredStyle = serde_json::from_str(&content)
            .map_err(|err| GeoportalError::StylePersistence(err.to_string()))?;
        Ok(Some(stored.style))
    }

    fn put(&self, dataset: &DatasetId, style: StyleDefinition) -> Result<(), GeoportalError> {
        let slot = self.locks.slot(dataset)?;
        let _guard = slot.lock().map_err(|_| poisoned_lock())?;

        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| GeoportalError::StylePersistence(err.to_string()))?;
        let stored = StoredStyle {
            dataset: dataset.as_str().to_string(),
            saved_at: chrono::Utc::now().to_rfc3339(),
            style,
        };
        let content = serde_json::to_vec_pretty(&stored)
            .map_err(|err| GeoportalError::StylePersistence(err.to_string()))?;

        let path = self.style_path(dataset);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| GeoportalError::StylePersistence(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| GeoportalError::StylePersistence(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn dataset(id: &str) -> DatasetId {
        id.parse().unwrap()
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStyleStore::new();
        let id = dataset("vg_50000");
        assert_eq!(store.get(&id).unwrap(), None);

        let style = StyleDefinition::new(r#"{"renderer":"simple-fill"}"#);
        store.put(&id, style.clone()).unwrap();
        assert_eq!(store.get(&id).unwrap(), Some(style));
    }

    #[test]
    fn memory_store_put_overwrites() {
        let store = MemoryStyleStore::new();
        let id = dataset("anaguma");
        store.put(&id, StyleDefinition::new("first")).unwrap();
        store.put(&id, StyleDefinition::new("second")).unwrap();
        assert_eq!(
            store.get(&id).unwrap(),
            Some(StyleDefinition::new("second"))
        );
    }

    #[test]
    fn poisoned_slot_surfaces_a_persistence_error() {
        let store = MemoryStyleStore::new();
        let id = dataset("vg_50000");
        store.put(&id, StyleDefinition::new("ok")).unwrap();

        let slot = store.slot(&id).unwrap();
        let _ = std::thread::spawn(move || {
            let _guard = slot.lock().unwrap();
            panic!("poison the slot");
        })
        .join();

        assert_matches!(store.get(&id), Err(GeoportalError::StylePersistence(_)));
        assert_matches!(
            store.put(&id, StyleDefinition::new("later")),
            Err(GeoportalError::StylePersistence(_))
        );
    }

    #[test]
    fn settings_store_round_trip() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("styles")).unwrap();
        let store = SettingsStyleStore::with_root(root);

        let id = dataset("mo4_v2");
        assert_eq!(store.get(&id).unwrap(), None);

        let style = StyleDefinition::new(r##"{"fill":"#2e8b57"}"##);
        store.put(&id, style.clone()).unwrap();
        assert_eq!(store.get(&id).unwrap(), Some(style));

        // No stray temp file left behind after the rename.
        let leftovers: Vec<_> = std::fs::read_dir(store.root().as_std_path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
