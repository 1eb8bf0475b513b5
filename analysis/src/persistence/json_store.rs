use super::PersistenceError;
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Records that live in a [`JsonStore`], one file each.
pub trait Storable: Serialize + DeserializeOwned {
    fn id(&self) -> &str;
}

/// Generic JSON-file-per-record persistence store.
pub struct JsonStore<T> {
    dir: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T: Storable> JsonStore<T> {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            _phantom: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Save a record, replacing any record with the same id. Returns the id.
    ///
    /// Writes go to a temporary sibling first so readers never see a
    /// half-written file.
    pub fn save(&self, data: &T) -> Result<String, PersistenceError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.file_path(data.id());
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(data.id().to_string())
    }

    /// Load a record by id. Returns None if not found.
    pub fn load(&self, id: &str) -> Result<Option<T>, PersistenceError> {
        let path = self.file_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Load every record, skipping files that fail to read or parse.
    pub fn load_all(&self) -> Result<Vec<T>, PersistenceError> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }
        let mut items = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .map_err(PersistenceError::from)
                .and_then(|contents| serde_json::from_str::<T>(&contents).map_err(Into::into));
            match parsed {
                Ok(data) => items.push(data),
                Err(e) => tracing::warn!("Skipping unreadable record {:?}: {}", path, e),
            }
        }

        Ok(items)
    }

    /// Delete a record by id.
    pub fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let path = self.file_path(id);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}
