use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::fetcher::CrudError;

pub fn page_size_key(table: &str) -> String {
    format!("page_size_{table}")
}

/// Client-local persistence of the page-size choice per table.
pub trait PageSizeStore: Send + Sync {
    fn load(&self, table: &str) -> Result<Option<u32>, CrudError>;
    fn save(&self, table: &str, page_size: u32) -> Result<(), CrudError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw write, for values saved by something other than this client.
    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }
}

impl PageSizeStore for MemoryStore {
    fn load(&self, table: &str) -> Result<Option<u32>, CrudError> {
        let values = self.values.lock().map_err(|_| CrudError::Storage {
            path: "memory".to_string(),
            message: "store lock poisoned".to_string(),
        })?;
        Ok(values
            .get(&page_size_key(table))
            .and_then(|v| v.trim().parse().ok()))
    }

    fn save(&self, table: &str, page_size: u32) -> Result<(), CrudError> {
        let mut values = self.values.lock().map_err(|_| CrudError::Storage {
            path: "memory".to_string(),
            message: "store lock poisoned".to_string(),
        })?;
        values.insert(page_size_key(table), page_size.to_string());
        Ok(())
    }
}

/// JSON object of `page_size_<table>` keys kept in a file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn storage_error(&self, message: String) -> CrudError {
        CrudError::Storage {
            path: self.path.display().to_string(),
            message,
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, serde_json::Value>, CrudError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| self.storage_error(format!("failed to parse: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.storage_error(format!("failed to read: {e}"))),
        }
    }
}

impl PageSizeStore for FileStore {
    fn load(&self, table: &str) -> Result<Option<u32>, CrudError> {
        let values = self.read_all()?;
        Ok(values.get(&page_size_key(table)).and_then(|v| match v {
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }))
    }

    fn save(&self, table: &str, page_size: u32) -> Result<(), CrudError> {
        let mut values = self.read_all()?;
        values.insert(page_size_key(table), serde_json::Value::from(page_size));
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| self.storage_error(format!("failed to create directory: {e}")))?;
        }
        let contents = serde_json::to_string_pretty(&values)
            .map_err(|e| self.storage_error(format!("failed to serialize: {e}")))?;
        std::fs::write(&self.path, contents)
            .map_err(|e| self.storage_error(format!("failed to write: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_persists_per_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("page_sizes.json"));
        assert_eq!(store.load("table1").unwrap(), None);
        store.save("table1", 20).unwrap();
        store.save("table2", 50).unwrap();

        let reopened = FileStore::new(store.path().clone());
        assert_eq!(reopened.load("table1").unwrap(), Some(20));
        assert_eq!(reopened.load("table2").unwrap(), Some(50));
        assert_eq!(reopened.load("table3").unwrap(), None);
    }

    #[test]
    fn memory_store_ignores_unparseable_values() {
        let store = MemoryStore::new();
        store.insert_raw("page_size_table1", "abc");
        assert_eq!(store.load("table1").unwrap(), None);
        store.insert_raw("page_size_table1", "10");
        assert_eq!(store.load("table1").unwrap(), Some(10));
    }
}
