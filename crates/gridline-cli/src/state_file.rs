//! Remembered grid state in a JSON file, one entry per section

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gridline_core::{GridState, Result, StateStore};
use parking_lot::Mutex;

/// A [`StateStore`] backed by a single JSON file.
///
/// The whole file is read and rewritten on every change; a missing file is
/// an empty store.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, GridState>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, sections: &BTreeMap<String, GridState>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(sections)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl StateStore for FileStateStore {
    fn get(&self, section: &str) -> Result<Option<GridState>> {
        let _guard = self.lock.lock();
        Ok(self.read()?.remove(section))
    }

    fn set(&self, section: &str, state: &GridState) -> Result<()> {
        let _guard = self.lock.lock();
        let mut sections = self.read()?;
        sections.insert(section.to_string(), state.clone());
        self.write(&sections)?;
        tracing::debug!(path = %self.path.display(), section, "grid state saved");
        Ok(())
    }

    fn remove(&self, section: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let mut sections = self.read()?;
        if sections.remove(section).is_some() {
            self.write(&sections)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sections_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStateStore::new(&path);
        assert_eq!(store.get("gridline:people").unwrap(), None);

        let state = GridState::default()
            .with_page(3)
            .with_sort("name", "desc")
            .with_filter("city", "Linz");
        store.set("gridline:people", &state).unwrap();
        store
            .set("gridline:orders", &GridState::default().with_per_page(50))
            .unwrap();

        let reopened = FileStateStore::new(&path);
        assert_eq!(reopened.get("gridline:people").unwrap(), Some(state));

        reopened.remove("gridline:people").unwrap();
        assert_eq!(store.get("gridline:people").unwrap(), None);
        assert!(store.get("gridline:orders").unwrap().is_some());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStateStore::new(&path);
        assert!(matches!(
            store.get("any"),
            Err(gridline_core::GridError::Serialization(_))
        ));
    }
}
