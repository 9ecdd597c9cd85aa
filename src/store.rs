//! Named dendrogram files.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cluster::Dendrogram;
use crate::codec::{WireReader, WireWriter, DEFAULT_MAX_ITEMS};
use crate::error::{Error, Result};

const EXTENSION: &str = "dendro";

/// A directory of dendrograms stored in the binary layout of [`crate::codec`].
#[derive(Debug, Clone)]
pub struct DendrogramStore {
    root: PathBuf,
    max_items: usize,
}

impl DendrogramStore {
    /// Store files under `root`. The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    /// Set the item limit applied when reading files back.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Directory holding the files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File backing `name`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidName`] for empty names and names that would escape the directory.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        let escapes = name.contains(['/', '\\']) || name.contains("..");
        if name.trim().is_empty() || escapes {
            return Err(Error::InvalidName(name.to_string()));
        }
        Ok(self.root.join(format!("{name}.{EXTENSION}")))
    }

    /// Write `dendrogram` under `name`, replacing any previous file.
    pub fn save(&self, name: &str, dendrogram: &Dendrogram) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        let storage = |source| Error::Storage {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.root).map_err(storage)?;
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        let written = File::create(&tmp).map_err(Error::from).and_then(|file| {
            let mut w = WireWriter::new(BufWriter::new(file));
            w.write(dendrogram)?;
            w.flush()
        });
        if let Err(e) = written {
            let _ = std::fs::remove_file(&tmp);
            return Err(match e {
                Error::Io(source) => storage(source),
                other => other,
            });
        }
        std::fs::rename(&tmp, &path).map_err(storage)?;

        debug!(path = %path.display(), depth = dendrogram.depth(), "saved dendrogram");
        Ok(path)
    }

    /// Read the dendrogram stored under `name`.
    pub fn load(&self, name: &str) -> Result<Dendrogram> {
        let path = self.path_for(name)?;
        let file = File::open(&path).map_err(|source| Error::Storage {
            path: path.clone(),
            source,
        })?;
        let mut r = WireReader::new(BufReader::new(file)).with_max_items(self.max_items);
        let dendrogram: Dendrogram = r.read().map_err(|e| match e {
            Error::Io(source) => Error::Storage {
                path: path.clone(),
                source,
            },
            other => other,
        })?;

        debug!(path = %path.display(), depth = dendrogram.depth(), "loaded dendrogram");
        Ok(dendrogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{Agglomerative, Linkage};
    use crate::data::Dataset;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = DendrogramStore::new(dir.path().join("nested"));
        let data = Dataset::from_rows(vec![vec![0.0], vec![2.0], vec![3.0]]);
        let d = Agglomerative::new(Linkage::Complete).mine(&data, 3).unwrap();

        let path = store.save("run1", &d).unwrap();
        assert!(path.ends_with("run1.dendro"));
        assert!(path.starts_with(store.root()));
        assert_eq!(store.load("run1").unwrap(), d);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_write_is_storage_error_and_leaves_no_temp_file() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let store = DendrogramStore::new(dir.path());
        assert_eq!(store.root(), dir.path());
        // Every write to /dev/full fails with ENOSPC.
        let tmp = dir.path().join("full.dendro.tmp");
        std::os::unix::fs::symlink("/dev/full", &tmp).unwrap();

        let data = Dataset::from_rows(vec![vec![0.0], vec![1.0]]);
        let d = Agglomerative::new(Linkage::Single).mine(&data, 2).unwrap();
        match store.save("full", &d) {
            Err(Error::Storage { path, .. }) => assert!(path.ends_with("full.dendro")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(std::fs::symlink_metadata(&tmp).is_err());
        assert!(!dir.path().join("full.dendro").exists());
    }

    #[test]
    fn test_rejects_escaping_names() {
        let store = DendrogramStore::new("/tmp/unused");
        for bad in ["", "  ", "../x", "a/b", "a\\b"] {
            assert!(matches!(store.path_for(bad), Err(Error::InvalidName(_))), "{bad:?}");
        }
    }

    #[test]
    fn test_missing_and_truncated_files_are_storage_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = DendrogramStore::new(dir.path());
        assert!(matches!(store.load("nope"), Err(Error::Storage { .. })));

        std::fs::write(dir.path().join("short.dendro"), [0, 0, 0, 2, 0]).unwrap();
        assert!(matches!(store.load("short"), Err(Error::Storage { .. })));
    }
}
