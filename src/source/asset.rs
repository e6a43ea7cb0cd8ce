//! Bundled read-only asset stores

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use log::debug;

use super::{ByteResolver, checked_len, read_exactly};
use crate::error::{LoadError, Result};

pub const DEFAULT_ASSET_PREFIX: &str = "assets";

/// An opened asset: its advertised length and a reader over its content
pub struct AssetHandle {
    pub len: u64,
    pub reader: Box<dyn Read + Send>,
}

/// Read-only store of bundled documents
pub trait AssetStore: Send + Sync {
    /// Prefix under which logical asset names live inside the bundle
    fn prefix(&self) -> &str;

    /// Open a bundle key produced by [`lookup_key`](AssetStore::lookup_key)
    fn open(&self, key: &str) -> io::Result<AssetHandle>;

    /// Map a logical asset name to its bundle key
    fn lookup_key(&self, name: &str) -> Result<String> {
        let name = name.trim_start_matches('/');
        let escapes = Path::new(name)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(LoadError::invalid(format!(
                "asset identifier {name:?} is not a bundle-relative name"
            )));
        }

        let prefix = self.prefix().trim_matches('/');
        if prefix.is_empty() {
            Ok(name.to_string())
        } else {
            Ok(format!("{prefix}/{name}"))
        }
    }
}

/// Assets stored under a directory on disk
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
    prefix: String,
}

impl DirAssets {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }
}

impl AssetStore for DirAssets {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn open(&self, key: &str) -> io::Result<AssetHandle> {
        let file = File::open(self.root.join(key))?;
        let len = file.metadata()?.len();
        Ok(AssetHandle {
            len,
            reader: Box::new(file),
        })
    }
}

/// Assets held in memory, keyed by bundle key
#[derive(Debug, Clone)]
pub struct MemoryAssets {
    prefix: String,
    entries: HashMap<String, Arc<[u8]>>,
}

impl MemoryAssets {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entries: HashMap::new(),
        }
    }

    /// Register `bytes` under the logical asset `name`
    pub fn insert(&mut self, name: &str, bytes: impl Into<Arc<[u8]>>) -> Result<()> {
        let key = self.lookup_key(name)?;
        self.entries.insert(key, bytes.into());
        Ok(())
    }
}

impl Default for MemoryAssets {
    fn default() -> Self {
        Self::new(DEFAULT_ASSET_PREFIX)
    }
}

struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AssetStore for MemoryAssets {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn open(&self, key: &str) -> io::Result<AssetHandle> {
        let bytes = self.entries.get(key).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no asset {key:?}"))
        })?;
        Ok(AssetHandle {
            len: bytes.len() as u64,
            reader: Box::new(Cursor::new(SharedBytes(Arc::clone(bytes)))),
        })
    }
}

/// Reads a named document out of an [`AssetStore`]
pub(super) struct AssetResolver<'a> {
    store: &'a dyn AssetStore,
    name: String,
}

impl<'a> AssetResolver<'a> {
    pub(super) fn new(store: &'a dyn AssetStore, name: String) -> Self {
        Self { store, name }
    }
}

impl ByteResolver for AssetResolver<'_> {
    fn describe(&self) -> String {
        format!("asset {}", self.name)
    }

    fn fetch(&mut self) -> Result<Vec<u8>> {
        let key = self.store.lookup_key(&self.name)?;
        let what = format!("asset {key}");
        let handle = self
            .store
            .open(&key)
            .map_err(|e| LoadError::read(&what, e))?;

        let len = checked_len(handle.len, &what)?;
        debug!("reading {len} bytes from {what}");
        read_exactly(handle.reader, len, &what)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn lookup_key_prefixes_bundle_directory() {
        let store = MemoryAssets::default();
        assert_eq!(store.lookup_key("doc.pdf").unwrap(), "assets/doc.pdf");
        assert_eq!(
            store.lookup_key("/books/doc.pdf").unwrap(),
            "assets/books/doc.pdf"
        );

        let bare = MemoryAssets::new("");
        assert_eq!(bare.lookup_key("doc.pdf").unwrap(), "doc.pdf");
    }

    #[test]
    fn lookup_key_rejects_escapes() {
        let store = MemoryAssets::default();
        for name in ["../secret.pdf", "a/../../b.pdf", ""] {
            assert_eq!(
                store.lookup_key(name).unwrap_err().kind(),
                ErrorKind::InvalidArgument,
                "{name}"
            );
        }
    }

    #[test]
    fn reads_memory_asset() {
        let mut store = MemoryAssets::default();
        store.insert("manual.pdf", b"%PDF-manual".to_vec()).unwrap();

        let bytes = AssetResolver::new(&store, "manual.pdf".into())
            .fetch()
            .unwrap();
        assert_eq!(bytes, b"%PDF-manual");
    }

    #[test]
    fn reads_directory_asset() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("bundle")).unwrap();
        std::fs::write(tmp.path().join("bundle/guide.pdf"), vec![9u8; 300]).unwrap();

        let store = DirAssets::new(tmp.path(), "bundle");
        let bytes = AssetResolver::new(&store, "guide.pdf".into())
            .fetch()
            .unwrap();
        assert_eq!(bytes.len(), 300);
    }

    #[test]
    fn missing_asset_is_io_error() {
        let store = MemoryAssets::default();
        let err = AssetResolver::new(&store, "absent.pdf".into())
            .fetch()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("assets/absent.pdf"));
    }
}
