use std::fs::File;
use std::io;
use std::path::PathBuf;

use log::debug;

use super::{ByteResolver, checked_len, read_exactly};
use crate::error::{LoadError, Result};

/// Reads a document from the local filesystem
#[derive(Debug)]
pub struct FileResolver {
    path: PathBuf,
}

impl FileResolver {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ByteResolver for FileResolver {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn fetch(&mut self) -> Result<Vec<u8>> {
        let what = self.describe();
        let file = File::open(&self.path).map_err(|e| LoadError::read(&what, e))?;
        let metadata = file.metadata().map_err(|e| LoadError::read(&what, e))?;
        if !metadata.is_file() {
            return Err(LoadError::read(
                &what,
                io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        let len = checked_len(metadata.len(), &what)?;
        debug!("reading {len} bytes from {what}");
        read_exactly(file, len, &what)
    }
}
