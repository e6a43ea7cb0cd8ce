//! Byte-source resolvers
//!
//! Every origin of document bytes implements [`ByteResolver`]. The
//! dispatcher ([`Sources::resolver_for`]) picks one purely from the
//! [`ByteSource`] tag; resolvers share no mutable state.

mod asset;
mod file;
mod memory;
mod stream;

use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LoadError, Result};
use crate::request::{BytePayload, ByteSource};

pub use asset::{AssetHandle, AssetStore, DEFAULT_ASSET_PREFIX, DirAssets, MemoryAssets};
pub use file::FileResolver;
pub use memory::MemoryResolver;
pub use stream::{StreamResolver, read_stream};

/// Produce the complete byte sequence of a document
pub trait ByteResolver {
    /// Human readable description for logs
    fn describe(&self) -> String;

    /// Read the whole document. A resolver is used at most once.
    fn fetch(&mut self) -> Result<Vec<u8>>;
}

/// Everything resolvers need besides the request itself
#[derive(Clone)]
pub struct Sources {
    assets: Arc<dyn AssetStore>,
    read_timeout: Option<Duration>,
}

impl Sources {
    #[must_use]
    pub fn new(assets: Arc<dyn AssetStore>, read_timeout: Option<Duration>) -> Self {
        Self {
            assets,
            read_timeout,
        }
    }

    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Select the resolver for `source`
    #[must_use]
    pub fn resolver_for(&self, source: ByteSource) -> Box<dyn ByteResolver + '_> {
        match source {
            ByteSource::File(path) => Box::new(FileResolver::new(path)),
            ByteSource::Asset(name) => Box::new(asset::AssetResolver::new(&*self.assets, name)),
            ByteSource::Bytes(BytePayload::Resident(bytes)) => Box::new(MemoryResolver::new(bytes)),
            ByteSource::Bytes(BytePayload::Streamed(endpoint)) => {
                Box::new(StreamResolver::new(endpoint, self.read_timeout))
            }
        }
    }
}

impl Default for Sources {
    fn default() -> Self {
        Self::new(Arc::new(MemoryAssets::default()), None)
    }
}

impl std::fmt::Debug for Sources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sources")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

/// Bytes requested from the reader per call
const READ_CHUNK: usize = 64 * 1024;

/// Read exactly `len` bytes from `reader`, looping over partial reads.
///
/// The buffer grows only as bytes arrive, so a declared length larger
/// than the source is reported when the source runs dry rather than
/// allocated up front. A reader that reaches end-of-stream early yields
/// an I/O error; a truncated buffer is never returned.
pub fn read_exactly<R: Read>(mut reader: R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(len.min(READ_CHUNK));
    let mut chunk = vec![0u8; len.min(READ_CHUNK)];

    while bytes.len() < len {
        let want = (len - bytes.len()).min(chunk.len());
        match reader.read(&mut chunk[..want]) {
            Ok(0) => {
                return Err(LoadError::read(
                    what,
                    io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("closed after {} of {len} bytes", bytes.len()),
                    ),
                ));
            }
            Ok(n) => bytes.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(LoadError::read(what, e)),
        }
    }

    Ok(bytes)
}

fn checked_len(len: u64, what: &str) -> Result<usize> {
    usize::try_from(len).map_err(|_| {
        LoadError::read(
            what,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{len} bytes do not fit in memory"),
            ),
        )
    })
}
