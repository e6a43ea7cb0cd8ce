use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, warn};

use super::{ByteResolver, read_exactly};
use crate::error::{LoadError, Result};
use crate::request::StreamEndpoint;

/// Reads a document of known length from a TCP peer.
///
/// A fresh connection is opened per fetch and dropped on every exit path.
#[derive(Debug)]
pub struct StreamResolver {
    endpoint: StreamEndpoint,
    read_timeout: Option<Duration>,
}

impl StreamResolver {
    #[must_use]
    pub fn new(endpoint: StreamEndpoint, read_timeout: Option<Duration>) -> Self {
        Self {
            endpoint,
            read_timeout,
        }
    }

    fn connect(&self) -> Result<TcpStream> {
        let address = self.endpoint.address();
        let connection_error = |source: io::Error| LoadError::Connection {
            endpoint: address.clone(),
            source,
        };

        let addrs = (self.endpoint.host.as_str(), self.endpoint.port)
            .to_socket_addrs()
            .map_err(connection_error)?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = match self.read_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!("connect to {addr} failed: {e}");
                    last_err = Some(e);
                }
            }
        }

        Err(connection_error(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
        })))
    }
}

impl ByteResolver for StreamResolver {
    fn describe(&self) -> String {
        format!(
            "stream {} ({} bytes)",
            self.endpoint.address(),
            self.endpoint.expected_len
        )
    }

    fn fetch(&mut self) -> Result<Vec<u8>> {
        let stream = self.connect()?;
        if let Err(e) = stream.set_read_timeout(self.read_timeout) {
            warn!("could not set read timeout on {}: {e}", self.endpoint.address());
        }

        debug!("{} connected", self.describe());
        read_stream(stream, self.endpoint.expected_len)
    }
}

/// Read exactly `expected_len` bytes from an already opened stream
pub fn read_stream<R: Read>(reader: R, expected_len: usize) -> Result<Vec<u8>> {
    read_exactly(reader, expected_len, "byte stream")
}
