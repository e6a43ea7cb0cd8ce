use super::ByteResolver;
use crate::error::{LoadError, Result};

/// Hands back bytes the caller already holds
#[derive(Debug)]
pub struct MemoryResolver {
    payload: Option<Vec<u8>>,
}

impl MemoryResolver {
    #[must_use]
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
        }
    }
}

impl ByteResolver for MemoryResolver {
    fn describe(&self) -> String {
        match &self.payload {
            Some(bytes) => format!("memory payload ({} bytes)", bytes.len()),
            None => "memory payload (consumed)".to_string(),
        }
    }

    fn fetch(&mut self) -> Result<Vec<u8>> {
        match self.payload.take() {
            Some(bytes) if !bytes.is_empty() => Ok(bytes),
            _ => Err(LoadError::invalid("resident byte payload is absent")),
        }
    }
}
