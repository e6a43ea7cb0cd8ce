//! Load pipeline: dispatch, resolve, optionally decrypt

use log::{debug, info, warn};

use crate::cipher::{self, XorKey};
use crate::error::Result;
use crate::request::{LoadRequest, LoadResult};
use crate::source::Sources;

/// Pipeline stage for a single request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Validating the request and selecting a resolver
    Dispatching,
    /// Reading raw bytes from the source
    Resolving,
    /// Applying the XOR cipher
    Decrypting,
    Complete,
    Failed,
}

impl Stage {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete | Stage::Failed)
    }

    #[must_use]
    pub fn can_advance_to(self, next: Stage) -> bool {
        match (self, next) {
            (Stage::Dispatching, Stage::Resolving | Stage::Failed) => true,
            (Stage::Resolving, Stage::Decrypting | Stage::Complete | Stage::Failed) => true,
            (Stage::Decrypting, Stage::Complete | Stage::Failed) => true,
            _ => false,
        }
    }
}

/// Stage bookkeeping for one run of the pipeline
#[derive(Clone, Debug)]
pub struct LoadState {
    stage: Stage,
    visited: Vec<Stage>,
}

impl LoadState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage: Stage::Dispatching,
            visited: vec![Stage::Dispatching],
        }
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Every stage entered so far, in order
    #[must_use]
    pub fn visited(&self) -> &[Stage] {
        &self.visited
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal transition {:?} -> {next:?}",
            self.stage
        );
        debug!("stage {:?} -> {next:?}", self.stage);
        self.stage = next;
        self.visited.push(next);
    }
}

impl Default for LoadState {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns a [`LoadRequest`] into a [`LoadResult`].
///
/// Every step is sequential; any failure aborts the run with no partial
/// result and no retry.
#[derive(Debug, Clone, Default)]
pub struct LoadPipeline {
    sources: Sources,
}

impl LoadPipeline {
    #[must_use]
    pub fn new(sources: Sources) -> Self {
        Self { sources }
    }

    #[must_use]
    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    pub fn run(&self, request: LoadRequest) -> Result<LoadResult> {
        self.run_traced(request).0
    }

    /// Run the pipeline and also return the stages it went through
    pub fn run_traced(&self, request: LoadRequest) -> (Result<LoadResult>, LoadState) {
        let mut state = LoadState::new();
        let result = self.drive(request, &mut state);
        match &result {
            Ok(loaded) => {
                state.advance(Stage::Complete);
                info!(
                    "document loaded: {} bytes, decrypted={}",
                    loaded.bytes.len(),
                    loaded.decrypted
                );
            }
            Err(e) => {
                let failed_in = state.stage();
                state.advance(Stage::Failed);
                warn!("document load failed in {failed_in:?}: {e}");
            }
        }
        (result, state)
    }

    fn drive(&self, request: LoadRequest, state: &mut LoadState) -> Result<LoadResult> {
        request.validate()?;
        let LoadRequest {
            source,
            decryption_key,
            password,
            display,
            document_id,
        } = request;

        let key = match decryption_key.as_deref() {
            Some(key) => Some(XorKey::new(key)?),
            None => None,
        };

        info!("loading {} document", source.tag());
        let mut resolver = self.sources.resolver_for(source);

        state.advance(Stage::Resolving);
        let mut bytes = resolver.fetch()?;
        debug!("{} yielded {} bytes", resolver.describe(), bytes.len());

        let decrypted = match key {
            Some(key) => {
                state.advance(Stage::Decrypting);
                cipher::xor_in_place(&mut bytes, &key);
                true
            }
            None => false,
        };

        Ok(LoadResult {
            bytes,
            password,
            display,
            document_id,
            decrypted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::request::{DisplayOptions, StreamEndpoint};
    use tempfile::TempDir;

    #[test]
    fn transitions_follow_the_stage_graph() {
        assert!(Stage::Dispatching.can_advance_to(Stage::Resolving));
        assert!(Stage::Resolving.can_advance_to(Stage::Complete));
        assert!(!Stage::Dispatching.can_advance_to(Stage::Decrypting));
        assert!(!Stage::Complete.can_advance_to(Stage::Failed));
        assert!(Stage::Failed.is_terminal());
    }

    #[test]
    fn plain_load_skips_decrypting() {
        let pipeline = LoadPipeline::default();
        let (result, state) = pipeline.run_traced(LoadRequest::from_bytes(b"plain".to_vec()));

        let loaded = result.unwrap();
        assert_eq!(loaded.bytes, b"plain");
        assert!(!loaded.decrypted);
        assert_eq!(
            state.visited(),
            &[Stage::Dispatching, Stage::Resolving, Stage::Complete]
        );
    }

    #[test]
    fn keyed_load_decrypts_and_passes_options_through() {
        let mut plain = b"hello, document".to_vec();
        let original = plain.clone();
        cipher::apply(&mut plain, "ab").unwrap();

        let display = DisplayOptions {
            night_mode: true,
            ..DisplayOptions::default()
        };
        let request = LoadRequest::from_bytes(plain)
            .with_key("ab")
            .with_password("pw")
            .with_display(display.clone())
            .with_document_id("doc-1");

        let (result, state) = LoadPipeline::default().run_traced(request);
        let loaded = result.unwrap();

        assert_eq!(loaded.bytes, original);
        assert!(loaded.decrypted);
        assert_eq!(loaded.password.as_deref(), Some("pw"));
        assert_eq!(loaded.display, display);
        assert_eq!(loaded.document_id.as_deref(), Some("doc-1"));
        assert_eq!(
            state.visited(),
            &[
                Stage::Dispatching,
                Stage::Resolving,
                Stage::Decrypting,
                Stage::Complete
            ]
        );
    }

    #[test]
    fn empty_key_fails_before_resolving() {
        let tmp = TempDir::new().unwrap();
        let request = LoadRequest::from_file(tmp.path().join("missing.pdf")).with_key("");

        let (result, state) = LoadPipeline::default().run_traced(request);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(state.visited(), &[Stage::Dispatching, Stage::Failed]);
    }

    #[test]
    fn resolver_failure_aborts_without_decrypting() {
        let tmp = TempDir::new().unwrap();
        let request = LoadRequest::from_file(tmp.path().join("missing.pdf")).with_key("k");

        let (result, state) = LoadPipeline::default().run_traced(request);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Io);
        assert_eq!(
            state.visited(),
            &[Stage::Dispatching, Stage::Resolving, Stage::Failed]
        );
    }

    #[test]
    fn malformed_stream_request_is_rejected() {
        let request =
            LoadRequest::from_stream(StreamEndpoint::new("localhost", 4567, 0)).with_key("k");
        let err = LoadPipeline::default().run(request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
