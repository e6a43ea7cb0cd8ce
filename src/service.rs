//! Load service - runs each request on its own worker thread

use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use flume::{Receiver, Sender};
use log::{debug, error};

use crate::error::{LoadError, Result};
use crate::pipeline::LoadPipeline;
use crate::request::{LoadOutcome, LoadRequest, LoadResponse, RequestId};

/// Dispatches load requests to background workers.
///
/// Each worker owns its request and buffer and posts exactly one
/// [`LoadResponse`] back over the response channel.
pub struct LoadService {
    pipeline: LoadPipeline,
    response_tx: Sender<LoadResponse>,
    response_rx: Receiver<LoadResponse>,
    next_request_id: u64,
    pending: HashMap<RequestId, &'static str>,
}

impl LoadService {
    #[must_use]
    pub fn new(pipeline: LoadPipeline) -> Self {
        let (response_tx, response_rx) = flume::unbounded();
        Self {
            pipeline,
            response_tx,
            response_rx,
            next_request_id: 1,
            pending: HashMap::new(),
        }
    }

    /// Start loading `request` on a fresh worker thread
    pub fn submit(&mut self, request: LoadRequest) -> Result<RequestId> {
        let id = self.next_id();
        let tag = request.source.tag();
        let pipeline = self.pipeline.clone();
        let tx = self.response_tx.clone();

        thread::Builder::new()
            .name(format!("docload-{}", id.0))
            .spawn(move || {
                debug!("worker {} started for {tag} source", id.0);
                let result = panic::catch_unwind(AssertUnwindSafe(|| pipeline.run(request)))
                    .unwrap_or_else(|payload| {
                        let reason = panic_reason(payload.as_ref());
                        error!("worker {} panicked: {reason}", id.0);
                        Err(LoadError::Io(io::Error::other(format!(
                            "load worker panicked: {reason}"
                        ))))
                    });
                let outcome = LoadOutcome::from(result);
                if tx.send(LoadResponse { id, outcome }).is_err() {
                    error!("load service dropped before request {} finished", id.0);
                }
            })
            .map_err(LoadError::Io)?;

        self.pending.insert(id, tag);
        Ok(id)
    }

    /// Collect every response that has arrived so far
    pub fn poll_responses(&mut self) -> Vec<LoadResponse> {
        let mut responses = vec![];

        while let Ok(response) = self.response_rx.try_recv() {
            self.pending.remove(&response.id);
            responses.push(response);
        }

        responses
    }

    /// Block until the next response arrives
    pub fn wait_next(&mut self) -> Option<LoadResponse> {
        if self.pending.is_empty() {
            return None;
        }
        let response = self.response_rx.recv().ok()?;
        self.pending.remove(&response.id);
        Some(response)
    }

    /// Get the response receiver for event-loop integration
    #[must_use]
    pub fn response_receiver(&self) -> &Receiver<LoadResponse> {
        &self.response_rx
    }

    #[must_use]
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::source::{AssetHandle, AssetStore, Sources};
    use std::sync::Arc;
    use std::time::Duration;

    struct ExplodingAssets;

    impl AssetStore for ExplodingAssets {
        fn prefix(&self) -> &str {
            "assets"
        }

        fn open(&self, _key: &str) -> io::Result<AssetHandle> {
            panic!("asset store exploded");
        }
    }

    #[test]
    fn each_request_gets_exactly_one_response() {
        let mut service = LoadService::new(LoadPipeline::default());
        let ok = service
            .submit(LoadRequest::from_bytes(b"abc".to_vec()))
            .unwrap();
        let bad = service
            .submit(LoadRequest::from_bytes(b"abc".to_vec()).with_key(""))
            .unwrap();
        assert_ne!(ok, bad);
        assert_eq!(service.pending_count(), 2);

        let mut responses = vec![
            service.wait_next().unwrap(),
            service.wait_next().unwrap(),
        ];
        assert!(service.wait_next().is_none());
        responses.sort_by_key(|r| r.id.0);

        assert_eq!(responses[0].id, ok);
        assert!(matches!(&responses[0].outcome, LoadOutcome::Complete(r) if r.bytes == b"abc"));
        assert_eq!(responses[1].id, bad);
        assert!(matches!(
            &responses[1].outcome,
            LoadOutcome::Failed(e) if e.kind() == ErrorKind::InvalidArgument
        ));
        assert!(!service.is_pending(ok));
    }

    #[test]
    fn poll_is_non_blocking() {
        let mut service = LoadService::new(LoadPipeline::default());
        assert!(service.poll_responses().is_empty());

        let id = service
            .submit(LoadRequest::from_bytes(vec![1, 2, 3]))
            .unwrap();
        let response = service.response_receiver().recv().unwrap();
        assert_eq!(response.id, id);
    }

    #[test]
    fn panicking_worker_still_reports_failure() {
        let sources = Sources::new(Arc::new(ExplodingAssets), None);
        let mut service = LoadService::new(LoadPipeline::new(sources));
        let id = service.submit(LoadRequest::from_asset("doc.pdf")).unwrap();

        let response = service
            .response_receiver()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(response.id, id);
        match response.outcome {
            LoadOutcome::Failed(e) => {
                assert_eq!(e.kind(), ErrorKind::Io);
                assert!(e.to_string().contains("asset store exploded"));
            }
            LoadOutcome::Complete(_) => panic!("panicking worker reported success"),
        }
    }
}
