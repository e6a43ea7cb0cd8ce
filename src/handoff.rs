//! Handing a loaded document to the renderer and signalling readiness

use log::{error, info};

use crate::analytics::ReadingAnalytics;
use crate::error::{ErrorKind, LoadError, Result};
use crate::request::{DisplayOptions, LoadOutcome, LoadResult};

/// External component that displays a document
pub trait Renderer {
    /// Take ownership of `bytes` and display them, returning the page count
    fn display(
        &mut self,
        bytes: Vec<u8>,
        password: Option<&str>,
        options: &DisplayOptions,
    ) -> Result<usize>;
}

/// Terminal signal for whoever shows the loading indicator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready { page_count: usize },
    Failed { kind: ErrorKind, reason: String },
}

/// Receives exactly one [`Readiness`]; consuming `self` makes it fire-once.
pub trait ReadyListener {
    fn finished(self, readiness: Readiness);
}

impl<F: FnOnce(Readiness)> ReadyListener for F {
    fn finished(self, readiness: Readiness) {
        self(readiness)
    }
}

/// Deliver a loaded document to `renderer`, then signal `listener`.
///
/// Once the renderer accepts a document that carries an id, `analytics`
/// starts tracking it.
pub fn hand_off<R, L>(
    loaded: LoadResult,
    renderer: &mut R,
    listener: L,
    analytics: Option<&ReadingAnalytics>,
) -> Result<usize>
where
    R: Renderer + ?Sized,
    L: ReadyListener,
{
    let LoadResult {
        bytes,
        password,
        display,
        document_id,
        ..
    } = loaded;

    match renderer.display(bytes, password.as_deref(), &display) {
        Ok(page_count) => {
            info!("renderer reported {page_count} pages");
            if let (Some(analytics), Some(id)) = (analytics, document_id.as_deref()) {
                analytics.open_document(id, &display);
            }
            listener.finished(Readiness::Ready { page_count });
            Ok(page_count)
        }
        Err(e) => {
            let e = match e {
                LoadError::Render { .. } => e,
                other => LoadError::render(other.to_string()),
            };
            error!("renderer failed: {e}");
            listener.finished(failed(&e));
            Err(e)
        }
    }
}

/// Route a worker outcome: hand off on success, report the failure otherwise
pub fn deliver<R, L>(
    outcome: LoadOutcome,
    renderer: &mut R,
    listener: L,
    analytics: Option<&ReadingAnalytics>,
) -> Result<usize>
where
    R: Renderer + ?Sized,
    L: ReadyListener,
{
    match outcome {
        LoadOutcome::Complete(loaded) => hand_off(loaded, renderer, listener, analytics),
        LoadOutcome::Failed(e) => {
            listener.finished(failed(&e));
            Err(e)
        }
    }
}

fn failed(e: &LoadError) -> Readiness {
    Readiness::Failed {
        kind: e.kind(),
        reason: e.to_string(),
    }
}
