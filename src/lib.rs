// Export modules for use in tests
pub mod analytics;
pub mod cipher;
pub mod error;
pub mod handoff;
pub mod panic_handler;
pub mod paths;
pub mod pipeline;
pub mod request;
pub mod service;
pub mod settings;
pub mod source;

pub mod test_utils;

// Re-export the pipeline entry points
pub use analytics::{AnalyticsEvent, ReadingAnalytics};
pub use error::{ErrorKind, LoadError, Result};
pub use handoff::{Readiness, ReadyListener, Renderer, deliver, hand_off};
pub use pipeline::{LoadPipeline, Stage};
pub use request::{
    BytePayload, ByteSource, DisplayOptions, LoadOutcome, LoadRequest, LoadResponse, LoadResult,
    RequestId, StreamEndpoint,
};
pub use service::LoadService;
