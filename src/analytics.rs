//! Per-page reading time tracking

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use flume::{RecvTimeoutError, Sender};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};
use crate::request::DisplayOptions;

/// Viewer-side events that drive the tracker
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalyticsEvent {
    /// Switch the current document; the current page is kept
    DocumentOpened(String),
    /// Page index as displayed, translated through the open document's `pages`
    PageChanged(u32),
    Paused(bool),
}

/// Accumulated milliseconds per page for one document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecords {
    pub first_opened: DateTime<Utc>,
    pub pages: BTreeMap<u32, u64>,
}

#[derive(Debug, Default)]
struct Tracker {
    paused: bool,
    current_document: Option<String>,
    current_page: Option<u32>,
    display: DisplayOptions,
    documents: BTreeMap<String, DocumentRecords>,
}

impl Tracker {
    fn handle(&mut self, event: AnalyticsEvent) {
        match event {
            AnalyticsEvent::DocumentOpened(id) => self.current_document = Some(id),
            AnalyticsEvent::PageChanged(displayed) => match self.display.actual_page(displayed) {
                Some(page) => self.current_page = Some(page),
                None => warn!("displayed page {displayed} is outside the page subset"),
            },
            AnalyticsEvent::Paused(paused) => self.paused = paused,
        }
    }

    fn tick(&mut self, period_ms: u64) {
        if self.paused {
            return;
        }
        let (Some(document), Some(page)) = (&self.current_document, self.current_page) else {
            return;
        };

        let records = self
            .documents
            .entry(document.clone())
            .or_insert_with(|| DocumentRecords {
                first_opened: Utc::now(),
                pages: BTreeMap::new(),
            });
        // First observation of a page starts its clock at zero.
        records
            .pages
            .entry(page)
            .and_modify(|ms| *ms += period_ms)
            .or_insert(0);
    }
}

struct Ticker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Page dwell-time analytics with an optional periodic ticker thread
pub struct ReadingAnalytics {
    tracker: Arc<Mutex<Tracker>>,
    ticker: Option<Ticker>,
}

impl ReadingAnalytics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tracker: Arc::new(Mutex::new(Tracker::default())),
            ticker: None,
        }
    }

    pub fn handle(&self, event: AnalyticsEvent) {
        self.lock().handle(event);
    }

    /// Track a document that was just handed to the renderer.
    ///
    /// Later page changes are read through `display.pages`.
    pub fn open_document(&self, id: &str, display: &DisplayOptions) {
        let mut tracker = self.lock();
        tracker.display = display.clone();
        tracker.handle(AnalyticsEvent::DocumentOpened(id.to_string()));
        debug!("analytics tracking document {id}");
    }

    /// Credit `period` to the current page, as the ticker does
    pub fn tick(&self, period: Duration) {
        self.lock().tick(period.as_millis() as u64);
    }

    /// Start (or restart) ticking every `period`
    pub fn enable(&mut self, period: Duration) -> Result<()> {
        if period.is_zero() {
            return Err(LoadError::invalid("analytics period must be positive"));
        }
        self.disable();

        let (stop_tx, stop_rx) = flume::bounded::<()>(1);
        let tracker = Arc::clone(&self.tracker);
        let period_ms = period.as_millis() as u64;

        let handle = thread::Builder::new()
            .name("docload-analytics".to_string())
            .spawn(move || {
                // The first tick fires as soon as the ticker starts.
                tracker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .tick(period_ms);
                loop {
                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => tracker
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .tick(period_ms),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(LoadError::Io)?;

        debug!("analytics enabled, period {period_ms}ms");
        self.ticker = Some(Ticker { stop_tx, handle });
        Ok(())
    }

    /// Stop the ticker; recorded data is kept
    pub fn disable(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.stop_tx.send(());
            if ticker.handle.join().is_err() {
                warn!("analytics ticker panicked");
            }
            debug!("analytics disabled");
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.ticker.is_some()
    }

    /// Records for `document`, or for the current document when `None`
    #[must_use]
    pub fn records(&self, document: Option<&str>) -> Option<DocumentRecords> {
        let tracker = self.lock();
        let id = document.or(tracker.current_document.as_deref())?;
        tracker.documents.get(id).cloned()
    }

    pub fn records_json(&self, document: Option<&str>) -> Result<Option<String>> {
        self.records(document)
            .map(|records| {
                serde_json::to_string_pretty(&records)
                    .map_err(|e| LoadError::Io(std::io::Error::other(e)))
            })
            .transpose()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ReadingAnalytics {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ReadingAnalytics {
    fn drop(&mut self) {
        self.disable();
    }
}
