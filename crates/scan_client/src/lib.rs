use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use futures::future::join;
use shared::{
    domain::{DailySummary, ScanId, ScanRecord, Theme},
    protocol::SaveScanRequest,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod connectivity;
pub mod display;
pub mod error;
pub mod export;
pub mod http;
pub mod lookup;
pub mod preferences;
pub mod store;

pub use connectivity::{Connectivity, ConnectivityWatcher};
pub use error::{ScanError, ScanErrorKind};
pub use export::{ExportFormat, ExportedFile};
pub use lookup::ProductLookup;
pub use preferences::ThemePreference;
pub use store::ScanStore;

/// Read-only snapshot of everything the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub barcode_input: String,
    /// Mirrors the in-flight flag at the time of the snapshot.
    pub loading: bool,
    pub last_error: Option<String>,
    pub summary: Option<DailySummary>,
    /// Most recent first, as served by the backend.
    pub history: Vec<ScanRecord>,
    pub online: bool,
    pub theme: Theme,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SubmitStarted { barcode: String },
    /// `scan_id` is absent when the backend acknowledged the save without one.
    ScanSaved {
        scan_id: Option<ScanId>,
        barcode: String,
    },
    SummaryUpdated(DailySummary),
    HistoryUpdated { rows: usize },
    InputChanged(String),
    Error(String),
    ThemeChanged(Theme),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    EmptyBarcode,
    SubmissionInFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Saved {
        scan_id: Option<ScanId>,
        name: String,
    },
    Ignored(IgnoredReason),
}

/// Owns the session state and drives lookup, save and refresh against the collaborators.
///
/// The state lock is never held across a network call, so snapshots stay readable
/// while a submission is in flight.
pub struct ScanController {
    lookup: Arc<dyn ProductLookup>,
    store: Arc<dyn ScanStore>,
    connectivity: ConnectivityWatcher,
    theme: Mutex<ThemePreference>,
    inner: Mutex<SessionState>,
    in_flight: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
}

/// Holds the in-flight flag for one submission and clears it on drop, including
/// when the submitting future is dropped before it completes.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct SavedScan {
    scan_id: Option<ScanId>,
    name: String,
}

impl ScanController {
    pub fn new(
        lookup: Arc<dyn ProductLookup>,
        store: Arc<dyn ScanStore>,
        connectivity: ConnectivityWatcher,
        theme: ThemePreference,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let state = SessionState {
            theme: theme.get(),
            ..SessionState::default()
        };
        Arc::new(Self {
            lookup,
            store,
            connectivity,
            theme: Mutex::new(theme),
            inner: Mutex::new(state),
            in_flight: AtomicBool::new(false),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn connectivity(&self) -> &ConnectivityWatcher {
        &self.connectivity
    }

    pub async fn snapshot(&self) -> SessionState {
        let mut state = self.inner.lock().await.clone();
        state.online = self.connectivity.is_online();
        state.loading = self.in_flight.load(Ordering::Acquire);
        state
    }

    pub async fn set_barcode_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.inner.lock().await.barcode_input = text.clone();
        self.emit(SessionEvent::InputChanged(text));
    }

    /// Submits whatever is currently in the barcode input.
    pub async fn submit_current(&self) -> std::result::Result<SubmitOutcome, ScanError> {
        let input = self.inner.lock().await.barcode_input.clone();
        self.submit_scan(&input).await
    }

    /// Looks up `barcode_text`, saves the scan and refreshes summary and history.
    ///
    /// Blank input and a submission already in flight are ignored without any network
    /// call. On failure the error is also placed in the session's error slot and the
    /// input text is kept for a retry.
    pub async fn submit_scan(
        &self,
        barcode_text: &str,
    ) -> std::result::Result<SubmitOutcome, ScanError> {
        let barcode = barcode_text.trim();
        if barcode.is_empty() {
            debug!("ignoring blank barcode");
            return Ok(SubmitOutcome::Ignored(IgnoredReason::EmptyBarcode));
        }

        let Some(in_flight) = InFlight::acquire(&self.in_flight) else {
            debug!(barcode, "submission already in flight");
            return Ok(SubmitOutcome::Ignored(IgnoredReason::SubmissionInFlight));
        };
        self.emit(SessionEvent::SubmitStarted {
            barcode: barcode.to_string(),
        });

        let result = self.run_submission(barcode).await;

        {
            let mut guard = self.inner.lock().await;
            match &result {
                Ok(_) => {
                    guard.barcode_input.clear();
                    guard.last_error = None;
                }
                Err(err) => guard.last_error = Some(err.to_string()),
            }
        }
        drop(in_flight);

        match result {
            Ok(SavedScan { scan_id, name }) => {
                info!(barcode, scan_id = ?scan_id, "scan submitted");
                self.emit(SessionEvent::InputChanged(String::new()));
                Ok(SubmitOutcome::Saved { scan_id, name })
            }
            Err(err) => {
                warn!(barcode, error = %err, "scan submission failed");
                self.emit(SessionEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }

    async fn run_submission(&self, barcode: &str) -> std::result::Result<SavedScan, ScanError> {
        let facts = self.lookup.lookup(barcode).await?;
        debug!(barcode, name = %facts.name, "product resolved");

        let saved = self
            .store
            .save_scan(&SaveScanRequest::from_facts(barcode, &facts))
            .await?;
        self.emit(SessionEvent::ScanSaved {
            scan_id: saved.id,
            barcode: barcode.to_string(),
        });

        self.refresh_views().await?;
        Ok(SavedScan {
            scan_id: saved.id,
            name: facts.name,
        })
    }

    /// Re-reads today's summary and the scan history in parallel.
    ///
    /// Each is replaced only when its own read succeeds; a failure of either lands in
    /// the error slot.
    pub async fn refresh(&self) -> std::result::Result<(), ScanError> {
        let result = self.refresh_views().await;
        if let Err(err) = &result {
            warn!(error = %err, "dashboard refresh failed");
            self.inner.lock().await.last_error = Some(err.to_string());
            self.emit(SessionEvent::Error(err.to_string()));
        }
        result
    }

    async fn refresh_views(&self) -> std::result::Result<(), ScanError> {
        let (summary, history) =
            join(self.store.today_summary(), self.store.recent_scans()).await;

        let mut first_error = None;
        let mut updated_summary = None;
        let mut updated_rows = None;
        {
            let mut guard = self.inner.lock().await;
            match summary {
                Ok(summary) => {
                    guard.summary = Some(summary.clone());
                    updated_summary = Some(summary);
                }
                Err(err) => first_error = Some(err),
            }
            match history {
                Ok(rows) => {
                    updated_rows = Some(rows.len());
                    guard.history = rows;
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(summary) = updated_summary {
            self.emit(SessionEvent::SummaryUpdated(summary));
        }
        if let Some(rows) = updated_rows {
            self.emit(SessionEvent::HistoryUpdated { rows });
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Renders the loaded history; never touches the network.
    pub async fn export_history(&self, format: ExportFormat) -> Result<ExportedFile> {
        let (rows, summary) = {
            let guard = self.inner.lock().await;
            (guard.history.clone(), guard.summary.clone())
        };
        let today = chrono::Local::now().date_naive();
        let tag = export::date_tag(summary.as_ref(), today);
        export::render_export(&rows, format, &tag)
    }

    pub async fn export_history_to(&self, dir: &Path, format: ExportFormat) -> Result<PathBuf> {
        let file = self.export_history(format).await?;
        let path = export::write_export(dir, &file).await?;
        info!(path = %path.display(), %format, "exported scan history");
        Ok(path)
    }

    pub async fn theme(&self) -> Theme {
        self.theme.lock().await.get()
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<()> {
        self.theme
            .lock()
            .await
            .set(theme)
            .await
            .context("failed to persist theme preference")?;
        self.inner.lock().await.theme = theme;
        self.emit(SessionEvent::ThemeChanged(theme));
        Ok(())
    }

    pub async fn toggle_theme(&self) -> Result<Theme> {
        let next = self.theme().await.toggled();
        self.set_theme(next).await?;
        Ok(next)
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
