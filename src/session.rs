//! Browser session lifecycle
//!
//! One long-lived browser process is shared by every request. It is created
//! lazily (or at warm start), checked before each use, and replaced wholesale
//! when it stops answering. Creation is single-flight: the slot is guarded by
//! an async mutex, so concurrent cold callers wait for the one launch in
//! progress instead of starting their own.
//!
//! Liveness checks run with the slot unlocked. The lock is only held to read
//! the slot, and to swap a stale session for a new one.

use crate::{metrics, PageLayout, RenderError, Timeouts};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// An isolated page inside the browser session, used for exactly one document
#[async_trait]
pub trait RenderingContext: Send {
    /// Inject markup and wait for the document to be parsed.
    async fn load(&mut self, markup: &str) -> Result<(), RenderError>;

    /// Resolve once network activity has been quiet for `idle`.
    async fn wait_for_network_idle(&mut self, idle: Duration) -> Result<(), RenderError>;

    async fn export_pdf(&mut self, layout: &PageLayout) -> Result<Vec<u8>, RenderError>;

    async fn close(self: Box<Self>) -> Result<(), RenderError>;
}

/// The shared browser process
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Connectivity check. Must not mutate session state.
    async fn is_alive(&self) -> bool;

    async fn open_context(&self) -> Result<Box<dyn RenderingContext>, RenderError>;

    async fn shutdown(&self);
}

/// Starts browser processes
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, RenderError>;
}

/// Externally visible state of the session slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No process yet, or the last start failed
    Absent,
    /// The slot is locked by a launch or replacement in progress
    Busy,
    Live,
}

pub struct SessionManager {
    launcher: Arc<dyn SessionLauncher>,
    slot: Mutex<Option<Arc<dyn BrowserSession>>>,
    startup_timeout: Duration,
    liveness_timeout: Duration,
    launches: AtomicUsize,
    is_shutting_down: AtomicBool,
}

impl SessionManager {
    pub fn new(launcher: Arc<dyn SessionLauncher>, timeouts: &Timeouts) -> Self {
        Self {
            launcher,
            slot: Mutex::new(None),
            startup_timeout: timeouts.session_start,
            liveness_timeout: timeouts.liveness_check,
            launches: AtomicUsize::new(0),
            is_shutting_down: AtomicBool::new(false),
        }
    }

    /// Return the live session, starting a new one if absent or unhealthy
    pub async fn ensure_session(&self) -> Result<Arc<dyn BrowserSession>, RenderError> {
        if self.is_shutting_down.load(Ordering::Relaxed) {
            return Err(RenderError::SessionStart("service is shutting down".to_string()));
        }

        let checked = self.slot.lock().await.clone();
        if let Some(session) = &checked {
            if self.check_alive(session.as_ref()).await {
                return Ok(session.clone());
            }
        }

        let mut slot = self.slot.lock().await;

        // Another caller may have replaced or started the session meanwhile
        match (slot.as_ref(), checked.as_ref()) {
            (Some(current), Some(dead)) if !Arc::ptr_eq(current, dead) => {
                return Ok(current.clone())
            }
            (Some(current), None) => return Ok(current.clone()),
            _ => {}
        }

        if let Some(stale) = slot.take() {
            warn!("Browser session is not responding, restarting");
            if timeout(self.liveness_timeout, stale.shutdown()).await.is_err() {
                warn!("Stale browser session did not shut down within {:?}", self.liveness_timeout);
            }
        }

        let session = self.launch().await?;
        *slot = Some(session.clone());
        Ok(session)
    }

    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, RenderError> {
        info!("Starting browser session...");

        let session = match timeout(self.startup_timeout, self.launcher.launch()).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                error!("Browser session failed to start: {}", e);
                return Err(match e {
                    RenderError::SessionStart(_) => e,
                    other => RenderError::SessionStart(other.to_string()),
                });
            }
            Err(_) => {
                error!("Browser session did not start within {:?}", self.startup_timeout);
                return Err(RenderError::SessionStart(format!(
                    "startup timed out after {:?}",
                    self.startup_timeout
                )));
            }
        };

        let launches = self.launches.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_session_launch();
        info!("Browser session started (launch #{})", launches);
        Ok(session)
    }

    async fn check_alive(&self, session: &dyn BrowserSession) -> bool {
        timeout(self.liveness_timeout, session.is_alive())
            .await
            .unwrap_or(false)
    }

    /// Start the session ahead of the first request
    pub async fn warm_up(&self) -> Result<(), RenderError> {
        self.ensure_session().await.map(|_| ())
    }

    /// Number of browser processes started so far
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::Relaxed)
    }

    /// Non-blocking view of the slot, for health reporting
    pub fn state(&self) -> SessionState {
        match self.slot.try_lock() {
            Ok(slot) if slot.is_some() => SessionState::Live,
            Ok(_) => SessionState::Absent,
            Err(_) => SessionState::Busy,
        }
    }

    pub async fn shutdown(&self) {
        info!("Shutting down browser session...");
        self.is_shutting_down.store(true, Ordering::Relaxed);

        if let Some(session) = self.slot.lock().await.take() {
            session.shutdown().await;
        }

        info!("Browser session shutdown complete");
    }
}
