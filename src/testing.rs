//! In-process browser backend and template store for tests

use crate::{
    BrowserSession, PageLayout, RenderError, RenderingContext, SessionLauncher, TemplateSource,
    Timeouts,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FAKE_DOCUMENT_BYTES: usize = 2048;

pub fn fake_pdf(len: usize) -> Vec<u8> {
    let mut bytes = b"%PDF-1.7\n".to_vec();
    bytes.resize(len, b'0');
    bytes
}

/// Timeouts short enough for hung steps to fail fast in tests
pub fn test_timeouts() -> Timeouts {
    Timeouts {
        session_start: Duration::from_millis(500),
        liveness_check: Duration::from_millis(200),
        load: Duration::from_millis(300),
        network_idle: Duration::from_millis(10),
        stabilize: Duration::from_millis(100),
        export: Duration::from_millis(300),
        context_close: Duration::from_millis(200),
    }
}

/// Counters and injected faults shared by every fake session and page
#[derive(Default)]
pub struct FakeBrowser {
    pub launches: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub loaded_markup: Mutex<Vec<String>>,

    launch_failures: AtomicUsize,
    launch_delay_ms: AtomicU64,
    liveness_delay_ms: AtomicU64,
    export_failures: AtomicUsize,
    hang_load: AtomicBool,
    hang_network: AtomicBool,
    small_output: AtomicBool,
    sessions: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeBrowser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn launcher(self: &Arc<Self>) -> Arc<dyn SessionLauncher> {
        Arc::new(FakeLauncher {
            browser: self.clone(),
        })
    }

    pub fn fail_next_launches(&self, count: usize) {
        self.launch_failures.store(count, Ordering::SeqCst);
    }

    pub fn set_launch_delay(&self, delay: Duration) {
        self.launch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Slow down every liveness check
    pub fn set_liveness_delay(&self, delay: Duration) {
        self.liveness_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn fail_next_exports(&self, count: usize) {
        self.export_failures.store(count, Ordering::SeqCst);
    }

    pub fn hang_load(&self, hang: bool) {
        self.hang_load.store(hang, Ordering::SeqCst);
    }

    pub fn hang_network(&self, hang: bool) {
        self.hang_network.store(hang, Ordering::SeqCst);
    }

    pub fn produce_small_output(&self, small: bool) {
        self.small_output.store(small, Ordering::SeqCst);
    }

    /// Make the most recently launched session stop answering liveness checks
    pub fn kill_current_session(&self) {
        if let Some(session) = self.sessions.lock().unwrap().last() {
            session.alive.store(false, Ordering::SeqCst);
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn shut_down_sessions(&self) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.shut_down.load(Ordering::SeqCst))
            .count()
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

struct FakeLauncher {
    browser: Arc<FakeBrowser>,
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, RenderError> {
        let delay = self.browser.launch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if FakeBrowser::take_one(&self.browser.launch_failures) {
            return Err(RenderError::SessionStart("chrome binary missing".to_string()));
        }

        self.browser.launches.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(FakeSession {
            browser: self.browser.clone(),
            alive: AtomicBool::new(true),
            shut_down: AtomicBool::new(false),
        });
        self.browser.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

pub struct FakeSession {
    browser: Arc<FakeBrowser>,
    alive: AtomicBool,
    shut_down: AtomicBool,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn is_alive(&self) -> bool {
        let delay = self.browser.liveness_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.alive.load(Ordering::SeqCst)
    }

    async fn open_context(&self) -> Result<Box<dyn RenderingContext>, RenderError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(RenderError::ContextAcquire("browser disconnected".to_string()));
        }
        self.browser.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            browser: self.browser.clone(),
        }))
    }

    async fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

struct FakePage {
    browser: Arc<FakeBrowser>,
}

#[async_trait]
impl RenderingContext for FakePage {
    async fn load(&mut self, markup: &str) -> Result<(), RenderError> {
        if self.browser.hang_load.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.browser
            .loaded_markup
            .lock()
            .unwrap()
            .push(markup.to_string());
        Ok(())
    }

    async fn wait_for_network_idle(&mut self, _idle: Duration) -> Result<(), RenderError> {
        if self.browser.hang_network.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn export_pdf(&mut self, _layout: &PageLayout) -> Result<Vec<u8>, RenderError> {
        if FakeBrowser::take_one(&self.browser.export_failures) {
            return Err(RenderError::Export("printToPDF failed".to_string()));
        }
        if self.browser.small_output.load(Ordering::SeqCst) {
            return Ok(b"%PDF".to_vec());
        }
        Ok(fake_pdf(FAKE_DOCUMENT_BYTES))
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        self.browser.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Template sources held in memory
#[derive(Default)]
pub struct MemoryTemplates {
    sources: HashMap<String, String>,
}

impl MemoryTemplates {
    pub fn with(mut self, name: &str, source: &str) -> Self {
        self.sources.insert(name.to_string(), source.to_string());
        self
    }
}

impl TemplateSource for MemoryTemplates {
    fn load(&self, template_id: &str) -> Result<Option<String>, RenderError> {
        Ok(self.sources.get(template_id).cloned())
    }
}
