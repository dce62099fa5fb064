//! chromiumoxide-backed browser session
//!
//! The CDP handler stream is polled on its own task for the lifetime of the
//! browser. A session counts as alive while that task runs and the browser
//! still answers a version request.
//!
//! Each page subscribes to the Network domain before any markup is injected.
//! A tracker task keeps the set of requests still in flight and publishes the
//! count on a watch channel, which `wait_for_quiet` reads.

use crate::{
    create_browser_config, BrowserSession, Config, PageLayout, RenderError, RenderingContext,
    SessionLauncher, Viewport,
};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::{stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Requests in flight on one page, and when that number last changed
#[derive(Debug, Clone, Copy)]
pub struct NetworkActivity {
    pub in_flight: usize,
    pub changed_at: Instant,
}

impl NetworkActivity {
    pub fn new(in_flight: usize) -> Self {
        Self {
            in_flight,
            changed_at: Instant::now(),
        }
    }
}

enum RequestEvent {
    Started(String),
    Settled(String),
}

/// Resolve once no request has been in flight for `idle`
///
/// A request that never settles keeps this pending; callers bound it with
/// their own timeout. Fails if the tracker behind `activity` goes away while
/// the page is still busy.
pub async fn wait_for_quiet(
    mut activity: watch::Receiver<NetworkActivity>,
    idle: Duration,
) -> Result<(), RenderError> {
    loop {
        let current = *activity.borrow_and_update();

        if current.in_flight > 0 {
            activity.changed().await.map_err(|_| tracker_stopped())?;
            continue;
        }

        let quiet_for = current.changed_at.elapsed();
        if quiet_for >= idle {
            return Ok(());
        }

        match timeout(idle - quiet_for, activity.changed()).await {
            Err(_) => return Ok(()),
            Ok(Ok(())) => continue,
            Ok(Err(_)) => return Err(tracker_stopped()),
        }
    }
}

fn tracker_stopped() -> RenderError {
    RenderError::Load("network tracker stopped".to_string())
}

/// Subscribe to request lifecycle events and count what is still pending
async fn track_network(
    page: &Page,
) -> Result<(watch::Receiver<NetworkActivity>, JoinHandle<()>), CdpError> {
    page.execute(EnableParams::default()).await?;

    let started = page
        .event_listener::<EventRequestWillBeSent>()
        .await?
        .map(|e| RequestEvent::Started(e.request_id.inner().clone()));
    let finished = page
        .event_listener::<EventLoadingFinished>()
        .await?
        .map(|e| RequestEvent::Settled(e.request_id.inner().clone()));
    let failed = page
        .event_listener::<EventLoadingFailed>()
        .await?
        .map(|e| RequestEvent::Settled(e.request_id.inner().clone()));

    let mut events = Box::pin(stream::select(started, stream::select(finished, failed)));
    let (tx, rx) = watch::channel(NetworkActivity::new(0));

    let tracker = tokio::spawn(async move {
        let mut pending = HashSet::new();
        while let Some(event) = events.next().await {
            // redirects reuse the request id
            let changed = match event {
                RequestEvent::Started(id) => pending.insert(id),
                RequestEvent::Settled(id) => pending.remove(&id),
            };
            if changed && tx.send(NetworkActivity::new(pending.len())).is_err() {
                break;
            }
        }
    });

    Ok((rx, tracker))
}

pub struct ChromeLauncher {
    config: Config,
}

impl ChromeLauncher {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, RenderError> {
        let browser_config =
            create_browser_config(&self.config).map_err(RenderError::SessionStart)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| RenderError::SessionStart(e.to_string()))?;

        // The handler must be polled for any CDP command to complete. Individual
        // event errors are not fatal; the stream ending means the browser is gone.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
            info!("CDP handler stream ended");
        });

        Ok(Arc::new(ChromeSession {
            browser: RwLock::new(browser),
            handler: handler_task,
            viewport: self.config.viewport.clone(),
        }))
    }
}

pub struct ChromeSession {
    browser: RwLock<Browser>,
    handler: JoinHandle<()>,
    viewport: Viewport,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn is_alive(&self) -> bool {
        if self.handler.is_finished() {
            return false;
        }
        self.browser.read().await.version().await.is_ok()
    }

    async fn open_context(&self) -> Result<Box<dyn RenderingContext>, RenderError> {
        let page = {
            let browser = self.browser.read().await;
            browser.new_page("about:blank").await
        }
        .map_err(|e| RenderError::ContextAcquire(e.to_string()))?;

        let metrics = SetDeviceMetricsOverrideParams::builder()
            .width(self.viewport.width)
            .height(self.viewport.height)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(RenderError::ContextAcquire);

        let applied = match metrics {
            Ok(params) => page
                .execute(params)
                .await
                .map(|_| ())
                .map_err(|e| RenderError::ContextAcquire(e.to_string())),
            Err(e) => Err(e),
        };

        let tracked = match applied {
            Ok(()) => track_network(&page)
                .await
                .map_err(|e| RenderError::ContextAcquire(e.to_string())),
            Err(e) => Err(e),
        };

        match tracked {
            Ok((network, tracker)) => Ok(Box::new(ChromePage {
                page,
                network,
                tracker,
            })),
            Err(e) => {
                if let Err(close_err) = page.close().await {
                    warn!("Failed to close page after setup error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn shutdown(&self) {
        let mut browser = self.browser.write().await;
        if let Err(e) = browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        self.handler.abort();
    }
}

pub struct ChromePage {
    page: Page,
    network: watch::Receiver<NetworkActivity>,
    tracker: JoinHandle<()>,
}

#[async_trait]
impl RenderingContext for ChromePage {
    async fn load(&mut self, markup: &str) -> Result<(), RenderError> {
        self.page
            .set_content(markup)
            .await
            .map(|_| ())
            .map_err(|e| RenderError::Load(e.to_string()))
    }

    async fn wait_for_network_idle(&mut self, idle: Duration) -> Result<(), RenderError> {
        wait_for_quiet(self.network.clone(), idle).await
    }

    async fn export_pdf(&mut self, layout: &PageLayout) -> Result<Vec<u8>, RenderError> {
        let (width, height) = layout.paper.dimensions_in();
        let margins = layout.margins;

        let params = PrintToPdfParams {
            landscape: Some(layout.landscape),
            print_background: Some(true),
            paper_width: Some(width),
            paper_height: Some(height),
            margin_top: Some(margins.top),
            margin_right: Some(margins.right),
            margin_bottom: Some(margins.bottom),
            margin_left: Some(margins.left),
            ..Default::default()
        };

        self.page
            .pdf(params)
            .await
            .map_err(|e: CdpError| RenderError::Export(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), RenderError> {
        let ChromePage { page, tracker, .. } = *self;
        tracker.abort();
        page.close()
            .await
            .map_err(|e| RenderError::ContextClose(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_quiet_page_settles_after_idle_window() {
        let (_tx, rx) = watch::channel(NetworkActivity::new(0));
        let started = Instant::now();

        wait_for_quiet(rx, Duration::from_millis(50)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_waits_for_pending_request_to_finish() {
        let (tx, rx) = watch::channel(NetworkActivity::new(1));
        let tx = Arc::new(tx);
        let finisher = {
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(80)).await;
                tx.send(NetworkActivity::new(0)).unwrap();
            })
        };

        let started = Instant::now();
        wait_for_quiet(rx, Duration::from_millis(50)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(120));
        finisher.await.unwrap();
    }

    #[tokio::test]
    async fn test_new_request_restarts_idle_window() {
        let (tx, rx) = watch::channel(NetworkActivity::new(0));
        let tx = Arc::new(tx);
        let poker = {
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                tx.send(NetworkActivity::new(1)).unwrap();
                tokio::time::sleep(Duration::from_millis(30)).await;
                tx.send(NetworkActivity::new(0)).unwrap();
            })
        };

        let started = Instant::now();
        wait_for_quiet(rx, Duration::from_millis(50)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
        poker.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_that_never_finishes_stays_pending() {
        let (_tx, rx) = watch::channel(NetworkActivity::new(1));

        let waited = timeout(
            Duration::from_millis(200),
            wait_for_quiet(rx, Duration::from_millis(20)),
        )
        .await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_stopped_tracker_fails_busy_page() {
        let (tx, rx) = watch::channel(NetworkActivity::new(2));
        drop(tx);

        let result = wait_for_quiet(rx, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(RenderError::Load(_))));
    }
}
