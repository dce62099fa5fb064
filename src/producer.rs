//! Per-request document production
//!
//! Drives one rendering context through acquire → load → stabilize → export
//! → release → validate. The steps never go backwards and every step that can
//! suspend has its own timeout. Release runs on every path once a context has
//! been opened.

use crate::{
    check_document, metrics, BrowserSession, PageLayout, RenderError,
    RenderingContext, Timeouts,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Outcome of the advisory network-idle wait
#[derive(Debug, Clone, PartialEq)]
pub enum Stabilization {
    Settled,
    TimedOut(Duration),
    Failed(String),
}

pub struct DocumentProducer {
    timeouts: Timeouts,
    active_contexts: AtomicUsize,
}

impl DocumentProducer {
    pub fn new(timeouts: Timeouts) -> Self {
        Self {
            timeouts,
            active_contexts: AtomicUsize::new(0),
        }
    }

    /// Produce a validated PDF from `markup`
    ///
    /// `load_timeout` overrides the configured load bound for this call.
    pub async fn produce(
        &self,
        session: &dyn BrowserSession,
        markup: &str,
        layout: &PageLayout,
        load_timeout: Option<Duration>,
    ) -> Result<Vec<u8>, RenderError> {
        let mut context = session.open_context().await.map_err(|e| match e {
            RenderError::ContextAcquire(_) => e,
            other => RenderError::ContextAcquire(other.to_string()),
        })?;
        let active = self.active_contexts.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::record_context_opened(active);
        debug!("Rendering context opened ({} active)", active);

        let exported = self
            .load_and_export(&mut *context, markup, layout, load_timeout)
            .await;

        self.release(context).await;

        let document = exported?;
        check_document(&document).into_result()?;
        Ok(document)
    }

    async fn load_and_export(
        &self,
        context: &mut dyn RenderingContext,
        markup: &str,
        layout: &PageLayout,
        load_timeout: Option<Duration>,
    ) -> Result<Vec<u8>, RenderError> {
        let load_timeout = load_timeout.unwrap_or(self.timeouts.load);
        debug!("Loading markup ({} bytes)", markup.len());

        match timeout(load_timeout, context.load(markup)).await {
            Ok(result) => result?,
            Err(_) => return Err(RenderError::LoadTimeout(load_timeout)),
        }

        match self.stabilize(context).await {
            Stabilization::Settled => debug!("Network settled"),
            Stabilization::TimedOut(after) => {
                metrics::record_stabilize_skipped();
                info!("Network idle wait skipped after {:?}", after);
            }
            Stabilization::Failed(reason) => {
                metrics::record_stabilize_skipped();
                info!("Network idle wait skipped: {}", reason);
            }
        }

        let document = match timeout(self.timeouts.export, context.export_pdf(layout)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RenderError::Export(format!(
                    "timed out after {:?}",
                    self.timeouts.export
                )))
            }
        };
        debug!("Exported {} bytes", document.len());
        Ok(document)
    }

    /// Best-effort wait for background asset loading to settle
    pub async fn stabilize(&self, context: &mut dyn RenderingContext) -> Stabilization {
        let bound = self.timeouts.stabilize;
        match timeout(bound, context.wait_for_network_idle(self.timeouts.network_idle)).await {
            Ok(Ok(())) => Stabilization::Settled,
            Ok(Err(e)) => Stabilization::Failed(e.to_string()),
            Err(_) => Stabilization::TimedOut(bound),
        }
    }

    async fn release(&self, context: Box<dyn RenderingContext>) {
        match timeout(self.timeouts.context_close, context.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("{}", e),
            Err(_) => warn!(
                "Rendering context did not close within {:?}",
                self.timeouts.context_close
            ),
        }

        let active = self.active_contexts.fetch_sub(1, Ordering::Relaxed) - 1;
        metrics::record_context_closed(active);
        debug!("Rendering context released ({} active)", active);
    }

    /// Contexts opened and not yet released
    pub fn active_contexts(&self) -> usize {
        self.active_contexts.load(Ordering::Relaxed)
    }
}
