//! Request orchestration
//!
//! `RenderService` ties the template renderer, the shared browser session and
//! the document producer together. It is cheap to clone; every clone shares
//! the same session.
//!
//! There is no admission control: every accepted request renders right away
//! against the one browser process.
//!
//! # Examples
//!
//! ```rust,no_run
//! use quote_render::{Config, RenderRequest, RenderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = RenderService::new(Config::default());
//!
//!     let request = RenderRequest {
//!         template_id: "manager_report".to_string(),
//!         data: json!({"title": "Q1"}),
//!         ..Default::default()
//!     };
//!     let envelope = service.handle(request).await?;
//!     println!("Rendered {} bytes", envelope.bytes);
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::{
    apply_bindings, metrics, ChromeLauncher, Config, DirectoryTemplates,
    DocumentProducer, ErrorSeverity, OutputEnvelope, PageLayout, RenderError, SessionLauncher,
    SessionManager, TableBinding, TemplateRenderer, TemplateSource, Timeouts,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn, Instrument};

/// One document to produce
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub id: String,
    pub template_id: String,
    pub data: Value,
    pub layout: PageLayout,
    pub tables: Vec<TableBinding>,
    pub load_timeout: Option<Duration>,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            template_id: String::new(),
            data: Value::Object(Map::new()),
            layout: PageLayout::default(),
            tables: Vec::new(),
            load_timeout: None,
        }
    }
}

#[derive(Clone)]
pub struct RenderService {
    templates: Arc<TemplateRenderer>,
    pub sessions: Arc<SessionManager>,
    pub producer: Arc<DocumentProducer>,
}

impl RenderService {
    /// Production wiring: templates from `config.template_dir`, Chrome as the browser
    pub fn new(config: Config) -> Self {
        let templates = Arc::new(DirectoryTemplates::new(config.template_dir.clone()));
        let timeouts = config.timeouts.clone();
        let launcher = Arc::new(ChromeLauncher::new(config));
        Self::with_parts(templates, launcher, timeouts)
    }

    pub fn with_parts(
        templates: Arc<dyn TemplateSource>,
        launcher: Arc<dyn SessionLauncher>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            templates: Arc::new(TemplateRenderer::new(templates)),
            sessions: Arc::new(SessionManager::new(launcher, &timeouts)),
            producer: Arc::new(DocumentProducer::new(timeouts)),
        }
    }

    /// Render a request and wrap the document in the response envelope
    ///
    /// The pipeline runs on its own task: if the caller goes away mid-render
    /// the work still completes and the rendering context is still released.
    pub async fn handle(&self, request: RenderRequest) -> Result<OutputEnvelope, RenderError> {
        let service = self.clone();
        let document = tokio::spawn(async move { service.render(request).await }).await??;
        Ok(OutputEnvelope::success(&document))
    }

    /// Render a request into validated document bytes
    pub async fn render(&self, request: RenderRequest) -> Result<Vec<u8>, RenderError> {
        let span = info_span!(
            "render",
            request_id = %request.id,
            template = %request.template_id
        );

        async move {
            let start_time = Instant::now();
            let result = self.run_pipeline(request).await;
            let duration = start_time.elapsed();

            match &result {
                Ok(document) => {
                    metrics::record_request("success", duration);
                    info!("Document OK bytes={} in {:.1?}", document.len(), duration);
                }
                Err(e) => {
                    metrics::record_request(e.kind(), duration);
                    match e.severity() {
                        ErrorSeverity::Low => warn!("Render rejected: {}", e),
                        _ => error!("Render failed after {:.1?}: {}", duration, e),
                    }
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn run_pipeline(&self, mut request: RenderRequest) -> Result<Vec<u8>, RenderError> {
        apply_bindings(&mut request.data, &request.tables);
        let markup = self.templates.render(&request.template_id, &request.data)?;

        let session = self.sessions.ensure_session().await?;
        self.producer
            .produce(
                session.as_ref(),
                &markup,
                &request.layout,
                request.load_timeout,
            )
            .await
    }

    /// Start the browser before the first request; failures are logged and
    /// retried by the next request.
    pub async fn warm_up(&self) {
        match self.sessions.warm_up().await {
            Ok(()) => info!("Browser warm started"),
            Err(e) => warn!("Browser warm start failed: {}", e),
        }
    }

    pub async fn shutdown(&self) {
        info!("Shutting down render service...");
        self.sessions.shutdown().await;
        info!("Render service shutdown complete");
    }
}
