use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template rendering failed: {0}")]
    TemplateRender(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedMediaType(String),

    #[error("Browser session failed to start: {0}")]
    SessionStart(String),

    #[error("Could not open rendering context: {0}")]
    ContextAcquire(String),

    #[error("Document did not finish loading within {0:?}")]
    LoadTimeout(Duration),

    #[error("Document load failed: {0}")]
    Load(String),

    #[error("Document export failed: {0}")]
    Export(String),

    #[error("Rendering context close failed: {0}")]
    ContextClose(String),

    #[error("Exported document is invalid ({reason}): len={length} header={header:?}")]
    InvalidOutput {
        reason: &'static str,
        length: usize,
        header: String,
    },

    #[error("Render task aborted: {0}")]
    TaskAborted(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl RenderError {
    /// Whether the same request could reasonably succeed if sent again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RenderError::SessionStart(_)
                | RenderError::ContextAcquire(_)
                | RenderError::LoadTimeout(_)
                | RenderError::TaskAborted(_)
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RenderError::TemplateNotFound(_) => ErrorSeverity::Low,
            RenderError::InvalidPayload(_) => ErrorSeverity::Low,
            RenderError::UnsupportedMediaType(_) => ErrorSeverity::Low,
            RenderError::TemplateRender(_) => ErrorSeverity::Low,
            RenderError::SessionStart(_) => ErrorSeverity::High,
            RenderError::InvalidOutput { .. } => ErrorSeverity::High,
            _ => ErrorSeverity::Medium,
        }
    }

    /// HTTP status reported to the caller
    ///
    /// Only a malformed or mislabelled body is the caller's fault; every
    /// failure of the pipeline itself is a 500.
    pub fn status_code(&self) -> u16 {
        match self {
            RenderError::InvalidPayload(_) => 400,
            RenderError::UnsupportedMediaType(_) => 415,
            _ => 500,
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::TemplateNotFound(_) => "template_not_found",
            RenderError::TemplateRender(_) => "template_render",
            RenderError::InvalidPayload(_) => "invalid_payload",
            RenderError::UnsupportedMediaType(_) => "unsupported_media_type",
            RenderError::SessionStart(_) => "session_start",
            RenderError::ContextAcquire(_) => "context_acquire",
            RenderError::LoadTimeout(_) => "load_timeout",
            RenderError::Load(_) => "load",
            RenderError::Export(_) => "export",
            RenderError::ContextClose(_) => "context_close",
            RenderError::InvalidOutput { .. } => "invalid_output",
            RenderError::TaskAborted(_) => "task_aborted",
            RenderError::IoError(_) => "io",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
}

impl From<std::io::Error> for RenderError {
    fn from(err: std::io::Error) -> Self {
        RenderError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::InvalidPayload(err.to_string())
    }
}

impl From<tokio::task::JoinError> for RenderError {
    fn from(err: tokio::task::JoinError) -> Self {
        RenderError::TaskAborted(err.to_string())
    }
}
