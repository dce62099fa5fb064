//! Exported document checks and the response envelope

use crate::RenderError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Leading bytes of every PDF file
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Anything smaller is a blank or truncated render
pub const MIN_DOCUMENT_BYTES: usize = 1000;

/// Result of inspecting an exported buffer
#[derive(Debug, Clone, PartialEq)]
pub enum OutputCheck {
    Valid,
    TooSmall { length: usize },
    BadSignature { length: usize, header: Vec<u8> },
}

impl OutputCheck {
    pub fn into_result(self) -> Result<(), RenderError> {
        match self {
            OutputCheck::Valid => Ok(()),
            OutputCheck::TooSmall { length } => Err(RenderError::InvalidOutput {
                reason: "buffer empty or too small",
                length,
                header: String::new(),
            }),
            OutputCheck::BadSignature { length, header } => Err(RenderError::InvalidOutput {
                reason: "missing PDF signature",
                length,
                header: String::from_utf8_lossy(&header).into_owned(),
            }),
        }
    }
}

/// Inspect an exported buffer against the size floor and the PDF signature
pub fn check_document(bytes: &[u8]) -> OutputCheck {
    if bytes.len() < MIN_DOCUMENT_BYTES {
        return OutputCheck::TooSmall {
            length: bytes.len(),
        };
    }

    if !bytes.starts_with(PDF_MAGIC) {
        return OutputCheck::BadSignature {
            length: bytes.len(),
            header: bytes[..PDF_MAGIC.len()].to_vec(),
        };
    }

    OutputCheck::Valid
}

/// Successful response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputEnvelope {
    pub status: String,
    pub base64: String,
    pub bytes: usize,
}

impl OutputEnvelope {
    pub fn success(document: &[u8]) -> Self {
        Self {
            status: "Success".to_string(),
            base64: STANDARD.encode(document),
            bytes: document.len(),
        }
    }
}

/// Failure response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn from_error(error: &RenderError) -> Self {
        let summary = match error {
            RenderError::TemplateNotFound(_) => "Template file not found on server.",
            RenderError::InvalidPayload(_) => "Request body must be a JSON object.",
            RenderError::UnsupportedMediaType(_) => "Request body must be sent as application/json.",
            _ => "Document generation failed.",
        };

        Self {
            error: summary.to_string(),
            message: error.to_string(),
        }
    }
}
