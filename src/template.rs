//! Template lookup and markup rendering
//!
//! Templates are Handlebars sources resolved by identifier. The engine runs
//! with escaping disabled for every call, so values carrying markup are
//! emitted verbatim.

use crate::RenderError;
use handlebars::{handlebars_helper, no_escape, Handlebars};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Name → template source lookup
#[cfg_attr(test, mockall::automock)]
pub trait TemplateSource: Send + Sync {
    /// Returns `Ok(None)` when no template exists under `template_id`.
    fn load(&self, template_id: &str) -> Result<Option<String>, RenderError>;
}

/// Reads `<dir>/<template_id>.hbs` from disk on every lookup
pub struct DirectoryTemplates {
    dir: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, template_id: &str) -> Option<PathBuf> {
        is_valid_template_id(template_id).then(|| self.dir.join(format!("{template_id}.hbs")))
    }
}

impl TemplateSource for DirectoryTemplates {
    fn load(&self, template_id: &str) -> Result<Option<String>, RenderError> {
        let Some(path) = self.path_for(template_id) else {
            return Ok(None);
        };

        match std::fs::read_to_string(&path) {
            Ok(source) => Ok(Some(source)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Template file missing: {}", path.display());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Identifiers are plain names; anything that could escape the template
/// directory is treated as unknown.
pub fn is_valid_template_id(template_id: &str) -> bool {
    !template_id.is_empty()
        && template_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

handlebars_helper!(strict_eq: |a: Json, b: Json| a == b);

pub struct TemplateRenderer {
    source: Arc<dyn TemplateSource>,
    engine: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        let mut engine = Handlebars::new();
        engine.register_escape_fn(no_escape);
        engine.register_helper("eq", Box::new(strict_eq));

        Self { source, engine }
    }

    /// Merge `data` into the template named `template_id`
    ///
    /// `null` data renders against an empty object.
    pub fn render(&self, template_id: &str, data: &Value) -> Result<String, RenderError> {
        let source = self
            .source
            .load(template_id)?
            .ok_or_else(|| RenderError::TemplateNotFound(template_id.to_string()))?;

        let empty = Value::Object(Map::new());
        let data = if data.is_null() { &empty } else { data };

        self.engine
            .render_template(&source, data)
            .map_err(|e| RenderError::TemplateRender(e.to_string()))
    }
}
