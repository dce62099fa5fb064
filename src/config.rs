//! Configuration management with serde serialization/deserialization
//!
//! This module provides the process-wide settings of the render service,
//! the per-route page layout used when exporting documents, and the fixed
//! Chrome launch configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for the render service
///
/// Controls the listener, request body ceiling, template location, browser
/// launch settings and the timeout of every suspension point in the pipeline.
///
/// # Examples
///
/// ```rust
/// use quote_render::Config;
///
/// // Use default configuration
/// let config = Config::default();
/// assert_eq!(config.port, 3000);
///
/// // Create custom configuration
/// let config = Config {
///     port: 8080,
///     warm_start: false,
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// TCP port the HTTP server listens on (default: 3000)
    pub port: u16,

    /// Address to bind the listener to (default: 0.0.0.0)
    pub bind: String,

    /// Maximum accepted JSON body size in bytes (default: 50 MiB)
    ///
    /// Payloads may embed base64 spreadsheets.
    pub body_limit_bytes: usize,

    /// Directory holding `<name>.hbs` template sources (default: `views`)
    pub template_dir: PathBuf,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Launch the browser session at startup instead of on first request (default: true)
    pub warm_start: bool,

    /// Browser viewport used by every rendering context
    pub viewport: Viewport,

    /// Per-step timeouts
    pub timeouts: Timeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind: "0.0.0.0".to_string(),
            body_limit_bytes: 50 * 1024 * 1024,
            template_dir: PathBuf::from("views"),
            chrome_path: None,
            warm_start: true,
            viewport: Viewport::default(),
            timeouts: Timeouts::default(),
        }
    }
}

/// Browser viewport configuration for rendering contexts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1280)
    pub width: u32,

    /// Viewport height in pixels (default: 720)
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Timeouts for each suspension point of the render pipeline
///
/// There is no end-to-end deadline: every step is bounded on its own.
///
/// In a JSON config file each field uses serde's `Duration` form, an object
/// with whole `secs` and sub-second `nanos`. Omitted fields keep their
/// defaults.
///
/// ```rust
/// use quote_render::Config;
/// use std::time::Duration;
///
/// let config: Config = serde_json::from_str(
///     r#"{
///         "port": 8080,
///         "timeouts": {
///             "load": { "secs": 90, "nanos": 0 },
///             "network_idle": { "secs": 0, "nanos": 250000000 }
///         }
///     }"#,
/// )?;
///
/// assert_eq!(config.timeouts.load, Duration::from_secs(90));
/// assert_eq!(config.timeouts.network_idle, Duration::from_millis(250));
/// assert_eq!(config.timeouts.export, Duration::from_secs(60));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Timeouts {
    /// Upper bound for launching the browser process (default: 30 seconds)
    pub session_start: Duration,

    /// Upper bound for the liveness check of an existing session (default: 5 seconds)
    pub liveness_check: Duration,

    /// Upper bound for markup to reach the content-loaded state (default: 60 seconds)
    pub load: Duration,

    /// Quiet period that counts as "network idle" (default: 500 ms)
    pub network_idle: Duration,

    /// Upper bound for the advisory stabilization wait (default: 10 seconds)
    ///
    /// Hitting it is logged and ignored. Third-party font services may never
    /// go idle.
    pub stabilize: Duration,

    /// Upper bound for printing the document (default: 60 seconds)
    pub export: Duration,

    /// Upper bound for closing a rendering context (default: 5 seconds)
    pub context_close: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            session_start: Duration::from_secs(30),
            liveness_check: Duration::from_secs(5),
            load: Duration::from_secs(60),
            network_idle: Duration::from_millis(500),
            stabilize: Duration::from_secs(10),
            export: Duration::from_secs(60),
            context_close: Duration::from_secs(5),
        }
    }
}

/// Paper sizes supported by the export step
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub enum PaperFormat {
    A4,
    Letter,
}

impl PaperFormat {
    /// Portrait width and height in inches
    pub fn dimensions_in(&self) -> (f64, f64) {
        match self {
            PaperFormat::A4 => (8.27, 11.69),
            PaperFormat::Letter => (8.5, 11.0),
        }
    }
}

/// Page margins in inches
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Margins {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Margins {
    pub const NONE: Margins = Margins::uniform(0.0);

    pub const fn uniform(inches: f64) -> Self {
        Self {
            top: inches,
            right: inches,
            bottom: inches,
            left: inches,
        }
    }
}

/// Fixed layout parameters applied when exporting a loaded document
///
/// Backgrounds are always printed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PageLayout {
    pub paper: PaperFormat,
    pub landscape: bool,
    pub margins: Margins,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            paper: PaperFormat::A4,
            landscape: false,
            margins: Margins::NONE,
        }
    }
}

impl PageLayout {
    /// A4 landscape, edge to edge
    pub const fn a4_landscape() -> Self {
        Self {
            paper: PaperFormat::A4,
            landscape: true,
            margins: Margins::NONE,
        }
    }

    /// A4 portrait with the given uniform margin
    pub const fn a4_portrait(margin_in: f64) -> Self {
        Self {
            paper: PaperFormat::A4,
            landscape: false,
            margins: Margins::uniform(margin_in),
        }
    }
}

/// Generate Chrome command-line arguments for the shared browser session
///
/// The argument list is fixed: sandboxing is disabled for containerized
/// execution, the browser runs single-process, and `/dev/shm` usage is avoided.
///
/// # Examples
///
/// ```rust
/// use quote_render::{Config, get_chrome_args};
///
/// let args = get_chrome_args(&Config::default());
/// assert!(args.contains(&"--no-sandbox".to_string()));
/// ```
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    vec![
        "--no-sandbox".to_string(),
        "--disable-setuid-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--single-process".to_string(),
        "--no-zygote".to_string(),
        "--disable-gpu".to_string(),
        "--disable-extensions".to_string(),
        "--no-first-run".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
    ]
}

pub fn create_browser_config(
    config: &Config,
) -> Result<chromiumoxide::browser::BrowserConfig, String> {
    use chromiumoxide::browser::BrowserConfig;

    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .launch_timeout(config.timeouts.session_start)
        .user_data_dir(format!("/tmp/quote-render-chromium-{}", std::process::id()))
        .args(get_chrome_args(config));

    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build()
}

/// Check a configuration for values that would make the service unusable
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.port == 0 {
        return Err("Port must be greater than 0".to_string());
    }

    if config.body_limit_bytes == 0 {
        return Err("Body limit must be greater than 0".to_string());
    }

    if config.viewport.width == 0 || config.viewport.height == 0 {
        return Err("Viewport dimensions must be greater than 0".to_string());
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("session_start", timeouts.session_start),
        ("liveness_check", timeouts.liveness_check),
        ("load", timeouts.load),
        ("export", timeouts.export),
        ("context_close", timeouts.context_close),
    ] {
        if value.is_zero() {
            return Err(format!("Timeout `{name}` must be greater than 0"));
        }
    }

    Ok(())
}
