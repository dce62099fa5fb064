use crate::{
    install_recorder, parse_payload, serve, validate_config,
    AppState, Config, Margins, PageLayout, RenderRequest, RenderService,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::info;

#[derive(Parser)]
#[command(name = "quote-render")]
#[command(about = "Render JSON payloads into PDF documents through headless Chrome")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "PORT", help = "HTTP listen port")]
    pub port: Option<u16>,

    #[arg(long, help = "Directory containing <name>.hbs templates")]
    pub template_dir: Option<PathBuf>,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, help = "Document load timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of a file or default configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = &self.template_dir {
            config.template_dir = dir.clone();
        }
        if let Some(chrome_path) = &self.chrome_path {
            config.chrome_path = Some(chrome_path.clone());
        }
        if let Some(timeout) = self.timeout {
            config.timeouts.load = Duration::from_secs(timeout);
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve {
        #[arg(long, help = "Bind address")]
        bind: Option<String>,

        #[arg(long, help = "Start the browser on first request instead of at boot")]
        no_warm_start: bool,
    },

    /// Render one document to a file
    Render {
        #[arg(short, long, help = "Template name (without .hbs)")]
        template: String,

        #[arg(short, long, help = "JSON file with the template data")]
        data: Option<PathBuf>,

        #[arg(short, long, help = "Output PDF path")]
        output: PathBuf,

        #[arg(long, help = "Landscape orientation")]
        landscape: bool,

        #[arg(long, default_value = "0", help = "Uniform page margin in inches")]
        margin: f64,
    },

    /// Validate configuration
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        file: PathBuf,
    },
}

pub struct CliRunner {
    pub config: Config,
    pub service: RenderService,
}

impl CliRunner {
    pub fn new(config: Config) -> Self {
        let service = RenderService::new(config.clone());
        Self { config, service }
    }

    pub async fn run(&self, command: Option<Commands>) -> anyhow::Result<()> {
        match command.unwrap_or(Commands::Serve {
            bind: None,
            no_warm_start: false,
        }) {
            Commands::Serve {
                bind,
                no_warm_start,
            } => self.run_server(bind, !no_warm_start).await,
            Commands::Render {
                template,
                data,
                output,
                landscape,
                margin,
            } => {
                let layout = PageLayout {
                    landscape,
                    margins: Margins::uniform(margin),
                    ..Default::default()
                };
                let result = self.run_render(template, data, output, layout).await;
                self.service.shutdown().await;
                result
            }
            Commands::Validate { file } => self.validate_config(file).await,
        }
    }

    pub async fn run_server(&self, bind: Option<String>, warm_start: bool) -> anyhow::Result<()> {
        let host = bind.unwrap_or_else(|| self.config.bind.clone());
        let addr: SocketAddr = format!("{}:{}", host, self.config.port)
            .parse()
            .with_context(|| format!("invalid bind address {host}"))?;

        let state = AppState {
            service: self.service.clone(),
            metrics: install_recorder(),
        };

        serve(
            state,
            addr,
            self.config.body_limit_bytes,
            warm_start && self.config.warm_start,
        )
        .await
    }

    pub async fn run_render(
        &self,
        template: String,
        data: Option<PathBuf>,
        output: PathBuf,
        layout: PageLayout,
    ) -> anyhow::Result<()> {
        let data = match &data {
            Some(path) => {
                let raw = fs::read(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                parse_payload(&raw)?
            }
            None => parse_payload(b"")?,
        };

        info!("Rendering template {}", template);
        let start_time = Instant::now();
        let document = self
            .service
            .render(RenderRequest {
                template_id: template,
                data,
                layout,
                ..Default::default()
            })
            .await?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&output, &document).await?;

        println!("Document rendered successfully:");
        println!("  Output: {}", output.display());
        println!("  Size: {} bytes", document.len());
        println!("  Duration: {:.1?}", start_time.elapsed());

        Ok(())
    }

    pub async fn validate_config(&self, config_path: PathBuf) -> anyhow::Result<()> {
        println!("Validating configuration: {}", config_path.display());

        let config_content = fs::read_to_string(&config_path).await?;
        let config: Config = serde_json::from_str(&config_content)?;
        validate_config(&config).map_err(anyhow::Error::msg)?;

        println!("Configuration is valid:");
        println!("  Listen: {}:{}", config.bind, config.port);
        println!("  Body limit: {} bytes", config.body_limit_bytes);
        println!("  Templates: {}", config.template_dir.display());
        println!(
            "  Viewport: {}x{}",
            config.viewport.width, config.viewport.height
        );
        println!("  Load timeout: {:?}", config.timeouts.load);
        println!("  Export timeout: {:?}", config.timeouts.export);

        Ok(())
    }
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    Ok(())
}
