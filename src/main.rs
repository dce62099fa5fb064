use anyhow::Context;
use clap::Parser;
use quote_render::{setup_logging, validate_config, Cli, CliRunner, Config};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting quote-render v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;
    let cli_runner = CliRunner::new(config);

    if let Err(e) = cli_runner.run(args.command).await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    info!("quote-render stopped");
    Ok(())
}

async fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let mut config = if let Some(config_path) = &args.config {
        let config_content = tokio::fs::read_to_string(config_path)
            .await
            .with_context(|| format!("reading {}", config_path.display()))?;
        serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", config_path.display()))?
    } else {
        Config::default()
    };

    args.apply_overrides(&mut config);

    validate_config(&config).map_err(anyhow::Error::msg)?;

    info!("Configuration loaded successfully");
    info!("Templates: {}", config.template_dir.display());
    info!("Load timeout: {:?}", config.timeouts.load);

    Ok(config)
}
