use clap::Parser;
use pitlane::cli::{Cli, Commands};
use pitlane::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            let config: Config = toml::from_str(include_str!("../config.toml.example"))?;
            config.validate()?;
            config
        }
    };

    // Initialize telemetry
    let _telemetry = pitlane::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(base_url = %config.api.base_url, "Starting live timing");
            args.execute(&config).await?;
        }
        Commands::Session(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  API: {}", config.api.base_url);
            println!(
                "  Session: live window {}h, {} retries every {}s, probe every {}s",
                config.session.live_window_hours,
                config.session.acquire_max_retries,
                config.session.acquire_retry_secs,
                config.session.probe_interval_secs
            );
            println!(
                "  Polling: every {}ms, telemetry window {}s",
                config.polling.interval_ms, config.polling.telemetry_window_secs
            );
            println!(
                "  Standings: DRS open above {}, MOM under {}s",
                config.standings.drs_open_threshold, config.standings.mom_window_secs
            );
            println!(
                "  Telemetry: level={}, format={:?}, metrics_port={:?}",
                config.telemetry.log_level,
                config.telemetry.log_format,
                config.telemetry.metrics_port
            );
        }
    }

    Ok(())
}
