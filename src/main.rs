use clap::Parser;
use snapshot_render::api::WebDriverSession;
use snapshot_render::config::{AppConfig, CliOverrides, LoggingConfig, Settings};
use snapshot_render::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(
    name = "snapshot-render",
    version,
    about = "Render stored message snapshots into PNG previews"
)]
struct Cli {
    /// Input folder containing snapshot fixtures.
    #[arg(short = 'i', long = "in", value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output folder the images are saved to.
    #[arg(short = 'o', long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Configuration file (RON, or a package.json with a `snapshotRender` block).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Skip a fixture category, in addition to the configured ones.
    #[arg(long, value_name = "CATEGORY")]
    exclude: Vec<String>,

    /// WebDriver server to render through.
    #[arg(long, value_name = "URL")]
    webdriver_url: Option<String>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            input: self.input.clone(),
            out: self.out.clone(),
            exclude: self.exclude.clone(),
            webdriver_url: self.webdriver_url.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", report(&e));
            return ExitCode::FAILURE;
        }
    };

    // Keep the guard alive so buffered file logs are flushed on exit.
    let _guard = init_logging(&config.logging);
    match &config.loaded_from {
        Some(path) => tracing::info!("Loaded config from {}", path.display()),
        None => tracing::info!("No config file found, using defaults"),
    }

    let settings = match Settings::resolve(config, &cli.overrides()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match snapshot_render::run(&settings, || WebDriverSession::connect(&settings.render)).await {
        Ok(summary) => {
            if !summary.failed_jobs.is_empty() {
                eprintln!(
                    "{} snapshot(s) could not be rendered:",
                    summary.failed_jobs.len()
                );
                for path in &summary.failed_jobs {
                    eprintln!("  {}", path.display());
                }
            }
            if summary.failed_entries > 0 {
                eprintln!(
                    "{} snapshot entr{} could not be parsed",
                    summary.failed_entries,
                    if summary.failed_entries == 1 { "y" } else { "ies" }
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", report(&e));
            ExitCode::FAILURE
        }
    }
}

/// Build the subscriber from the logging config. `RUST_LOG`, when set, wins.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(_) => tracing_subscriber::EnvFilter::from_default_env(),
        Err(_) => tracing_subscriber::EnvFilter::new(logging.filter_directive()),
    };

    match &logging.log_directory {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "snapshot-render.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .compact()
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .compact()
                .init();
            None
        }
    }
}

/// The error and every cause below the one its message already includes.
fn report(err: &Error) -> String {
    let mut out = err.to_string();
    let mut source = std::error::Error::source(err).and_then(|s| s.source());
    while let Some(cause) = source {
        out.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    out
}
