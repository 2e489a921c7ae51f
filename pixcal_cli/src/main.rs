mod calib;
mod cli;
mod error_fmt;

use clap::Parser;
use cli::{Cli, FILE_GUARD};
use eyre::{Result, WrapErr};
use pixcal_config::Logging;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        if cli.json {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
            tracing::debug!(error = ?err, "command failed");
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn run(cli: &Cli) -> Result<()> {
    // Plain reports: the CLI prints its own explanation, not a backtrace dump
    color_eyre::config::HookBuilder::default()
        .display_env_section(false)
        .install()?;

    // Logging needs the config's [logging] table; a broken config still gets console logs
    let cfg = calib::load_config(&cli.config, cli.layout.as_deref());
    let logging = cfg.as_ref().ok().map(|c| &c.logging);
    init_tracing(cli, logging)?;
    let cfg = cfg?;

    tracing::info!(
        config = %cli.config.display(),
        modules = cfg.modules.len(),
        linear_extrapolation = cfg.calibration.linear_extrapolation,
        "config loaded"
    );
    calib::run_command(cli, &cfg)
}

fn init_tracing(cli: &Cli, logging: Option<&Logging>) -> Result<()> {
    let level = cli
        .log_level
        .clone()
        .or_else(|| logging.and_then(|l| l.level.clone()))
        .unwrap_or_else(|| "warn".to_string());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;

    let console = if cli.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    // Optional JSON-lines file sink
    let file = match logging.and_then(|l| l.file.as_deref()) {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
            let appender = match logging.and_then(|l| l.rotation.as_deref()) {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(filter)
        .try_init()
        .wrap_err("install tracing subscriber")
}
