use std::io::Write;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use tokio::signal;
use tokio::signal::unix::SignalKind;

use hue_circadian::backend::hass::CircadianBackend;
use hue_circadian::config;
use hue_circadian::error::ApiResult;
use hue_circadian::service;

/*
 * Formatter function to output in syslog format. This makes sense when running
 * as a service (where output might go to a log file, or the system journal)
 */
#[allow(clippy::match_same_arms)]
fn syslog_format(
    buf: &mut pretty_env_logger::env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "<{}>{}: {}",
        match record.level() {
            log::Level::Error => 3,
            log::Level::Warn => 4,
            log::Level::Info => 6,
            log::Level::Debug => 7,
            log::Level::Trace => 7,
        },
        record.target(),
        record.args()
    )
}

fn init_logging() -> ApiResult<()> {
    /* Try to provide reasonable default filters, when RUST_LOG is not specified */
    const DEFAULT_LOG_FILTERS: &[&str] = &[
        "debug",
        "hyper=info",
        "hyper_util=info",
        "reqwest=info",
        "tungstenite=info",
    ];

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTERS.join(","));

    /* Detect if we need syslog or human-readable formatting */
    if std::env::var("SYSTEMD_EXEC_PID").is_ok_and(|pid| pid == std::process::id().to_string()) {
        Ok(pretty_env_logger::env_logger::builder()
            .format(syslog_format)
            .parse_filters(&log_filters)
            .try_init()?)
    } else {
        Ok(pretty_env_logger::formatted_timed_builder()
            .parse_filters(&log_filters)
            .try_init()?)
    }
}

#[derive(Debug, Parser)]
#[command(name = "hue-circadian", about, version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: Utf8PathBuf,
}

async fn run(args: Args) -> ApiResult<()> {
    init_logging()?;

    let config = Arc::new(config::parse(&args.config)?);
    log::debug!("Configuration loaded successfully");

    let backend = CircadianBackend::new(config)?;

    let mut sigterm = signal::unix::signal(SignalKind::terminate())?;

    tokio::select! {
        res = service::run_service(backend) => res,
        _ = signal::ctrl_c() => {
            log::warn!("Ctrl-C pressed, exiting..");
            Ok(())
        }
        _ = sigterm.recv() => {
            log::warn!("SIGTERM received, exiting..");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(err) = run(args).await {
        log::error!("hue-circadian error: {err}");
        log::error!("Fatal error encountered, cannot continue.");
    }
}
