mod app_metrics;
mod arguments;
mod consts;
mod dispatcher;
mod errors;
mod extract;
mod packet;
mod processing;
mod session;
mod structs;
#[cfg(test)]
mod test_support;

#[macro_use]
extern crate tracing;

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_util::MetricKindMask;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use crate::arguments::{Arguments, Command};
use crate::dispatcher::Dispatcher;
use crate::processing::{DeviceInput, Schedule};
use crate::session::Session;
use crate::structs::{AppConfig, Region};

/// An explicitly named file must exist; the default path is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let (path, required) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => match std::env::var("CONFIG_FILE_PATH") {
            Ok(s) => (PathBuf::from(s), true),
            Err(_e) => (PathBuf::from(consts::DEFAULT_CONFIG_PATH), false),
        },
    };
    if !required && !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let yaml = fs::read_to_string(&path).with_context(|| format!("Can't read config file {}", path.display()))?;
    AppConfig::from_yaml(&yaml).with_context(|| format!("Couldn't deserialize AppConfig from {}", path.display()))
}

fn start_metrics(port: u16) -> Result<()> {
    let metrics_addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    PrometheusBuilder::new()
        .idle_timeout(
            MetricKindMask::COUNTER | MetricKindMask::HISTOGRAM,
            Some(Duration::from_secs(300)),
        )
        .with_http_listener(metrics_addr)
        .install()
        .context("Couldn't start prometheus.")?;
    app_metrics::register_metrics();
    info!("Serving metrics on {metrics_addr}");
    Ok(())
}

/// Cancels `token` on the first SIGINT or SIGTERM.
fn cancel_on_signal(token: CancellationToken) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Couldn't register signal handlers")?;
    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!("Received signal {signal}, stopping after the current send");
            token.cancel();
        }
    });
    Ok(())
}

#[tokio::main]
pub async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Arguments::parse();
    let config = load_config(args.config.as_deref())?;

    if let Some(port) = config.metrics_port {
        start_metrics(port)?;
    }

    let dispatcher = Dispatcher::new(config.request_timeout()).context("Couldn't build HTTP client")?;
    let mut session = Session::new();

    match args.action {
        Command::Regions => {
            for region in Region::iter() {
                match config.endpoint(region) {
                    Ok(url) => println!("{region}\t{url}"),
                    Err(e) => println!("{region}\t{e}"),
                }
            }
            return Ok(());
        }
        Command::Register { region, imei, compliance } => {
            processing::process_registration(&config, &dispatcher, &mut session, region, &imei, compliance).await;
        }
        Command::Send { region, imeis, latitude, longitude } => {
            processing::process_manual(&config, &dispatcher, &mut session, region, &imeis, &latitude, &longitude).await;
        }
        Command::Extract { region, format } => {
            processing::process_extracted(&config, &dispatcher, &mut session, region, &format).await;
        }
        Command::Continuous { region, imei, latitude, longitude, format, interval, duration } => {
            let input = match format {
                Some(text) => DeviceInput::Format(text),
                None => DeviceInput::Manual {
                    imei: imei.unwrap_or_default(),
                    latitude: latitude.unwrap_or_default(),
                    longitude: longitude.unwrap_or_default(),
                },
            };
            let schedule = Schedule {
                interval: Duration::from_secs(interval.unwrap_or(config.default_interval_secs).max(1)),
                duration: Duration::from_secs(duration),
            };
            let cancel = CancellationToken::new();
            cancel_on_signal(cancel.clone())?;
            if let Some(report) =
                processing::process_continuous(&config, &dispatcher, &mut session, region, input, schedule, cancel).await
            {
                info!(
                    "Continuous sending {} after {} ({} sent, {} failed)",
                    report.outcome,
                    pretty_duration::pretty_duration(&report.elapsed, None),
                    report.attempted,
                    report.failed
                );
            }
        }
    }

    for entry in session.activity() {
        println!("{entry}");
    }
    if !session.errors().is_empty() {
        println!("Errors:");
        for entry in session.errors() {
            println!("  {entry}");
        }
    }
    info!("Session: {}", session.summary());
    Ok(())
}

pub fn get_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
