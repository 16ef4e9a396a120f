//! elaphure-scan - Find elaphureLink devices on the local network
//!
//! Broadcasts a discovery probe, prints the responders and the address
//! that would seed the connection setup.

mod config;
mod session;

use anyhow::Result;
use clap::Parser;
use elaphure_core::DiscoveredDevice;
use elaphure_discovery::{DiscoveryEvent, UdpScanner};
use std::net::{IpAddr, SocketAddrV4};
use std::path::PathBuf;
use std::time::Duration;
use std::io::Write;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::OutputFormat;
use crate::session::{ScanOutcome, ScanSession};

#[derive(Parser, Debug)]
#[command(name = "elaphure-scan")]
#[command(about = "Discover elaphureLink devices on the local network")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "elaphure.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Scan window in milliseconds
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Discovery port devices listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Probe these addresses instead of the interface broadcasts (repeatable)
    #[arg(long = "target")]
    targets: Vec<SocketAddrV4>,

    /// Device address to select when several respond
    #[arg(long)]
    select: Option<IpAddr>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if args.init_config {
        config::save_default_config(&args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    let mut config = config::load_config(&args.config)?;
    if let Some(timeout_ms) = args.timeout_ms {
        config.discovery.timeout_ms = timeout_ms;
    }
    if let Some(port) = args.port {
        config.discovery.port = port;
    }
    if args.json {
        config.output.format = OutputFormat::Json;
    }

    info!(
        port = config.discovery.port,
        timeout_ms = config.discovery.timeout_ms,
        "Configuration loaded"
    );

    let scanner = UdpScanner::new(config.to_scanner_config());
    let timeout = Duration::from_millis(config.discovery.timeout_ms);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, stopping scan");
                cancel.cancel();
            }
        });
    }

    let mut events = scanner.subscribe();
    let progress = tokio::spawn(async move {
        report_progress(&mut events, &mut std::io::stderr()).await;
    });

    let session = ScanSession::new();
    let outcome = if args.targets.is_empty() {
        session.run(scanner.scan_with_cancel(timeout, &cancel)).await
    } else {
        session
            .run(scanner.scan_targets(&args.targets, timeout, &cancel))
            .await
    };
    drop(scanner);
    let _ = progress.await;

    if let ScanOutcome::Failed(reason) = &outcome {
        anyhow::bail!("discovery failed: {}", reason);
    }

    if let Some(address) = args.select {
        if session.select(address).await.is_none() {
            warn!(address = %address, "Requested device did not respond");
        }
    }

    let devices = session.devices().await;
    let has_devices = session.has_devices().await;
    let selected = session.connection_address().await;

    match config.output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&devices)?);
        }
        OutputFormat::Text => print_devices(&devices, has_devices, selected),
    }

    Ok(())
}

/// Echo scan events until the scan completes or the scanner goes away.
///
/// Returns how many discovered devices were reported.
async fn report_progress<W: Write>(
    events: &mut broadcast::Receiver<DiscoveryEvent>,
    out: &mut W,
) -> usize {
    let mut reported = 0;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Progress output fell behind");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match event {
            DiscoveryEvent::ScanStarted { targets } => {
                let _ = writeln!(out, "Scanning {} broadcast target(s)...", targets);
            }
            DiscoveryEvent::DeviceDiscovered(device) => {
                reported += 1;
                let _ = writeln!(out, "  found {}", device.address);
            }
            DiscoveryEvent::ScanCompleted { .. } => break,
        }
    }
    reported
}

fn print_devices(devices: &[DiscoveredDevice], has_devices: bool, selected: Option<IpAddr>) {
    if !has_devices {
        println!("No devices found");
        return;
    }

    println!("Discovered {} devices:", devices.len());
    for device in devices {
        let marker = if Some(device.address) == selected { "*" } else { "-" };
        println!("  {} {} (port {})", marker, device.display_label(), device.port);
        if !device.raw.is_empty() {
            println!("    Reply: {}", device.raw);
        }
    }

    if let Some(address) = selected {
        println!("Selected device: {}", address);
    }
}
