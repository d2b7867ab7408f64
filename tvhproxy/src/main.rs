//! tvhproxy: HDHomeRun tuner emulator for Tvheadend.
//!
//! Presents a Tvheadend installation to DVR client software as a
//! hardware tuner cluster: answers the discovery/control wire protocol
//! on UDP/TCP and serves the device description, channel lineup, and
//! stream passthrough over HTTP.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use clap::Parser;
use log::info;
use tokio_util::sync::CancellationToken;

mod config;
mod logging;
mod server;
mod tvheadend;
mod web;

use hdhr_protocol::types::{CONTROL_TCP_PORT, DISCOVER_UDP_PORT};

use config::{Args, Mode, Settings};
use server::control::ControlServer;
use server::discovery::DiscoveryServer;
use tvheadend::TvheadendClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let settings = Settings::resolve(args)?;

    logging::init_logging(
        settings.log_dir.as_deref(),
        settings.log_retention_days,
        settings.verbose,
    )
    .expect("Failed to initialize logging");

    info!("tvhproxy starting...");
    info!("  Mode: {:?}", settings.mode);
    info!("  Advertised address: {}", settings.address);
    info!("  Device id: {:08X}", settings.identity.device_id);
    info!("  Tuner count: {}", settings.identity.tuner_count);
    info!("  Base URL: {}", settings.identity.base_url);
    info!("  Tvheadend: {}", settings.tvheadend.url);
    if !settings.ignore.is_empty() {
        info!("  Ignoring senders: {}", settings.ignore);
    }

    let settings = Arc::new(settings);
    let identity = Arc::new(settings.identity.clone());
    let ignore = Arc::new(settings.ignore.clone());
    let tvheadend = TvheadendClient::new(settings.tvheadend.clone());

    // Ctrl-C cancels the token; every listener watches it for a
    // deterministic stop.
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
        }
    });

    let wildcard = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    let discovery_addr = SocketAddr::new(wildcard, DISCOVER_UDP_PORT);
    let control_addr = SocketAddr::new(settings.address, CONTROL_TCP_PORT);
    let web_addr = SocketAddr::new(wildcard, settings.http_port);

    match settings.mode {
        Mode::Discovery => {
            let listener = DiscoveryServer::bind(discovery_addr, identity, ignore).await?;
            listener.run(shutdown).await?;
        }
        Mode::Control => {
            let listener = ControlServer::bind(control_addr, identity, ignore).await?;
            listener.run(shutdown).await?;
        }
        Mode::Web => {
            web::start_web_server(web_addr, Arc::clone(&settings), tvheadend, shutdown).await?;
        }
        Mode::All => {
            let discovery =
                DiscoveryServer::bind(discovery_addr, Arc::clone(&identity), Arc::clone(&ignore))
                    .await?;
            let control = ControlServer::bind(control_addr, identity, ignore).await?;

            // The first surface to fail takes the process down with it;
            // restarts are a supervisor's job.
            tokio::try_join!(
                discovery.run(shutdown.clone()),
                control.run(shutdown.clone()),
                web::start_web_server(web_addr, Arc::clone(&settings), tvheadend, shutdown),
            )?;
        }
    }

    info!("tvhproxy stopped");
    Ok(())
}
