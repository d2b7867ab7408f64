//! HTTP emulation surface.
//!
//! Serves the device description, channel lineup, and stream passthrough
//! endpoints DVR clients use once discovery has pointed them at the
//! base URL.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use log::info;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::tvheadend::TvheadendClient;

/// Shared state for HTTP handlers.
pub struct WebState {
    pub settings: Arc<Settings>,
    pub tvheadend: TvheadendClient,
}

/// Build the emulation router.
pub fn router(settings: Arc<Settings>, tvheadend: TvheadendClient) -> Router {
    let state = Arc::new(WebState {
        settings,
        tvheadend,
    });

    Router::new()
        .route("/", get(api::discover))
        .route("/discover.json", get(api::discover))
        .route("/device.xml", get(api::device_xml))
        .route("/lineup_status.json", get(api::lineup_status))
        .route("/lineup.json", get(api::lineup))
        .route("/lineup.post", get(api::lineup_post).post(api::lineup_post))
        .route("/auto/:channel", get(api::stream))
        .route("/tuner0/:channel", get(api::stream))
        .route("/tuner1/:channel", get(api::stream))
        .route("/tuner2/:channel", get(api::stream))
        .route("/tuner3/:channel", get(api::stream))
        .fallback(api::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the emulation surface until shutdown is requested or the socket
/// fails.
pub async fn start_web_server(
    listen: SocketAddr,
    settings: Arc<Settings>,
    tvheadend: TvheadendClient,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = router(settings, tvheadend);
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("HTTP emulation surface on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
