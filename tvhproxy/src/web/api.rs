//! HTTP endpoint handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::Settings;
use crate::tvheadend::{TvhChannel, TvheadendClient};
use crate::web::WebState;

/// Device description body, shared by discover.json and device.xml.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiscoverData {
    pub friendly_name: String,
    pub model_number: String,
    pub firmware_name: String,
    pub tuner_count: u8,
    pub firmware_version: String,
    #[serde(rename = "DeviceID")]
    pub device_id: String,
    pub device_auth: String,
    #[serde(rename = "BaseURL")]
    pub base_url: String,
    #[serde(rename = "LineupURL")]
    pub lineup_url: String,
}

impl DiscoverData {
    pub fn from_settings(settings: &Settings) -> Self {
        let base_url = settings.identity.base_url.clone();
        Self {
            friendly_name: settings.device.friendly_name.clone(),
            model_number: settings.device.model_number.clone(),
            firmware_name: settings.device.firmware_name.clone(),
            tuner_count: settings.identity.tuner_count,
            firmware_version: settings.device.firmware_version.clone(),
            device_id: settings.device.device_id_hex.clone(),
            device_auth: settings.device.device_auth.clone(),
            lineup_url: format!("{}/lineup.json", base_url),
            base_url,
        }
    }
}

/// One lineup row as DVR clients expect it.
#[derive(Debug, Clone, Serialize)]
pub struct LineupEntry {
    #[serde(rename = "GuideNumber")]
    pub guide_number: String,
    #[serde(rename = "GuideName")]
    pub guide_name: String,
    #[serde(rename = "URL")]
    pub url: String,
}

pub async fn discover(State(state): State<Arc<WebState>>) -> Json<DiscoverData> {
    Json(DiscoverData::from_settings(&state.settings))
}

pub async fn device_xml(State(state): State<Arc<WebState>>) -> impl IntoResponse {
    let data = DiscoverData::from_settings(&state.settings);
    let xml = render_device_xml(&data, &state.settings.device.manufacturer);
    ([(CONTENT_TYPE, "application/xml")], xml)
}

fn render_device_xml(data: &DiscoverData, manufacturer: &str) -> String {
    format!(
        r#"<root xmlns="urn:schemas-upnp-org:device-1-0">
    <specVersion>
        <major>1</major>
        <minor>0</minor>
    </specVersion>
    <URLBase>{base_url}</URLBase>
    <device>
        <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
        <friendlyName>{friendly_name}</friendlyName>
        <manufacturer>{manufacturer}</manufacturer>
        <modelName>{model_number}</modelName>
        <modelNumber>{model_number}</modelNumber>
        <serialNumber></serialNumber>
        <UDN>uuid:{device_id}</UDN>
    </device>
</root>
"#,
        base_url = data.base_url,
        friendly_name = data.friendly_name,
        manufacturer = manufacturer,
        model_number = data.model_number,
        device_id = data.device_id,
    )
}

pub async fn lineup_status() -> Json<serde_json::Value> {
    Json(json!({
        "ScanInProgress": 0,
        "ScanPossible": 1,
        "Source": "Cable",
        "SourceList": ["Cable"],
    }))
}

pub async fn lineup(State(state): State<Arc<WebState>>) -> Result<Json<Vec<LineupEntry>>, StatusCode> {
    let channels = state.tvheadend.channel_grid().await.map_err(|e| {
        error!("Tvheadend channel grid failed: {}", e);
        StatusCode::BAD_GATEWAY
    })?;

    Ok(Json(lineup_entries(
        &channels,
        &state.tvheadend,
        state.settings.tvheadend.direct_stream,
        &state.settings.identity.base_url,
    )))
}

/// Map enabled channels to lineup rows. Direct-stream mode points clients
/// straight at Tvheadend; proxy mode routes them through `/auto/v{n}`.
fn lineup_entries(
    channels: &[TvhChannel],
    tvheadend: &TvheadendClient,
    direct_stream: bool,
    base_url: &str,
) -> Vec<LineupEntry> {
    channels
        .iter()
        .filter(|channel| channel.enabled)
        .map(|channel| {
            let url = if direct_stream {
                tvheadend.stream_url(channel)
            } else {
                format!("{}/auto/v{}", base_url, channel.number)
            };
            LineupEntry {
                guide_number: channel.number.to_string(),
                guide_name: channel.name.clone(),
                url,
            }
        })
        .collect()
}

/// Scan trigger endpoint; scanning is a no-op for an emulated lineup.
pub async fn lineup_post() -> &'static str {
    ""
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Stop relaying after this many seconds (0 = unbounded).
    #[serde(default)]
    duration: u64,
}

/// Relay a channel stream from Tvheadend to the client unchanged.
pub async fn stream(
    State(state): State<Arc<WebState>>,
    Path(channel): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Response {
    info!("Stream request for {}", channel);
    let number = channel.trim_start_matches('v');

    let channels = match state.tvheadend.channel_grid().await {
        Ok(channels) => channels,
        Err(e) => {
            error!("Tvheadend channel grid failed: {}", e);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let Some(target) = channels.iter().find(|c| c.number.to_string() == number) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let url = state.tvheadend.stream_url(target);
    let upstream = match state.tvheadend.open_stream(&url).await {
        Ok(response) => response,
        Err(e) => {
            error!("Tvheadend stream open failed: {}", e);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    // reqwest and axum disagree on http crate versions, so the upstream
    // content type crosses over as a string.
    let content_type = upstream
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let deadline = (query.duration > 0).then(|| Instant::now() + Duration::from_secs(query.duration));
    let body = Body::from_stream(upstream.bytes_stream().take_while(move |_| {
        futures::future::ready(deadline.map_or(true, |d| Instant::now() < d))
    }));

    let mut response = Response::new(body);
    if let Some(value) = content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

pub async fn not_found(uri: Uri) -> impl IntoResponse {
    info!("Path undefined: {}", uri.path());
    StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SortField, SortOrder, TvheadendSettings};

    fn tvheadend() -> TvheadendClient {
        TvheadendClient::new(TvheadendSettings {
            url: "http://127.0.0.1:9981".to_string(),
            stream_profile: "pass".to_string(),
            subscription_weight: 300,
            direct_stream: true,
            sort_field: SortField::None,
            sort_order: SortOrder::Asc,
        })
    }

    fn channels() -> Vec<TvhChannel> {
        vec![
            TvhChannel {
                uuid: "abcd".to_string(),
                enabled: true,
                name: "News One".to_string(),
                number: 1,
            },
            TvhChannel {
                uuid: "ef01".to_string(),
                enabled: false,
                name: "Shop TV".to_string(),
                number: 42,
            },
        ]
    }

    #[test]
    fn test_discover_data_field_names() {
        let data = DiscoverData {
            friendly_name: "HDHR Emulator".to_string(),
            model_number: "HDTC-2US".to_string(),
            firmware_name: "hdhomeruntc_atsc".to_string(),
            tuner_count: 4,
            firmware_version: "20150826".to_string(),
            device_id: "12345678".to_string(),
            device_auth: "test1234".to_string(),
            base_url: "http://127.0.0.1:80".to_string(),
            lineup_url: "http://127.0.0.1:80/lineup.json".to_string(),
        };
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["FriendlyName"], "HDHR Emulator");
        assert_eq!(value["TunerCount"], 4);
        assert_eq!(value["DeviceID"], "12345678");
        assert_eq!(value["BaseURL"], "http://127.0.0.1:80");
        assert_eq!(value["LineupURL"], "http://127.0.0.1:80/lineup.json");
    }

    #[test]
    fn test_lineup_skips_disabled_channels() {
        let entries = lineup_entries(&channels(), &tvheadend(), true, "http://127.0.0.1:80");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].guide_number, "1");
        assert_eq!(entries[0].guide_name, "News One");
    }

    #[test]
    fn test_lineup_direct_stream_urls() {
        let entries = lineup_entries(&channels(), &tvheadend(), true, "http://127.0.0.1:80");
        assert_eq!(
            entries[0].url,
            "http://127.0.0.1:9981/stream/channel/abcd?profile=pass&weight=300"
        );
    }

    #[test]
    fn test_lineup_proxy_urls() {
        let entries = lineup_entries(&channels(), &tvheadend(), false, "http://127.0.0.1:80");
        assert_eq!(entries[0].url, "http://127.0.0.1:80/auto/v1");
    }

    #[test]
    fn test_device_xml_render() {
        let data = DiscoverData {
            friendly_name: "HDHR Emulator".to_string(),
            model_number: "HDTC-2US".to_string(),
            firmware_name: "hdhomeruntc_atsc".to_string(),
            tuner_count: 4,
            firmware_version: "20150826".to_string(),
            device_id: "12345678".to_string(),
            device_auth: "test1234".to_string(),
            base_url: "http://127.0.0.1:80".to_string(),
            lineup_url: "http://127.0.0.1:80/lineup.json".to_string(),
        };
        let xml = render_device_xml(&data, "Silicondust");
        assert!(xml.contains("<URLBase>http://127.0.0.1:80</URLBase>"));
        assert!(xml.contains("<friendlyName>HDHR Emulator</friendlyName>"));
        assert!(xml.contains("<UDN>uuid:12345678</UDN>"));
    }
}
