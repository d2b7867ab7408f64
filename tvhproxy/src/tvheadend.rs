//! Tvheadend REST API client: the channel catalog behind the emulator.

use serde::Deserialize;

use crate::config::{SortField, SortOrder, TvheadendSettings};

/// One channel row from Tvheadend's channel grid.
#[derive(Debug, Clone, Deserialize)]
pub struct TvhChannel {
    pub uuid: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub number: i64,
}

#[derive(Debug, Deserialize)]
struct ChannelGrid {
    #[serde(default)]
    entries: Vec<TvhChannel>,
}

/// Client for the Tvheadend HTTP API.
#[derive(Debug, Clone)]
pub struct TvheadendClient {
    settings: TvheadendSettings,
    http: reqwest::Client,
}

impl TvheadendClient {
    pub fn new(settings: TvheadendSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    /// Fetch the full channel grid, sorted per configuration.
    pub async fn channel_grid(&self) -> Result<Vec<TvhChannel>, reqwest::Error> {
        let url = format!(
            "{}/api/channel/grid?start=0&limit=999999",
            self.settings.url
        );
        let grid: ChannelGrid = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut channels = grid.entries;
        sort_channels(
            &mut channels,
            self.settings.sort_field,
            self.settings.sort_order,
        );
        Ok(channels)
    }

    /// Direct stream URL for a channel, with profile and weight applied.
    pub fn stream_url(&self, channel: &TvhChannel) -> String {
        format!(
            "{}/stream/channel/{}?profile={}&weight={}",
            self.settings.url,
            channel.uuid,
            self.settings.stream_profile,
            self.settings.subscription_weight
        )
    }

    /// Open a channel stream for passthrough.
    pub async fn open_stream(&self, url: &str) -> Result<reqwest::Response, reqwest::Error> {
        self.http.get(url).send().await?.error_for_status()
    }
}

fn sort_channels(channels: &mut [TvhChannel], field: SortField, order: SortOrder) {
    match field {
        SortField::None => return,
        SortField::Name => channels.sort_by(|a, b| a.name.cmp(&b.name)),
        SortField::Number => channels.sort_by_key(|c| c.number),
    }
    if order == SortOrder::Desc {
        channels.reverse();
    }
}
