use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderValue, AUTHORIZATION},
    StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use url::Url;

use super::{
    model::{Devices, TopTracks},
    token::Tokens,
    Album, Api, Artist, CurrentlyPlaying, Device, Page, Playback, PlaybackRequest, Playlist,
    PlaylistItem, Queue, RepeatState, SavedTrack, SearchResults, SearchType, Track, User,
};
use crate::{
    config::Config,
    error::{Error, ErrorKind, Result},
    http::Client as HttpClient,
};

/// Spotify Web API client.
pub struct Client {
    http_client: HttpClient,
    tokens: Tokens,
    api_url: Url,
    market: String,
}

/// Error object of the Web API: `{"error": {"status": 404, "message": "..."}}`.
#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorObject,
}

#[derive(Deserialize)]
struct ErrorObject {
    message: String,
    #[serde(default)]
    reason: Option<String>,
}

/// How a request wants its response body handled.
#[derive(Clone, Copy)]
enum Expect {
    /// A JSON body must be present.
    Json,
    /// `204 No Content` is a valid, empty answer.
    MaybeJson,
    /// The body is ignored.
    Nothing,
}

impl Client {
    /// Page size for listings; Spotify's maximum for most endpoints.
    const PAGE_LIMIT: u32 = 50;

    /// Creates a client from the configuration.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http_client: HttpClient::new(config)?,
            tokens: Tokens::new(config.credentials.clone(), &config.accounts_url)?,
            api_url: config.api_url.clone(),
            market: config.market.clone(),
        })
    }

    /// The token source, for the one-time authorization.
    #[must_use]
    pub fn tokens(&self) -> &Tokens {
        &self.tokens
    }

    #[must_use]
    pub fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.api_url.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn device_query(device: Option<&str>) -> Vec<(&str, &str)> {
        device.map(|id| ("device_id", id)).into_iter().collect()
    }

    /// Sends a request built by `build`, retrying once with a fresh access
    /// token when Spotify answers `401 Unauthorized`.
    async fn send<F>(&self, expect: Expect, build: F) -> Result<Option<String>>
    where
        F: Fn() -> reqwest::Request,
    {
        let mut retried = false;
        loop {
            let token = self.tokens.access_token(&self.http_client).await?;
            let mut request = build();
            request.headers_mut().insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token.as_str()))?,
            );

            trace!("{} {}", request.method(), request.url());
            let response = self.http_client.execute(request).await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && !retried {
                debug!("access token rejected; refreshing");
                self.tokens.flush().await;
                retried = true;
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(Self::status_error(status, &text));
            }

            return match expect {
                Expect::Nothing => Ok(None),
                Expect::MaybeJson if status == StatusCode::NO_CONTENT => Ok(None),
                Expect::Json | Expect::MaybeJson => {
                    let text = response.text().await?;
                    if text.trim().is_empty() {
                        if matches!(expect, Expect::MaybeJson) {
                            Ok(None)
                        } else {
                            Err(Error::data_loss(format!("empty response with {status}")))
                        }
                    } else {
                        Ok(Some(text))
                    }
                }
            };
        }
    }

    fn status_error(status: StatusCode, body: &str) -> Error {
        let kind = ErrorKind::from_status(status.as_u16());
        let message = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(ErrorResponse {
                error:
                    ErrorObject {
                        message,
                        reason: Some(reason),
                    },
            }) => format!("{message} ({reason})"),
            Ok(ErrorResponse { error }) => error.message,
            Err(_) => format!("request failed with {status}"),
        };
        Error::new(kind, message)
    }

    async fn get<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned + Debug,
    {
        let url = self.url(path, query)?;
        let body = self
            .send(Expect::Json, || self.http_client.get(url.clone()))
            .await?
            .ok_or_else(|| Error::data_loss(format!("no content for {path}")))?;
        json(&body, path)
    }

    async fn get_optional<T>(&self, path: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Debug,
    {
        let url = self.url(path, &[])?;
        match self
            .send(Expect::MaybeJson, || self.http_client.get(url.clone()))
            .await?
        {
            Some(body) => json(&body, path).map(Some),
            None => Ok(None),
        }
    }

    async fn player_command(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<()> {
        let url = self.url(path, query)?;
        self.send(Expect::Nothing, || {
            self.http_client.request(method.clone(), url.clone(), "")
        })
        .await
        .map(|_| ())
    }
}

/// Parses a response body, logging it at trace level.
fn json<T>(body: &str, origin: &str) -> Result<T>
where
    T: DeserializeOwned + Debug,
{
    match serde_json::from_str(body) {
        Ok(result) => {
            trace!("{origin}: {result:#?}");
            Ok(result)
        }
        Err(e) => {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
                trace!("{origin}: {json:#?}");
            } else {
                error!("{origin}: failed parsing response ({e})");
                trace!("{body}");
            }
            Err(e.into())
        }
    }
}

#[async_trait]
impl Api for Client {
    async fn current_playback(&self) -> Result<Option<Playback>> {
        self.get_optional("me/player").await
    }

    async fn currently_playing(&self) -> Result<Option<CurrentlyPlaying>> {
        self.get_optional("me/player/currently-playing").await
    }

    async fn current_user(&self) -> Result<User> {
        self.get("me", &[]).await
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        let devices: Devices = self.get("me/player/devices", &[]).await?;
        Ok(devices.devices)
    }

    async fn start_playback(&self, request: &PlaybackRequest, device: Option<&str>) -> Result<()> {
        let url = self.url("me/player/play", &Self::device_query(device))?;
        let body = serde_json::to_string(request)?;
        self.send(Expect::Nothing, || {
            self.http_client.put_json(url.clone(), body.clone())
        })
        .await
        .map(|_| ())
    }

    async fn pause_playback(&self, device: Option<&str>) -> Result<()> {
        self.player_command(
            reqwest::Method::PUT,
            "me/player/pause",
            &Self::device_query(device),
        )
        .await
    }

    async fn next_track(&self, device: Option<&str>) -> Result<()> {
        self.player_command(
            reqwest::Method::POST,
            "me/player/next",
            &Self::device_query(device),
        )
        .await
    }

    async fn previous_track(&self, device: Option<&str>) -> Result<()> {
        self.player_command(
            reqwest::Method::POST,
            "me/player/previous",
            &Self::device_query(device),
        )
        .await
    }

    async fn seek(&self, position: Duration, device: Option<&str>) -> Result<()> {
        let position = position.as_millis().to_string();
        let mut query = vec![("position_ms", position.as_str())];
        query.extend(Self::device_query(device));
        self.player_command(reqwest::Method::PUT, "me/player/seek", &query)
            .await
    }

    async fn set_shuffle(&self, state: bool, device: Option<&str>) -> Result<()> {
        let mut query = vec![("state", if state { "true" } else { "false" })];
        query.extend(Self::device_query(device));
        self.player_command(reqwest::Method::PUT, "me/player/shuffle", &query)
            .await
    }

    async fn set_repeat(&self, state: RepeatState, device: Option<&str>) -> Result<()> {
        let mut query = vec![("state", state.as_str())];
        query.extend(Self::device_query(device));
        self.player_command(reqwest::Method::PUT, "me/player/repeat", &query)
            .await
    }

    async fn queue(&self) -> Result<Queue> {
        self.get("me/player/queue", &[]).await
    }

    async fn search(&self, query: &str, types: &[SearchType]) -> Result<SearchResults> {
        let types = types
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.get(
            "search",
            &[("q", query), ("type", types.as_str()), ("market", self.market.as_str())],
        )
        .await
    }

    async fn saved_tracks(&self, offset: u32, limit: u32) -> Result<Page<SavedTrack>> {
        let offset = offset.to_string();
        let limit = limit.to_string();
        self.get("me/tracks", &[("offset", offset.as_str()), ("limit", limit.as_str())])
            .await
    }

    async fn user_playlists(&self) -> Result<Page<Playlist>> {
        let limit = Self::PAGE_LIMIT.to_string();
        self.get("me/playlists", &[("limit", limit.as_str())]).await
    }

    async fn playlist(&self, id: &str) -> Result<Playlist> {
        self.get(
            &format!("playlists/{id}"),
            &[("fields", "id,name,uri,images,owner(display_name),tracks(total)")],
        )
        .await
    }

    async fn playlist_tracks(
        &self,
        id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<PlaylistItem>> {
        let offset = offset.to_string();
        let limit = limit.to_string();
        self.get(
            &format!("playlists/{id}/tracks"),
            &[
                ("offset", offset.as_str()),
                ("limit", limit.as_str()),
                ("market", self.market.as_str()),
            ],
        )
        .await
    }

    async fn album(&self, id: &str) -> Result<Album> {
        self.get(&format!("albums/{id}"), &[("market", self.market.as_str())])
            .await
    }

    async fn album_tracks(&self, id: &str) -> Result<Page<Track>> {
        let limit = Self::PAGE_LIMIT.to_string();
        self.get(
            &format!("albums/{id}/tracks"),
            &[("limit", limit.as_str()), ("market", self.market.as_str())],
        )
        .await
    }

    async fn artist(&self, id: &str) -> Result<Artist> {
        self.get(&format!("artists/{id}"), &[]).await
    }

    async fn artist_top_tracks(&self, id: &str) -> Result<Vec<Track>> {
        let top: TopTracks = self
            .get(
                &format!("artists/{id}/top-tracks"),
                &[("market", self.market.as_str())],
            )
            .await?;
        Ok(top.tracks)
    }

    async fn artist_albums(&self, id: &str) -> Result<Page<Album>> {
        let limit = Self::PAGE_LIMIT.to_string();
        self.get(
            &format!("artists/{id}/albums"),
            &[("include_groups", "album,single"), ("limit", limit.as_str())],
        )
        .await
    }
}
