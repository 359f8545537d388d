//! Spotify Web API response and request bodies.
//!
//! Only the fields the bridge renders or acts on are modeled; everything
//! else in the JSON is ignored. List items that fail to decode (Spotify
//! returns `null` entries in some playlist listings, and podcast episodes in
//! queues lack track fields) are skipped instead of failing the whole page.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull, VecSkipError};

use crate::error::Error;

/// A cover or avatar image. Spotify lists the largest first.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Image {
    pub url: String,
}

/// Links to the Spotify web player.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Followers {
    #[serde(default)]
    pub total: u64,
}

/// Only the `total` of a nested track listing.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Total {
    #[serde(default)]
    pub total: u32,
}

/// One page of a paginated listing.
#[serde_as]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    #[serde(default)]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u32,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SimplifiedArtist {
    pub name: String,
    #[serde(default)]
    pub uri: String,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub followers: Followers,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

/// An album, either simplified (inside a track or a listing) or full (with
/// its first page of tracks).
#[serde_as]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Album {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub tracks: Option<Page<Track>>,
}

/// A track. Tracks listed inside an album carry no `album` of their own.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Track {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    #[serde(default)]
    pub album: Option<Album>,
    #[serde(default = "Track::first_disc")]
    pub disc_number: u32,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl Track {
    fn first_disc() -> u32 {
        1
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Owner {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Playlist {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub tracks: Total,
}

/// An entry of a playlist. Local files and removed tracks have no `track`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<Track>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SavedTrack {
    pub track: Track,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub uri: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Device {
    /// Restricted devices have no id and cannot be controlled.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Devices {
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// The album, playlist or artist that frames playback.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Context {
    pub uri: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

/// Repeat mode of the player.
///
/// The bridge cycles through the modes in the order `off`, `track`,
/// `context`.
#[derive(Copy, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RepeatState {
    #[default]
    Off,
    Track,
    Context,
}

impl RepeatState {
    /// The mode that follows `self` in the `off → track → context` cycle.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::Track,
            Self::Track => Self::Context,
            Self::Context => Self::Off,
        }
    }

    /// Wire value for the Spotify Web API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Track => "track",
            Self::Context => "context",
        }
    }
}

/// Capitalized, as the client displays it.
impl fmt::Display for RepeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "Off"),
            Self::Track => write!(f, "Track"),
            Self::Context => write!(f, "Context"),
        }
    }
}

/// Full state of the user's player, as returned by `GET /me/player`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Playback {
    #[serde(default)]
    pub device: Option<Device>,
    /// Missing while smart shuffle is on, which counts as shuffling.
    #[serde(default = "Playback::smart_shuffle")]
    pub shuffle_state: bool,
    #[serde(default)]
    pub repeat_state: RepeatState,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub context: Option<Context>,
    #[serde(default)]
    pub item: Option<Track>,
}

impl Playback {
    fn smart_shuffle() -> bool {
        true
    }
}

/// The object currently playing, as returned by
/// `GET /me/player/currently-playing`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub context: Option<Context>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub item: Option<Track>,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Queue {
    #[serde(default)]
    pub currently_playing: Option<Track>,
    #[serde_as(as = "DefaultOnNull<VecSkipError<_>>")]
    #[serde(default)]
    pub queue: Vec<Track>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct SearchResults {
    #[serde(default)]
    pub tracks: Option<Page<Track>>,
    #[serde(default)]
    pub albums: Option<Page<Album>>,
    #[serde(default)]
    pub artists: Option<Page<Artist>>,
    #[serde(default)]
    pub playlists: Option<Page<Playlist>>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub(crate) struct TopTracks {
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Kinds of items that can be searched for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SearchType {
    Track,
    Album,
    Artist,
    Playlist,
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Track => write!(f, "track"),
            Self::Album => write!(f, "album"),
            Self::Artist => write!(f, "artist"),
            Self::Playlist => write!(f, "playlist"),
        }
    }
}

impl FromStr for SearchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "artist" => Ok(Self::Artist),
            "playlist" => Ok(Self::Playlist),
            other => Err(Error::invalid_argument(format!(
                "unknown search type \"{other}\""
            ))),
        }
    }
}

/// Where to start playing inside a context.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Offset {
    pub uri: String,
}

/// Body of `PUT /me/player/play`.
///
/// An empty request resumes whatever was playing.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct PlaybackRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<Offset>,
}

impl PlaybackRequest {
    /// Resumes playback where it was paused.
    #[must_use]
    pub fn resume() -> Self {
        Self::default()
    }

    /// Plays a single track.
    #[must_use]
    pub fn track(uri: &str) -> Self {
        Self {
            uris: Some(vec![uri.to_owned()]),
            ..Self::default()
        }
    }

    /// Plays an album, playlist or artist from the start, or from `offset`
    /// when given.
    #[must_use]
    pub fn context(context_uri: &str, offset: Option<&str>) -> Self {
        Self {
            context_uri: Some(context_uri.to_owned()),
            offset: offset.map(|uri| Offset {
                uri: uri.to_owned(),
            }),
            ..Self::default()
        }
    }
}

/// Extracts the base62 id from a Spotify uri or open.spotify.com link.
///
/// Accepts `spotify:album:<id>`, `spotify:user:<user>:playlist:<id>` and
/// `https://open.spotify.com/album/<id>?si=...`. A bare id is returned
/// unchanged.
pub fn id_from_uri(uri: &str) -> crate::error::Result<String> {
    let uri = uri.trim();

    let id = if uri.starts_with("http://") || uri.starts_with("https://") {
        let url = url::Url::parse(uri)?;
        url.path_segments()
            .and_then(|segments| segments.filter(|segment| !segment.is_empty()).last())
            .map(ToOwned::to_owned)
    } else {
        uri.rsplit(':').next().map(ToOwned::to_owned)
    };

    match id {
        Some(id) if !id.is_empty() && id.chars().all(|chr| chr.is_ascii_alphanumeric()) => Ok(id),
        _ => Err(Error::invalid_argument(format!(
            "\"{uri}\" is not a spotify uri"
        ))),
    }
}
