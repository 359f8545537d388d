//! In-memory [`Api`] that records calls, for engine tests.

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;

use super::{
    Album, Api, Artist, CurrentlyPlaying, Device, Page, Playback, PlaybackRequest, Playlist,
    PlaylistItem, Queue, RepeatState, SavedTrack, SearchResults, SearchType, Track, User,
};
use crate::error::{Error, Result};

/// A call that changed or queried the player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Devices,
    Playback,
    StartPlayback(PlaybackRequest, Option<String>),
    Pause(Option<String>),
    Next(Option<String>),
    Previous(Option<String>),
    Seek(Duration, Option<String>),
    Shuffle(bool, Option<String>),
    Repeat(RepeatState, Option<String>),
    Search(String, Vec<SearchType>),
    SavedTracks(u32, u32),
    PlaylistTracks(String, u32, u32),
}

#[derive(Default)]
pub(crate) struct State {
    pub playback: Option<Playback>,
    pub fail_playback: bool,
    pub currently_playing: Option<CurrentlyPlaying>,
    pub devices: Vec<Device>,
    pub queue: Queue,
    pub user: Option<User>,
    pub search: SearchResults,
    pub saved_tracks: Page<SavedTrack>,
    pub playlists: Page<Playlist>,
    pub playlist: Option<Playlist>,
    pub playlist_items: Page<PlaylistItem>,
    pub album: Option<Album>,
    pub album_tracks: Page<Track>,
    pub artist: Option<Artist>,
    pub top_tracks: Vec<Track>,
    pub artist_albums: Page<Album>,

    /// Player actions targeting these devices fail.
    pub failing_devices: Vec<String>,
    /// Every player action fails.
    pub fail_actions: bool,

    pub calls: Vec<Call>,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    pub state: Mutex<State>,
}

impl FakeApi {
    pub fn new(state: State) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    fn action(&self, call: Call, device: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        let failing = device.is_some_and(|id| state.failing_devices.iter().any(|dev| dev == id));
        if state.fail_actions || failing {
            Err(Error::not_found("Player command failed: No active device found"))
        } else {
            Ok(())
        }
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn missing(what: &str) -> Error {
    Error::not_found(format!("{what} not found"))
}

#[async_trait]
impl Api for FakeApi {
    async fn current_playback(&self) -> Result<Option<Playback>> {
        self.record(Call::Playback);
        let state = self.state.lock().unwrap();
        if state.fail_playback {
            return Err(Error::unavailable("service unavailable"));
        }
        Ok(state.playback.clone())
    }

    async fn currently_playing(&self) -> Result<Option<CurrentlyPlaying>> {
        Ok(self.state.lock().unwrap().currently_playing.clone())
    }

    async fn current_user(&self) -> Result<User> {
        self.state
            .lock()
            .unwrap()
            .user
            .clone()
            .ok_or_else(|| missing("user"))
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        self.record(Call::Devices);
        Ok(self.state.lock().unwrap().devices.clone())
    }

    async fn start_playback(&self, request: &PlaybackRequest, device: Option<&str>) -> Result<()> {
        self.action(
            Call::StartPlayback(request.clone(), device.map(ToOwned::to_owned)),
            device,
        )
    }

    async fn pause_playback(&self, device: Option<&str>) -> Result<()> {
        self.action(Call::Pause(device.map(ToOwned::to_owned)), device)
    }

    async fn next_track(&self, device: Option<&str>) -> Result<()> {
        self.action(Call::Next(device.map(ToOwned::to_owned)), device)
    }

    async fn previous_track(&self, device: Option<&str>) -> Result<()> {
        self.action(Call::Previous(device.map(ToOwned::to_owned)), device)
    }

    async fn seek(&self, position: Duration, device: Option<&str>) -> Result<()> {
        self.action(Call::Seek(position, device.map(ToOwned::to_owned)), device)
    }

    async fn set_shuffle(&self, state: bool, device: Option<&str>) -> Result<()> {
        self.action(Call::Shuffle(state, device.map(ToOwned::to_owned)), device)
    }

    async fn set_repeat(&self, state: RepeatState, device: Option<&str>) -> Result<()> {
        self.action(Call::Repeat(state, device.map(ToOwned::to_owned)), device)
    }

    async fn queue(&self) -> Result<Queue> {
        Ok(self.state.lock().unwrap().queue.clone())
    }

    async fn search(&self, query: &str, types: &[SearchType]) -> Result<SearchResults> {
        self.record(Call::Search(query.to_owned(), types.to_vec()));
        Ok(self.state.lock().unwrap().search.clone())
    }

    async fn saved_tracks(&self, offset: u32, limit: u32) -> Result<Page<SavedTrack>> {
        self.record(Call::SavedTracks(offset, limit));
        Ok(self.state.lock().unwrap().saved_tracks.clone())
    }

    async fn user_playlists(&self) -> Result<Page<Playlist>> {
        Ok(self.state.lock().unwrap().playlists.clone())
    }

    async fn playlist(&self, _id: &str) -> Result<Playlist> {
        self.state
            .lock()
            .unwrap()
            .playlist
            .clone()
            .ok_or_else(|| missing("playlist"))
    }

    async fn playlist_tracks(
        &self,
        id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Page<PlaylistItem>> {
        self.record(Call::PlaylistTracks(id.to_owned(), offset, limit));
        Ok(self.state.lock().unwrap().playlist_items.clone())
    }

    async fn album(&self, _id: &str) -> Result<Album> {
        self.state
            .lock()
            .unwrap()
            .album
            .clone()
            .ok_or_else(|| missing("album"))
    }

    async fn album_tracks(&self, _id: &str) -> Result<Page<Track>> {
        Ok(self.state.lock().unwrap().album_tracks.clone())
    }

    async fn artist(&self, _id: &str) -> Result<Artist> {
        self.state
            .lock()
            .unwrap()
            .artist
            .clone()
            .ok_or_else(|| missing("artist"))
    }

    async fn artist_top_tracks(&self, _id: &str) -> Result<Vec<Track>> {
        Ok(self.state.lock().unwrap().top_tracks.clone())
    }

    async fn artist_albums(&self, _id: &str) -> Result<Page<Album>> {
        Ok(self.state.lock().unwrap().artist_albums.clone())
    }
}

/// Test fixtures.
pub(crate) mod fixtures {
    use super::super::model::{ExternalUrls, Followers, Image, Owner, SimplifiedArtist, Total};
    use super::*;

    pub fn device(id: &str, name: &str) -> Device {
        Device {
            id: Some(id.to_owned()),
            name: name.to_owned(),
            is_active: false,
            kind: "Computer".to_owned(),
        }
    }

    pub fn album(name: &str, uri: &str) -> Album {
        Album {
            id: uri.rsplit(':').next().unwrap_or_default().to_owned(),
            name: name.to_owned(),
            uri: uri.to_owned(),
            artists: vec![SimplifiedArtist {
                name: "Daft Punk".to_owned(),
                uri: "spotify:artist:4tZwfgrHOc3mvqYlEYSvVi".to_owned(),
            }],
            images: vec![Image {
                url: format!("https://i.scdn.co/image/{name}"),
            }],
            total_tracks: 0,
            tracks: None,
        }
    }

    pub fn track(name: &str, uri: &str) -> Track {
        Track {
            id: uri.rsplit(':').next().map(ToOwned::to_owned),
            name: name.to_owned(),
            uri: uri.to_owned(),
            artists: vec![
                SimplifiedArtist {
                    name: "Daft Punk".to_owned(),
                    uri: "spotify:artist:4tZwfgrHOc3mvqYlEYSvVi".to_owned(),
                },
                SimplifiedArtist {
                    name: "Pharrell Williams".to_owned(),
                    uri: "spotify:artist:2RdwBSPQiwcmiDo9kixcl8".to_owned(),
                },
            ],
            album: Some(album("Random Access Memories", "spotify:album:4m2880jivSbbyEGAKfITCa")),
            disc_number: 1,
            duration_ms: 369_000,
            external_urls: ExternalUrls {
                spotify: Some(format!(
                    "https://open.spotify.com/track/{}",
                    uri.rsplit(':').next().unwrap_or_default()
                )),
            },
        }
    }

    pub fn on_disc(mut track: Track, disc: u32) -> Track {
        track.album = None;
        track.disc_number = disc;
        track
    }

    pub fn playlist(name: &str, uri: &str, total: u32) -> Playlist {
        Playlist {
            id: uri.rsplit(':').next().unwrap_or_default().to_owned(),
            name: name.to_owned(),
            uri: uri.to_owned(),
            images: Vec::new(),
            owner: Owner {
                display_name: Some("Spotify".to_owned()),
            },
            tracks: Total { total },
        }
    }

    pub fn artist(name: &str, uri: &str, followers: u64) -> Artist {
        Artist {
            id: uri.rsplit(':').next().unwrap_or_default().to_owned(),
            name: name.to_owned(),
            uri: uri.to_owned(),
            images: vec![Image {
                url: "https://i.scdn.co/image/artist".to_owned(),
            }],
            followers: Followers { total: followers },
            external_urls: ExternalUrls {
                spotify: Some(format!(
                    "https://open.spotify.com/artist/{}",
                    uri.rsplit(':').next().unwrap_or_default()
                )),
            },
        }
    }

    pub fn playback(is_playing: bool, progress_ms: u64) -> Playback {
        Playback {
            device: None,
            shuffle_state: false,
            repeat_state: RepeatState::Off,
            is_playing,
            progress_ms: Some(progress_ms),
            context: None,
            item: Some(track("Get Lucky", "spotify:track:69kOkLUCkxIZYexIgSG8rq")),
        }
    }

    pub fn page<T>(items: Vec<T>) -> Page<T> {
        let total = u32::try_from(items.len()).unwrap();
        Page { items, total }
    }
}
