//! The Spotify Web API, as far as the bridge uses it.
//!
//! [`Api`] is the seam between the protocol engine and the music service:
//! the engine only ever talks to this trait, [`Client`] implements it over
//! HTTPS, and tests substitute an in-memory fake.
//!
//! Every method that acts on the player takes an optional device id. When
//! `None`, Spotify targets the currently active device and fails with
//! `404 NO_ACTIVE_DEVICE` if there is none.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub mod client;
pub mod model;
pub mod token;

pub use client::Client;
pub use model::{
    Album, Artist, CurrentlyPlaying, Device, Page, Playback, PlaybackRequest, Playlist,
    PlaylistItem, Queue, RepeatState, SavedTrack, SearchResults, SearchType, Track, User,
};

/// Capabilities of the music service consumed by the protocol engine.
#[async_trait]
pub trait Api: Send + Sync {
    /// Full player state; `None` when no playback session exists.
    async fn current_playback(&self) -> Result<Option<Playback>>;

    /// The item currently playing and its context; `None` when idle.
    async fn currently_playing(&self) -> Result<Option<CurrentlyPlaying>>;

    async fn current_user(&self) -> Result<User>;

    async fn devices(&self) -> Result<Vec<Device>>;

    /// Starts or resumes playback. See [`PlaybackRequest`].
    async fn start_playback(&self, request: &PlaybackRequest, device: Option<&str>) -> Result<()>;

    async fn pause_playback(&self, device: Option<&str>) -> Result<()>;

    async fn next_track(&self, device: Option<&str>) -> Result<()>;

    async fn previous_track(&self, device: Option<&str>) -> Result<()>;

    async fn seek(&self, position: Duration, device: Option<&str>) -> Result<()>;

    async fn set_shuffle(&self, state: bool, device: Option<&str>) -> Result<()>;

    async fn set_repeat(&self, state: RepeatState, device: Option<&str>) -> Result<()>;

    async fn queue(&self) -> Result<Queue>;

    async fn search(&self, query: &str, types: &[SearchType]) -> Result<SearchResults>;

    /// The user's Liked Songs.
    async fn saved_tracks(&self, offset: u32, limit: u32) -> Result<Page<SavedTrack>>;

    async fn user_playlists(&self) -> Result<Page<Playlist>>;

    async fn playlist(&self, id: &str) -> Result<Playlist>;

    async fn playlist_tracks(&self, id: &str, offset: u32, limit: u32)
        -> Result<Page<PlaylistItem>>;

    async fn album(&self, id: &str) -> Result<Album>;

    async fn album_tracks(&self, id: &str) -> Result<Page<Track>>;

    async fn artist(&self, id: &str) -> Result<Artist>;

    async fn artist_top_tracks(&self, id: &str) -> Result<Vec<Track>>;

    async fn artist_albums(&self, id: &str) -> Result<Page<Album>>;
}

#[cfg(test)]
pub(crate) mod fake;
