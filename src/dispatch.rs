//! Command handling.
//!
//! The [`Dispatcher`] turns one inbound frame into exactly one outbound
//! frame. It holds the session lock for the whole command, so commands run
//! one after another even when several connections are open.
//!
//! Commands fall in five groups:
//!
//! * info queries: `current_info`, `current_song`/`current_track`,
//!   `current_states`
//! * track transport: `next`, `previous`, `play`
//! * playback toggles: `pause`/`resume`, `shuffle`, `repeat`
//! * list queries: `list_playlists`, `search`, `list_queue`
//! * detail display: `display_album`, `display_playlist`, `display_artist`
//!
//! List and detail commands record what the client is looking at in the
//! [`DisplayContext`] before fetching anything; `play` reads it to know what
//! its argument refers to.

use std::{sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    device,
    error::Error,
    guard,
    protocol::{
        format::{self, PlaylistHeader},
        Command,
    },
    session::{DisplayContext, Session, SharedSession},
    spotify::{model::id_from_uri, Api, Playback, PlaybackRequest, RepeatState, SearchType},
};

/// Why a command could not be answered with its regular frame. The display
/// form is the message of the `[ERROR]` frame.
#[derive(Debug, Error)]
pub enum Failure {
    #[error("No current song active")]
    NoActiveTrack,

    #[error("No playback active")]
    NoPlayback,

    #[error("No queue found")]
    NoQueue,

    #[error("No tracks found")]
    NoTracks,

    /// A player action or the lookup it depends on failed.
    #[error("{0}")]
    Action(&'static str),

    #[error("Invalid {what}: {reason}")]
    MalformedArgument { what: &'static str, reason: String },

    #[error("Unknown command")]
    UnknownCommand,

    #[error("{0}")]
    Api(#[from] Error),
}

impl Failure {
    fn malformed(what: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedArgument {
            what,
            reason: reason.into(),
        }
    }
}

/// Shuffle, repeat and playing flags as shown by the client.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct States {
    shuffle: bool,
    repeat: RepeatState,
    playing: bool,
}

impl From<&Playback> for States {
    fn from(playback: &Playback) -> Self {
        Self {
            shuffle: playback.shuffle_state,
            repeat: playback.repeat_state,
            playing: playback.is_playing,
        }
    }
}

impl States {
    fn frame(self) -> String {
        format::states(self.shuffle, self.repeat, self.playing)
    }
}

pub struct Dispatcher {
    api: Arc<dyn Api>,
    session: SharedSession,
}

impl Dispatcher {
    /// Tracks of a playlist shown per page.
    pub const PAGE_SIZE: u32 = 20;

    /// Below this position, `previous` goes to the previous track instead of
    /// restarting the current one.
    const RESTART_THRESHOLD: Duration = Duration::from_millis(4000);

    #[must_use]
    pub fn new(api: Arc<dyn Api>, session: SharedSession) -> Self {
        Self { api, session }
    }

    #[must_use]
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// The frame sent unsolicited when a client connects: the playback
    /// states, after trying to resolve a device.
    pub async fn greeting(&self) -> String {
        let mut session = self.session.lock().await;
        if let Err(e) = device::resolve(&*self.api, &mut session).await {
            warn!("no playback device yet: {e}");
        }

        self.current_states()
            .await
            .unwrap_or_else(format::error)
    }

    /// Handles one inbound frame and returns the response frame.
    pub async fn dispatch(&self, frame: &str) -> String {
        let command = Command::parse(frame);
        let mut session = self.session.lock().await;

        match self.handle(&mut session, &command).await {
            Ok(response) => response,
            Err(e) => {
                log!(session.log_level(), "{command} failed: {e:?}");
                format::error(e)
            }
        }
    }

    async fn handle(&self, session: &mut Session, command: &Command) -> Result<String, Failure> {
        match command {
            Command::CurrentInfo => self.current_info().await,
            Command::CurrentSong => self.current_song().await,
            Command::CurrentStates => self.current_states().await,

            Command::Next => self.next(session).await,
            Command::Previous => self.previous(session).await,
            Command::Play(argument) => self.play(session, argument.as_deref()).await,

            Command::Pause | Command::Resume => self.toggle_playback(session).await,
            Command::Shuffle => self.shuffle(session).await,
            Command::Repeat => self.repeat(session).await,

            Command::ListPlaylists => self.list_playlists(session).await,
            Command::Search(argument) => self.search(session, argument.as_deref()).await,
            Command::ListQueue => self.list_queue(session).await,

            Command::DisplayAlbum(argument) => {
                self.display_album(session, argument.as_deref()).await
            }
            Command::DisplayPlaylist(argument) => {
                self.display_playlist(session, argument.as_deref()).await
            }
            Command::DisplayArtist(argument) => {
                self.display_artist(session, argument.as_deref()).await
            }

            Command::Unknown(_) => Err(Failure::UnknownCommand),
        }
    }

    async fn current_track_row(&self) -> Result<String, Failure> {
        let track = match self.api.currently_playing().await {
            Ok(playing) => playing.and_then(|playing| playing.item),
            Err(e) => {
                debug!("error getting currently playing track: {e}");
                None
            }
        };

        track
            .map(|track| format::current(&track))
            .ok_or(Failure::NoActiveTrack)
    }

    async fn current_song(&self) -> Result<String, Failure> {
        self.current_track_row().await
    }

    async fn current_info(&self) -> Result<String, Failure> {
        let current = self.current_track_row().await?;
        let states = self
            .current_states()
            .await
            .unwrap_or_else(format::error);
        Ok(format!("{current}\n{states}"))
    }

    async fn current_states(&self) -> Result<String, Failure> {
        match self.api.current_playback().await {
            Ok(Some(playback)) => Ok(States::from(&playback).frame()),
            Ok(None) => Err(Failure::NoPlayback),
            Err(e) => {
                debug!("error getting playback: {e}");
                Err(Failure::Action("Error getting playback states"))
            }
        }
    }

    /// States after a toggle: from the playback read before the action, or
    /// read again when there was none. When that read fails too, the action
    /// went out anyway, so the reply is built from default states.
    async fn states_after(
        &self,
        snapshot: Option<Playback>,
        change: impl FnOnce(&mut States),
    ) -> String {
        let mut states = match snapshot {
            Some(playback) => States::from(&playback),
            None => match self.api.current_playback().await {
                Ok(Some(playback)) => States::from(&playback),
                Ok(None) => States::default(),
                Err(e) => {
                    debug!("error getting playback after toggle: {e}");
                    States::default()
                }
            },
        };

        change(&mut states);
        states.frame()
    }

    async fn next(&self, session: &mut Session) -> Result<String, Failure> {
        let api = &*self.api;
        guard::run(api, session, |device| async move {
            api.next_track(Some(&device)).await
        })
        .await
        .map_err(|_| Failure::Action("Error going to next song"))?;

        Ok("[NEXT SONG]".to_owned())
    }

    async fn previous(&self, session: &mut Session) -> Result<String, Failure> {
        const FAILED: &str = "Error going to previous song";

        let playback = match self.api.current_playback().await {
            Ok(Some(playback)) => playback,
            Ok(None) => return Err(Failure::Action(FAILED)),
            Err(e) => {
                debug!("error getting playback progress: {e}");
                return Err(Failure::Action(FAILED));
            }
        };

        let progress = Duration::from_millis(playback.progress_ms.unwrap_or_default());
        let api = &*self.api;
        let result = if progress > Self::RESTART_THRESHOLD {
            trace!("restarting track at {}ms", progress.as_millis());
            guard::run(api, session, |device| async move {
                api.seek(Duration::ZERO, Some(&device)).await
            })
            .await
        } else {
            guard::run(api, session, |device| async move {
                api.previous_track(Some(&device)).await
            })
            .await
        };
        result.map_err(|_| Failure::Action(FAILED))?;

        Ok("[PREVIOUS SONG]".to_owned())
    }

    /// Builds the playback request for a `play` argument, given what the
    /// client is looking at. Returns the request and the uri reported back.
    async fn play_request(
        &self,
        context: DisplayContext,
        argument: &str,
    ) -> Result<(PlaybackRequest, String), Failure> {
        match context {
            DisplayContext::Search => match argument.split_once(' ') {
                Some(("track", uri)) if !uri.trim().is_empty() => {
                    let uri = uri.trim();
                    Ok((PlaybackRequest::track(uri), uri.to_owned()))
                }
                _ => Err(Failure::malformed(
                    "play",
                    format!("\"{argument}\" is not a track"),
                )),
            },

            DisplayContext::Queue => {
                let context = self
                    .api
                    .currently_playing()
                    .await?
                    .and_then(|playing| playing.context)
                    .ok_or(Failure::NoActiveTrack)?;
                Ok((
                    PlaybackRequest::context(&context.uri, Some(argument)),
                    argument.to_owned(),
                ))
            }

            DisplayContext::Playlist | DisplayContext::Album => {
                let mut tokens = argument.split_whitespace();
                match (tokens.next(), tokens.next(), tokens.next()) {
                    (Some(context), offset, None) => Ok((
                        PlaybackRequest::context(context, offset),
                        context.to_owned(),
                    )),
                    _ => Err(Failure::malformed(
                        "play",
                        format!("\"{argument}\" is not a context"),
                    )),
                }
            }

            DisplayContext::None | DisplayContext::Artist => Err(Failure::malformed(
                "play",
                format!("nothing to play in {context} context"),
            )),
        }
    }

    async fn play(&self, session: &mut Session, argument: Option<&str>) -> Result<String, Failure> {
        const FAILED: &str = "Error playing song";

        let argument = argument
            .map(str::trim)
            .filter(|argument| !argument.is_empty());
        let Some(argument) = argument else {
            debug!("play without argument");
            return Err(Failure::Action(FAILED));
        };

        let (request, uri) = self
            .play_request(session.display_context(), argument)
            .await
            .map_err(|e| {
                debug!("cannot play \"{argument}\": {e}");
                Failure::Action(FAILED)
            })?;

        let api = &*self.api;
        let request = &request;
        guard::run(api, session, |device| async move {
            api.start_playback(request, Some(&device)).await
        })
        .await
        .map_err(|_| Failure::Action(FAILED))?;

        Ok(format!("[PLAY]\t{uri}"))
    }

    /// `pause` and `resume` both toggle: a player that is not known to be
    /// playing is resumed.
    async fn toggle_playback(&self, session: &mut Session) -> Result<String, Failure> {
        let playback = match self.api.current_playback().await {
            Ok(playback) => playback,
            Err(e) => {
                warn!("error probing playback, resuming: {e}");
                None
            }
        };
        let playing = playback.as_ref().is_some_and(|playback| playback.is_playing);

        let api = &*self.api;
        if playing {
            guard::run(api, session, |device| async move {
                api.pause_playback(Some(&device)).await
            })
            .await
            .map_err(|_| Failure::Action("Error pausing playback"))?;
        } else {
            let resume = &PlaybackRequest::resume();
            guard::run(api, session, |device| async move {
                api.start_playback(resume, Some(&device)).await
            })
            .await
            .map_err(|_| Failure::Action("Error resuming playback"))?;
        }

        Ok(self
            .states_after(playback, |states| states.playing = !playing)
            .await)
    }

    async fn shuffle(&self, session: &mut Session) -> Result<String, Failure> {
        const FAILED: &str = "Error changing shuffle state";

        let playback = self.probe(FAILED).await?;
        let shuffle = !playback.shuffle_state;

        let api = &*self.api;
        guard::run(api, session, |device| async move {
            api.set_shuffle(shuffle, Some(&device)).await
        })
        .await
        .map_err(|_| Failure::Action(FAILED))?;

        Ok(self
            .states_after(Some(playback), |states| states.shuffle = shuffle)
            .await)
    }

    async fn repeat(&self, session: &mut Session) -> Result<String, Failure> {
        const FAILED: &str = "Error changing repeat state";

        let playback = self.probe(FAILED).await?;
        let repeat = playback.repeat_state.next();

        let api = &*self.api;
        guard::run(api, session, |device| async move {
            api.set_repeat(repeat, Some(&device)).await
        })
        .await
        .map_err(|_| Failure::Action(FAILED))?;

        Ok(self
            .states_after(Some(playback), |states| states.repeat = repeat)
            .await)
    }

    /// Reads the playback that a toggle flips, failing with `failed`.
    async fn probe(&self, failed: &'static str) -> Result<Playback, Failure> {
        match self.api.current_playback().await {
            Ok(Some(playback)) => Ok(playback),
            Ok(None) => Err(Failure::Action(failed)),
            Err(e) => {
                debug!("error getting playback: {e}");
                Err(Failure::Action(failed))
            }
        }
    }

    async fn list_playlists(&self, session: &mut Session) -> Result<String, Failure> {
        session.set_display_context(DisplayContext::Playlist);

        let user = self.api.current_user().await?;
        let liked = self.api.saved_tracks(0, 1).await?;
        let playlists = self.api.user_playlists().await?;

        Ok(format::library(&user.uri, liked.total, &playlists.items))
    }

    async fn search(&self, session: &mut Session, argument: Option<&str>) -> Result<String, Failure> {
        session.set_display_context(DisplayContext::Search);

        let argument = argument.map(str::trim).unwrap_or_default();
        let (types, query) = argument
            .split_once(' ')
            .map(|(types, query)| (types, query.trim()))
            .filter(|(_, query)| !query.is_empty())
            .ok_or_else(|| Failure::malformed("search", "missing query"))?;

        let types = types
            .split(',')
            .filter(|kind| !kind.is_empty())
            .map(str::parse::<SearchType>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Failure::malformed("search", e.error.to_string()))?;
        if types.is_empty() {
            return Err(Failure::malformed("search", "missing type"));
        }

        let results = self.api.search(query, &types).await?;

        let mut response = String::new();
        for kind in &types {
            let block = match kind {
                SearchType::Track => format::tracks(
                    "SEARCH",
                    results.tracks.iter().flat_map(|page| &page.items),
                ),
                SearchType::Album => format::albums(
                    "SEARCH",
                    results.albums.iter().flat_map(|page| &page.items),
                ),
                SearchType::Artist => {
                    format::artists_listing(results.artists.iter().flat_map(|page| &page.items))
                }
                SearchType::Playlist => format::playlists(
                    "SEARCH",
                    results.playlists.iter().flat_map(|page| &page.items),
                ),
            };
            response.push_str(&block);
        }

        Ok(response)
    }

    async fn list_queue(&self, session: &mut Session) -> Result<String, Failure> {
        session.set_display_context(DisplayContext::Queue);

        let queue = self.api.queue().await.map_err(|e| {
            debug!("error getting queue: {e}");
            Failure::NoQueue
        })?;
        if queue.queue.is_empty() {
            return Err(Failure::NoQueue);
        }

        Ok(format::tracks("QUEUE", &queue.queue))
    }

    async fn display_album(
        &self,
        session: &mut Session,
        argument: Option<&str>,
    ) -> Result<String, Failure> {
        session.set_display_context(DisplayContext::Album);

        let id = Self::id_argument("album", argument)?;
        let tracks = self.api.album_tracks(&id).await?;
        if tracks.items.is_empty() {
            return Err(Failure::NoTracks);
        }

        let album = self.api.album(&id).await?;
        Ok(format::album_detail(&album, &tracks.items))
    }

    async fn display_playlist(
        &self,
        session: &mut Session,
        argument: Option<&str>,
    ) -> Result<String, Failure> {
        session.set_display_context(DisplayContext::Playlist);

        let mut tokens = argument.unwrap_or_default().split_whitespace();
        let uri = tokens
            .next()
            .ok_or_else(|| Failure::malformed("playlist", "missing uri"))?;
        let offset = match tokens.next() {
            Some(offset) => offset
                .parse::<u32>()
                .map_err(|e| Failure::malformed("playlist", format!("offset \"{offset}\": {e}")))?,
            None => 0,
        };

        if uri.ends_with(":collection") {
            let page = self.api.saved_tracks(offset, Self::PAGE_SIZE).await?;
            if page.items.is_empty() {
                return Err(Failure::NoTracks);
            }

            let header = PlaylistHeader {
                name: format::LIKED_SONGS,
                owner: " ",
                count: page.total,
                uri,
                icon: format::DEFAULT_ICON,
            };
            return Ok(format::playlist_detail(
                &header,
                page.items.iter().map(|saved| &saved.track),
            ));
        }

        let id = id_from_uri(uri).map_err(|e| Failure::malformed("playlist", e.error.to_string()))?;
        let playlist = self.api.playlist(&id).await?;
        let total = playlist.tracks.total;
        if offset >= total {
            return Err(Failure::NoTracks);
        }

        // Show the most recently added tracks first.
        let start = total.saturating_sub(offset.saturating_add(Self::PAGE_SIZE));
        let limit = (total - offset).min(Self::PAGE_SIZE);
        let page = self.api.playlist_tracks(&id, start, limit).await?;

        let tracks: Vec<_> = page
            .items
            .iter()
            .rev()
            .filter_map(|item| item.track.as_ref())
            .collect();
        if tracks.is_empty() {
            return Err(Failure::NoTracks);
        }

        let header = PlaylistHeader {
            name: &playlist.name,
            owner: playlist.owner.display_name.as_deref().unwrap_or_default(),
            count: total,
            uri: &playlist.uri,
            icon: playlist
                .images
                .first()
                .map_or(format::DEFAULT_ICON, |image| image.url.as_str()),
        };
        Ok(format::playlist_detail(&header, tracks))
    }

    async fn display_artist(
        &self,
        session: &mut Session,
        argument: Option<&str>,
    ) -> Result<String, Failure> {
        session.set_display_context(DisplayContext::Artist);

        let id = Self::id_argument("artist", argument)?;
        let top_tracks = self.api.artist_top_tracks(&id).await?;
        if top_tracks.is_empty() {
            return Err(Failure::NoTracks);
        }

        let artist = self.api.artist(&id).await?;
        let albums = self.api.artist_albums(&id).await?;
        Ok(format::artist_detail(&artist, &top_tracks, &albums.items))
    }

    fn id_argument(what: &'static str, argument: Option<&str>) -> Result<String, Failure> {
        let uri = argument
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| Failure::malformed(what, "missing uri"))?;
        id_from_uri(uri).map_err(|e| Failure::malformed(what, e.error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spotify::{
        fake::{fixtures, Call, FakeApi, State},
        model::{Context, CurrentlyPlaying, PlaylistItem, Queue, SavedTrack, SearchResults, User},
    };

    fn setup(mut state: State) -> (Dispatcher, Arc<FakeApi>) {
        if state.devices.is_empty() {
            state.devices = vec![fixtures::device("dev1", "Desktop")];
        }
        let fake = Arc::new(FakeApi::new(state));
        let api: Arc<dyn Api> = fake.clone();
        let dispatcher = Dispatcher::new(api, Session::default().shared());
        (dispatcher, fake)
    }

    async fn set_context(dispatcher: &Dispatcher, context: DisplayContext) {
        dispatcher
            .session()
            .lock()
            .await
            .set_display_context(context);
    }

    async fn context(dispatcher: &Dispatcher) -> DisplayContext {
        dispatcher.session().lock().await.display_context()
    }

    fn dev1() -> Option<String> {
        Some("dev1".to_owned())
    }

    #[tokio::test]
    async fn unknown_command_changes_nothing() {
        let (dispatcher, api) = setup(State::default());
        set_context(&dispatcher, DisplayContext::Album).await;
        let before = dispatcher.session().lock().await.clone();

        assert_eq!(dispatcher.dispatch("dance").await, "[ERROR] Unknown command");
        assert_eq!(dispatcher.dispatch("").await, "[ERROR] Unknown command");

        assert_eq!(*dispatcher.session().lock().await, before);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn greeting_resolves_device_and_sends_states() {
        let (dispatcher, api) = setup(State {
            playback: Some(fixtures::playback(true, 0)),
            ..State::default()
        });

        assert_eq!(dispatcher.greeting().await, "[INIT]\tFalse\tOff\tTrue");
        assert_eq!(dispatcher.session().lock().await.device_id(), Some("dev1"));
        assert_eq!(api.count(|call| *call == Call::Devices), 1);
    }

    #[tokio::test]
    async fn greeting_without_playback() {
        let (dispatcher, _) = setup(State::default());
        assert_eq!(dispatcher.greeting().await, "[ERROR] No playback active");
    }

    #[tokio::test]
    async fn current_info_joins_track_and_states() {
        let track = fixtures::track("Get Lucky", "spotify:track:69kOkLUCkxIZYexIgSG8rq");
        let (dispatcher, _) = setup(State {
            playback: Some(fixtures::playback(false, 0)),
            currently_playing: Some(CurrentlyPlaying {
                context: None,
                is_playing: false,
                progress_ms: None,
                item: Some(track.clone()),
            }),
            ..State::default()
        });

        let response = dispatcher.dispatch("current_info").await;
        assert_eq!(
            response,
            format!("{}\n[INIT]\tFalse\tOff\tFalse", format::current(&track))
        );
        assert_eq!(
            dispatcher.dispatch("current_track").await,
            format::current(&track)
        );
    }

    #[tokio::test]
    async fn nothing_playing() {
        let (dispatcher, _) = setup(State::default());
        assert_eq!(
            dispatcher.dispatch("current_song").await,
            "[ERROR] No current song active"
        );
        assert_eq!(
            dispatcher.dispatch("current_states").await,
            "[ERROR] No playback active"
        );
    }

    #[tokio::test]
    async fn states_error_when_playback_fails() {
        let (dispatcher, _) = setup(State {
            fail_playback: true,
            ..State::default()
        });
        assert_eq!(
            dispatcher.dispatch("current_states").await,
            "[ERROR] Error getting playback states"
        );
    }

    #[tokio::test]
    async fn next_song() {
        let (dispatcher, api) = setup(State::default());
        assert_eq!(dispatcher.dispatch("next").await, "[NEXT SONG]");
        assert!(api.calls().contains(&Call::Next(dev1())));
    }

    #[tokio::test]
    async fn next_fails_without_device() {
        let (dispatcher, api) = setup(State {
            devices: vec![
                fixtures::device("dev1", "Desktop"),
                fixtures::device("dev2", "Phone"),
            ],
            ..State::default()
        });
        assert_eq!(
            dispatcher.dispatch("next").await,
            "[ERROR] Error going to next song"
        );
        assert_eq!(api.count(|call| matches!(call, Call::Next(_))), 0);
    }

    #[tokio::test]
    async fn previous_restarts_after_four_seconds() {
        let (dispatcher, api) = setup(State {
            playback: Some(fixtures::playback(true, 4001)),
            ..State::default()
        });
        assert_eq!(dispatcher.dispatch("previous").await, "[PREVIOUS SONG]");
        assert!(api.calls().contains(&Call::Seek(Duration::ZERO, dev1())));
        assert_eq!(api.count(|call| matches!(call, Call::Previous(_))), 0);
    }

    #[tokio::test]
    async fn previous_goes_back_at_four_seconds() {
        let (dispatcher, api) = setup(State {
            playback: Some(fixtures::playback(true, 4000)),
            ..State::default()
        });
        assert_eq!(dispatcher.dispatch("previous").await, "[PREVIOUS SONG]");
        assert!(api.calls().contains(&Call::Previous(dev1())));
        assert_eq!(api.count(|call| matches!(call, Call::Seek(..))), 0);
    }

    #[tokio::test]
    async fn previous_fails_without_progress() {
        let (dispatcher, _) = setup(State::default());
        assert_eq!(
            dispatcher.dispatch("previous").await,
            "[ERROR] Error going to previous song"
        );
    }

    #[tokio::test]
    async fn repeat_advances_one_step() {
        for (current, next, shown) in [
            (RepeatState::Off, RepeatState::Track, "Track"),
            (RepeatState::Track, RepeatState::Context, "Context"),
            (RepeatState::Context, RepeatState::Off, "Off"),
        ] {
            let mut playback = fixtures::playback(true, 0);
            playback.repeat_state = current;
            let (dispatcher, api) = setup(State {
                playback: Some(playback),
                ..State::default()
            });

            assert_eq!(
                dispatcher.dispatch("repeat").await,
                format!("[INIT]\tFalse\t{shown}\tTrue")
            );
            assert_eq!(api.count(|call| matches!(call, Call::Repeat(..))), 1);
            assert!(api.calls().contains(&Call::Repeat(next, dev1())));
        }
    }

    #[tokio::test]
    async fn shuffle_flips() {
        let (dispatcher, api) = setup(State {
            playback: Some(fixtures::playback(true, 0)),
            ..State::default()
        });
        assert_eq!(
            dispatcher.dispatch("shuffle").await,
            "[INIT]\tTrue\tOff\tTrue"
        );
        assert!(api.calls().contains(&Call::Shuffle(true, dev1())));
    }

    #[tokio::test]
    async fn shuffle_without_playback() {
        let (dispatcher, _) = setup(State::default());
        assert_eq!(
            dispatcher.dispatch("shuffle").await,
            "[ERROR] Error changing shuffle state"
        );
    }

    #[tokio::test]
    async fn pause_when_playing() {
        let (dispatcher, api) = setup(State {
            playback: Some(fixtures::playback(true, 0)),
            ..State::default()
        });
        assert_eq!(
            dispatcher.dispatch("pause").await,
            "[INIT]\tFalse\tOff\tFalse"
        );
        assert!(api.calls().contains(&Call::Pause(dev1())));
    }

    #[tokio::test]
    async fn resume_toggles_like_pause() {
        let (dispatcher, api) = setup(State {
            playback: Some(fixtures::playback(false, 0)),
            ..State::default()
        });
        assert_eq!(
            dispatcher.dispatch("resume").await,
            "[INIT]\tFalse\tOff\tTrue"
        );
        assert!(api
            .calls()
            .contains(&Call::StartPlayback(PlaybackRequest::resume(), dev1())));
    }

    #[tokio::test]
    async fn pause_with_failed_probe_resumes() {
        let (dispatcher, api) = setup(State {
            fail_playback: true,
            ..State::default()
        });

        assert_eq!(
            dispatcher.dispatch("pause").await,
            "[INIT]\tFalse\tOff\tTrue"
        );

        assert!(api
            .calls()
            .contains(&Call::StartPlayback(PlaybackRequest::resume(), dev1())));
        assert_eq!(api.count(|call| matches!(call, Call::Pause(_))), 0);
    }

    #[tokio::test]
    async fn resume_without_playback_reports_playing() {
        let (dispatcher, api) = setup(State::default());

        assert_eq!(
            dispatcher.dispatch("resume").await,
            "[INIT]\tFalse\tOff\tTrue"
        );
        assert_eq!(
            api.count(|call| matches!(call, Call::StartPlayback(..))),
            1
        );
    }

    #[tokio::test]
    async fn pause_failure() {
        let (dispatcher, _) = setup(State {
            playback: Some(fixtures::playback(true, 0)),
            fail_actions: true,
            ..State::default()
        });
        assert_eq!(
            dispatcher.dispatch("pause").await,
            "[ERROR] Error pausing playback"
        );
    }

    #[tokio::test]
    async fn play_from_queue_uses_current_context() {
        let (dispatcher, api) = setup(State {
            currently_playing: Some(CurrentlyPlaying {
                context: Some(Context {
                    uri: "spotify:playlist:37i9dQZF1DXcBWIGoYBM5M".to_owned(),
                    kind: "playlist".to_owned(),
                }),
                is_playing: true,
                progress_ms: Some(0),
                item: None,
            }),
            ..State::default()
        });
        set_context(&dispatcher, DisplayContext::Queue).await;

        assert_eq!(
            dispatcher.dispatch("play spotify:track:ABC").await,
            "[PLAY]\tspotify:track:ABC"
        );
        assert!(api.calls().contains(&Call::StartPlayback(
            PlaybackRequest::context(
                "spotify:playlist:37i9dQZF1DXcBWIGoYBM5M",
                Some("spotify:track:ABC")
            ),
            dev1()
        )));
    }

    #[tokio::test]
    async fn play_from_search_plays_tracks_only() {
        let (dispatcher, api) = setup(State::default());
        set_context(&dispatcher, DisplayContext::Search).await;

        assert_eq!(
            dispatcher.dispatch("play track spotify:track:XYZ").await,
            "[PLAY]\tspotify:track:XYZ"
        );
        assert!(api.calls().contains(&Call::StartPlayback(
            PlaybackRequest::track("spotify:track:XYZ"),
            dev1()
        )));

        assert_eq!(
            dispatcher.dispatch("play album spotify:album:XYZ").await,
            "[ERROR] Error playing song"
        );
        assert_eq!(
            api.count(|call| matches!(call, Call::StartPlayback(..))),
            1
        );
    }

    #[tokio::test]
    async fn play_context_with_and_without_offset() {
        let (dispatcher, api) = setup(State::default());
        set_context(&dispatcher, DisplayContext::Album).await;

        assert_eq!(
            dispatcher.dispatch("play spotify:album:1").await,
            "[PLAY]\tspotify:album:1"
        );
        set_context(&dispatcher, DisplayContext::Playlist).await;
        assert_eq!(
            dispatcher
                .dispatch("play spotify:playlist:2 spotify:track:3")
                .await,
            "[PLAY]\tspotify:playlist:2"
        );

        let calls = api.calls();
        assert!(calls.contains(&Call::StartPlayback(
            PlaybackRequest::context("spotify:album:1", None),
            dev1()
        )));
        assert!(calls.contains(&Call::StartPlayback(
            PlaybackRequest::context("spotify:playlist:2", Some("spotify:track:3")),
            dev1()
        )));
    }

    #[tokio::test]
    async fn play_needs_a_context_and_argument() {
        let (dispatcher, api) = setup(State::default());

        assert_eq!(
            dispatcher.dispatch("play spotify:track:1").await,
            "[ERROR] Error playing song"
        );
        set_context(&dispatcher, DisplayContext::Artist).await;
        assert_eq!(
            dispatcher.dispatch("play spotify:track:1").await,
            "[ERROR] Error playing song"
        );
        set_context(&dispatcher, DisplayContext::Album).await;
        assert_eq!(dispatcher.dispatch("play").await, "[ERROR] Error playing song");
        assert_eq!(
            dispatcher.dispatch("play a b c").await,
            "[ERROR] Error playing song"
        );

        assert_eq!(
            api.count(|call| matches!(call, Call::StartPlayback(..))),
            0
        );
    }

    #[tokio::test]
    async fn empty_queue_keeps_queue_context() {
        let (dispatcher, _) = setup(State::default());

        assert_eq!(
            dispatcher.dispatch("list_queue").await,
            "[ERROR] No queue found"
        );
        assert_eq!(context(&dispatcher).await, DisplayContext::Queue);
    }

    #[tokio::test]
    async fn queue_rows() {
        let track = fixtures::track("Instant Crush", "spotify:track:2cGxRwrMyEAp8dEbuZaVv6");
        let (dispatcher, _) = setup(State {
            queue: Queue {
                currently_playing: None,
                queue: vec![track.clone()],
            },
            ..State::default()
        });

        assert_eq!(
            dispatcher.dispatch("list_queue").await,
            format::tracks("QUEUE", [&track])
        );
    }

    #[tokio::test]
    async fn playlists_start_with_liked_songs() {
        let (dispatcher, _) = setup(State {
            user: Some(User {
                id: "alice".to_owned(),
                uri: "spotify:user:alice".to_owned(),
                display_name: None,
            }),
            saved_tracks: crate::spotify::Page {
                items: Vec::new(),
                total: 321,
            },
            playlists: fixtures::page(vec![fixtures::playlist("Mix", "spotify:playlist:9", 7)]),
            ..State::default()
        });

        let response = dispatcher.dispatch("list_playlists").await;
        assert!(response.starts_with(
            "[PLAYLISTS]\tLiked Songs\t321 Songs\tspotify:user:alice:collection\t"
        ));
        assert!(response.contains("\tMix\t7 Songs\tspotify:playlist:9\t"));
        assert_eq!(context(&dispatcher).await, DisplayContext::Playlist);
    }

    #[tokio::test]
    async fn search_blocks_follow_requested_order() {
        let (dispatcher, api) = setup(State {
            search: SearchResults {
                tracks: Some(fixtures::page(vec![fixtures::track(
                    "One More Time",
                    "spotify:track:0DiWol3AO6WpXZgp0goxAV",
                )])),
                artists: Some(fixtures::page(vec![fixtures::artist(
                    "Daft Punk",
                    "spotify:artist:4tZwfgrHOc3mvqYlEYSvVi",
                    10,
                )])),
                ..SearchResults::default()
            },
            ..State::default()
        });

        let response = dispatcher.dispatch("search artist,track daft punk").await;
        let artist_at = response.find("10 Followers").unwrap();
        let track_at = response.find("One More Time").unwrap();
        assert!(response.starts_with("[SEARCH]\tDaft Punk\t"));
        assert!(artist_at < track_at);

        assert!(api.calls().contains(&Call::Search(
            "daft punk".to_owned(),
            vec![SearchType::Artist, SearchType::Track]
        )));
        assert_eq!(context(&dispatcher).await, DisplayContext::Search);
    }

    #[tokio::test]
    async fn invalid_search() {
        let (dispatcher, api) = setup(State::default());

        assert_eq!(
            dispatcher.dispatch("search track").await,
            "[ERROR] Invalid search: missing query"
        );
        assert_eq!(
            dispatcher.dispatch("search song daft punk").await,
            "[ERROR] Invalid search: unknown search type \"song\""
        );
        assert_eq!(api.count(|call| matches!(call, Call::Search(..))), 0);
        assert_eq!(context(&dispatcher).await, DisplayContext::Search);
    }

    #[tokio::test]
    async fn empty_album() {
        let (dispatcher, _) = setup(State {
            album: Some(fixtures::album("Empty", "spotify:album:1")),
            ..State::default()
        });

        assert_eq!(
            dispatcher.dispatch("display_album spotify:album:1").await,
            "[ERROR] No tracks found"
        );
        assert_eq!(context(&dispatcher).await, DisplayContext::Album);
    }

    #[tokio::test]
    async fn album_detail() {
        let album = fixtures::album("Discovery", "spotify:album:2noRn2Aes5aoNVsU6iWThc");
        let tracks = vec![fixtures::on_disc(
            fixtures::track("Aerodynamic", "spotify:track:1"),
            1,
        )];
        let (dispatcher, _) = setup(State {
            album: Some(album.clone()),
            album_tracks: fixtures::page(tracks.clone()),
            ..State::default()
        });

        assert_eq!(
            dispatcher
                .dispatch("display_album spotify:album:2noRn2Aes5aoNVsU6iWThc")
                .await,
            format::album_detail(&album, &tracks)
        );
    }

    #[tokio::test]
    async fn liked_songs_page() {
        let (dispatcher, api) = setup(State {
            saved_tracks: fixtures::page(vec![SavedTrack {
                track: fixtures::track("Digital Love", "spotify:track:2VEZx7NWsZ1D0eJ4uv5Fym"),
            }]),
            ..State::default()
        });

        let response = dispatcher
            .dispatch("display_playlist spotify:user:alice:collection 20")
            .await;
        assert!(response.starts_with(
            "[PLAYLIST]\tLiked Songs\t \t1\tspotify:user:alice:collection\t"
        ));
        assert!(response.ends_with('\t'));
        assert!(api.calls().contains(&Call::SavedTracks(20, 20)));
    }

    #[tokio::test]
    async fn playlist_page_is_newest_first() {
        let items = ["Old", "Middle", "New"]
            .iter()
            .enumerate()
            .map(|(i, name)| PlaylistItem {
                track: Some(fixtures::track(name, &format!("spotify:track:{i}"))),
            })
            .collect();
        let (dispatcher, api) = setup(State {
            playlist: Some(fixtures::playlist(
                "Mix",
                "spotify:playlist:37i9dQZF1DXcBWIGoYBM5M",
                25,
            )),
            playlist_items: fixtures::page(items),
            ..State::default()
        });

        let response = dispatcher
            .dispatch("display_playlist spotify:playlist:37i9dQZF1DXcBWIGoYBM5M")
            .await;
        assert!(response.starts_with("[PLAYLIST]\tMix\tSpotify\t25\tspotify:playlist:37i9dQZF1DXcBWIGoYBM5M\t"));
        assert!(response.find("New").unwrap() < response.find("Old").unwrap());
        assert!(api.calls().contains(&Call::PlaylistTracks(
            "37i9dQZF1DXcBWIGoYBM5M".to_owned(),
            5,
            20
        )));

        dispatcher
            .dispatch("display_playlist spotify:playlist:37i9dQZF1DXcBWIGoYBM5M 20")
            .await;
        assert!(api.calls().contains(&Call::PlaylistTracks(
            "37i9dQZF1DXcBWIGoYBM5M".to_owned(),
            0,
            5
        )));
    }

    #[tokio::test]
    async fn playlist_offset_past_end() {
        let (dispatcher, _) = setup(State {
            playlist: Some(fixtures::playlist("Mix", "spotify:playlist:1", 10)),
            ..State::default()
        });
        assert_eq!(
            dispatcher.dispatch("display_playlist spotify:playlist:1 40").await,
            "[ERROR] No tracks found"
        );
        assert_eq!(
            dispatcher.dispatch("display_playlist spotify:playlist:1 x").await,
            "[ERROR] Invalid playlist: offset \"x\": invalid digit found in string"
        );
    }

    #[tokio::test]
    async fn artist_from_link() {
        let artist = fixtures::artist("Daft Punk", "spotify:artist:4tZwfgrHOc3mvqYlEYSvVi", 5);
        let top = vec![fixtures::track("Around the World", "spotify:track:1")];
        let (dispatcher, _) = setup(State {
            artist: Some(artist.clone()),
            top_tracks: top.clone(),
            ..State::default()
        });

        assert_eq!(
            dispatcher
                .dispatch("display_artist https://open.spotify.com/artist/4tZwfgrHOc3mvqYlEYSvVi?si=x")
                .await,
            format::artist_detail(&artist, &top, &[])
        );
        assert_eq!(context(&dispatcher).await, DisplayContext::Artist);
    }

    #[tokio::test]
    async fn artist_without_top_tracks() {
        let (dispatcher, _) = setup(State::default());
        assert_eq!(
            dispatcher.dispatch("display_artist spotify:artist:1").await,
            "[ERROR] No tracks found"
        );
    }
}
