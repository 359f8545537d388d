//! Commands sent by the client.
//!
//! A frame is `<name>[ <argument>]`: the name runs up to the first space and
//! everything after it is the argument, spaces included.

use std::fmt;

/// A parsed client command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// The current track followed by the playback states.
    CurrentInfo,
    /// The current track. Sent as `current_song` or `current_track`.
    CurrentSong,
    CurrentStates,

    Next,
    Previous,
    Play(Option<String>),

    Pause,
    Resume,
    Shuffle,
    Repeat,

    ListPlaylists,
    Search(Option<String>),
    ListQueue,

    DisplayAlbum(Option<String>),
    DisplayPlaylist(Option<String>),
    DisplayArtist(Option<String>),

    Unknown(String),
}

impl Command {
    /// Parses one inbound frame. Never fails: unrecognized names become
    /// [`Command::Unknown`].
    #[must_use]
    pub fn parse(frame: &str) -> Self {
        let frame = frame.trim_end_matches(['\r', '\n']);
        let (name, argument) = match frame.split_once(' ') {
            Some((name, argument)) => (name, Some(argument.to_owned())),
            None => (frame, None),
        };

        match name {
            "current_info" => Self::CurrentInfo,
            "current_song" | "current_track" => Self::CurrentSong,
            "current_states" => Self::CurrentStates,

            "next" => Self::Next,
            "previous" => Self::Previous,
            "play" => Self::Play(argument),

            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "shuffle" => Self::Shuffle,
            "repeat" => Self::Repeat,

            "list_playlists" => Self::ListPlaylists,
            "search" => Self::Search(argument),
            "list_queue" => Self::ListQueue,

            "display_album" => Self::DisplayAlbum(argument),
            "display_playlist" => Self::DisplayPlaylist(argument),
            "display_artist" => Self::DisplayArtist(argument),

            other => Self::Unknown(other.to_owned()),
        }
    }

    /// The wire name, for logging.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::CurrentInfo => "current_info",
            Self::CurrentSong => "current_song",
            Self::CurrentStates => "current_states",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Play(_) => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Shuffle => "shuffle",
            Self::Repeat => "repeat",
            Self::ListPlaylists => "list_playlists",
            Self::Search(_) => "search",
            Self::ListQueue => "list_queue",
            Self::DisplayAlbum(_) => "display_album",
            Self::DisplayPlaylist(_) => "display_playlist",
            Self::DisplayArtist(_) => "display_artist",
            Self::Unknown(name) => name.as_str(),
        }
    }

    #[must_use]
    pub fn argument(&self) -> Option<&str> {
        match self {
            Self::Play(argument)
            | Self::Search(argument)
            | Self::DisplayAlbum(argument)
            | Self::DisplayPlaylist(argument)
            | Self::DisplayArtist(argument) => argument.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument() {
            Some(argument) => write!(f, "{} | {argument}", self.name()),
            None => write!(f, "{}", self.name()),
        }
    }
}
