//! State shared by every command of the bridge.
//!
//! There is one [`Session`] per process. It remembers which playback device
//! to target and which kind of list the client was last shown, so that an
//! ambiguous `play` argument can be interpreted.

use std::{fmt, sync::Arc};

use log::Level;
use tokio::sync::Mutex;

/// Kind of list the client was last shown.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DisplayContext {
    #[default]
    None,
    Search,
    Queue,
    Playlist,
    Album,
    Artist,
}

impl fmt::Display for DisplayContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Search => write!(f, "search"),
            Self::Queue => write!(f, "queue"),
            Self::Playlist => write!(f, "playlist"),
            Self::Album => write!(f, "album"),
            Self::Artist => write!(f, "artist"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
    device_id: Option<String>,
    preferred_device: Option<String>,
    display_context: DisplayContext,
    debug: bool,
}

/// Handle to the session, held for the duration of one command.
pub type SharedSession = Arc<Mutex<Session>>;

impl Session {
    #[must_use]
    pub fn new(preferred_device: Option<String>, debug: bool) -> Self {
        Self {
            preferred_device: preferred_device.filter(|device| !device.trim().is_empty()),
            debug,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn set_device_id(&mut self, device_id: String) {
        self.device_id = Some(device_id);
    }

    /// Forgets the cached device, so that the next resolution queries the
    /// device list again.
    pub fn forget_device(&mut self) -> Option<String> {
        self.device_id.take()
    }

    #[must_use]
    pub fn preferred_device(&self) -> Option<&str> {
        self.preferred_device.as_deref()
    }

    #[must_use]
    pub fn display_context(&self) -> DisplayContext {
        self.display_context
    }

    pub fn set_display_context(&mut self, context: DisplayContext) {
        if context != self.display_context {
            trace!("display context: {} -> {context}", self.display_context);
        }
        self.display_context = context;
    }

    /// Level for command tracing: `Info` in debug mode, `Debug` otherwise.
    #[must_use]
    pub fn log_level(&self) -> Level {
        if self.debug {
            Level::Info
        } else {
            Level::Debug
        }
    }
}
