//! Playback device resolution.
//!
//! Player commands need a device to act on. The resolver queries Spotify's
//! device list once and caches the chosen id in the [`Session`] until an
//! action on it fails.

use thiserror::Error;

use crate::{error::Error, session::Session, spotify::Api};

/// Why no device could be selected.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("error listing devices: {0}")]
    Query(#[from] Error),

    #[error("no devices available")]
    NoDevices,

    #[error("{count} devices available and none preferred")]
    Ambiguous { count: usize },

    #[error("preferred device \"{0}\" not available")]
    PreferredNotFound(String),
}

/// A device id and whether it came from the session cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub id: String,
    pub cached: bool,
}

/// Returns the device to control, querying the device list only when no
/// device is cached.
///
/// # Errors
///
/// Will return `Err` if the device list cannot be queried, is empty, or
/// holds several devices of which none matches the preferred device.
pub async fn resolve(api: &dyn Api, session: &mut Session) -> Result<Resolved, ResolveError> {
    if let Some(id) = session.device_id() {
        return Ok(Resolved {
            id: id.to_owned(),
            cached: true,
        });
    }

    let devices = api.devices().await?;

    // Restricted devices cannot be controlled through the Web API.
    let available: Vec<_> = devices
        .iter()
        .filter_map(|device| device.id.as_deref().map(|id| (id, device)))
        .collect();

    let id = match available.as_slice() {
        [] => return Err(ResolveError::NoDevices),
        [(id, _)] => (*id).to_owned(),
        _ => {
            let Some(preferred) = session.preferred_device() else {
                warn!(
                    "{} devices available, restart with --device to pick one:",
                    available.len()
                );
                for (id, device) in &available {
                    warn!("- {} ({id})", device.name);
                }
                return Err(ResolveError::Ambiguous {
                    count: available.len(),
                });
            };

            available
                .iter()
                .find(|(id, device)| *id == preferred || device.name.eq_ignore_ascii_case(preferred))
                .map(|(id, _)| (*id).to_owned())
                .ok_or_else(|| ResolveError::PreferredNotFound(preferred.to_owned()))?
        }
    };

    log!(session.log_level(), "active device: {id}");
    session.set_device_id(id.clone());

    Ok(Resolved { id, cached: false })
}
