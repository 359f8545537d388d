//! Device-dependent player actions.
//!
//! Spotify answers player commands with `404 NO_ACTIVE_DEVICE` when the
//! targeted device went to sleep or disappeared. [`run`] resolves a device
//! first and, when the action fails on a cached device, resolves again and
//! retries once.

use std::future::Future;

use thiserror::Error;

use crate::{
    device::{self, ResolveError},
    error::Error,
    session::Session,
    spotify::Api,
};

/// Failure of a guarded action, whatever went wrong.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("no device: {0}")]
    NoDevice(#[from] ResolveError),

    #[error("action failed on device {device}: {error}")]
    Failed { device: String, error: Error },
}

/// Runs `action` against the resolved device.
///
/// `action` receives the device id and may be invoked twice: once with the
/// cached device and, if that fails, once more with a freshly resolved one.
///
/// # Errors
///
/// Will return `Err` if no device can be resolved or the action fails.
pub async fn run<F, Fut>(api: &dyn Api, session: &mut Session, action: F) -> Result<(), ActionError>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<(), Error>>,
{
    let level = session.log_level();

    let resolved = device::resolve(api, session).await.inspect_err(|e| {
        log!(level, "device resolution failed: {e}");
    })?;

    let error = match action(resolved.id.clone()).await {
        Ok(()) => {
            trace!("action succeeded on device {}", resolved.id);
            return Ok(());
        }
        Err(e) if resolved.cached => e,
        Err(e) => {
            log!(level, "action failed on device {}: {e}", resolved.id);
            return Err(ActionError::Failed {
                device: resolved.id,
                error: e,
            });
        }
    };

    log!(
        level,
        "action failed on cached device {}: {error}; resolving again",
        resolved.id
    );
    session.forget_device();

    let retry = device::resolve(api, session).await.inspect_err(|e| {
        log!(level, "device resolution failed on retry: {e}");
    })?;

    action(retry.id.clone()).await.map_err(|e| {
        log!(level, "action failed on retry on device {}: {e}", retry.id);
        ActionError::Failed {
            device: retry.id,
            error: e,
        }
    })
}
