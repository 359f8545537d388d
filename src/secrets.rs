//! Spotify application credentials, loaded from a TOML secrets file.
//!
//! ```toml
//! client_id = "..."
//! client_secret = "..."
//! redirect_uri = "http://127.0.0.1:8888/callback"
//! refresh_token = "..."
//! ```
//!
//! `refresh_token` is absent until the account has been authorized once
//! with `--authorize`.

use std::{fs, path::Path};

use serde::Deserialize;
use veil::Redact;

use crate::error::{Error, Result};

/// Credentials of the Spotify application and the authorized account.
#[derive(Clone, Redact, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,

    #[redact]
    pub client_secret: String,

    pub redirect_uri: String,

    #[redact]
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Credentials {
    /// Secrets files are tiny; anything bigger is not one.
    const MAX_FILE_SIZE: u64 = 4096;

    /// Loads the credentials from `secrets_file`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the file cannot be read or is larger than 4 KiB
    /// - the file is not valid TOML or misses a field
    /// - one of the required fields is empty
    pub fn from_file<P>(secrets_file: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let secrets_file = secrets_file.as_ref();

        // Prevent out-of-memory condition: the secrets file should be small.
        let file_size = fs::metadata(secrets_file)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::out_of_range(format!(
                "{} is too large ({file_size} bytes)",
                secrets_file.display()
            )));
        }

        let contents = fs::read_to_string(secrets_file)?;
        contents.parse()
    }

    /// Whether the account has been authorized and can obtain tokens.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}

impl std::str::FromStr for Credentials {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let credentials: Self = toml::from_str(s)?;

        for (field, value) in [
            ("client_id", &credentials.client_id),
            ("client_secret", &credentials.client_secret),
            ("redirect_uri", &credentials.redirect_uri),
        ] {
            if value.trim().is_empty() {
                return Err(Error::invalid_argument(format!("{field} is empty")));
            }
        }

        url::Url::parse(&credentials.redirect_uri)?;

        Ok(credentials)
    }
}
