use std::net::SocketAddr;

use url::Url;

use crate::{
    error::{Error, Result},
    secrets::Credentials,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,

    /// Address the websocket server listens on.
    pub listen: SocketAddr,

    /// Market used to rank search results and artist top tracks.
    pub market: String,

    /// Device id or name to pick when several devices are available.
    pub preferred_device: Option<String>,

    /// Logs every command and response at info level.
    pub debug: bool,

    pub user_agent: String,

    pub api_url: Url,
    pub accounts_url: Url,

    pub credentials: Credentials,
}

impl Config {
    pub const DEFAULT_PORT: u16 = 8765;
    pub const DEFAULT_MARKET: &'static str = "US";

    const API_URL: &'static str = "https://api.spotify.com/v1/";
    const ACCOUNTS_URL: &'static str = "https://accounts.spotify.com/";

    /// Creates a configuration with defaults for everything but the
    /// credentials.
    ///
    /// # Errors
    ///
    /// Will return `Err` if no valid `User-Agent` can be built from the
    /// package metadata and the OS name and version.
    pub fn with_credentials(credentials: Credentials) -> Result<Self> {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();

        // Additional `User-Agent` string checks on top of `reqwest::HeaderValue`.
        let illegal_chars = |chr| chr == '/' || chr == ';';
        if app_name.is_empty()
            || app_name.contains(illegal_chars)
            || app_version.is_empty()
            || app_version.contains(illegal_chars)
        {
            return Err(Error::internal(format!(
                "application name and/or version invalid (\"{app_name}\"; \"{app_version}\")"
            )));
        }

        let os_name = std::env::consts::OS;
        let os_version = sysinfo::System::os_version()
            .filter(|version| !version.is_empty() && !version.contains(illegal_chars))
            .unwrap_or_else(|| String::from("0"));

        let user_agent = format!("{app_name}/{app_version} (Rust; {os_name}/{os_version})");
        trace!("user agent: {user_agent}");

        Ok(Self {
            app_name,
            app_version,

            listen: SocketAddr::from(([127, 0, 0, 1], Self::DEFAULT_PORT)),
            market: Self::DEFAULT_MARKET.to_owned(),
            preferred_device: None,
            debug: false,

            user_agent,

            api_url: Url::parse(Self::API_URL)?,
            accounts_url: Url::parse(Self::ACCOUNTS_URL)?,

            credentials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        r#"
            client_id = "id"
            client_secret = "secret"
            redirect_uri = "http://127.0.0.1:8888/callback"
        "#
        .parse()
        .unwrap()
    }

    #[test]
    fn defaults() {
        let config = Config::with_credentials(credentials()).unwrap();
        assert_eq!(config.listen.port(), Config::DEFAULT_PORT);
        assert_eq!(config.market, "US");
        assert!(!config.debug);
        assert!(config.user_agent.starts_with("resonite-spotify/"));
        assert_eq!(config.api_url.as_str(), "https://api.spotify.com/v1/");
    }
}
