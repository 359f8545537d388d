//! OAuth access tokens for the Spotify Web API.
//!
//! The bridge uses the authorization code flow once (see
//! [`authorize_url`] and [`Tokens::exchange_code`]) to obtain a refresh token,
//! which is stored in the secrets file. At runtime, access tokens are
//! obtained with the refresh token grant and cached until shortly before
//! they expire.

use std::{
    fmt,
    time::{Duration, Instant},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tokio::sync::Mutex;
use url::{form_urlencoded, Url};

use crate::{
    error::{Error, Result},
    http::Client as HttpClient,
    secrets::Credentials,
};

/// Scopes the bridge needs to read and control playback and browse the
/// user's library.
pub const SCOPES: &[&str] = &[
    "user-library-read",
    "user-read-currently-playing",
    "user-read-playback-position",
    "user-read-playback-state",
    "user-modify-playback-state",
    "playlist-read-private",
    "playlist-read-collaborative",
];

/// A bearer token and the moment it stops being valid.
#[derive(Clone)]
pub struct AccessToken {
    token: String,
    expires_at: Instant,
}

impl AccessToken {
    /// Refresh a while before actual expiration, so that requests do not
    /// fail when the expiration is checked with only a few seconds left.
    const EXPIRATION_THRESHOLD: Duration = Duration::from_secs(60);

    #[must_use]
    pub fn new(token: String, expires_in: Duration) -> Self {
        Self {
            token,
            expires_at: Instant::now() + expires_in,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() + Self::EXPIRATION_THRESHOLD >= self.expires_at
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Issues and caches access tokens.
pub struct Tokens {
    credentials: Credentials,
    token_url: Url,
    current: Mutex<Option<AccessToken>>,
}

impl Tokens {
    /// Creates a token source for `credentials`, talking to the accounts
    /// service at `accounts_url`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the token endpoint URL cannot be built.
    pub fn new(credentials: Credentials, accounts_url: &Url) -> Result<Self> {
        Ok(Self {
            credentials,
            token_url: accounts_url.join("api/token")?,
            current: Mutex::new(None),
        })
    }

    /// Returns a valid access token, refreshing it when needed.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the account has not been authorized yet
    /// - the accounts service rejects the refresh token
    /// - the HTTP request fails
    pub async fn access_token(&self, http: &HttpClient) -> Result<AccessToken> {
        let mut current = self.current.lock().await;
        if let Some(token) = current.as_ref().filter(|token| !token.is_expired()) {
            return Ok(token.clone());
        }

        let refresh_token = self
            .credentials
            .refresh_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                Error::unauthenticated("no refresh token; run with --authorize first")
            })?;

        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", refresh_token)
            .finish();

        let response = self.request(http, body).await?;
        debug!("access token refreshed; expires in {}s", response.expires_in);

        let token = AccessToken::new(
            response.access_token,
            Duration::from_secs(response.expires_in),
        );
        *current = Some(token.clone());
        Ok(token)
    }

    /// Forgets the cached access token, for instance after a `401`.
    pub async fn flush(&self) {
        self.current.lock().await.take();
    }

    /// Exchanges an authorization code for a refresh token.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the accounts service rejects the code or does
    /// not return a refresh token.
    pub async fn exchange_code(&self, http: &HttpClient, code: &str) -> Result<String> {
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "authorization_code")
            .append_pair("code", code)
            .append_pair("redirect_uri", &self.credentials.redirect_uri)
            .finish();

        let response = self.request(http, body).await?;
        *self.current.lock().await = Some(AccessToken::new(
            response.access_token,
            Duration::from_secs(response.expires_in),
        ));

        response
            .refresh_token
            .ok_or_else(|| Error::failed_precondition("no refresh token received"))
    }

    async fn request(&self, http: &HttpClient, body: String) -> Result<TokenResponse> {
        let basic = STANDARD.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));

        let mut request = http.post(self.token_url.clone(), body);
        let headers = request.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Basic {basic}"))?);

        let response = http.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return response.json::<TokenResponse>().await.map_err(Into::into);
        }

        let text = response.text().await.unwrap_or_default();
        let reason = match serde_json::from_str::<TokenError>(&text) {
            Ok(TokenError {
                error,
                error_description: Some(description),
            }) => format!("{error}: {description}"),
            Ok(TokenError { error, .. }) => error,
            Err(_) => format!("token request failed with {status}"),
        };

        // The accounts service answers a revoked or unknown refresh token
        // with `400 invalid_grant`.
        if status.as_u16() == 400 || status.as_u16() == 401 {
            Err(Error::unauthenticated(reason))
        } else {
            Err(Error::new(
                crate::error::ErrorKind::from_status(status.as_u16()),
                reason,
            ))
        }
    }
}

/// Builds the URL where the user grants the bridge access to their account.
///
/// # Errors
///
/// Will return `Err` if the authorization URL cannot be built.
pub fn authorize_url(credentials: &Credentials, accounts_url: &Url) -> Result<Url> {
    let mut url = accounts_url.join("authorize")?;
    url.query_pairs_mut()
        .append_pair("client_id", &credentials.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &credentials.redirect_uri)
        .append_pair("scope", &SCOPES.join(" "));
    Ok(url)
}

/// Extracts the authorization code from the URL the browser was redirected
/// to after granting access.
///
/// # Errors
///
/// Will return `Err` if the URL is invalid, carries an `error` parameter
/// (access denied) or has no `code`.
pub fn code_from_redirect(redirected: &str) -> Result<String> {
    let url = Url::parse(redirected.trim())?;

    let mut code = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "error" => {
                return Err(Error::permission_denied(format!(
                    "authorization failed: {value}"
                )))
            }
            _ => {}
        }
    }

    code.ok_or_else(|| Error::invalid_argument("redirect URL has no code parameter"))
}
