//! HTTP client with rate limiting for the Spotify Web API.
//!
//! This module provides a wrapper around `reqwest::Client` that adds:
//! * Request rate limiting to stay clear of Spotify's rolling quota
//! * Consistent timeouts and headers
//!
//! # Rate Limiting
//!
//! Spotify does not publish its limits, only that they apply to a rolling
//! 30-second window. The bridge allows bursts of up to 90 calls per window
//! and delays anything beyond that instead of provoking `429` responses.
//!
//! # Example
//!
//! ```rust
//! use resonite_spotify::http::Client;
//!
//! let client = Client::new(&config)?;
//! let request = client.get(url);
//! let response = client.execute(request).await?;
//! ```

use std::{future::Future, num::NonZeroU32, time::Duration};

use futures_util::{FutureExt, TryFutureExt};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{
    self,
    header::{HeaderValue, ACCEPT, CONTENT_TYPE},
    Body, Method, Url,
};

use crate::{
    config::Config,
    error::{Error, Result},
};

/// HTTP client with built-in rate limiting.
pub struct Client {
    /// Direct access to underlying client without rate limiting.
    pub unlimited: reqwest::Client,

    /// Rate limiter for API quota compliance.
    rate_limiter: DefaultDirectRateLimiter,
}

impl Client {
    /// Rolling window over which Spotify counts calls.
    const RATE_LIMIT_INTERVAL: Duration = Duration::from_secs(30);

    /// Maximum calls per interval before requests are delayed.
    const RATE_LIMIT_CALLS_PER_INTERVAL: u8 = 90;

    /// Duration to keep idle connections alive.
    ///
    /// Commands arrive in bursts as the user browses, so keeping the
    /// connection warm saves a TLS handshake on most of them.
    const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Duration to wait for a connection to be established.
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Duration to wait for individual network reads.
    ///
    /// The websocket client waits for exactly one answer per command, so a
    /// stuck read would block the session.
    const READ_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new rate limited client.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// * HTTP client creation fails
    /// * The rate limit parameters are zero
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .tcp_keepalive(Self::KEEPALIVE_TIMEOUT)
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .read_timeout(Self::READ_TIMEOUT)
            .default_headers(headers)
            .user_agent(&config.user_agent);

        let replenish_interval =
            Self::RATE_LIMIT_INTERVAL / u32::from(Self::RATE_LIMIT_CALLS_PER_INTERVAL);
        let quota = Quota::with_period(replenish_interval)
            .ok_or_else(|| Error::internal("quota time interval is zero"))?
            .allow_burst(
                NonZeroU32::new(Self::RATE_LIMIT_CALLS_PER_INTERVAL.into())
                    .ok_or_else(|| Error::internal("calls per interval is zero"))?,
            );

        Ok(Self {
            unlimited: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    /// Builds a request with specified method, URL and body.
    pub fn request<U, T>(&self, method: Method, url: U, body: T) -> reqwest::Request
    where
        U: Into<Url>,
        T: Into<Body>,
    {
        let mut request = reqwest::Request::new(method, url.into());
        let body_mut = request.body_mut();
        *body_mut = Some(body.into());

        request
    }

    /// Builds a GET request without a body.
    pub fn get<U>(&self, url: U) -> reqwest::Request
    where
        U: Into<Url>,
    {
        reqwest::Request::new(Method::GET, url.into())
    }

    /// Builds a POST request with a body.
    pub fn post<U, T>(&self, url: U, body: T) -> reqwest::Request
    where
        U: Into<Url>,
        T: Into<Body>,
    {
        self.request(Method::POST, url, body)
    }

    /// Builds a PUT request with a body.
    ///
    /// Spotify rejects player commands without `Content-Length`, so even
    /// bodiless commands send an empty body.
    pub fn put<U, T>(&self, url: U, body: T) -> reqwest::Request
    where
        U: Into<Url>,
        T: Into<Body>,
    {
        self.request(Method::PUT, url, body)
    }

    /// Builds a PUT request with a JSON body.
    pub fn put_json<U>(&self, url: U, json: String) -> reqwest::Request
    where
        U: Into<Url>,
    {
        let mut request = self.put(url, json);
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        request
    }

    /// Executes a request with rate limiting.
    ///
    /// # Errors
    ///
    /// Returns error if the network request fails. HTTP error statuses are
    /// not errors at this level; see [`crate::spotify::Client`].
    pub fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response>> + '_ {
        // No need to await with jitter because there is a single session.
        let throttle = self.rate_limiter.until_ready();
        throttle.then(|()| self.unlimited.execute(request).map_err(Into::into))
    }
}
