//! Rate-limited HTTP client for release lookups.
//!
//! Wraps `reqwest::Client` with:
//! * The relay's `User-Agent`, which the GitHub API requires
//! * Connect and request timeouts, so a lookup never lingers
//! * A request rate limiter
//!
//! # Rate Limiting
//!
//! Unauthenticated GitHub API access is limited to 60 requests per hour.
//! A listener that keeps restarting triggers a lookup per handshake, so
//! requests are throttled to one per minute with a small burst allowance.
//! Lookups beyond the limit wait rather than fail.

use std::{future::Future, num::NonZeroU32, time::Duration};

use futures_util::{FutureExt, TryFutureExt};
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::{header::HeaderValue, Method, Url};

use crate::{config::Config, error::Result};

pub struct Client {
    /// Client without rate limiting.
    pub unlimited: reqwest::Client,

    rate_limiter: DefaultDirectRateLimiter,
}

impl Client {
    /// Requests allowed back to back before throttling kicks in.
    const RATE_LIMIT_BURST: u32 = 10;

    const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// The GitHub REST API media type.
    const ACCEPT: HeaderValue = HeaderValue::from_static("application/vnd.github+json");

    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built, e.g. because the
    /// user agent is not a valid header value.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::ACCEPT, Self::ACCEPT);

        let http_client = reqwest::Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .timeout(Self::REQUEST_TIMEOUT)
            .default_headers(headers)
            .user_agent(&config.user_agent);

        let burst = NonZeroU32::new(Self::RATE_LIMIT_BURST).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_minute(NonZeroU32::MIN).allow_burst(burst);

        Ok(Self {
            unlimited: http_client.build()?,
            rate_limiter: governor::RateLimiter::direct(quota),
        })
    }

    /// Builds a GET request.
    #[must_use]
    pub fn get(&self, url: Url) -> reqwest::Request {
        reqwest::Request::new(Method::GET, url)
    }

    /// Executes a request once the rate limiter allows it.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response carries an
    /// error status.
    pub fn execute(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response>> + '_ {
        let throttle = self.rate_limiter.until_ready();
        throttle.then(|()| {
            self.unlimited
                .execute(request)
                .and_then(|response| async move { response.error_for_status() })
                .map_err(Into::into)
        })
    }
}
