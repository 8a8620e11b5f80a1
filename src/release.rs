//! Latest-release lookups for listener version checks.
//!
//! When a listener announces its version during the handshake, the relay
//! compares it against the latest published release of that listener. A
//! listener behind the latest release is reported as outdated. Any failure
//! to find out is treated as "up to date": no lookup failure ever raises
//! an alarm.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use futures_util::{future::BoxFuture, FutureExt};
use semver::Version;
use serde::Deserialize;

use crate::{
    config::Config,
    error::{Error, Result},
    http,
};

/// Source of the latest published version of a listener.
pub trait ReleaseFeed: Send + Sync {
    /// Looks up the latest release of `repository` (`owner/name`).
    fn latest<'a>(&'a self, repository: &'a str) -> BoxFuture<'a, Result<Version>>;
}

/// Returns whether `connected` is behind `latest`.
///
/// Only the numeric major, minor and patch components are compared;
/// pre-release and build metadata are ignored.
#[must_use]
pub fn is_outdated(connected: &Version, latest: &Version) -> bool {
    (connected.major, connected.minor, connected.patch) < (latest.major, latest.minor, latest.patch)
}

/// Parses a release tag such as `v1.2.3` or `1.2.3`.
///
/// # Errors
///
/// Returns `InvalidArgument` if the tag is not a semantic version.
pub fn parse_tag(tag: &str) -> Result<Version> {
    let tag = tag.trim();
    let tag = tag.strip_prefix(|chr: char| chr == 'v' || chr == 'V').unwrap_or(tag);
    Ok(Version::parse(tag)?)
}

#[derive(Clone, Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// [`ReleaseFeed`] backed by the GitHub releases API.
///
/// Results are memoized per repository for the lifetime of the feed.
pub struct GithubReleases {
    http_client: http::Client,
    base: url::Url,
    known: Mutex<HashMap<String, Version>>,
}

impl GithubReleases {
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http_client: http::Client::new(config)?,
            base: config.release_feed.clone(),
            known: Mutex::new(HashMap::new()),
        })
    }

    fn url(&self, repository: &str) -> Result<url::Url> {
        if repository.split('/').count() != 2 || repository.contains(char::is_whitespace) {
            return Err(Error::invalid_argument(format!(
                "{repository} is not an owner/name repository"
            )));
        }
        Ok(self
            .base
            .join(&format!("repos/{repository}/releases/latest"))?)
    }

    async fn fetch(&self, repository: &str) -> Result<Version> {
        let cached = self
            .known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(repository)
            .cloned();
        if let Some(version) = cached {
            return Ok(version);
        }

        let url = self.url(repository)?;
        debug!("looking up latest release at {url}");

        let request = self.http_client.get(url);
        let body = self.http_client.execute(request).await?.text().await?;
        let release: LatestRelease = serde_json::from_str(&body)?;
        let version = parse_tag(&release.tag_name)?;
        debug!("latest release of {repository} is {version}");

        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(repository.to_owned(), version.clone());
        Ok(version)
    }
}

impl ReleaseFeed for GithubReleases {
    fn latest<'a>(&'a self, repository: &'a str) -> BoxFuture<'a, Result<Version>> {
        self.fetch(repository).boxed()
    }
}

/// A feed that never finds anything, for when release checks are off.
#[derive(Copy, Clone, Debug, Default)]
pub struct Disabled;

impl ReleaseFeed for Disabled {
    fn latest<'a>(&'a self, repository: &'a str) -> BoxFuture<'a, Result<Version>> {
        let error = Error::failed_precondition(format!("release check for {repository} disabled"));
        async move { Err(error) }.boxed()
    }
}

/// Builds the feed the configuration asks for.
///
/// # Errors
///
/// Returns error if the HTTP client cannot be built.
pub fn from_config(config: &Config) -> Result<Arc<dyn ReleaseFeed>> {
    if config.release_check {
        Ok(Arc::new(GithubReleases::new(config)?))
    } else {
        Ok(Arc::new(Disabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[test]
    fn outdated_compares_numerically() {
        assert!(is_outdated(&v("1.2.3"), &v("1.2.4")));
        assert!(is_outdated(&v("1.2.3"), &v("1.3.0")));
        assert!(is_outdated(&v("0.9.9"), &v("1.0.0")));
        assert!(is_outdated(&v("1.9.0"), &v("1.10.0")));
        assert!(!is_outdated(&v("1.2.3"), &v("1.2.3")));
        assert!(!is_outdated(&v("2.0.0"), &v("1.9.9")));
        assert!(!is_outdated(&v("1.2.3-beta.1"), &v("1.2.3")));
    }

    #[test]
    fn tags_may_carry_a_prefix() {
        assert_eq!(parse_tag("v1.2.3").unwrap(), v("1.2.3"));
        assert_eq!(parse_tag(" 2.0.0 ").unwrap(), v("2.0.0"));
        assert!(parse_tag("latest").is_err());
    }

    #[test]
    fn repository_urls() {
        let feed = GithubReleases::new(&Config::default()).unwrap();
        assert_eq!(
            feed.url("keifufu/WebNowPlaying-Redux-Rainmeter")
                .unwrap()
                .as_str(),
            "https://api.github.com/repos/keifufu/WebNowPlaying-Redux-Rainmeter/releases/latest"
        );
        assert!(feed.url("not a repository").is_err());
        assert!(feed.url("a/b/c").is_err());
    }

    #[tokio::test]
    async fn disabled_feed_fails() {
        assert!(Disabled.latest("owner/name").await.is_err());
    }
}
