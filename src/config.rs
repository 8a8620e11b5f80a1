//! Relay configuration.
//!
//! Configuration is read from a TOML file. Every key is optional:
//!
//! ```toml
//! update_frequency_ms = 250
//! release_check = true
//!
//! [[adapter]]
//! name = "Rainmeter Adapter"
//! port = 8974
//! enabled = true
//! repository = "keifufu/WebNowPlaying-Redux-Rainmeter"
//! update_frequency_ms = 100
//!
//! [[custom_adapter]]
//! port = 1234
//! enabled = true
//! ```
//!
//! Listing any `[[adapter]]` replaces the built-in adapter list as a whole.
//! The resulting [`Endpoint`]s are immutable: changing them means building
//! a new [`Config`] and handing it to [`Coordinator::reload`].
//!
//! [`Coordinator::reload`]: crate::coordinator::Coordinator::reload

use std::{collections::HashSet, fmt, fs, path::Path, time::Duration};

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Where an endpoint was configured.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Origin {
    /// One of the adapters the relay knows about.
    BuiltIn,
    /// Added by the user by port.
    Custom,
}

/// One listener the relay keeps a connection to.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Endpoint {
    pub name: String,
    pub port: u16,
    pub origin: Origin,
    pub enabled: bool,
    /// Interval between periodic report ticks.
    pub update_frequency: Duration,
    /// GitHub `owner/name` publishing the listener's releases.
    pub repository: Option<String>,
}

impl Endpoint {
    /// WebSocket URL of the listener.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://localhost:{}", self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.port)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct Adapter {
    name: String,
    port: u16,
    #[serde(default = "enabled")]
    enabled: bool,
    #[serde(default)]
    repository: Option<String>,
    #[serde(default)]
    update_frequency_ms: Option<u64>,
}

#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct CustomAdapter {
    port: u16,
    #[serde(default = "enabled")]
    enabled: bool,
    #[serde(default)]
    update_frequency_ms: Option<u64>,
}

fn enabled() -> bool {
    true
}

/// On-disk representation.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct File {
    update_frequency_ms: u64,
    release_check: bool,
    release_feed: Url,
    #[serde(rename = "adapter")]
    adapters: Vec<Adapter>,
    #[serde(rename = "custom_adapter")]
    custom_adapters: Vec<CustomAdapter>,
}

impl Default for File {
    fn default() -> Self {
        let builtin = |name: &str, port, enabled, repository: &str| Adapter {
            name: name.to_owned(),
            port,
            enabled,
            repository: Some(repository.to_owned()),
            update_frequency_ms: None,
        };

        Self {
            update_frequency_ms: Config::DEFAULT_UPDATE_FREQUENCY_MS,
            release_check: true,
            release_feed: Config::default_release_feed(),
            adapters: vec![
                builtin(
                    "Rainmeter Adapter",
                    8974,
                    true,
                    "keifufu/WebNowPlaying-Redux-Rainmeter",
                ),
                builtin(
                    "Macro Deck Adapter",
                    8698,
                    false,
                    "jbcarreon123/WebNowPlaying-Redux-Macro-Deck",
                ),
                builtin("OBS Adapter", 6534, false, "keifufu/WebNowPlaying-Redux-OBS"),
            ],
            custom_adapters: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,
    pub user_agent: String,

    /// Report interval for endpoints without their own.
    pub update_frequency: Duration,

    /// Whether to compare listener versions against published releases.
    pub release_check: bool,

    /// Base URL of the GitHub API serving release information.
    pub release_feed: Url,

    endpoints: Vec<Endpoint>,
}

impl Config {
    pub const DEFAULT_UPDATE_FREQUENCY_MS: u64 = 250;

    const DEFAULT_RELEASE_FEED: &'static str = "https://api.github.com";

    /// Configuration files are small; refuse anything larger.
    const MAX_FILE_SIZE: u64 = 64 * 1024;

    /// # Panics
    ///
    /// Will panic if the constant URL is invalid.
    fn default_release_feed() -> Url {
        Url::parse(Self::DEFAULT_RELEASE_FEED).expect("invalid release feed")
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the text is not valid TOML, contains
    /// unknown keys, or describes an invalid endpoint list.
    pub fn parse(text: &str) -> Result<Self> {
        let file = toml::from_str::<File>(text)?;
        Self::from_file_contents(file)
    }

    /// Reads configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist, and the errors of
    /// [`Config::parse`] otherwise.
    pub fn from_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();

        // Prevent out-of-memory condition: configuration should be small.
        let file_size = fs::metadata(path)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::out_of_range(format!(
                "{} is too large ({file_size} bytes)",
                path.display()
            )));
        }

        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    fn from_file_contents(file: File) -> Result<Self> {
        if file.update_frequency_ms == 0 {
            return Err(Error::invalid_argument("update frequency must be positive"));
        }
        let update_frequency = Duration::from_millis(file.update_frequency_ms);

        let frequency = |override_ms: Option<u64>| -> Result<Duration> {
            match override_ms {
                Some(0) => Err(Error::invalid_argument("update frequency must be positive")),
                Some(ms) => Ok(Duration::from_millis(ms)),
                None => Ok(update_frequency),
            }
        };

        let mut endpoints = Vec::with_capacity(file.adapters.len() + file.custom_adapters.len());
        for adapter in file.adapters {
            endpoints.push(Endpoint {
                name: adapter.name,
                port: adapter.port,
                origin: Origin::BuiltIn,
                enabled: adapter.enabled,
                update_frequency: frequency(adapter.update_frequency_ms)?,
                repository: adapter.repository.filter(|repository| !repository.is_empty()),
            });
        }
        for adapter in file.custom_adapters {
            endpoints.push(Endpoint {
                name: format!("Custom Adapter {}", adapter.port),
                port: adapter.port,
                origin: Origin::Custom,
                enabled: adapter.enabled,
                update_frequency: frequency(adapter.update_frequency_ms)?,
                repository: None,
            });
        }

        Self::validate(&endpoints)?;

        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();
        let user_agent = Self::user_agent(&app_name, &app_version);

        Ok(Self {
            app_name,
            app_version,
            user_agent,
            update_frequency,
            release_check: file.release_check,
            release_feed: file.release_feed,
            endpoints,
        })
    }

    /// Builds a `User-Agent` like `wnp-relay/0.1.0 (Rust; linux/6.8)`.
    fn user_agent(app_name: &str, app_version: &str) -> String {
        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_else(|| String::from("0"));

        // `/` and `;` would break the product token grammar.
        let illegal_chars = |chr: char| chr == '/' || chr == ';';
        let os_version = os_version.replace(illegal_chars, "-");

        let user_agent = format!("{app_name}/{app_version} (Rust; {os_name}/{os_version})");
        trace!("user agent: {user_agent}");
        user_agent
    }

    /// Every configured endpoint, enabled or not.
    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// The endpoints a connection should be kept to.
    pub fn enabled_endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter().filter(|endpoint| endpoint.enabled)
    }

    /// Replaces the endpoint list, e.g. for a programmatic setup.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`Config::parse`].
    pub fn with_endpoints(mut self, endpoints: Vec<Endpoint>) -> Result<Self> {
        Self::validate(&endpoints)?;
        self.endpoints = endpoints;
        Ok(self)
    }

    /// Rejects missing ports, zero frequencies and ports listed twice.
    fn validate(endpoints: &[Endpoint]) -> Result<()> {
        let mut ports = HashSet::new();
        for endpoint in endpoints {
            if endpoint.port == 0 {
                return Err(Error::invalid_argument(format!("{} has no port", endpoint.name)));
            }
            if endpoint.update_frequency.is_zero() {
                return Err(Error::invalid_argument(format!(
                    "{} has no update frequency",
                    endpoint.name
                )));
            }
            if !ports.insert(endpoint.port) {
                return Err(Error::already_exists(format!(
                    "port {} is configured more than once",
                    endpoint.port
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_file_contents(File::default()).expect("invalid built-in configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.update_frequency, Duration::from_millis(250));
        assert!(config.release_check);
        assert_eq!(config.endpoints().len(), 3);

        let enabled: Vec<_> = config.enabled_endpoints().collect();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "Rainmeter Adapter");
        assert_eq!(enabled[0].url(), "ws://localhost:8974");
        assert_eq!(enabled[0].origin, Origin::BuiltIn);
    }

    #[test]
    fn empty_file_means_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn adapters_and_overrides() {
        let config = Config::parse(
            r#"
            update_frequency_ms = 500
            release_check = false

            [[adapter]]
            name = "Rainmeter Adapter"
            port = 8974
            update_frequency_ms = 100

            [[custom_adapter]]
            port = 1234

            [[custom_adapter]]
            port = 4321
            enabled = false
            "#,
        )
        .unwrap();

        assert!(!config.release_check);
        let endpoints = config.endpoints();
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0].update_frequency, Duration::from_millis(100));
        assert_eq!(endpoints[0].repository, None);
        assert_eq!(endpoints[1].name, "Custom Adapter 1234");
        assert_eq!(endpoints[1].origin, Origin::Custom);
        assert_eq!(endpoints[1].update_frequency, Duration::from_millis(500));
        assert!(!endpoints[2].enabled);
        assert_eq!(config.enabled_endpoints().count(), 2);
    }

    #[test]
    fn rejects_duplicate_ports() {
        let err = Config::parse("[[custom_adapter]]\nport = 8974\n").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::AlreadyExists);
    }

    #[test]
    fn rejects_zero_frequency_and_unknown_keys() {
        assert!(Config::parse("update_frequency_ms = 0").is_err());
        assert!(Config::parse("[[custom_adapter]]\nport = 1\nupdate_frequency_ms = 0").is_err());
        assert!(Config::parse("colour = \"blue\"").is_err());
    }

    #[test]
    fn user_agent_has_product_token() {
        let config = Config::default();
        assert!(config.user_agent.starts_with("wnp-relay/"));
        assert!(config.user_agent.contains("(Rust; "));
    }
}
