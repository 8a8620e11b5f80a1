//! Recognition of a listener's first message.
//!
//! Three generations of listeners exist in the wild:
//!
//! * the oldest send `Version:<x.y.z>` on connect
//! * current ones send `ADAPTER_VERSION <x.y.z>;WNPRLIB_REVISION <n>`
//! * anything else (or nothing at all) is assumed to predate both
//!
//! Parsing here is purely lexical. Whether a handshake means the listener
//! is outdated is decided by [`crate::negotiate`].

use semver::Version;

use super::Revision;

const LEGACY_PREFIX: &str = "Version:";
const ADAPTER_PREFIX: &str = "ADAPTER_VERSION ";
const REVISION_PREFIX: &str = "WNPRLIB_REVISION ";
const SEPARATOR: char = ';';

/// What a listener announced in its first message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Handshake {
    /// `Version:...` from the oldest listener generation.
    Legacy,

    /// `ADAPTER_VERSION ...;WNPRLIB_REVISION ...`.
    Adapter {
        /// The listener's own version, if it parses as semver.
        version: Option<Version>,
        /// The revision it speaks.
        revision: Revision,
    },

    /// Anything else.
    Unrecognized,
}

impl Handshake {
    #[must_use]
    pub fn parse(message: &str) -> Self {
        if message.starts_with(LEGACY_PREFIX) {
            return Self::Legacy;
        }

        let Some(rest) = message.strip_prefix(ADAPTER_PREFIX) else {
            return Self::Unrecognized;
        };

        let (version, revision) = rest.split_once(SEPARATOR).unwrap_or((rest, ""));
        let version = Version::parse(version.trim())
            .inspect_err(|e| debug!("listener version {version} unparsable: {e}"))
            .ok();

        let revision = match revision.trim().strip_prefix(REVISION_PREFIX.trim_end()) {
            Some(number) => match number.trim().parse::<u32>() {
                Ok(1) => Revision::Rev1,
                Ok(newer) if newer > 1 => {
                    warn!("listener speaks revision {newer}, falling back to revision 1");
                    Revision::Rev1
                }
                _ => {
                    warn!("listener revision {number} unsupported, assuming revision 1");
                    Revision::Rev1
                }
            },
            // The adapter handshake was introduced together with revision 1.
            None => Revision::Rev1,
        };

        Self::Adapter { version, revision }
    }

    /// The revision implied by the handshake.
    #[must_use]
    pub fn revision(&self) -> Revision {
        match self {
            Self::Adapter { revision, .. } => *revision,
            Self::Legacy | Self::Unrecognized => Revision::Legacy,
        }
    }
}
