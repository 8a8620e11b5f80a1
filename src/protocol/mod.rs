//! Wire protocol spoken with WebNowPlaying listeners.
//!
//! Listeners connect over a local WebSocket and exchange one UTF-8 text
//! line per frame. Two incompatible dialects exist:
//!
//! * [`legacy`] - colon-delimited reports with numeric enumerations
//!   (`STATE:1`, `REPEAT:2`) and compound commands such as
//!   `SETPOSITION 34:SETPROGRESS 0,55:`
//! * [`rev1`] - space-delimited reports with symbolic enumerations
//!   (`STATE PLAYING`, `REPEAT ALL`) and `EVENT_NAME [DATA]` commands
//!
//! Which dialect a listener speaks is determined from its first message by
//! [`handshake`]. The types shared by both dialects live here: the
//! [`Revision`] itself, the reported [`Field`]s with their [`Value`]s, and
//! the [`Command`]s a listener can send.
//!
//! All functions in this module tree are pure: they neither touch sockets
//! nor the active player.

pub mod command;
pub mod handshake;
pub mod legacy;
pub mod rev1;

use std::{fmt, str::FromStr};

pub use command::Command;

use crate::{
    capability::{PlaybackState, RepeatMode},
    error::{Error, Result},
};

/// The protocol dialect negotiated with one listener.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Revision {
    /// The original dialect, spoken by listeners that announce themselves
    /// with `Version:` or not at all.
    Legacy,
    /// Revision 1, announced with `WNPRLIB_REVISION 1`.
    Rev1,
}

impl Revision {
    /// Encodes one report line.
    #[must_use]
    pub fn encode(self, report: &Report) -> String {
        match self {
            Self::Legacy => legacy::encode_report(report),
            Self::Rev1 => rev1::encode_report(report),
        }
    }

    /// Decodes one report line, as a listener would.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the line is not a well-formed report.
    pub fn decode(self, line: &str) -> Result<Report> {
        match self {
            Self::Legacy => legacy::decode_report(line),
            Self::Rev1 => rev1::decode_report(line),
        }
    }

    /// Decodes one inbound command line into the capability invocations it
    /// stands for. Unknown commands decode to an empty list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a known command carries malformed data.
    pub fn decode_command(self, line: &str) -> Result<Vec<Command>> {
        match self {
            Self::Legacy => legacy::decode_command(line),
            Self::Rev1 => rev1::decode_command(line),
        }
    }

    /// Encodes the two-line error form: a human readable `message` and the
    /// raw `debug` text of the underlying failure.
    #[must_use]
    pub fn error_lines(self, message: &str, debug: &str) -> [String; 2] {
        match self {
            Self::Legacy => [legacy::error(message), legacy::error_debug(debug)],
            Self::Rev1 => [rev1::error(message), rev1::error_debug(debug)],
        }
    }

    /// Encodes a single human readable error line.
    #[must_use]
    pub fn error_line(self, message: &str) -> String {
        match self {
            Self::Legacy => legacy::error(message),
            Self::Rev1 => rev1::error(message),
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Rev1 => write!(f, "1"),
        }
    }
}

/// A field of the now-playing state, in the order reports are sent.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Field {
    State,
    Player,
    Title,
    Artist,
    Album,
    Cover,
    Duration,
    Position,
    Volume,
    Rating,
    Repeat,
    Shuffle,
}

impl Field {
    /// Every field, in report order.
    pub const ALL: [Field; 12] = [
        Field::State,
        Field::Player,
        Field::Title,
        Field::Artist,
        Field::Album,
        Field::Cover,
        Field::Duration,
        Field::Position,
        Field::Volume,
        Field::Rating,
        Field::Repeat,
        Field::Shuffle,
    ];

    const STATE: &'static str = "STATE";
    const PLAYER: &'static str = "PLAYER";
    const TITLE: &'static str = "TITLE";
    const ARTIST: &'static str = "ARTIST";
    const ALBUM: &'static str = "ALBUM";
    const COVER: &'static str = "COVER";
    const DURATION: &'static str = "DURATION";
    const POSITION: &'static str = "POSITION";
    const VOLUME: &'static str = "VOLUME";
    const RATING: &'static str = "RATING";
    const REPEAT: &'static str = "REPEAT";
    const SHUFFLE: &'static str = "SHUFFLE";

    /// Wire name of the field, shared by both revisions.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::State => Self::STATE,
            Self::Player => Self::PLAYER,
            Self::Title => Self::TITLE,
            Self::Artist => Self::ARTIST,
            Self::Album => Self::ALBUM,
            Self::Cover => Self::COVER,
            Self::Duration => Self::DURATION,
            Self::Position => Self::POSITION,
            Self::Volume => Self::VOLUME,
            Self::Rating => Self::RATING,
            Self::Repeat => Self::REPEAT,
            Self::Shuffle => Self::SHUFFLE,
        }
    }

    /// Human readable name, used in error lines.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Player => "player",
            Self::Title => "title",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Cover => "cover",
            Self::Duration => "duration",
            Self::Position => "position",
            Self::Volume => "volume",
            Self::Rating => "rating",
            Self::Repeat => "repeat",
            Self::Shuffle => "shuffle",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| Error::invalid_argument(format!("{s} is not a known field")))
    }
}

/// The value of one [`Field`], already rounded where numeric.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Value {
    State(PlaybackState),
    Text(String),
    Number(i64),
    Repeat(RepeatMode),
    Shuffle(bool),
}

/// One outbound report line before encoding.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Report {
    pub field: Field,
    pub value: Value,
}

impl Report {
    #[must_use]
    pub fn new(field: Field, value: Value) -> Self {
        Self { field, value }
    }
}

/// Parses the value part of a report line for `field`, given the way the
/// revision spells enumerations.
fn parse_value<S, R, B>(
    field: Field,
    data: &str,
    state: S,
    repeat: R,
    shuffle: B,
) -> Result<Value>
where
    S: FnOnce(&str) -> Result<PlaybackState>,
    R: FnOnce(&str) -> Result<RepeatMode>,
    B: FnOnce(&str) -> Result<bool>,
{
    let value = match field {
        Field::State => Value::State(state(data)?),
        Field::Repeat => Value::Repeat(repeat(data)?),
        Field::Shuffle => Value::Shuffle(shuffle(data)?),
        Field::Duration | Field::Position | Field::Volume | Field::Rating => {
            Value::Number(data.parse()?)
        }
        Field::Player | Field::Title | Field::Artist | Field::Album | Field::Cover => {
            Value::Text(data.to_owned())
        }
    };
    Ok(value)
}

/// Parses a decimal number that may use a comma as decimal separator.
fn parse_decimal(data: &str) -> Result<f64> {
    Ok(data.trim().replace(',', ".").parse::<f64>()?)
}
