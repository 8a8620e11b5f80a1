use std::fmt;

use crate::{
    capability::Player,
    error::{Error, Result},
};

/// One capability invocation requested by a listener.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command {
    TogglePlaying,
    Next,
    Previous,
    /// Seek to an absolute position in seconds.
    SetPositionSeconds(f64),
    /// Seek to a fraction of the duration.
    SetPositionPercentage(f64),
    /// Seek with both representations.
    SetPosition { seconds: f64, fraction: f64 },
    SetVolume(u8),
    ToggleRepeat,
    ToggleShuffle,
    ToggleThumbsUp,
    ToggleThumbsDown,
    SetRating(u8),
}

impl Command {
    const MAX_VOLUME: u8 = 100;
    const MAX_RATING: u8 = 5;

    /// Invokes the command on `player`.
    ///
    /// # Errors
    ///
    /// Propagates whatever error the player returns.
    pub fn apply(self, player: &mut dyn Player) -> Result<()> {
        match self {
            Self::TogglePlaying => player.toggle_playing(),
            Self::Next => player.next(),
            Self::Previous => player.previous(),
            Self::SetPositionSeconds(seconds) => player.set_position_seconds(seconds),
            Self::SetPositionPercentage(fraction) => player.set_position_percentage(fraction),
            Self::SetPosition { seconds, fraction } => player.set_position(seconds, fraction),
            Self::SetVolume(volume) => player.set_volume(volume),
            Self::ToggleRepeat => player.toggle_repeat(),
            Self::ToggleShuffle => player.toggle_shuffle(),
            Self::ToggleThumbsUp => player.toggle_thumbs_up(),
            Self::ToggleThumbsDown => player.toggle_thumbs_down(),
            Self::SetRating(rating) => player.set_rating(rating),
        }
    }

    /// Parses integer volume data, clamped to 100.
    pub(super) fn volume(data: &str) -> Result<u8> {
        Self::integer(data, Self::MAX_VOLUME)
    }

    /// Parses integer rating data, clamped to 5.
    pub(super) fn rating(data: &str) -> Result<u8> {
        Self::integer(data, Self::MAX_RATING)
    }

    fn integer(data: &str, max: u8) -> Result<u8> {
        let data = data.trim();
        if data.is_empty() {
            return Err(Error::invalid_argument("missing integer argument"));
        }
        let value = data.parse::<i64>()?;
        Ok(u8::try_from(value.clamp(0, i64::from(max))).unwrap_or(max))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TogglePlaying => write!(f, "toggle playing"),
            Self::Next => write!(f, "next"),
            Self::Previous => write!(f, "previous"),
            Self::SetPositionSeconds(seconds) => write!(f, "set position to {seconds}s"),
            Self::SetPositionPercentage(fraction) => {
                write!(f, "set position to {:.1}%", fraction * 100.0)
            }
            Self::SetPosition { seconds, fraction } => write!(
                f,
                "set position to {seconds}s ({:.1}%)",
                fraction * 100.0
            ),
            Self::SetVolume(volume) => write!(f, "set volume to {volume}"),
            Self::ToggleRepeat => write!(f, "toggle repeat"),
            Self::ToggleShuffle => write!(f, "toggle shuffle"),
            Self::ToggleThumbsUp => write!(f, "toggle thumbs up"),
            Self::ToggleThumbsDown => write!(f, "toggle thumbs down"),
            Self::SetRating(rating) => write!(f, "set rating to {rating}"),
        }
    }
}
