//! The legacy dialect.
//!
//! Reports are `FIELD:value` with enumerations as small integers:
//!
//! | Field     | Encoding                          |
//! |-----------|-----------------------------------|
//! | `STATE`   | playing `1`, paused `2`, else `0` |
//! | `REPEAT`  | all `2`, one `1`, none `0`        |
//! | `SHUFFLE` | `1` or `0`                        |
//!
//! Commands are `TYPE DATA`, matched case-insensitively. `SETPOSITION` is
//! irregular: its data is `<seconds>:SETPROGRESS <fraction>:` with a comma
//! as decimal separator, and stands for two seek commands at once.

use super::{parse_decimal, parse_value, Command, Field, Report, Value};
use crate::{
    capability::{PlaybackState, RepeatMode},
    error::{Error, Result},
};

const SEPARATOR: char = ':';

const PLAY_PAUSE: &str = "PLAYPAUSE";
const NEXT: &str = "NEXT";
const PREVIOUS: &str = "PREVIOUS";
const SET_POSITION: &str = "SETPOSITION";
const SET_PROGRESS: &str = "SETPROGRESS";
const SET_VOLUME: &str = "SETVOLUME";
const REPEAT: &str = "REPEAT";
const SHUFFLE: &str = "SHUFFLE";
const TOGGLE_THUMBS_UP: &str = "TOGGLETHUMBSUP";
const TOGGLE_THUMBS_DOWN: &str = "TOGGLETHUMBSDOWN";
const RATING: &str = "RATING";

#[must_use]
pub fn encode_report(report: &Report) -> String {
    let value = match &report.value {
        Value::State(state) => match state {
            PlaybackState::Playing => "1".to_owned(),
            PlaybackState::Paused => "2".to_owned(),
            PlaybackState::Stopped => "0".to_owned(),
        },
        Value::Repeat(repeat) => match repeat {
            RepeatMode::All => "2".to_owned(),
            RepeatMode::One => "1".to_owned(),
            RepeatMode::None => "0".to_owned(),
        },
        Value::Shuffle(shuffle) => u8::from(*shuffle).to_string(),
        Value::Number(number) => number.to_string(),
        Value::Text(text) => text.clone(),
    };

    format!("{}{SEPARATOR}{value}", report.field)
}

/// # Errors
///
/// Returns `InvalidArgument` if `line` has no separator, names an unknown
/// field or carries a value of the wrong type.
pub fn decode_report(line: &str) -> Result<Report> {
    let (field, data) = line
        .split_once(SEPARATOR)
        .ok_or_else(|| Error::invalid_argument(format!("{line} is not a legacy report")))?;
    let field = field.parse::<Field>()?;

    let value = parse_value(
        field,
        data,
        |data| match data {
            "1" => Ok(PlaybackState::Playing),
            "2" => Ok(PlaybackState::Paused),
            "0" => Ok(PlaybackState::Stopped),
            _ => Err(Error::invalid_argument(format!("{data} is not a state"))),
        },
        |data| match data {
            "2" => Ok(RepeatMode::All),
            "1" => Ok(RepeatMode::One),
            "0" => Ok(RepeatMode::None),
            _ => Err(Error::invalid_argument(format!("{data} is not a repeat mode"))),
        },
        |data| match data {
            "1" => Ok(true),
            "0" => Ok(false),
            _ => Err(Error::invalid_argument(format!("{data} is not a shuffle flag"))),
        },
    )?;

    Ok(Report::new(field, value))
}

/// # Errors
///
/// Returns `InvalidArgument` if a known command carries malformed data,
/// including a truncated `SETPOSITION` compound.
pub fn decode_command(line: &str) -> Result<Vec<Command>> {
    let line = line.to_uppercase();
    let (kind, data) = line.split_once(' ').unwrap_or((line.as_str(), ""));

    let commands = match kind {
        PLAY_PAUSE => vec![Command::TogglePlaying],
        NEXT => vec![Command::Next],
        PREVIOUS => vec![Command::Previous],
        SET_POSITION => {
            let (seconds, fraction) = decode_position(data)?;
            vec![
                Command::SetPositionSeconds(seconds),
                Command::SetPositionPercentage(fraction),
            ]
        }
        SET_VOLUME => vec![Command::SetVolume(Command::volume(data)?)],
        REPEAT => vec![Command::ToggleRepeat],
        SHUFFLE => vec![Command::ToggleShuffle],
        TOGGLE_THUMBS_UP => vec![Command::ToggleThumbsUp],
        TOGGLE_THUMBS_DOWN => vec![Command::ToggleThumbsDown],
        RATING => vec![Command::SetRating(Command::rating(data)?)],
        _ => {
            trace!("ignoring unknown legacy command {kind}");
            Vec::new()
        }
    };

    Ok(commands)
}

/// Decodes `<seconds>:SETPROGRESS <fraction>:`.
fn decode_position(data: &str) -> Result<(f64, f64)> {
    let truncated = || Error::invalid_argument(format!("truncated position command: {data}"));

    let mut parts = data.split(SEPARATOR);
    let seconds = parts.next().filter(|s| !s.trim().is_empty()).ok_or_else(truncated)?;
    let progress = parts.next().ok_or_else(truncated)?;
    let fraction = progress
        .trim()
        .strip_prefix(SET_PROGRESS)
        .map(str::trim)
        .filter(|fraction| !fraction.is_empty())
        .ok_or_else(truncated)?;

    Ok((parse_decimal(seconds)?, parse_decimal(fraction)?))
}

#[must_use]
pub fn error(message: &str) -> String {
    format!("Error{SEPARATOR}{message}")
}

#[must_use]
pub fn error_debug(text: &str) -> String {
    format!("ErrorD{SEPARATOR}{text}")
}
