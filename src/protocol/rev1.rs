//! Revision 1 of the protocol.
//!
//! Reports are `FIELD value` with enumerations spelled out symbolically
//! (`STATE PLAYING`, `REPEAT ONE`, `SHUFFLE true`). Commands are
//! `EVENT_NAME [DATA]`; `SET_POSITION` carries `<seconds>:<fraction>`.

use super::{parse_decimal, parse_value, Command, Field, Report, Value};
use crate::{
    capability::{PlaybackState, RepeatMode},
    error::{Error, Result},
};

const SEPARATOR: char = ' ';

const TOGGLE_PLAYING: &str = "TOGGLE_PLAYING";
const NEXT: &str = "NEXT";
const PREVIOUS: &str = "PREVIOUS";
const SET_POSITION: &str = "SET_POSITION";
const SET_VOLUME: &str = "SET_VOLUME";
const TOGGLE_REPEAT: &str = "TOGGLE_REPEAT";
const TOGGLE_SHUFFLE: &str = "TOGGLE_SHUFFLE";
const TOGGLE_THUMBS_UP: &str = "TOGGLE_THUMBS_UP";
const TOGGLE_THUMBS_DOWN: &str = "TOGGLE_THUMBS_DOWN";
const SET_RATING: &str = "SET_RATING";

#[must_use]
pub fn encode_report(report: &Report) -> String {
    let value = match &report.value {
        Value::State(state) => state.to_string(),
        Value::Repeat(repeat) => repeat.to_string(),
        Value::Shuffle(shuffle) => shuffle.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Text(text) => text.clone(),
    };

    format!("{}{SEPARATOR}{value}", report.field)
}

/// # Errors
///
/// Returns `InvalidArgument` if `line` names an unknown field or carries a
/// value of the wrong type.
pub fn decode_report(line: &str) -> Result<Report> {
    let (field, data) = line.split_once(SEPARATOR).unwrap_or((line, ""));
    let field = field.parse::<Field>()?;

    let value = parse_value(
        field,
        data,
        |data| match data {
            "PLAYING" => Ok(PlaybackState::Playing),
            "PAUSED" => Ok(PlaybackState::Paused),
            "STOPPED" => Ok(PlaybackState::Stopped),
            _ => Err(Error::invalid_argument(format!("{data} is not a state"))),
        },
        |data| match data {
            "ALL" => Ok(RepeatMode::All),
            "ONE" => Ok(RepeatMode::One),
            "NONE" => Ok(RepeatMode::None),
            _ => Err(Error::invalid_argument(format!("{data} is not a repeat mode"))),
        },
        |data| {
            data.parse::<bool>()
                .map_err(|e| Error::invalid_argument(format!("{data} is not a shuffle flag: {e}")))
        },
    )?;

    Ok(Report::new(field, value))
}

/// # Errors
///
/// Returns `InvalidArgument` if a known event carries malformed data.
pub fn decode_command(line: &str) -> Result<Vec<Command>> {
    let (event, data) = line.trim().split_once(SEPARATOR).unwrap_or((line.trim(), ""));

    let command = match event.to_uppercase().as_str() {
        TOGGLE_PLAYING => Command::TogglePlaying,
        NEXT => Command::Next,
        PREVIOUS => Command::Previous,
        SET_POSITION => {
            let (seconds, fraction) = data
                .split_once(':')
                .ok_or_else(|| Error::invalid_argument(format!("malformed position: {data}")))?;
            Command::SetPosition {
                seconds: parse_decimal(seconds)?,
                fraction: parse_decimal(fraction)?,
            }
        }
        SET_VOLUME => Command::SetVolume(Command::volume(data)?),
        TOGGLE_REPEAT => Command::ToggleRepeat,
        TOGGLE_SHUFFLE => Command::ToggleShuffle,
        TOGGLE_THUMBS_UP => Command::ToggleThumbsUp,
        TOGGLE_THUMBS_DOWN => Command::ToggleThumbsDown,
        SET_RATING => Command::SetRating(Command::rating(data)?),
        _ => {
            trace!("ignoring unknown event {event}");
            return Ok(Vec::new());
        }
    };

    Ok(vec![command])
}

#[must_use]
pub fn error(message: &str) -> String {
    format!("ERROR{SEPARATOR}{message}")
}

#[must_use]
pub fn error_debug(text: &str) -> String {
    format!("ERRORDEBUG{SEPARATOR}{text}")
}
