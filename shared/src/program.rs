//! Uploaded Program Grammar
//!
//! A program is a list of statements, one per line:
//! ```text
//! # drive forward for two seconds, then turn the turret
//! track_left forward
//! track_right forward
//! sleep 2
//! reset
//! turret left
//! sleep 0.5
//! turret reset
//! ```

use crate::{ChannelId, Direction};
use std::time::Duration;
use thiserror::Error;

/// Errors reported while parsing a program
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgramError {
    #[error("line {line}: unknown statement {text:?}")]
    UnknownStatement { line: usize, text: String },

    #[error("line {line}: unknown direction {text:?} for {channel}")]
    UnknownDirection {
        line: usize,
        channel: ChannelId,
        text: String,
    },

    #[error("line {line}: {channel} cannot be driven {direction}")]
    UnsupportedDirection {
        line: usize,
        channel: ChannelId,
        direction: Direction,
    },

    #[error("line {line}: invalid duration {text:?}")]
    InvalidDuration { line: usize, text: String },

    #[error("line {line}: unexpected argument {text:?}")]
    TrailingArgument { line: usize, text: String },
}

/// A single program step
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Drive one channel in a direction
    Set {
        channel: ChannelId,
        direction: Direction,
    },
    /// Release one channel
    ResetChannel(ChannelId),
    /// Release every channel
    ResetAll,
    /// Pause before the next statement
    Sleep(Duration),
}

/// A parsed program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    /// Parse a program body
    pub fn parse(source: &str) -> Result<Self, ProgramError> {
        let mut statements = Vec::new();

        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let text = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            };

            let mut words = text.split_whitespace();
            let Some(head) = words.next() else {
                continue;
            };
            let arg = words.next();
            if let Some(extra) = words.next() {
                return Err(ProgramError::TrailingArgument {
                    line,
                    text: extra.to_string(),
                });
            }

            let statement = match (head, arg) {
                ("reset", None) => Statement::ResetAll,
                ("sleep", Some(secs)) => Statement::Sleep(parse_duration(line, secs)?),
                (name, Some(arg)) => match parse_channel(name) {
                    Some(channel) => parse_channel_statement(line, channel, arg)?,
                    None => {
                        return Err(ProgramError::UnknownStatement {
                            line,
                            text: text.trim().to_string(),
                        })
                    }
                },
                _ => {
                    return Err(ProgramError::UnknownStatement {
                        line,
                        text: text.trim().to_string(),
                    })
                }
            };

            statements.push(statement);
        }

        Ok(Self { statements })
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

fn parse_channel(name: &str) -> Option<ChannelId> {
    match name {
        "track_left" => Some(ChannelId::TrackLeft),
        "track_right" => Some(ChannelId::TrackRight),
        "turret" | "tower" => Some(ChannelId::Turret),
        _ => None,
    }
}

fn parse_channel_statement(
    line: usize,
    channel: ChannelId,
    arg: &str,
) -> Result<Statement, ProgramError> {
    if arg == "reset" {
        return Ok(Statement::ResetChannel(channel));
    }

    let direction = arg
        .parse::<Direction>()
        .map_err(|_| ProgramError::UnknownDirection {
            line,
            channel,
            text: arg.to_string(),
        })?;

    if !channel.pin_map().iter().any(|(d, _)| *d == direction) {
        return Err(ProgramError::UnsupportedDirection {
            line,
            channel,
            direction,
        });
    }

    Ok(Statement::Set { channel, direction })
}

fn parse_duration(line: usize, text: &str) -> Result<Duration, ProgramError> {
    text.parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ProgramError::InvalidDuration {
            line,
            text: text.to_string(),
        })
}
