//! Tank Shared Types
//!
//! This crate provides the actuator model, the pin daemon wire codec and the
//! uploaded program grammar shared by the tank control plane.

pub mod actuator;
pub mod codec;
pub mod program;

use std::fmt;
use std::str::FromStr;

pub use actuator::{ActuatorChannel, ActuatorError, ChannelState, Submit, SubmitMode};
pub use codec::{CodecError, DaemonCommand, LineDecoder};
pub use program::{Program, ProgramError, Statement};

/// Hardware pin identifier as understood by the pin daemon
pub type PinId = u8;

/// Pin bindings for tank hardware version 2
pub mod pins {
    use crate::PinId;

    pub const TRACK_LEFT_FORWARD: PinId = 26;
    pub const TRACK_LEFT_REVERSE: PinId = 24;
    pub const TRACK_RIGHT_FORWARD: PinId = 23;
    pub const TRACK_RIGHT_REVERSE: PinId = 22;
    pub const TURRET_LEFT: PinId = 21;
    pub const TURRET_RIGHT: PinId = 19;
}

/// Safety parameters for the system
pub mod safety {
    /// Seconds the daemon keeps driving pins without a fresh command while a
    /// program is in control
    pub const FALLBACK_TIMEOUT_SECS: u32 = 15;
}

/// Logical direction an actuator can be driven in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Reverse,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Direction::Forward),
            "reverse" => Ok(Direction::Reverse),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(()),
        }
    }
}

/// The physical actuators of the tank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    TrackLeft,
    TrackRight,
    Turret,
}

impl ChannelId {
    /// All channels in wire order
    pub const ALL: [ChannelId; 3] = [ChannelId::TrackLeft, ChannelId::TrackRight, ChannelId::Turret];

    /// Name used in diagnostic output
    pub fn name(&self) -> &'static str {
        match self {
            ChannelId::TrackLeft => "LEFT",
            ChannelId::TrackRight => "RIGHT",
            ChannelId::Turret => "TURRET",
        }
    }

    /// Fixed direction to pin bindings for this channel
    pub fn pin_map(&self) -> [(Direction, PinId); 2] {
        match self {
            ChannelId::TrackLeft => [
                (Direction::Forward, pins::TRACK_LEFT_FORWARD),
                (Direction::Reverse, pins::TRACK_LEFT_REVERSE),
            ],
            ChannelId::TrackRight => [
                (Direction::Forward, pins::TRACK_RIGHT_FORWARD),
                (Direction::Reverse, pins::TRACK_RIGHT_REVERSE),
            ],
            ChannelId::Turret => [
                (Direction::Left, pins::TURRET_LEFT),
                (Direction::Right, pins::TURRET_RIGHT),
            ],
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
