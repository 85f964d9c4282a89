//! Actuator Channel State Machine
//!
//! Tracks the requested direction of one actuator and resolves conflicting
//! requests that arrive within the same control cycle.

use crate::{ChannelId, Direction, PinId};
use thiserror::Error;

/// Direction state of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No direction requested, drive neither pin
    #[default]
    Unset,
    /// Driving the pin bound to this direction
    Driving(Direction),
    /// Conflicting directions were requested, drive neither pin until reset
    Locked,
}

/// How a channel propagates mutations to the pin daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// Every mutation is transmitted by the owner straight away
    Immediate,
    /// Mutations accumulate until the owner submits the cycle
    Batched,
}

/// Signal returned to the owning aggregate after a mutation
#[must_use = "an Immediate channel expects its owner to submit"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    /// Owner must submit now
    Now,
    /// Owner submits at the end of the cycle
    Deferred,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    #[error("{channel} has no pin for direction {direction}")]
    UnsupportedDirection {
        channel: ChannelId,
        direction: Direction,
    },
}

/// One actuator with its two direction pins
#[derive(Debug, Clone)]
pub struct ActuatorChannel {
    id: ChannelId,
    pins: [(Direction, PinId); 2],
    state: ChannelState,
    mode: SubmitMode,
}

impl ActuatorChannel {
    /// Create a channel with the fixed pin bindings of `id`
    pub fn new(id: ChannelId, mode: SubmitMode) -> Self {
        Self {
            id,
            pins: id.pin_map(),
            state: ChannelState::Unset,
            mode,
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn mode(&self) -> SubmitMode {
        self.mode
    }

    /// Concrete direction, if any
    pub fn direction(&self) -> Option<Direction> {
        match self.state {
            ChannelState::Driving(direction) => Some(direction),
            ChannelState::Unset | ChannelState::Locked => None,
        }
    }

    /// Whether this channel has a pin bound to `direction`
    pub fn supports(&self, direction: Direction) -> bool {
        self.pins.iter().any(|(d, _)| *d == direction)
    }

    /// Request a direction
    ///
    /// Immediate channels take the new direction unconditionally. Batched
    /// channels lock out when a second, different direction is requested
    /// before the next reset.
    pub fn set_direction(&mut self, direction: Direction) -> Result<Submit, ActuatorError> {
        if !self.supports(direction) {
            return Err(ActuatorError::UnsupportedDirection {
                channel: self.id,
                direction,
            });
        }

        match self.mode {
            SubmitMode::Immediate => {
                self.state = ChannelState::Driving(direction);
                Ok(Submit::Now)
            }
            SubmitMode::Batched => {
                self.state = next_batched_state(self.state, direction);
                Ok(Submit::Deferred)
            }
        }
    }

    /// Clear the direction (and any lockout)
    pub fn reset(&mut self) -> Submit {
        self.state = ChannelState::Unset;
        self.submit_signal()
    }

    /// Pin to drive for the current state, `None` when unset or locked
    pub fn pin_for_current_direction(&self) -> Option<PinId> {
        let direction = self.direction()?;
        self.pins
            .iter()
            .find(|(d, _)| *d == direction)
            .map(|(_, pin)| *pin)
    }

    fn submit_signal(&self) -> Submit {
        match self.mode {
            SubmitMode::Immediate => Submit::Now,
            SubmitMode::Batched => Submit::Deferred,
        }
    }
}

/// Batched transition table
fn next_batched_state(current: ChannelState, requested: Direction) -> ChannelState {
    match current {
        ChannelState::Unset => ChannelState::Driving(requested),
        ChannelState::Driving(direction) if direction == requested => current,
        ChannelState::Driving(_) => ChannelState::Locked,
        ChannelState::Locked => ChannelState::Locked,
    }
}
