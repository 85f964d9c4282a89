//! Power State Aggregate
//!
//! Owns the three actuator channels and turns their resolved state into
//! `set_output` commands for the pin daemon.

use crate::daemon::CommandSink;
use std::fmt;
use std::sync::Arc;
use tank_shared::{
    safety, ActuatorChannel, ActuatorError, ChannelId, ChannelState, DaemonCommand, Direction,
    PinId, Submit, SubmitMode,
};
use tracing::{debug, info};

/// Actuator state of the whole tank
pub struct PowerState {
    /// Channels in wire order: left track, right track, turret
    channels: [ActuatorChannel; 3],
    autosubmit: bool,
    sink: Arc<dyn CommandSink>,
}

impl PowerState {
    /// Create a power state
    ///
    /// With `autosubmit` every mutation is transmitted on the spot and each
    /// transmission arms the daemon's fallback timeout (scripted control).
    /// Without it, mutations accumulate until [`PowerState::submit`] is
    /// called (interactive control).
    pub fn new(autosubmit: bool, sink: Arc<dyn CommandSink>) -> Self {
        let mode = if autosubmit {
            SubmitMode::Immediate
        } else {
            SubmitMode::Batched
        };

        Self {
            channels: ChannelId::ALL.map(|id| ActuatorChannel::new(id, mode)),
            autosubmit,
            sink,
        }
    }

    #[cfg(test)]
    pub fn channel(&self, id: ChannelId) -> &ActuatorChannel {
        &self.channels[slot(id)]
    }

    /// Request a direction on one channel
    pub async fn set_direction(
        &mut self,
        id: ChannelId,
        direction: Direction,
    ) -> Result<(), ActuatorError> {
        let channel = &mut self.channels[slot(id)];
        let was_locked = channel.state() == ChannelState::Locked;
        let signal = channel.set_direction(direction)?;

        if !was_locked && channel.state() == ChannelState::Locked {
            debug!("[POWER] {} locked out by conflicting {}", id, direction);
        }

        self.follow(signal).await;
        Ok(())
    }

    /// Release one channel
    pub async fn reset_channel(&mut self, id: ChannelId) {
        let signal = self.channels[slot(id)].reset();
        self.follow(signal).await;
    }

    /// Release every channel
    pub async fn reset(&mut self) {
        for id in ChannelId::ALL {
            self.reset_channel(id).await;
        }
    }

    /// Pins of every channel in a concrete direction, in wire order
    pub fn output_pins(&self) -> Vec<PinId> {
        self.channels
            .iter()
            .filter_map(ActuatorChannel::pin_for_current_direction)
            .collect()
    }

    /// Transmit the current state to the pin daemon
    pub async fn submit(&self) {
        let pins = self.output_pins();
        info!(
            "[POWER] [{}] transmitting as [{}]",
            self,
            pins.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(" ")
        );

        if self.autosubmit {
            self.sink
                .send_command(DaemonCommand::SetFallbackTimeout(safety::FALLBACK_TIMEOUT_SECS))
                .await;
        }
        self.sink.send_command(DaemonCommand::SetOutput(pins)).await;
    }

    async fn follow(&self, signal: Submit) {
        if signal == Submit::Now {
            self.submit().await;
        }
    }
}

impl fmt::Display for PowerState {
    /// Concrete channels only, e.g. `LEFT: forward, TURRET: left`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for channel in &self.channels {
            if let Some(direction) = channel.direction() {
                if !first {
                    f.write_str(", ")?;
                }
                write!(f, "{}: {}", channel.id(), direction)?;
                first = false;
            }
        }
        Ok(())
    }
}

fn slot(id: ChannelId) -> usize {
    match id {
        ChannelId::TrackLeft => 0,
        ChannelId::TrackRight => 1,
        ChannelId::Turret => 2,
    }
}
