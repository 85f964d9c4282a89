//! Interactive control tokens and their effect on the power state

use crate::power::PowerState;
use std::fmt;
use std::str::FromStr;
use tank_shared::{ActuatorError, ChannelId, Direction};

use tank_shared::ChannelId::{TrackLeft, TrackRight, Turret};
use tank_shared::Direction::{Forward, Left, Reverse, Right};

/// A single control token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    TrackLeftForward,
    TrackRightForward,
    TrackLeftReverse,
    TrackRightReverse,
    BothForward,
    BothReverse,
    /// Turn on the spot to the left by driving only the right track
    SpinLeft,
    /// Turn on the spot to the right by driving only the left track
    SpinRight,
    TurretLeft,
    TurretRight,
    /// Nothing beyond the reset every message starts with
    Stop,
}

impl ControlCommand {
    pub const ALL: [ControlCommand; 11] = [
        ControlCommand::TrackLeftForward,
        ControlCommand::TrackRightForward,
        ControlCommand::TrackLeftReverse,
        ControlCommand::TrackRightReverse,
        ControlCommand::BothForward,
        ControlCommand::BothReverse,
        ControlCommand::SpinLeft,
        ControlCommand::SpinRight,
        ControlCommand::TurretLeft,
        ControlCommand::TurretRight,
        ControlCommand::Stop,
    ];

    /// Wire token for this command
    pub fn token(&self) -> &'static str {
        match self {
            ControlCommand::TrackLeftForward => "track-left-forward",
            ControlCommand::TrackRightForward => "track-right-forward",
            ControlCommand::TrackLeftReverse => "track-left-reverse",
            ControlCommand::TrackRightReverse => "track-right-reverse",
            ControlCommand::BothForward => "both-forward",
            ControlCommand::BothReverse => "both-reverse",
            ControlCommand::SpinLeft => "spin-left",
            ControlCommand::SpinRight => "spin-right",
            ControlCommand::TurretLeft => "turret-left",
            ControlCommand::TurretRight => "turret-right",
            ControlCommand::Stop => "stop",
        }
    }

    /// Direction requests this command makes
    pub fn actions(&self) -> &'static [(ChannelId, Direction)] {
        match self {
            ControlCommand::TrackLeftForward => &[(TrackLeft, Forward)],
            ControlCommand::TrackRightForward => &[(TrackRight, Forward)],
            ControlCommand::TrackLeftReverse => &[(TrackLeft, Reverse)],
            ControlCommand::TrackRightReverse => &[(TrackRight, Reverse)],
            ControlCommand::BothForward => &[(TrackLeft, Forward), (TrackRight, Forward)],
            ControlCommand::BothReverse => &[(TrackLeft, Reverse), (TrackRight, Reverse)],
            ControlCommand::SpinLeft => &[(TrackRight, Forward)],
            ControlCommand::SpinRight => &[(TrackLeft, Forward)],
            ControlCommand::TurretLeft => &[(Turret, Left)],
            ControlCommand::TurretRight => &[(Turret, Right)],
            ControlCommand::Stop => &[],
        }
    }

    /// Apply the direction requests to `power`
    pub async fn apply(self, power: &mut PowerState) -> Result<(), ActuatorError> {
        for &(channel, direction) in self.actions() {
            power.set_direction(channel, direction).await?;
        }
        Ok(())
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Token not in the control table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownToken(pub String);

impl FromStr for ControlCommand {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControlCommand::ALL
            .into_iter()
            .find(|c| c.token() == s)
            .ok_or_else(|| UnknownToken(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::sink::RecordingSink;
    use std::sync::Arc;

    #[test]
    fn test_tokens_round_trip() {
        for command in ControlCommand::ALL {
            assert_eq!(command.token().parse::<ControlCommand>(), Ok(command));
        }
    }

    #[test]
    fn test_tokens_are_case_sensitive() {
        assert_eq!(
            "Both-Forward".parse::<ControlCommand>(),
            Err(UnknownToken("Both-Forward".into()))
        );
    }

    #[test]
    fn test_spin_drives_opposite_track() {
        assert_eq!(ControlCommand::SpinLeft.actions(), &[(TrackRight, Forward)]);
        assert_eq!(ControlCommand::SpinRight.actions(), &[(TrackLeft, Forward)]);
        assert!(ControlCommand::Stop.actions().is_empty());
    }

    #[tokio::test]
    async fn test_apply_both_reverse() {
        let sink = Arc::new(RecordingSink::new());
        let mut power = PowerState::new(false, sink.clone());

        ControlCommand::BothReverse.apply(&mut power).await.unwrap();

        assert_eq!(power.output_pins(), vec![24, 22]);
        assert!(sink.commands().is_empty());
    }
}
