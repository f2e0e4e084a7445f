use serde::Serialize;
use std::fmt;

use super::phase::JumpType;

/// フレームごとに発生する一時的なフィードバック
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Feedback {
    JumpTypeInstruction { jump_type: JumpType },
    CountermovementStarted,
    CountermovementAborted,
    InsufficientDepth,
    SpeedUpCountermovement,
    TakingOff,
    WatchKneePosition,
    PushThroughAnkles,
    ForceTakeoff,
    Airborne,
    Landing,
    JumpVoided,
    StiffLanding,
    AlignTrunk,
    KneesOutOnLanding,
    GoodJump { height_m: f64 },
    JumpWithErrors,
    Rest,
    ReadyForNextJump,
}

impl Feedback {
    /// 助言のみで、姿勢の正否には影響しない
    pub fn is_advisory(&self) -> bool {
        matches!(self, Self::SpeedUpCountermovement | Self::ForceTakeoff)
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JumpTypeInstruction { jump_type } => match jump_type {
                JumpType::Cmj => f.write_str("CMJ: start standing, bend quickly and jump"),
                JumpType::Sqj => f.write_str("SQJ: hold the squat position for 3 s before jumping"),
                JumpType::Abalakov => f.write_str("ABALAKOV: swing your arms actively to drive the jump"),
            },
            Self::CountermovementStarted => f.write_str("Countermovement started"),
            Self::CountermovementAborted => f.write_str("Countermovement abandoned, reset and try again"),
            Self::InsufficientDepth => f.write_str("Not deep enough! Bend your knees more"),
            Self::SpeedUpCountermovement => f.write_str("Speed up the countermovement"),
            Self::TakingOff => f.write_str("Taking off!"),
            Self::WatchKneePosition => f.write_str("Watch your knee position"),
            Self::PushThroughAnkles => f.write_str("Push through your ankles"),
            Self::ForceTakeoff => f.write_str("Drive the takeoff harder"),
            Self::Airborne => f.write_str("In the air!"),
            Self::Landing => f.write_str("Landing"),
            Self::JumpVoided => f.write_str("Jump not valid (flight time or height too low)"),
            Self::StiffLanding => f.write_str("Stiff landing! Bend your knees more on impact"),
            Self::AlignTrunk => f.write_str("Keep your trunk aligned on landing"),
            Self::KneesOutOnLanding => f.write_str("Push your knees out on landing"),
            Self::GoodJump { height_m } => write!(f, "GOOD JUMP! Height: {:.1} cm", height_m * 100.0),
            Self::JumpWithErrors => f.write_str("Jump with errors"),
            Self::Rest => f.write_str("Rest 15 seconds before the next jump"),
            Self::ReadyForNextJump => f.write_str("Ready for the next jump"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_set() {
        assert!(Feedback::SpeedUpCountermovement.is_advisory());
        assert!(Feedback::ForceTakeoff.is_advisory());
        assert!(!Feedback::StiffLanding.is_advisory());
        assert!(!Feedback::TakingOff.is_advisory());
    }

    #[test]
    fn test_good_jump_message() {
        let msg = Feedback::GoodJump { height_m: 0.354 }.to_string();
        assert_eq!(msg, "GOOD JUMP! Height: 35.4 cm");
    }
}
