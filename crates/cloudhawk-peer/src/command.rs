use std::fmt;
use std::str::FromStr;

use cloudhawk_frame::CommandCode;
use serde::Serialize;

use crate::error::PeerError;

/// User-facing mowing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MowerCommand {
    Start,
    StartOnce,
    Spiral,
    Edge,
    Stop,
    Dock,
}

impl MowerCommand {
    pub const ALL: [MowerCommand; 6] = [
        Self::Start,
        Self::StartOnce,
        Self::Spiral,
        Self::Edge,
        Self::Stop,
        Self::Dock,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::StartOnce => "start_once",
            Self::Spiral => "spiral",
            Self::Edge => "edge",
            Self::Stop => "stop",
            Self::Dock => "dock",
        }
    }

    /// Wire command sent for this action.
    pub fn code(self) -> CommandCode {
        match self {
            Self::Start => CommandCode::Start,
            Self::StartOnce => CommandCode::StartOnce,
            Self::Spiral => CommandCode::SpiralCut,
            Self::Edge => CommandCode::EdgeCutOnce,
            Self::Stop => CommandCode::Stop,
            Self::Dock => CommandCode::Charge,
        }
    }
}

impl fmt::Display for MowerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MowerCommand {
    type Err = PeerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|command| command.name() == s)
            .ok_or_else(|| PeerError::UnknownCommand(s.to_string()))
    }
}
