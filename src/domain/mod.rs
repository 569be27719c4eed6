//! Typed record shapes flowing through the three transforms.
//!
//! Column names serialize in lowercase, which is the shape the load sinks
//! expect.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type GamePk = i64;
pub type TeamId = i64;
pub type PlayerId = i64;

/// One team's turn at bat within an inning
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Half {
    Top,
    Bottom,
}

impl Half {
    pub fn parse(raw: &str) -> Option<Half> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "top" | "t" => Some(Half::Top),
            "bottom" | "bot" | "b" => Some(Half::Bottom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Half::Top => "top",
            Half::Bottom => "bottom",
        }
    }
}

impl fmt::Display for Half {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positions along the base path, in running order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Base {
    /// Batter's box, i.e. not yet on base
    #[serde(rename = "B")]
    Batter,
    #[serde(rename = "1B")]
    First,
    #[serde(rename = "2B")]
    Second,
    #[serde(rename = "3B")]
    Third,
    #[serde(rename = "HM")]
    Home,
}

impl Base {
    pub fn as_str(&self) -> &'static str {
        match self {
            Base::Batter => "B",
            Base::First => "1B",
            Base::Second => "2B",
            Base::Third => "3B",
            Base::Home => "HM",
        }
    }

    /// Second or third base
    pub fn is_scoring_position(&self) -> bool {
        matches!(self, Base::Second | Base::Third)
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshest schedule row for a game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub gamepk: GamePk,
    /// Every other schedule column, lowercased, empty values omitted
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

/// One half-inning of a game's linescore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinescoreRecord {
    pub gamepk: GamePk,
    pub inning: u32,
    pub half: Half,
    pub battingteamid: TeamId,
    pub runs: u32,
}

/// A linescore row with the score at the start of its half-inning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredLinescore {
    pub gamepk: GamePk,
    pub inning: u32,
    pub half: Half,
    pub battingteamid: TeamId,
    pub runs: u32,
    /// Batting team's runs before this half-inning
    pub battingteam_score: i64,
    /// Both teams' runs before this half-inning
    #[serde(skip)]
    pub total_score: i64,
    /// Batting team's lead (negative when trailing) before this half-inning
    pub battingteam_score_diff: i64,
}

/// One observed leg of a runner's movement on a play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerMovementSegment {
    pub gamepk: GamePk,
    pub atbatindex: u32,
    pub playindex: u32,
    pub runnerid: PlayerId,
    pub runnerfullname: Option<String>,
    /// Base the runner occupied when the play began
    pub startbase: Base,
    /// Base this leg began from
    pub start: Base,
    pub endbase: Base,
    pub outbase: Option<Base>,
    pub is_out: bool,
    pub eventtype: Option<String>,
    pub movementreason: Option<String>,
    pub playid: Option<String>,
}

/// Identifies one runner on one play
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayKey {
    pub gamepk: GamePk,
    pub atbatindex: u32,
    pub playindex: u32,
    pub runnerid: PlayerId,
}

impl RunnerMovementSegment {
    pub fn play_key(&self) -> PlayKey {
        PlayKey {
            gamepk: self.gamepk,
            atbatindex: self.atbatindex,
            playindex: self.playindex,
            runnerid: self.runnerid,
        }
    }
}

/// All segments of one runner on one play, merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerPlayRecord {
    pub gamepk: GamePk,
    pub atbatindex: u32,
    pub playindex: u32,
    pub runnerid: PlayerId,
    pub runnerfullname: Option<String>,
    pub startbase: Base,
    pub endbase: Base,
    pub reachedbase: Base,
    pub outbase: Option<Base>,
    pub eventtype: Option<String>,
    pub movementreason: Option<String>,
    pub is_out: bool,
    pub playid: Option<String>,
    pub is_risp: bool,
    pub is_firsttothird: bool,
    pub is_secondtohome: bool,
}
