use serde::Deserialize;
use std::collections::BTreeMap;

/// A `games.csv` row: `gamepk` plus whatever schedule columns the extract carried.
/// Header names are lowercased before deserialization.
pub type RawGameRow = BTreeMap<String, String>;

/// A `linescores.csv` row as extracted; every value may be absent
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawLinescoreRow {
    pub gamepk: Option<String>,
    pub inning: Option<String>,
    pub half: Option<String>,
    pub battingteamid: Option<String>,
    pub runs: Option<String>,
}

/// A `runners.csv` row as extracted; every value may be absent
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawRunnerRow {
    pub gamepk: Option<String>,
    pub atbatindex: Option<String>,
    pub playindex: Option<String>,
    pub runnerid: Option<String>,
    pub runnerfullname: Option<String>,
    pub originbase: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub outbase: Option<String>,
    pub isout: Option<String>,
    pub eventtype: Option<String>,
    pub movementreason: Option<String>,
    pub playid: Option<String>,
}
