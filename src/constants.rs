/// Source file and table name constants shared by discovery, transforms and sinks

// Extract file names, as they appear inside each dated folder
pub const GAMES_FILE: &str = "games.csv";
pub const LINESCORES_FILE: &str = "linescores.csv";
pub const RUNNERS_FILE: &str = "runners.csv";

// Destination table names
pub const GAME_TABLE: &str = "game";
pub const LINESCORE_TABLE: &str = "linescore";
pub const RUNNER_PLAY_TABLE: &str = "runner_play";

/// Substring of `eventtype` that marks a home run
pub const HOME_RUN_EVENT: &str = "home_run";

/// Separator used when several distinct labels are merged into one column
pub const LABEL_SEPARATOR: &str = ",";
