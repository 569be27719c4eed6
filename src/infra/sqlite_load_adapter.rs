use anyhow::Context;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::app::ports::{EtlOutput, LoadPort, LoadSummary};
use crate::constants::{GAME_TABLE, LINESCORE_TABLE, RUNNER_PLAY_TABLE};
use crate::error::Result;

const SINK_NAME: &str = "sqlite";

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS game (
        gamepk  INTEGER PRIMARY KEY,
        fields  TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS linescore (
        gamepk                  INTEGER NOT NULL,
        inning                  INTEGER NOT NULL,
        half                    TEXT NOT NULL,
        battingteamid           INTEGER NOT NULL,
        runs                    INTEGER NOT NULL,
        battingteam_score       INTEGER NOT NULL,
        battingteam_score_diff  INTEGER NOT NULL,
        PRIMARY KEY (gamepk, inning, half)
    );
    CREATE TABLE IF NOT EXISTS runner_play (
        gamepk           INTEGER NOT NULL,
        atbatindex       INTEGER NOT NULL,
        playindex        INTEGER NOT NULL,
        runnerid         INTEGER NOT NULL,
        runnerfullname   TEXT,
        startbase        TEXT NOT NULL,
        endbase          TEXT NOT NULL,
        reachedbase      TEXT NOT NULL,
        outbase          TEXT,
        eventtype        TEXT,
        movementreason   TEXT,
        is_out           INTEGER NOT NULL,
        playid           TEXT,
        is_risp          INTEGER NOT NULL,
        is_firsttothird  INTEGER NOT NULL,
        is_secondtohome  INTEGER NOT NULL,
        PRIMARY KEY (gamepk, atbatindex, playindex, runnerid)
    );
"#;

/// SQLite sink. One transaction clears and refills all three tables, so a
/// failed load leaves the previous contents in place.
pub struct SqliteLoadAdapter {
    db_path: PathBuf,
}

impl SqliteLoadAdapter {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Open (creating if needed) the database and its tables
pub fn open_database(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// Replace the contents of `game`, `linescore` and `runner_play` in one transaction
pub fn replace_tables(conn: &mut Connection, output: &EtlOutput) -> Result<LoadSummary> {
    let tx = conn.transaction()?;
    tx.execute_batch("DELETE FROM runner_play; DELETE FROM linescore; DELETE FROM game;")?;

    {
        let mut stmt = tx.prepare("INSERT INTO game (gamepk, fields) VALUES (?1, ?2)")?;
        for game in &output.games {
            let fields = serde_json::to_string(&game.fields)?;
            stmt.execute(params![game.gamepk, fields])?;
        }
    }
    debug!("Inserted {} rows into {}", output.games.len(), GAME_TABLE);

    {
        let mut stmt = tx.prepare(
            "INSERT INTO linescore (gamepk, inning, half, battingteamid, runs, battingteam_score, battingteam_score_diff)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for row in &output.linescores {
            stmt.execute(params![
                row.gamepk,
                row.inning,
                row.half.as_str(),
                row.battingteamid,
                row.runs,
                row.battingteam_score,
                row.battingteam_score_diff,
            ])?;
        }
    }
    debug!("Inserted {} rows into {}", output.linescores.len(), LINESCORE_TABLE);

    {
        let mut stmt = tx.prepare(
            "INSERT INTO runner_play (gamepk, atbatindex, playindex, runnerid, runnerfullname, startbase, endbase,
                                      reachedbase, outbase, eventtype, movementreason, is_out, playid, is_risp,
                                      is_firsttothird, is_secondtohome)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        )?;
        for play in &output.runner_plays {
            stmt.execute(params![
                play.gamepk,
                play.atbatindex,
                play.playindex,
                play.runnerid,
                play.runnerfullname,
                play.startbase.as_str(),
                play.endbase.as_str(),
                play.reachedbase.as_str(),
                play.outbase.map(|base| base.as_str()),
                play.eventtype,
                play.movementreason,
                play.is_out,
                play.playid,
                play.is_risp,
                play.is_firsttothird,
                play.is_secondtohome,
            ])?;
        }
    }
    debug!("Inserted {} rows into {}", output.runner_plays.len(), RUNNER_PLAY_TABLE);

    tx.commit()?;
    Ok(LoadSummary::for_output(SINK_NAME, output))
}

#[async_trait::async_trait]
impl LoadPort for SqliteLoadAdapter {
    fn sink_name(&self) -> &'static str {
        SINK_NAME
    }

    async fn replace_all(&self, output: &EtlOutput) -> anyhow::Result<LoadSummary> {
        let db_path = self.db_path.clone();
        let output = output.clone();

        let summary = tokio::task::spawn_blocking(move || -> Result<LoadSummary> {
            let mut conn = open_database(&db_path)?;
            replace_tables(&mut conn, &output)
        })
        .await
        .context("SQLite load task did not complete")?
        .with_context(|| format!("Failed to replace tables in {}", self.db_path.display()))?;

        crate::observability::metrics::load::rows_written(SINK_NAME, GAME_TABLE, summary.game_rows);
        crate::observability::metrics::load::rows_written(SINK_NAME, LINESCORE_TABLE, summary.linescore_rows);
        crate::observability::metrics::load::rows_written(SINK_NAME, RUNNER_PLAY_TABLE, summary.runner_play_rows);
        info!(
            "Replaced {} ({} games, {} half-innings, {} runner plays)",
            self.db_path.display(),
            summary.game_rows,
            summary.linescore_rows,
            summary.runner_play_rows
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Base, GameRecord, Half, RunnerPlayRecord, ScoredLinescore};
    use std::collections::BTreeMap;

    fn output(gamepks: &[i64]) -> EtlOutput {
        let games = gamepks
            .iter()
            .map(|&gamepk| {
                let mut fields = BTreeMap::new();
                fields.insert("venue".to_string(), format!("Park {}", gamepk));
                GameRecord { gamepk, fields }
            })
            .collect();
        let linescores = gamepks
            .iter()
            .map(|&gamepk| ScoredLinescore {
                gamepk,
                inning: 1,
                half: Half::Top,
                battingteamid: 147,
                runs: 1,
                battingteam_score: 0,
                total_score: 0,
                battingteam_score_diff: 0,
            })
            .collect();
        let runner_plays = gamepks
            .iter()
            .map(|&gamepk| RunnerPlayRecord {
                gamepk,
                atbatindex: 0,
                playindex: 1,
                runnerid: 592450,
                runnerfullname: Some("Aaron Judge".to_string()),
                startbase: Base::Second,
                endbase: Base::Home,
                reachedbase: Base::Home,
                outbase: None,
                eventtype: Some("single".to_string()),
                movementreason: None,
                is_out: false,
                playid: None,
                is_risp: true,
                is_firsttothird: false,
                is_secondtohome: true,
            })
            .collect();
        EtlOutput {
            games,
            linescores,
            runner_plays,
        }
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn test_second_load_replaces_first() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = SqliteLoadAdapter::new(dir.path().join("db").join("mlb.db"));

        adapter.replace_all(&output(&[1, 2, 3])).await.unwrap();
        let summary = adapter.replace_all(&output(&[9])).await.unwrap();
        assert_eq!(summary.game_rows, 1);

        let conn = Connection::open(adapter.db_path()).unwrap();
        assert_eq!(count(&conn, "game"), 1);
        assert_eq!(count(&conn, "linescore"), 1);
        assert_eq!(count(&conn, "runner_play"), 1);

        let fields: String = conn
            .query_row("SELECT fields FROM game WHERE gamepk = 9", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fields, r#"{"venue":"Park 9"}"#);

        let (reached, flag): (String, bool) = conn
            .query_row(
                "SELECT reachedbase, is_secondtohome FROM runner_play WHERE gamepk = 9",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(reached, "HM");
        assert!(flag);
    }

    #[test]
    fn test_failed_load_keeps_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mlb.db");
        let mut conn = open_database(&path).unwrap();
        replace_tables(&mut conn, &output(&[1, 2])).unwrap();

        // Duplicate primary key makes the second load fail mid-way
        let mut broken = output(&[5]);
        broken.games.push(broken.games[0].clone());
        assert!(replace_tables(&mut conn, &broken).is_err());

        assert_eq!(count(&conn, "game"), 2);
        assert_eq!(count(&conn, "runner_play"), 2);
    }
}
