//! Freshness resolution across repeated extraction batches.
//!
//! Every logical record may appear once per extraction batch. Exactly one
//! survives per natural key: the one from the latest batch. Among extracts of
//! the same batch the one that arrived last wins, so the result depends only on
//! batch dates and input order. The batch tag is dropped from the output.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::domain::{Base, GamePk, GameRecord, Half, LinescoreRecord, PlayKey, RunnerMovementSegment};
use crate::types::{Extract, ExtractionBatch};

/// Identity of a record across extraction batches
pub trait NaturalKey {
    type Key: Ord + Clone + Debug;

    fn natural_key(&self) -> Self::Key;
}

impl NaturalKey for GameRecord {
    type Key = GamePk;

    fn natural_key(&self) -> GamePk {
        self.gamepk
    }
}

impl NaturalKey for LinescoreRecord {
    type Key = (GamePk, u32, Half);

    fn natural_key(&self) -> Self::Key {
        (self.gamepk, self.inning, self.half)
    }
}

impl NaturalKey for RunnerMovementSegment {
    type Key = (PlayKey, Base, Base);

    fn natural_key(&self) -> Self::Key {
        (self.play_key(), self.start, self.endbase)
    }
}

/// Surviving records, ordered by natural key
#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicated<T> {
    pub records: Vec<T>,
    /// Extracts that lost to a fresher (or later-arriving) one
    pub superseded: usize,
}

/// Whether `candidate` replaces `current` for the same key.
/// Later batch wins; an equal batch wins too because it arrived later.
pub fn is_fresher(candidate: &ExtractionBatch, current: &ExtractionBatch) -> bool {
    candidate >= current
}

/// Keep one record per natural key, preferring the latest extraction batch.
pub fn resolve_freshest<T, I>(extracts: I) -> Deduplicated<T>
where
    T: NaturalKey,
    I: IntoIterator<Item = Extract<T>>,
{
    let mut winners: BTreeMap<T::Key, Extract<T>> = BTreeMap::new();
    let mut superseded = 0;

    for extract in extracts {
        let key = extract.record.natural_key();
        match winners.get(&key) {
            Some(current) if !is_fresher(&extract.batch, &current.batch) => {
                superseded += 1;
            }
            Some(_) => {
                superseded += 1;
                winners.insert(key, extract);
            }
            None => {
                winners.insert(key, extract);
            }
        }
    }

    Deduplicated {
        records: winners.into_values().map(|winner| winner.record).collect(),
        superseded,
    }
}
