//! Latest-value-per-key stream merger

use crate::feed::{CarData, Interval, Location, Position};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A record carrying an entity key and an observation time
pub trait Timestamped {
    type Key: Ord + Copy + std::fmt::Debug;

    fn key(&self) -> Self::Key;
    fn timestamp(&self) -> DateTime<Utc>;
}

macro_rules! timestamped_by_driver {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Timestamped for $ty {
                type Key = u32;

                fn key(&self) -> u32 {
                    self.driver_number
                }

                fn timestamp(&self) -> DateTime<Utc> {
                    self.date
                }
            }
        )*
    };
}

timestamped_by_driver!(Position, Interval, Location, CarData);

/// Result of folding one batch into the map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeOutcome {
    /// Keys inserted or replaced
    pub updated: usize,
    /// Records rejected as not newer than what was stored
    pub stale: usize,
    /// Newest timestamp seen anywhere in the batch
    pub newest: Option<DateTime<Utc>>,
}

/// Newest record per key, kept across merges
///
/// A key absent from a batch keeps its previous record indefinitely; an
/// empty page never erases known state. Iteration is in key order so
/// consumers never depend on arrival order.
#[derive(Debug, Clone)]
pub struct LatestByKey<T: Timestamped> {
    entries: BTreeMap<T::Key, T>,
}

impl<T: Timestamped> Default for LatestByKey<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T: Timestamped> LatestByKey<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map holding only the newest record per key of one batch
    pub fn from_batch(batch: impl IntoIterator<Item = T>) -> Self {
        let mut map = Self::new();
        map.merge(batch);
        map
    }

    /// Fold a batch in, replacing a stored record only with a strictly newer one
    pub fn merge(&mut self, batch: impl IntoIterator<Item = T>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for record in batch {
            let ts = record.timestamp();
            outcome.newest = Some(outcome.newest.map_or(ts, |n| n.max(ts)));

            match self.entries.get(&record.key()) {
                Some(existing) if existing.timestamp() >= ts => outcome.stale += 1,
                _ => {
                    self.entries.insert(record.key(), record);
                    outcome.updated += 1;
                }
            }
        }

        outcome
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }
}
