//! Per-model row cache.
//!
//! A cache is [`Absent`](CacheState::Absent) until the first query fills
//! it. A select-all without paging makes it [`Full`](CacheState::Full): it
//! then holds every row of the table. Individual selects only add what they
//! fetched, leaving it [`Partial`](CacheState::Partial). Expiration drops
//! everything back to `Absent`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use onedata_proto::{Row, Value};
use serde::{Deserialize, Serialize};

/// Coverage of a model's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheState {
    Absent,
    Partial,
    Full,
}

/// Rows of one model keyed by primary key.
#[derive(Debug, Clone)]
pub struct DataCache {
    key_column: String,
    expiration: Duration,
    /// New rows go first, matching a `DateCreated DESC` ordering.
    newest_first: bool,
    state: CacheState,
    /// Rows by key string, in result order.
    rows: IndexMap<String, Row>,
    last_refresh: Option<DateTime<Utc>>,
}

impl DataCache {
    pub fn new(key_column: impl Into<String>, expiration: Duration) -> Self {
        Self {
            key_column: key_column.into(),
            expiration,
            newest_first: false,
            state: CacheState::Absent,
            rows: IndexMap::new(),
            last_refresh: None,
        }
    }

    pub fn with_newest_first(mut self, newest_first: bool) -> Self {
        self.newest_first = newest_first;
        self
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    /// Cached rows in result order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// Look up a row by primary key value.
    pub fn get(&self, key: &Value) -> Option<&Row> {
        self.rows.get(&key.key_string())
    }

    /// Check if more than `expiration` has elapsed since the last refresh.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_refresh else {
            return false;
        };
        match chrono::Duration::from_std(self.expiration) {
            Ok(window) => last.checked_add_signed(window).is_some_and(|deadline| now > deadline),
            Err(_) => false,
        }
    }

    /// Reset if expired. Returns true when the cache was dropped.
    pub fn check_expired(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_expired(now) {
            return false;
        }
        tracing::debug!(
            key = %self.key_column,
            rows = self.rows.len(),
            "cache expired"
        );
        self.reset();
        true
    }

    /// Drop every row and go back to `Absent`.
    pub fn reset(&mut self) {
        self.rows.clear();
        self.state = CacheState::Absent;
        self.last_refresh = None;
    }

    /// Replace the contents with the complete table.
    pub fn fill(&mut self, rows: Vec<Row>, now: DateTime<Utc>) {
        self.rows.clear();
        for row in rows {
            if let Some(key) = self.key_of(&row) {
                self.rows.insert(key, row);
            }
        }
        self.state = CacheState::Full;
        self.last_refresh = Some(now);
    }

    /// Merge rows fetched by a filtered query.
    ///
    /// An absent cache becomes partial and starts its expiration window;
    /// merging into a partial or full cache keeps the window.
    pub fn merge(&mut self, rows: Vec<Row>, now: DateTime<Utc>) {
        if self.state == CacheState::Absent {
            self.state = CacheState::Partial;
            self.last_refresh = Some(now);
        }
        if !self.newest_first {
            for row in rows {
                self.upsert(row);
            }
            return;
        }
        // Unseen rows go to the front as one block, keeping the query order.
        let mut fresh = IndexMap::with_capacity(rows.len() + self.rows.len());
        for row in rows {
            let Some(key) = self.key_of(&row) else {
                continue;
            };
            match self.rows.get_mut(&key) {
                Some(cached) => *cached = row,
                None => {
                    fresh.insert(key, row);
                }
            }
        }
        if fresh.is_empty() {
            return;
        }
        fresh.extend(self.rows.drain(..));
        self.rows = fresh;
    }

    /// Insert or replace a row. Ignored while absent.
    pub fn upsert(&mut self, row: Row) {
        if self.state == CacheState::Absent {
            return;
        }
        let Some(key) = self.key_of(&row) else {
            return;
        };
        match self.rows.get_mut(&key) {
            Some(cached) => *cached = row,
            None if self.newest_first => {
                self.rows.shift_insert(0, key, row);
            }
            None => {
                self.rows.insert(key, row);
            }
        }
    }

    /// Overlay the non-null columns of `changes` on the cached row with the
    /// same key. Returns false when no such row is cached.
    pub fn merge_update(&mut self, changes: &Row) -> bool {
        let Some(key) = self.key_of(changes) else {
            return false;
        };
        match self.rows.get_mut(&key) {
            Some(cached) => {
                cached.merge_non_null(changes);
                true
            }
            None => false,
        }
    }

    /// Remove a row by primary key value.
    pub fn remove(&mut self, key: &Value) -> Option<Row> {
        self.rows.shift_remove(&key.key_string())
    }

    fn key_of(&self, row: &Row) -> Option<String> {
        match row.get(&self.key_column) {
            Some(value) if !value.is_null() => Some(value.key_string()),
            _ => {
                tracing::warn!(key = %self.key_column, "row without primary key not cached");
                None
            }
        }
    }
}
