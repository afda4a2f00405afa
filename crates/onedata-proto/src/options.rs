//! Per-call query options.

use serde::{Deserialize, Serialize};

/// Options controlling a select or select-all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Maximum number of rows to return.
    pub max_results: Option<u32>,
    /// Number of rows to skip.
    pub offset: Option<u32>,
    /// Skip the cache and query the database.
    pub force_database: bool,
    /// Connection identifier overriding the configured default.
    pub connection: Option<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_results(mut self, max: u32) -> Self {
        self.max_results = Some(max);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    pub fn force_database(mut self) -> Self {
        self.force_database = true;
        self
    }

    /// Check if paging restricts the result set.
    pub fn is_paged(&self) -> bool {
        self.max_results.is_some() || self.offset.is_some()
    }

    /// Apply offset and limit to an in-memory result set.
    pub fn page<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = self.offset.unwrap_or(0) as usize;
        let take = self.max_results.map(|m| m as usize).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(take).collect()
    }
}
