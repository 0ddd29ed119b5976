//! Keyset pagination for chunked scans.
//!
//! Offset paging skips rows when earlier rows drop out of the filter between pages (a
//! journal that gets posted no longer matches "approved"). Keyset paging resumes strictly
//! after the last key seen instead.

use serde::{Deserialize, Serialize};

/// Request for one page of a keyset-ordered scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysetPage<K> {
    /// Resume strictly after this key (`None` starts from the beginning).
    pub after: Option<K>,
    /// Number of items per page.
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_size() -> u32 {
    100
}

impl<K> KeysetPage<K> {
    /// First page of the given size. A size of zero is treated as one.
    #[must_use]
    pub fn first(size: u32) -> Self {
        Self {
            after: None,
            size: size.max(1),
        }
    }

    /// Page following the given key.
    #[must_use]
    pub fn next(&self, last: K) -> Self {
        Self {
            after: Some(last),
            size: self.size,
        }
    }

    /// Returns the limit for database queries.
    #[must_use]
    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

impl<K> Default for KeysetPage<K> {
    fn default() -> Self {
        Self::first(default_size())
    }
}
