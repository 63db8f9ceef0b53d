//! Pagination policy enforcement.

use serde::{Deserialize, Serialize};

/// Sentinel for a disabled ceiling or default.
pub const DISABLED: i64 = -1;

/// Configured ceilings and defaults. Any negative value means disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationPolicy {
    pub max_page_size: i64,
    pub max_total_results: i64,
    pub default_page_size: i64,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            max_page_size: 1000,
            max_total_results: DISABLED,
            default_page_size: 100,
        }
    }
}

impl PaginationPolicy {
    /// A policy that never limits anything.
    pub fn unlimited() -> Self {
        Self {
            max_page_size: DISABLED,
            max_total_results: DISABLED,
            default_page_size: DISABLED,
        }
    }

    fn enabled(value: i64) -> Option<u64> {
        u64::try_from(value).ok()
    }
}

/// Effective limit and offset after applying a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// `None` means the query is unlimited.
    pub limit: Option<u64>,
    pub offset: u64,
}

/// Apply `policy` to the requested limit and offset.
///
/// Steps run in a fixed order: clamp the offset, apply the default page
/// size, cap at the maximum page size, then cap by what remains of the
/// total-results window. An offset past that window yields `limit = 0`.
pub fn normalize(
    requested_limit: Option<u64>,
    requested_offset: Option<i64>,
    policy: &PaginationPolicy,
) -> Pagination {
    let offset = requested_offset.map_or(0, |o| o.max(0).unsigned_abs());

    let mut limit = requested_limit.or_else(|| PaginationPolicy::enabled(policy.default_page_size));

    if let Some(max_page) = PaginationPolicy::enabled(policy.max_page_size) {
        limit = limit.map(|l| l.min(max_page));
    }

    if let Some(max_total) = PaginationPolicy::enabled(policy.max_total_results) {
        let remaining = max_total.saturating_sub(offset);
        limit = Some(limit.map_or(remaining, |l| l.min(remaining)));
    }

    Pagination { limit, offset }
}
