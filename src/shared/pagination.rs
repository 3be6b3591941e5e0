//! Paginated list envelope used by every collection endpoint.

use serde::Serialize;

/// `{ data, count, page, size }` — `count` is the total row count of the
/// backing table, not the filtered count.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub count: i64,
    pub page: i64,
    pub size: i64,
}

/// Normalizes `page`/`size` query parameters into `(page, size, offset)`.
/// Pages are 1-based; zero or negative values fall back to the defaults.
pub fn page_params(page: Option<i64>, size: Option<i64>, default_size: i64) -> (i64, i64, i64) {
    let page = match page {
        Some(p) if p >= 1 => p,
        _ => 1,
    };
    let size = match size {
        Some(s) if s >= 1 => s,
        _ => default_size,
    };
    (page, size, (page - 1) * size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(page_params(None, None, 20), (1, 20, 0));
    }

    #[test]
    fn test_offset_math() {
        assert_eq!(page_params(Some(3), Some(25), 20), (3, 25, 50));
    }

    #[test]
    fn test_rejects_non_positive_values() {
        assert_eq!(page_params(Some(0), Some(-5), 15), (1, 15, 0));
    }
}
