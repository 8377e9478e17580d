//! Limit/offset pagination and the list envelope.

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Serialize;

/// List envelope returned by every collection.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Convert the results, keeping the envelope.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// A parsed `?limit=&offset=` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: usize,
    pub offset: usize,
}

impl Window {
    /// Window from raw query values. Missing or unparseable values fall back
    /// to the defaults; the limit is clamped to `1..=max_limit`.
    pub fn from_query(
        limit: Option<&str>,
        offset: Option<&str>,
        default_limit: usize,
        max_limit: usize,
    ) -> Self {
        let limit = limit
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|&limit| limit > 0)
            .unwrap_or(default_limit)
            .clamp(1, max_limit.max(1));
        let offset = offset
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(0);
        Self { limit, offset }
    }

    /// Slice `items` and build the envelope with relative `next`/`previous`
    /// links. `params` are the other query parameters, carried into the links.
    pub fn paginate<T>(self, items: Vec<T>, path: &str, params: &[(String, String)]) -> Page<T> {
        let count = items.len();
        let end = self.offset.saturating_add(self.limit);
        let next = (end < count).then(|| link(path, params, self.limit, Some(end)));
        let previous = (self.offset > 0).then(|| {
            let previous_offset = self.offset.saturating_sub(self.limit);
            link(
                path,
                params,
                self.limit,
                (previous_offset > 0).then_some(previous_offset),
            )
        });
        let results = items
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect();

        Page {
            count,
            next,
            previous,
            results,
        }
    }
}

fn link(path: &str, params: &[(String, String)], limit: usize, offset: Option<usize>) -> String {
    let mut query: Vec<String> = params
        .iter()
        .filter(|(key, _)| key != "limit" && key != "offset")
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect();
    query.push(format!("limit={}", limit));
    if let Some(offset) = offset {
        query.push(format!("offset={}", offset));
    }
    format!("{}?{}", path, query.join("&"))
}

fn encode(raw: &str) -> String {
    utf8_percent_encode(raw, NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_defaults_and_cap() {
        assert_eq!(
            Window::from_query(None, None, 1000, 5000),
            Window { limit: 1000, offset: 0 }
        );
        assert_eq!(Window::from_query(Some("9000"), Some("3"), 1000, 5000).limit, 5000);
        assert_eq!(Window::from_query(Some("abc"), Some("-1"), 10, 50), Window { limit: 10, offset: 0 });
    }

    #[test]
    fn test_first_page_links() {
        let page = Window { limit: 2, offset: 0 }.paginate(vec![1, 2, 3, 4, 5], "/v1/sites/", &[]);
        assert_eq!(page.count, 5);
        assert_eq!(page.results, vec![1, 2]);
        assert_eq!(page.next.as_deref(), Some("/v1/sites/?limit=2&offset=2"));
        assert_eq!(page.previous, None);
    }

    #[test]
    fn test_middle_page_drops_zero_offset_from_previous() {
        let params = vec![("code".to_string(), "a b".to_string())];
        let page = Window { limit: 2, offset: 2 }.paginate(vec![1, 2, 3, 4, 5], "/v1/sites/", &params);
        assert_eq!(page.results, vec![3, 4]);
        assert_eq!(page.next.as_deref(), Some("/v1/sites/?code=a%20b&limit=2&offset=4"));
        assert_eq!(page.previous.as_deref(), Some("/v1/sites/?code=a%20b&limit=2"));
    }

    #[test]
    fn test_offset_past_end_is_empty() {
        let page = Window { limit: 10, offset: 20 }.paginate(vec![1, 2], "/v1/cameras/", &[]);
        assert_eq!(page.count, 2);
        assert!(page.results.is_empty());
        assert!(page.next.is_none());
        assert_eq!(page.previous.as_deref(), Some("/v1/cameras/?limit=10&offset=10"));
    }

    #[test]
    fn test_huge_offset_does_not_overflow() {
        let window = Window::from_query(Some("1"), Some(&usize::MAX.to_string()), 1000, 10000);
        assert_eq!(window.offset, usize::MAX);

        let page = window.paginate(vec![1, 2, 3], "/v1/sites/", &[]);
        assert_eq!(page.count, 3);
        assert!(page.results.is_empty());
        assert!(page.next.is_none());
        assert_eq!(
            page.previous,
            Some(format!("/v1/sites/?limit=1&offset={}", usize::MAX - 1))
        );
    }
}
