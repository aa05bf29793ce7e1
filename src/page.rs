use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// One batch of a paged result set plus the opaque continuation token.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// A remote paged-fetch primitive. Implementations issue exactly one remote
/// call per `fetch_page` and surface the platform's continuation cursor.
#[async_trait]
pub trait PagedQuery {
    type Item;

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<Self::Item>>;
}

/// Drive a paged query until the quota is met, the data runs out, or a call
/// fails. A failure on the first page is the caller's problem; once any page
/// has been accumulated, later failures abandon the remaining pages and the
/// partial result is returned. No retry; a fixed sleep paces consecutive
/// calls. The traversal restarts from scratch only; no cursor persists
/// across runs.
pub async fn collect_paged<Q>(query: &Q, quota: usize, pace: Duration) -> Result<Vec<Q::Item>>
where
    Q: PagedQuery + Sync,
    Q::Item: Send,
{
    let mut items: Vec<Q::Item> = Vec::new();
    if quota == 0 {
        return Ok(items);
    }

    let mut cursor: Option<String> = None;
    loop {
        let page = match query.fetch_page(cursor.as_deref()).await {
            Ok(page) => page,
            Err(err) if items.is_empty() => return Err(err),
            Err(err) => {
                tracing::warn!("pagination abandoned after {} items: {err:#}", items.len());
                break;
            }
        };

        let got = page.items.len();
        for item in page.items {
            if items.len() >= quota {
                break;
            }
            items.push(item);
        }
        tracing::debug!(collected = items.len(), quota, "page fetched");

        if items.len() >= quota || got == 0 {
            break;
        }
        match page.next_cursor {
            // A cursor identical to the one just used would loop forever.
            Some(next) if cursor.as_deref() != Some(next.as_str()) && !next.is_empty() => {
                cursor = Some(next);
            }
            _ => break,
        }

        if !pace.is_zero() {
            tokio::time::sleep(pace).await;
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Serves `per_page`-sized batches of sequential integers up to `total`,
    /// counting calls; optionally fails on the nth call.
    struct FakeQuery {
        per_page: usize,
        total: usize,
        fail_on_call: Option<usize>,
        calls: Mutex<usize>,
    }

    impl FakeQuery {
        fn new(per_page: usize, total: usize) -> Self {
            Self {
                per_page,
                total,
                fail_on_call: None,
                calls: Mutex::new(0),
            }
        }

        fn failing_on(mut self, call: usize) -> Self {
            self.fail_on_call = Some(call);
            self
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl PagedQuery for FakeQuery {
        type Item = usize;

        async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<usize>> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            if self.fail_on_call == Some(call) {
                return Err(anyhow!("rate limited"));
            }
            let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            let end = (start + self.per_page).min(self.total);
            let items: Vec<usize> = (start..end).collect();
            let next_cursor = (end < self.total).then(|| end.to_string());
            Ok(Page { items, next_cursor })
        }
    }

    #[tokio::test]
    async fn test_quota_is_never_exceeded() {
        let query = FakeQuery::new(20, 1000);
        let items = collect_paged(&query, 50, Duration::ZERO).await.unwrap();
        assert_eq!(items.len(), 50);
        assert_eq!(items[49], 49);
    }

    #[tokio::test]
    async fn test_call_count_stays_within_ceil_bound() {
        let query = FakeQuery::new(20, 1000);
        let _ = collect_paged(&query, 50, Duration::ZERO).await.unwrap();
        // ceil(50 / 20) = 3
        assert_eq!(query.calls(), 3);
    }

    #[tokio::test]
    async fn test_exact_page_boundary_stops_without_extra_call() {
        let query = FakeQuery::new(20, 1000);
        let items = collect_paged(&query, 40, Duration::ZERO).await.unwrap();
        assert_eq!(items.len(), 40);
        assert_eq!(query.calls(), 2);
    }

    #[tokio::test]
    async fn test_absent_cursor_ends_the_traversal() {
        let query = FakeQuery::new(20, 35);
        let items = collect_paged(&query, 100, Duration::ZERO).await.unwrap();
        assert_eq!(items.len(), 35);
        assert_eq!(query.calls(), 2);
    }

    #[tokio::test]
    async fn test_mid_pagination_error_returns_partial_prefix() {
        let query = FakeQuery::new(10, 100).failing_on(3);
        let items = collect_paged(&query, 100, Duration::ZERO).await.unwrap();
        assert_eq!(items, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_first_page_error_propagates() {
        let query = FakeQuery::new(10, 100).failing_on(1);
        assert!(collect_paged(&query, 10, Duration::ZERO).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_quota_makes_no_calls() {
        let query = FakeQuery::new(10, 100);
        let items = collect_paged(&query, 0, Duration::ZERO).await.unwrap();
        assert!(items.is_empty());
        assert_eq!(query.calls(), 0);
    }

    struct StuckCursor;

    #[async_trait]
    impl PagedQuery for StuckCursor {
        type Item = u8;

        async fn fetch_page(&self, _cursor: Option<&str>) -> Result<Page<u8>> {
            Ok(Page {
                items: vec![1],
                next_cursor: Some("same".into()),
            })
        }
    }

    #[tokio::test]
    async fn test_repeated_cursor_terminates() {
        let items = collect_paged(&StuckCursor, 10, Duration::ZERO).await.unwrap();
        // first call with None, second with "same", then the cursor repeats
        assert_eq!(items.len(), 2);
    }
}
