//! Sequential timeline pagination
//!
//! Pages are fetched strictly one after the other. The page callback runs
//! to completion before the next page is requested, so a callback that
//! blocks on a full queue also holds back the walk.
//!
//! The walk ends on the page whose number equals the `total_pages` reported
//! *by that page*. If the timeline grows or shrinks mid-run the walk follows
//! the live total, which can end it earlier or later than the size the
//! timeline had when the run started.

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::types::{Coub, FetchedPage, PageEntry, TimelinePage};
use reqwest::StatusCode;
use reqwest::header::COOKIE;
use std::future::Future;

/// Walks the pages of one timeline
pub struct TimelinePaginator {
    client: reqwest::Client,
    base_url: String,
    path: String,
    order_by: Option<String>,
    per_page: u32,
    cookie: Option<String>,
}

impl TimelinePaginator {
    /// Create a paginator for the timeline configured in `api`
    pub fn new(client: reqwest::Client, api: &ApiConfig) -> Self {
        Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            path: api.timeline.api_path(),
            order_by: api.order_by.clone(),
            per_page: api.per_page,
            cookie: api.cookie.clone(),
        }
    }

    /// Request path and query for `page`, relative to the API base URL
    pub fn request_for(&self, page: u32) -> String {
        let mut params = Vec::with_capacity(3);
        if let Some(order) = &self.order_by {
            params.push(format!("order_by={}", urlencoding::encode(order)));
        }
        params.push(format!("page={page}"));
        params.push(format!("per_page={}", self.per_page));
        format!("{}?{}", self.path, params.join("&"))
    }

    /// Fetch and decode a single page
    pub async fn fetch_page(&self, page: u32) -> Result<FetchedPage> {
        let request = self.request_for(page);
        let url = format!("{}{}", self.base_url, request);

        let mut builder = self.client.get(&url);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(COOKIE, cookie);
        }

        let response = builder.send().await.map_err(|e| Error::PageFetchFailed {
            page,
            reason: e.to_string(),
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| Error::PageFetchFailed {
            page,
            reason: e.to_string(),
        })?;

        if status != StatusCode::OK {
            return Err(Error::PageFetchFailed {
                page,
                reason: format!("coub.com response is not good: {status} {request}"),
            });
        }

        let envelope: TimelinePage = serde_json::from_slice(&body)
            .map_err(|source| Error::PageDecodeFailed { page, source })?;

        let entries = envelope
            .coubs
            .into_iter()
            .map(|raw| {
                let coub: Coub = serde_json::from_value(raw.clone())
                    .map_err(|source| Error::PageDecodeFailed { page, source })?;
                Ok(PageEntry { coub, raw })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FetchedPage {
            request,
            number: envelope.page,
            total_pages: envelope.total_pages,
            entries,
        })
    }

    /// Walk the timeline from page 1, handing each page to `on_page`
    ///
    /// Returns the number of pages fetched. Any fetch, decode, or callback
    /// error ends the walk and is returned as is.
    pub async fn run<F, Fut>(&self, mut on_page: F) -> Result<u32>
    where
        F: FnMut(FetchedPage) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut page = 1;

        loop {
            let fetched = self.fetch_page(page).await?;
            let total_pages = fetched.total_pages;

            tracing::debug!(
                page,
                total_pages,
                items = fetched.entries.len(),
                "Fetched timeline page"
            );

            on_page(fetched).await?;

            // An empty timeline reports zero pages
            if page >= total_pages {
                return Ok(page);
            }
            page += 1;
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timeline;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page_body(page: u32, total_pages: u32, permalinks: &[&str]) -> serde_json::Value {
        let coubs: Vec<_> = permalinks
            .iter()
            .enumerate()
            .map(|(i, p)| {
                json!({
                    "id": page * 100 + i as u32,
                    "permalink": p,
                    "file_versions": { "html5": { "video": { "med": { "url": "https://cdn/v.mp4" } } } }
                })
            })
            .collect();
        json!({ "page": page, "total_pages": total_pages, "coubs": coubs })
    }

    async fn mount_page(server: &MockServer, page: u32, body: serde_json::Value, times: u64) {
        Mock::given(method("GET"))
            .and(path("/timeline/likes"))
            .and(query_param("page", page.to_string()))
            .and(query_param("per_page", "25"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(times)
            .mount(server)
            .await;
    }

    fn paginator(server: &MockServer) -> TimelinePaginator {
        let api = ApiConfig {
            base_url: server.uri(),
            ..ApiConfig::default()
        };
        TimelinePaginator::new(reqwest::Client::new(), &api)
    }

    #[test]
    fn request_includes_order_page_and_page_size() {
        let api = ApiConfig {
            timeline: Timeline::Tag("cats".into()),
            order_by: Some("oldest".into()),
            ..ApiConfig::default()
        };
        let paginator = TimelinePaginator::new(reqwest::Client::new(), &api);

        assert_eq!(
            paginator.request_for(3),
            "/timeline/tag/cats?order_by=oldest&page=3&per_page=25"
        );
    }

    #[tokio::test]
    async fn walks_exactly_total_pages_in_order() {
        let server = MockServer::start().await;
        mount_page(&server, 1, page_body(1, 3, &["a", "b"]), 1).await;
        mount_page(&server, 2, page_body(2, 3, &["c"]), 1).await;
        mount_page(&server, 3, page_body(3, 3, &["d"]), 1).await;
        mount_page(&server, 4, page_body(4, 3, &[]), 0).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let pages = paginator(&server)
            .run(|page| {
                let sink = sink.clone();
                async move {
                    let mut seen = sink.lock().unwrap();
                    for entry in page.entries {
                        seen.push((page.number, entry.coub.permalink));
                    }
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(pages, 3);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (1, "a".to_string()),
                (1, "b".to_string()),
                (2, "c".to_string()),
                (3, "d".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn stops_on_the_total_reported_by_the_latest_page() {
        let server = MockServer::start().await;
        mount_page(&server, 1, page_body(1, 5, &["a"]), 1).await;
        mount_page(&server, 2, page_body(2, 2, &["b"]), 1).await;
        mount_page(&server, 3, page_body(3, 5, &["c"]), 0).await;

        let pages = paginator(&server).run(|_| async { Ok(()) }).await.unwrap();

        assert_eq!(pages, 2);
    }

    #[tokio::test]
    async fn empty_timeline_stops_after_first_page() {
        let server = MockServer::start().await;
        mount_page(&server, 1, page_body(1, 0, &[]), 1).await;
        mount_page(&server, 2, page_body(2, 0, &[]), 0).await;

        let pages = paginator(&server).run(|_| async { Ok(()) }).await.unwrap();

        assert_eq!(pages, 1);
    }

    #[tokio::test]
    async fn sends_cookie_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/timeline/likes"))
            .and(header("cookie", "remember_token=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page_body(1, 1, &["a"])))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiConfig {
            base_url: server.uri(),
            cookie: Some("remember_token=abc".into()),
            ..ApiConfig::default()
        };
        let paginator = TimelinePaginator::new(reqwest::Client::new(), &api);

        let page = paginator.fetch_page(1).await.unwrap();

        assert_eq!(page.request, "/timeline/likes?page=1&per_page=25");
        assert_eq!(page.entries[0].coub.permalink, "a");
    }

    #[tokio::test]
    async fn non_ok_status_is_a_page_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/timeline/likes"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = paginator(&server)
            .run(|_| async { Ok(()) })
            .await
            .unwrap_err();

        match err {
            Error::PageFetchFailed { page, reason } => {
                assert_eq!(page, 1);
                assert!(reason.contains("401"), "reason was {reason}");
            }
            other => panic!("expected PageFetchFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_a_page_decode_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/timeline/likes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let err = paginator(&server).fetch_page(1).await.unwrap_err();

        assert!(matches!(err, Error::PageDecodeFailed { page: 1, .. }));
    }

    #[tokio::test]
    async fn item_without_permalink_is_a_page_decode_failure() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            1,
            json!({ "page": 1, "total_pages": 1, "coubs": [{ "id": 1 }] }),
            1,
        )
        .await;

        let err = paginator(&server).fetch_page(1).await.unwrap_err();

        assert!(matches!(err, Error::PageDecodeFailed { page: 1, .. }));
    }

    #[tokio::test]
    async fn callback_error_stops_the_walk() {
        let server = MockServer::start().await;
        mount_page(&server, 1, page_body(1, 3, &["a"]), 1).await;
        mount_page(&server, 2, page_body(2, 3, &["b"]), 0).await;

        let err = paginator(&server)
            .run(|_| async { Err(Error::persist("q/pages/001", "disk full")) })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PersistFailed { .. }));
    }
}
