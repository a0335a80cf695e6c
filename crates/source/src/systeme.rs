//! systeme.io public API adapter.
//!
//! Both listings are cursor-paginated: each page carries `items` and
//! `hasMore`, and the next page is requested with `startingAfter=<last id>`.
//! Items are decoded one by one, so a single malformed entry is reported on
//! its own instead of sinking the whole page.

use std::thread;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use contactsync_core::{RawContact, RawTag};

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::traits::{ContactSource, Fetched, MalformedItem};

/// One undecoded page of a listing.
#[derive(Debug, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default, rename = "hasMore")]
    pub has_more: bool,
}

impl Page {
    /// Id of the last entry, the cursor for the next request.
    pub fn cursor(&self) -> Option<i64> {
        self.items.last().and_then(item_id)
    }

    /// Decode every entry. `offset` is the listing position of the first one.
    pub fn decode<T: DeserializeOwned>(self, offset: usize) -> (Vec<T>, Vec<MalformedItem>) {
        let mut decoded = Vec::with_capacity(self.items.len());
        let mut malformed = Vec::new();
        for (i, item) in self.items.into_iter().enumerate() {
            let id = item_id(&item);
            match serde_json::from_value(item) {
                Ok(value) => decoded.push(value),
                Err(err) => malformed.push(MalformedItem {
                    index: offset + i,
                    id,
                    reason: err.to_string(),
                }),
            }
        }
        (decoded, malformed)
    }
}

fn item_id(item: &Value) -> Option<i64> {
    item.get("id").and_then(Value::as_i64)
}

/// Decode one page body. A body without `items` is an empty final page.
pub fn parse_page(endpoint: &str, body: &str) -> Result<Page, SourceError> {
    serde_json::from_str(body).map_err(|err| SourceError::Decode {
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    })
}

pub struct SystemeClient {
    agent: ureq::Agent,
    config: SourceConfig,
}

impl SystemeClient {
    pub fn new(config: SourceConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .build()
            .into();
        Self { agent, config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn get_page(&self, endpoint: &str, after: Option<i64>) -> Result<String, SourceError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::MissingCredentials(endpoint.to_string()))?;

        let mut request = self
            .agent
            .get(endpoint)
            .header("accept", "application/json")
            .header("X-API-Key", api_key)
            .query("limit", self.config.page_limit.to_string());
        if let Some(after) = after {
            request = request.query("startingAfter", after.to_string());
        }

        let response = request.call().map_err(|err| match err {
            ureq::Error::StatusCode(status) => SourceError::Status {
                endpoint: endpoint.to_string(),
                status,
            },
            other => SourceError::Transport {
                endpoint: endpoint.to_string(),
                reason: other.to_string(),
            },
        })?;

        response
            .into_body()
            .read_to_string()
            .map_err(|err| SourceError::Transport {
                endpoint: endpoint.to_string(),
                reason: format!("failed reading response body: {err}"),
            })
    }

    fn get_page_with_retry(&self, endpoint: &str, after: Option<i64>) -> Result<String, SourceError> {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.get_page(endpoint, after) {
                Ok(body) => return Ok(body),
                Err(err) if err.is_transient() && attempt < attempts => {
                    warn!(endpoint, attempt, error = %err, "page request failed, retrying");
                    thread::sleep(self.config.retry_delay());
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn fetch_all<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Fetched<T>, SourceError> {
        let mut items = Vec::new();
        let mut malformed = Vec::new();
        let mut after = None;
        let mut pages = 0;
        loop {
            if pages >= self.config.max_pages {
                return Err(SourceError::Pagination {
                    endpoint: endpoint.to_string(),
                    pages,
                });
            }
            let body = self.get_page_with_retry(endpoint, after)?;
            let page = parse_page(endpoint, &body)?;
            pages += 1;

            let received = page.items.len();
            let has_more = page.has_more;
            let cursor = page.cursor();
            let (decoded, bad) = page.decode::<T>(items.len() + malformed.len());
            debug!(endpoint, page = pages, items = received, malformed = bad.len(), "page fetched");
            items.extend(decoded);
            malformed.extend(bad);

            match (has_more, cursor) {
                (true, Some(cursor)) => after = Some(cursor),
                (true, None) if received > 0 => {
                    return Err(SourceError::Decode {
                        endpoint: endpoint.to_string(),
                        reason: format!("page {pages} ends with an entry without a numeric id"),
                    });
                }
                _ => break,
            }
        }
        if !malformed.is_empty() {
            warn!(endpoint, malformed = malformed.len(), "listing entries failed to decode");
        }
        Ok(Fetched::new(items, pages).with_malformed(malformed))
    }
}

impl ContactSource for SystemeClient {
    #[instrument(level = "info", skip(self))]
    fn fetch_contacts(&self) -> Result<Fetched<RawContact>, SourceError> {
        let fetched = self.fetch_all(&self.config.contacts_url)?;
        info!(
            contacts = fetched.count(),
            malformed = fetched.malformed.len(),
            pages = fetched.pages,
            "contacts fetched"
        );
        Ok(fetched)
    }

    /// Labels have no per-row path downstream, so any malformed entry fails
    /// the listing.
    #[instrument(level = "info", skip(self))]
    fn fetch_tags(&self) -> Result<Fetched<RawTag>, SourceError> {
        let endpoint = &self.config.tags_url;
        let fetched: Fetched<RawTag> = self.fetch_all(endpoint)?;
        if let Some(item) = fetched.malformed.first() {
            return Err(SourceError::Item {
                endpoint: endpoint.clone(),
                index: item.index,
                id: item.id,
                reason: item.reason.clone(),
            });
        }
        info!(tags = fetched.count(), pages = fetched.pages, "tags fetched");
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contactsync_core::{ContactId, TagId};
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Answers one connection per canned response, in order, and hands back
    /// the request heads it received.
    struct StubServer {
        base: String,
        handle: JoinHandle<Vec<String>>,
    }

    impl StubServer {
        fn start(responses: Vec<(u16, String)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let base = format!("http://{}", listener.local_addr().unwrap());
            let handle = thread::spawn(move || {
                let mut heads = Vec::new();
                for (status, body) in responses {
                    let (mut stream, _) = listener.accept().unwrap();
                    let mut reader = BufReader::new(stream.try_clone().unwrap());
                    let mut head = String::new();
                    loop {
                        let mut line = String::new();
                        if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                            break;
                        }
                        head.push_str(&line);
                    }
                    heads.push(head);
                    let reason = if status < 400 { "OK" } else { "Error" };
                    write!(
                        stream,
                        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    )
                    .unwrap();
                    stream.flush().unwrap();
                }
                heads
            });
            Self { base, handle }
        }

        fn client(&self, tweak: impl FnOnce(&mut SourceConfig)) -> SystemeClient {
            let mut config = SourceConfig {
                api_key: Some("test-key".into()),
                contacts_url: format!("{}/contacts", self.base),
                tags_url: format!("{}/tags", self.base),
                page_limit: 2,
                retry_delay_ms: 0,
                ..SourceConfig::default()
            };
            tweak(&mut config);
            SystemeClient::new(config)
        }

        fn request_lines(self) -> Vec<String> {
            self.handle
                .join()
                .unwrap()
                .iter()
                .map(|head| head.lines().next().unwrap_or_default().to_string())
                .collect()
        }
    }

    fn contact_json(id: i64) -> String {
        format!(
            r#"{{"id": {id}, "email": "c{id}@x.com", "registeredAt": "2024-01-01T00:00:00+00:00"}}"#
        )
    }

    fn page_json(items: &[String], has_more: bool) -> String {
        format!(r#"{{"items": [{}], "hasMore": {has_more}}}"#, items.join(", "))
    }

    #[test]
    fn parses_contact_page() {
        let body = r#"{
            "items": [
                {"id": 10, "email": "a@x.com", "registeredAt": "2024-01-01T00:00:00+00:00"},
                {"id": 12, "email": "b@x.com", "registeredAt": "2024-01-02T00:00:00+00:00",
                 "tags": [{"id": 4, "name": "vip"}]}
            ],
            "hasMore": true
        }"#;
        let page = parse_page("contacts", body).unwrap();
        assert!(page.has_more);
        assert_eq!(page.cursor(), Some(12));
        let (items, malformed) = page.decode::<RawContact>(0);
        assert!(malformed.is_empty());
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, ContactId::new(12));
    }

    #[test]
    fn body_without_items_is_an_empty_last_page() {
        let page = parse_page("tags", r#"{"message": "nothing here"}"#).unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
        assert_eq!(page.cursor(), None);
    }

    #[test]
    fn unreadable_body_is_a_decode_error() {
        let err = parse_page("tags", "<html>oops</html>").unwrap_err();
        assert!(matches!(err, SourceError::Decode { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn null_email_is_isolated_to_its_entry() {
        let body = format!(
            r#"{{"items": [{}, {{"id": 2, "email": null, "registeredAt": "2024-01-01T00:00:00+00:00"}}, {}]}}"#,
            contact_json(1),
            contact_json(3)
        );
        let (items, malformed) = parse_page("contacts", &body).unwrap().decode::<RawContact>(10);
        let ids: Vec<i64> = items.iter().map(|c| c.id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].index, 11);
        assert_eq!(malformed[0].id, Some(2));
        assert!(malformed[0].reason.contains("null"));
    }

    #[test]
    fn tag_page_parses_names() {
        let page =
            parse_page("tags", r#"{"items": [{"id": 3, "name": "newsletter"}], "hasMore": false}"#)
                .unwrap();
        let (items, _) = page.decode::<RawTag>(0);
        assert_eq!(items, vec![RawTag { id: TagId::new(3), name: "newsletter".into() }]);
    }

    #[test]
    fn missing_api_key_fails_before_any_request() {
        let client = SystemeClient::new(SourceConfig {
            contacts_url: "http://127.0.0.1:9/contacts".into(),
            ..SourceConfig::default()
        });
        let err = client.fetch_contacts().unwrap_err();
        assert!(matches!(err, SourceError::MissingCredentials(_)));
    }

    #[test]
    fn server_errors_and_throttling_are_transient() {
        let status = |status| SourceError::Status { endpoint: "e".into(), status };
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(401).is_transient());
        assert!(!status(404).is_transient());
    }

    #[test]
    fn follows_the_cursor_until_has_more_is_false() {
        let server = StubServer::start(vec![
            (200, page_json(&[contact_json(1), contact_json(2)], true)),
            (200, page_json(&[contact_json(5)], true)),
            (200, page_json(&[], false)),
        ]);
        let fetched = server.client(|_| {}).fetch_contacts().unwrap();
        assert_eq!(fetched.count(), 3);
        assert_eq!(fetched.pages, 3);

        assert_eq!(
            server.request_lines(),
            vec![
                "GET /contacts?limit=2 HTTP/1.1",
                "GET /contacts?limit=2&startingAfter=2 HTTP/1.1",
                "GET /contacts?limit=2&startingAfter=5 HTTP/1.1",
            ]
        );
    }

    #[test]
    fn sends_the_api_key_header() {
        let server = StubServer::start(vec![(200, page_json(&[], false))]);
        server.client(|_| {}).fetch_tags().unwrap();
        let heads = server.handle.join().unwrap();
        assert!(heads[0].to_ascii_lowercase().contains("x-api-key: test-key"));
    }

    #[test]
    fn retries_a_server_error_then_succeeds() {
        let server = StubServer::start(vec![
            (503, String::new()),
            (200, page_json(&[r#"{"id": 4, "name": "vip"}"#.to_string()], false)),
        ]);
        let fetched = server.client(|_| {}).fetch_tags().unwrap();
        assert_eq!(fetched.items, vec![RawTag { id: TagId::new(4), name: "vip".into() }]);
        assert_eq!(server.request_lines().len(), 2);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let server = StubServer::start(vec![(401, String::new())]);
        let err = server.client(|_| {}).fetch_contacts().unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 401, .. }));
        assert_eq!(server.request_lines().len(), 1);
    }

    #[test]
    fn throttling_gives_up_after_max_attempts() {
        let server = StubServer::start(vec![(429, String::new()), (429, String::new())]);
        let err = server
            .client(|config| config.max_attempts = 2)
            .fetch_contacts()
            .unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 429, .. }));
        assert_eq!(server.request_lines().len(), 2);
    }

    #[test]
    fn endless_listing_hits_the_page_guard() {
        let server = StubServer::start(vec![
            (200, page_json(&[contact_json(1)], true)),
            (200, page_json(&[contact_json(2)], true)),
        ]);
        let err = server
            .client(|config| config.max_pages = 2)
            .fetch_contacts()
            .unwrap_err();
        assert!(matches!(err, SourceError::Pagination { pages: 2, .. }));
        assert_eq!(server.request_lines().len(), 2);
    }

    #[test]
    fn malformed_contacts_are_indexed_across_pages() {
        let server = StubServer::start(vec![
            (
                200,
                page_json(
                    &[
                        contact_json(1),
                        r#"{"id": 2, "email": null, "registeredAt": "2024-01-01T00:00:00+00:00"}"#
                            .to_string(),
                    ],
                    true,
                ),
            ),
            (
                200,
                page_json(
                    &[r#"{"id": 3, "email": "c@x.com", "registeredAt": "not a date"}"#.to_string()],
                    false,
                ),
            ),
        ]);
        let fetched = server.client(|_| {}).fetch_contacts().unwrap();
        assert_eq!(fetched.items.len(), 1);
        assert_eq!(fetched.count(), 3);
        let bad: Vec<(usize, Option<i64>)> =
            fetched.malformed.iter().map(|m| (m.index, m.id)).collect();
        assert_eq!(bad, vec![(1, Some(2)), (2, Some(3))]);
        // The cursor comes from the raw entry even when it did not decode.
        assert_eq!(
            server.request_lines()[1],
            "GET /contacts?limit=2&startingAfter=2 HTTP/1.1"
        );
    }

    #[test]
    fn malformed_tag_fails_the_listing_with_its_position() {
        let server = StubServer::start(vec![(
            200,
            page_json(&[r#"{"id": 1, "name": "ok"}"#.to_string(), r#"{"id": 2}"#.to_string()], false),
        )]);
        let err = server.client(|_| {}).fetch_tags().unwrap_err();
        match err {
            SourceError::Item { index, id, .. } => {
                assert_eq!(index, 1);
                assert_eq!(id, Some(2));
            }
            other => panic!("expected an item error, got {other:?}"),
        }
        server.request_lines();
    }
}
