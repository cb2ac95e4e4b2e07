//! Confluence REST client.
//!
//! [`WikiApi`] is the seam the [`Publisher`](crate::publisher::Publisher)
//! depends on; [`ConfluenceClient`] implements it over blocking HTTP.

use crate::config::Config;
use crate::error::{Error, Result};
use reqwest::blocking::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument, trace};

/// Sparse local view of a wiki page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteDocument {
    /// Page identifier
    pub id: String,

    /// Current page title
    pub title: String,

    /// Current version number
    #[serde(default = "first_version", deserialize_with = "version_number")]
    pub version: u64,
}

/// Space metadata returned by the space lookup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpaceInfo {
    /// Space key
    pub key: String,

    /// Human-readable space name
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
struct VersionField {
    number: u64,
}

const fn first_version() -> u64 {
    1
}

fn version_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<VersionField>::deserialize(deserializer).map(|v| v.map_or(1, |v| v.number))
}

#[derive(Deserialize)]
struct SearchResults {
    #[serde(default)]
    results: Vec<RemoteDocument>,
}

#[derive(Serialize)]
struct StorageBody<'a> {
    storage: StorageValue<'a>,
}

#[derive(Serialize)]
struct StorageValue<'a> {
    value: &'a str,
    representation: &'static str,
}

impl<'a> StorageBody<'a> {
    fn new(value: &'a str) -> Self {
        Self {
            storage: StorageValue {
                value,
                representation: "storage",
            },
        }
    }
}

/// Operations the publisher needs from a wiki.
pub trait WikiApi {
    /// Returns pages in the configured space whose title matches `title`.
    ///
    /// Exact title hits come first, followed by fuzzy search hits.
    fn search_pages(&self, title: &str) -> Result<Vec<RemoteDocument>>;

    /// Fetches a page with its current version.
    fn get_page(&self, id: &str) -> Result<RemoteDocument>;

    /// Creates a page in the configured space.
    fn create_page(&self, title: &str, body: &str) -> Result<RemoteDocument>;

    /// Replaces a page's title and body, setting its version to `version`.
    fn update_page(&self, id: &str, title: &str, body: &str, version: u64) -> Result<RemoteDocument>;

    /// Looks up a space by key.
    fn space(&self, key: &str) -> Result<SpaceInfo>;

    /// Returns the browser URL of a page.
    fn page_url(&self, id: &str) -> String;
}

/// Blocking Confluence Cloud client authenticated with an API token.
pub struct ConfluenceClient {
    base_url: String,
    email: String,
    token: SecretString,
    space_key: String,
    client: Client,
}

impl std::fmt::Debug for ConfluenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfluenceClient")
            .field("base_url", &self.base_url)
            .field("email", &self.email)
            .field("token", &"[REDACTED]")
            .field("space_key", &self.space_key)
            .finish()
    }
}

impl ConfluenceClient {
    /// Creates a client from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let creds = &config.credentials;
        Self::with_settings(
            &creds.wiki_base_url,
            &creds.wiki_email,
            creds.wiki_token.expose_secret(),
            &creds.space_key,
            config.wiki_timeout,
        )
    }

    /// Creates a client from individual settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_settings(
        base_url: &str,
        email: &str,
        token: &str,
        space_key: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            email: email.to_string(),
            token: SecretString::from(token.to_string()),
            space_key: space_key.to_string(),
            client,
        })
    }

    /// Returns the configured space key.
    #[must_use]
    pub fn space_key(&self) -> &str {
        &self.space_key
    }

    fn content_url(&self) -> String {
        format!("{}/rest/api/content", self.base_url)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.email, Some(self.token.expose_secret()))
            .header("Accept", "application/json")
    }

    /// Sends a request and returns the body, mapping failures to `operation`.
    fn execute(&self, operation: &str, request: RequestBuilder) -> Result<String> {
        let response = self
            .authed(request)
            .send()
            .map_err(|e| Error::publish_transport(operation, e))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| Error::publish_transport(operation, e))?;
        trace!("wiki {} -> {}", operation, status);

        if status.is_success() {
            Ok(body)
        } else {
            Err(Error::publish(operation, status.as_u16(), body))
        }
    }

    fn exact_lookup(&self, title: &str) -> Result<Vec<RemoteDocument>> {
        let request = self.client.get(self.content_url()).query(&[
            ("type", "page"),
            ("spaceKey", self.space_key.as_str()),
            ("title", title),
            ("expand", "version"),
        ]);
        let body = self.execute("search", request)?;
        Ok(decode::<SearchResults>("search", &body)?.results)
    }

    fn cql_search(&self, title: &str) -> Result<Vec<RemoteDocument>> {
        let cql = format!(
            "type=page AND space=\"{}\" AND title~\"{}\"",
            escape_cql(&self.space_key),
            escape_cql(title)
        );
        let request = self
            .client
            .get(format!("{}/search", self.content_url()))
            .query(&[("cql", cql.as_str()), ("expand", "version")]);
        let body = self.execute("search", request)?;
        Ok(decode::<SearchResults>("search", &body)?.results)
    }
}

impl WikiApi for ConfluenceClient {
    #[instrument(skip(self))]
    fn search_pages(&self, title: &str) -> Result<Vec<RemoteDocument>> {
        let mut pages = self.exact_lookup(title)?;
        for page in self.cql_search(title)? {
            if !pages.iter().any(|p| p.id == page.id) {
                pages.push(page);
            }
        }
        debug!("Found {} candidate page(s)", pages.len());
        Ok(pages)
    }

    fn get_page(&self, id: &str) -> Result<RemoteDocument> {
        let request = self
            .client
            .get(format!("{}/{id}", self.content_url()))
            .query(&[("expand", "version")]);
        let body = self.execute("fetch", request)?;
        decode("fetch", &body)
    }

    #[instrument(skip(self, body), fields(body_chars = body.len()))]
    fn create_page(&self, title: &str, body: &str) -> Result<RemoteDocument> {
        let payload = json!({
            "type": "page",
            "title": title,
            "space": { "key": self.space_key },
            "body": StorageBody::new(body),
        });
        let request = self.client.post(self.content_url()).json(&payload);
        let response = self.execute("create", request)?;
        decode("create", &response)
    }

    #[instrument(skip(self, body), fields(body_chars = body.len()))]
    fn update_page(&self, id: &str, title: &str, body: &str, version: u64) -> Result<RemoteDocument> {
        let payload = json!({
            "id": id,
            "type": "page",
            "title": title,
            "space": { "key": self.space_key },
            "body": StorageBody::new(body),
            "version": { "number": version },
        });
        let request = self
            .client
            .put(format!("{}/{id}", self.content_url()))
            .json(&payload);

        match self.execute("update", request) {
            Ok(response) => decode("update", &response),
            Err(Error::Publish { status: 409, .. }) => Err(Error::VersionConflict {
                page_id: id.to_string(),
                attempted: version,
            }),
            Err(e) => Err(e),
        }
    }

    fn space(&self, key: &str) -> Result<SpaceInfo> {
        let request = self
            .client
            .get(format!("{}/rest/api/space/{key}", self.base_url));
        let body = self.execute("space", request)?;
        decode("space", &body)
    }

    fn page_url(&self, id: &str) -> String {
        format!("{}/pages/viewpage.action?pageId={id}", self.base_url)
    }
}

/// Parses a wiki response body, reporting failures against `operation`.
fn decode<T: DeserializeOwned>(operation: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::publish_transport(operation, e))
}

/// Escapes a value for use inside a double-quoted CQL string.
fn escape_cql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> ConfluenceClient {
        ConfluenceClient::with_settings(
            &format!("{}/wiki/", server.url()),
            "docs@example.com",
            "token",
            "DOCS",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn page_json(id: &str, title: &str, version: u64) -> serde_json::Value {
        json!({"id": id, "type": "page", "title": title, "version": {"number": version}})
    }

    #[test]
    fn test_search_merges_exact_and_fuzzy_results() {
        let mut server = mockito::Server::new();
        let exact = server
            .mock("GET", "/wiki/rest/api/content")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("spaceKey".into(), "DOCS".into()),
                Matcher::UrlEncoded("title".into(), "LWC Foo".into()),
            ]))
            .match_header("authorization", Matcher::Regex("^Basic ".into()))
            .with_status(200)
            .with_body(json!({"results": [page_json("1", "LWC Foo", 2)]}).to_string())
            .create();
        let fuzzy = server
            .mock("GET", "/wiki/rest/api/content/search")
            .match_query(Matcher::UrlEncoded(
                "cql".into(),
                "type=page AND space=\"DOCS\" AND title~\"LWC Foo\"".into(),
            ))
            .with_status(200)
            .with_body(
                json!({"results": [page_json("7", "LWC Foo Archive", 1), page_json("1", "LWC Foo", 2)]})
                    .to_string(),
            )
            .create();

        let pages = client_for(&server).search_pages("LWC Foo").unwrap();

        exact.assert();
        fuzzy.assert();
        let ids: Vec<_> = pages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "7"]);
        assert_eq!(pages[0].version, 2);
    }

    #[test]
    fn test_create_page_posts_storage_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/wiki/rest/api/content")
            .match_body(Matcher::PartialJson(json!({
                "type": "page",
                "title": "Order Summary",
                "space": {"key": "DOCS"},
                "body": {"storage": {"value": "<p>x</p>", "representation": "storage"}}
            })))
            .with_status(200)
            .with_body(page_json("42", "Order Summary", 1).to_string())
            .expect(1)
            .create();

        let page = client_for(&server).create_page("Order Summary", "<p>x</p>").unwrap();

        mock.assert();
        assert_eq!(page.id, "42");
        assert_eq!(page.version, 1);
    }

    #[test]
    fn test_update_page_sends_version() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("PUT", "/wiki/rest/api/content/42")
            .match_body(Matcher::PartialJson(json!({"version": {"number": 4}})))
            .with_status(200)
            .with_body(page_json("42", "Order Summary", 4).to_string())
            .create();

        let page = client_for(&server)
            .update_page("42", "Order Summary", "<p>x</p>", 4)
            .unwrap();

        mock.assert();
        assert_eq!(page.version, 4);
    }

    #[test]
    fn test_update_conflict_is_version_conflict() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("PUT", "/wiki/rest/api/content/42")
            .with_status(409)
            .with_body("{\"message\":\"Version must be incremented\"}")
            .create();

        let err = client_for(&server)
            .update_page("42", "Order Summary", "<p>x</p>", 4)
            .unwrap_err();

        assert!(matches!(err, Error::VersionConflict { attempted: 4, .. }));
    }

    #[test]
    fn test_create_failure_is_publish_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/wiki/rest/api/content")
            .with_status(400)
            .with_body("{\"message\":\"A page with this title already exists\"}")
            .create();

        let err = client_for(&server).create_page("Dup", "<p/>").unwrap_err();

        match err {
            Error::Publish { operation, status, body } => {
                assert_eq!(operation, "create");
                assert_eq!(status, 400);
                assert!(body.contains("already exists"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unreachable_wiki_is_publish_error() {
        let client = ConfluenceClient::with_settings(
            "http://127.0.0.1:9",
            "docs@example.com",
            "token",
            "DOCS",
            Duration::from_secs(5),
        )
        .unwrap();

        let err = client.search_pages("LWC Foo").unwrap_err();
        assert!(err.is_publish(), "unexpected error: {err:?}");
        assert!(matches!(err, Error::PublishTransport { ref operation, .. } if operation == "search"));
    }

    #[test]
    fn test_malformed_wiki_body_is_publish_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/wiki/rest/api/content/42")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create();

        let err = client_for(&server).get_page("42").unwrap_err();
        assert!(err.is_publish());
        assert!(err.to_string().starts_with("Wiki fetch failed"));
    }

    #[test]
    fn test_space_lookup() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/wiki/rest/api/space/DOCS")
            .with_status(200)
            .with_body(json!({"key": "DOCS", "name": "Documentation"}).to_string())
            .create();

        let space = client_for(&server).space("DOCS").unwrap();
        assert_eq!(space.name, "Documentation");
    }

    #[test]
    fn test_page_url_and_cql_escaping() {
        let server = mockito::Server::new();
        let client = client_for(&server);

        assert_eq!(
            client.page_url("42"),
            format!("{}/wiki/pages/viewpage.action?pageId=42", server.url())
        );
        assert_eq!(escape_cql(r#"Say "hi" \o/"#), r#"Say \"hi\" \\o/"#);
    }
}
