use assert_fs::prelude::*;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use sfdoc::{Config, Pipeline};
use std::time::Duration;

const BUNDLE: &str = "force-app/main/default/lwc/orderSummary";

fn order_summary_repo() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child(format!("{BUNDLE}/orderSummary.html"))
        .write_str("<template><p>{total}</p></template>")
        .unwrap();
    temp.child(format!("{BUNDLE}/orderSummary.js"))
        .write_str("import { LightningElement, api } from 'lwc';\nexport default class OrderSummary extends LightningElement {\n    @api total;\n}\n")
        .unwrap();
    temp.child(format!("{BUNDLE}/orderSummary.css"))
        .write_str(":host { display: block; }")
        .unwrap();
    temp.child(format!("{BUNDLE}/orderSummary.js-meta.xml"))
        .write_str("<LightningComponentBundle><isExposed>true</isExposed></LightningComponentBundle>")
        .unwrap();
    temp
}

fn config_for(root: &std::path::Path, generation: &ServerGuard, wiki: &ServerGuard) -> Config {
    Config::builder()
        .root_dir(root)
        .api_key("sk-ant-test")
        .wiki_email("docs@example.com")
        .wiki_token("token")
        .wiki_base_url(wiki.url())
        .space_key("DOCS")
        .generation_url(format!("{}/v1/messages", generation.url()))
        .generation_timeout(Duration::from_secs(10))
        .wiki_timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

fn mock_generation(server: &mut ServerGuard, text: &str) -> mockito::Mock {
    server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "sk-ant-test")
        .match_body(Matcher::Regex("orderSummary".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"content": [{"type": "text", "text": text}]}).to_string())
        .expect(1)
        .create()
}

fn mock_empty_searches(server: &mut ServerGuard, variants: usize) -> (mockito::Mock, mockito::Mock) {
    let exact = server
        .mock("GET", "/rest/api/content")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"results": []}).to_string())
        .expect(variants)
        .create();
    let fuzzy = server
        .mock("GET", "/rest/api/content/search")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"results": []}).to_string())
        .expect(variants)
        .create();
    (exact, fuzzy)
}

#[test]
fn creates_page_titled_after_generated_heading() {
    let repo = order_summary_repo();
    let mut generation = Server::new();
    let mut wiki = Server::new();

    let document = "# Order Summary Component\n\n## Overview\n**Displays** the order total.\n\n```javascript\nconst a = b ** c;\n```\n";
    let generate = mock_generation(&mut generation, document);
    let (exact, fuzzy) = mock_empty_searches(&mut wiki, 6);
    let create = wiki
        .mock("POST", "/rest/api/content")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({
                "type": "page",
                "title": "Order Summary Component",
                "space": {"key": "DOCS"}
            })),
            Matcher::Regex("<strong>Displays</strong>".into()),
            Matcher::Regex(r"b \*\* c".into()),
        ]))
        .with_status(200)
        .with_body(json!({"id": "9001", "title": "Order Summary Component", "version": {"number": 1}}).to_string())
        .expect(1)
        .create();

    let config = config_for(repo.path(), &generation, &wiki);
    let stats = Pipeline::new(config).unwrap().run().unwrap();

    generate.assert();
    exact.assert();
    fuzzy.assert();
    create.assert();
    assert_eq!(stats.canonical_title, "LWC orderSummary");
    assert_eq!(stats.final_title, "Order Summary Component");
    assert_eq!(stats.files_included, 4);
    assert_eq!(stats.page_id.as_deref(), Some("9001"));
    assert_eq!(
        stats.page_url.as_deref(),
        Some(format!("{}/pages/viewpage.action?pageId=9001", wiki.url()).as_str())
    );
}

#[test]
fn falls_back_to_canonical_title_without_heading() {
    let repo = order_summary_repo();
    let mut generation = Server::new();
    let mut wiki = Server::new();

    let _generate = mock_generation(&mut generation, "## Overview\nNo top-level heading here.");
    let _searches = mock_empty_searches(&mut wiki, 6);
    let create = wiki
        .mock("POST", "/rest/api/content")
        .match_body(Matcher::PartialJson(json!({"title": "LWC orderSummary"})))
        .with_status(200)
        .with_body(json!({"id": "77", "title": "LWC orderSummary", "version": {"number": 1}}).to_string())
        .expect(1)
        .create();

    let config = config_for(repo.path(), &generation, &wiki);
    let stats = Pipeline::new(config).unwrap().run().unwrap();

    create.assert();
    assert_eq!(stats.final_title, "LWC orderSummary");
    assert!(!stats.updated_existing);
}

#[test]
fn updates_existing_page_with_next_version() {
    let repo = order_summary_repo();
    let mut generation = Server::new();
    let mut wiki = Server::new();

    let _generate = mock_generation(&mut generation, "Body without a heading.");
    let _mock = wiki.mock("GET", "/rest/api/content")
        .match_query(Matcher::UrlEncoded("title".into(), "LWC orderSummary".into()))
        .with_status(200)
        .with_body(json!({"results": [{"id": "55", "title": "LWC orderSummary", "version": {"number": 2}}]}).to_string())
        .create();
    let _mock = wiki.mock("GET", "/rest/api/content/search")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"results": []}).to_string())
        .create();
    let _mock = wiki.mock("GET", "/rest/api/content/55")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"id": "55", "title": "LWC orderSummary", "version": {"number": 3}}).to_string())
        .create();
    let update = wiki
        .mock("PUT", "/rest/api/content/55")
        .match_body(Matcher::PartialJson(json!({
            "title": "LWC orderSummary",
            "version": {"number": 4}
        })))
        .with_status(200)
        .with_body(json!({"id": "55", "title": "LWC orderSummary", "version": {"number": 4}}).to_string())
        .expect(1)
        .create();
    let create = wiki.mock("POST", "/rest/api/content").expect(0).create();

    let config = config_for(repo.path(), &generation, &wiki);
    let stats = Pipeline::new(config).unwrap().run().unwrap();

    update.assert();
    create.assert();
    assert!(stats.updated_existing);
    assert_eq!(stats.page_version, Some(4));
}

#[test]
fn generation_failure_publishes_nothing() {
    let repo = order_summary_repo();
    let mut generation = Server::new();
    let mut wiki = Server::new();

    let _mock = generation
        .mock("POST", "/v1/messages")
        .with_status(401)
        .with_body("{\"error\":{\"type\":\"authentication_error\"}}")
        .create();
    let create = wiki.mock("POST", "/rest/api/content").expect(0).create();

    let config = config_for(repo.path(), &generation, &wiki);
    let err = Pipeline::new(config).unwrap().run().unwrap_err();

    create.assert();
    assert!(err.is_upstream());
    assert!(err.to_string().contains("401"));
}

#[test]
fn empty_repository_fails_before_any_request() {
    let repo = assert_fs::TempDir::new().unwrap();
    repo.child("README.md").write_str("# Not Salesforce").unwrap();
    let mut generation = Server::new();
    let wiki = Server::new();

    let generate = generation.mock("POST", "/v1/messages").expect(0).create();

    let config = config_for(repo.path(), &generation, &wiki);
    let err = Pipeline::new(config).unwrap().run().unwrap_err();

    generate.assert();
    assert!(matches!(err, sfdoc::Error::NoFiles { .. }));
}
