//! Client tree against a real HTTP server.

use std::io::Write;

use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use remotefs_http::{Credentials, Entry, Listing, RemoteConfig, RemoteContainer};
use remotefs_resource::DIRECTORY;

fn entry(name: &str, content_type: &str, size: Option<u64>) -> Entry {
    Entry {
        name: name.to_string(),
        hash: None,
        content_type: content_type.to_string(),
        size,
        last_modified: None,
        writable: true,
        path: format!("/{name}"),
        children: None,
        content: None,
    }
}

fn listing_xml(entries: Vec<Entry>) -> String {
    let mut listing = Listing::new("/", true);
    listing.entries = entries;
    listing.to_xml().unwrap()
}

async fn mount_root_listing(server: &MockServer, entries: Vec<Entry>) {
    Mock::given(method("GET"))
        .and(path("/list/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/xml")
                .set_body_string(listing_xml(entries)),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_listing_is_fetched_once_with_mode_flags() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/list/"))
        .and(query_param("recursive", "false"))
        .and(query_param("full", "true"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/xml")
                .set_body_string(listing_xml(vec![
                    entry("a.txt", "text/plain", Some(3)),
                    entry("docs", DIRECTORY, None),
                ])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let names = tokio::task::spawn_blocking(move || {
        let config = RemoteConfig::new(&uri)
            .unwrap()
            .with_recursive(false)
            .with_full(true);
        let root = RemoteContainer::connect(&config).unwrap();
        root.children().unwrap();
        let children = root.children().unwrap();
        children.keys().cloned().collect::<Vec<_>>()
    })
    .await
    .unwrap();

    assert_eq!(names, vec!["a.txt".to_string(), "docs".to_string()]);
}

#[tokio::test]
async fn test_item_content_is_fetched_once() {
    let server = MockServer::start().await;
    mount_root_listing(&server, vec![entry("a.txt", "text/plain", Some(5))]).await;

    Mock::given(method("GET"))
        .and(path("/resource/a.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let contents = tokio::task::spawn_blocking(move || {
        let root = RemoteContainer::connect(&RemoteConfig::new(&uri).unwrap()).unwrap();
        let child = root.child("a.txt").unwrap().unwrap();
        let item = child.as_item().unwrap();
        (item.read().unwrap(), item.read().unwrap())
    })
    .await
    .unwrap();

    assert_eq!(&contents.0[..], b"hello");
    assert_eq!(contents.0, contents.1);
}

#[tokio::test]
async fn test_missing_resource_reports_status_and_url() {
    let server = MockServer::start().await;
    mount_root_listing(&server, vec![entry("gone.txt", "text/plain", Some(1))]).await;

    Mock::given(method("GET"))
        .and(path("/resource/gone.txt"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such resource"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (status, message) = tokio::task::spawn_blocking(move || {
        let root = RemoteContainer::connect(&RemoteConfig::new(&uri).unwrap()).unwrap();
        let child = root.child("gone.txt").unwrap().unwrap();
        let err = child.as_item().unwrap().read().unwrap_err();
        (err.status(), err.to_string())
    })
    .await
    .unwrap();

    assert_eq!(status, Some(404));
    assert!(message.contains("/resource/gone.txt"));
    assert!(message.contains("no such resource"));
}

#[tokio::test]
async fn test_credentials_are_sent_as_basic_auth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/list/"))
        .and(header("authorization", "Basic dXNlcjpzZWNyZXQ="))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/xml")
                .set_body_string(listing_xml(Vec::new())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let config = RemoteConfig::new(&uri)
            .unwrap()
            .with_credentials(Credentials::new("user", Some("secret".to_string())));
        let root = RemoteContainer::connect(&config).unwrap();
        assert!(root.children().unwrap().is_empty());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_credentials_from_remote_uri() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/list/"))
        .and(header("authorization", "Basic dXNlcjpzZWNyZXQ="))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/xml")
                .set_body_string(listing_xml(vec![entry("a.txt", "text/plain", Some(1))])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let authority = server.uri().trim_start_matches("http://").to_string();
    let uri = format!("remote://user:secret@{authority}/api");
    let found = tokio::task::spawn_blocking(move || {
        let root = RemoteContainer::connect(&RemoteConfig::from_uri(&uri).unwrap()).unwrap();
        root.child("a.txt").unwrap().is_some()
    })
    .await
    .unwrap();

    assert!(found);
}

#[tokio::test]
async fn test_write_sends_put_with_content() {
    let server = MockServer::start().await;
    mount_root_listing(&server, vec![entry("a.txt", "text/plain", Some(3))]).await;

    Mock::given(method("PUT"))
        .and(path("/resource/a.txt"))
        .and(header("content-type", "text/plain"))
        .and(body_string("hello, world"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let size = tokio::task::spawn_blocking(move || {
        let root = RemoteContainer::connect(&RemoteConfig::new(&uri).unwrap()).unwrap();
        let child = root.child("a.txt").unwrap().unwrap();
        let item = child.as_item().unwrap();
        let mut writer = item.writer().unwrap();
        writer.write_all(b"hello, world").unwrap();
        writer.finish().unwrap();
        remotefs_resource::Resource::size(item.as_ref())
    })
    .await
    .unwrap();

    assert_eq!(size, Some(12));
}

#[tokio::test]
async fn test_create_and_delete_on_server() {
    let server = MockServer::start().await;
    mount_root_listing(&server, vec![entry("old.txt", "text/plain", Some(1))]).await;

    Mock::given(method("POST"))
        .and(path("/resource"))
        .and(query_param("name", "docs"))
        .and(query_param("type", DIRECTORY))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/resource/old.txt"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let names = tokio::task::spawn_blocking(move || {
        let root = RemoteContainer::connect(&RemoteConfig::new(&uri).unwrap()).unwrap();
        root.create("docs", DIRECTORY).unwrap();
        root.delete("old.txt").unwrap();
        root.delete("never-existed.txt").unwrap();
        root.children().unwrap().keys().cloned().collect::<Vec<_>>()
    })
    .await
    .unwrap();

    assert_eq!(names, vec!["docs".to_string()]);
}

#[tokio::test]
async fn test_exists_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/exists/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("true"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let exists = tokio::task::spawn_blocking(move || {
        let root = RemoteContainer::connect(&RemoteConfig::new(&uri).unwrap()).unwrap();
        root.exists().unwrap()
    })
    .await
    .unwrap();

    assert!(exists);
}
