use std::io::Read;

use tokio::task::spawn_blocking;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use httpfs_core::error::HttpFsError;
use httpfs_core::filesystem::Scheme;
use httpfs_core::settings::HttpSettings;
use httpfs_http::client;
use httpfs_http::provider::{AccessMode, HttpFileSystemProvider, OpenOption};

fn quick_settings() -> HttpSettings {
    let mut settings = HttpSettings::default();
    settings.retry.max_retries = 1;
    settings
}

fn file_url(server: &MockServer, name: &str) -> Url {
    Url::parse(&format!("{}/{name}", server.uri())).unwrap()
}

#[tokio::test]
async fn provider_opens_a_readable_channel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("Hello"))
        .mount(&server)
        .await;

    let url = file_url(&server, "hello.txt");
    spawn_blocking(move || {
        let provider = HttpFileSystemProvider::new(Scheme::Http);
        let fs_path = provider.get_path(&url).unwrap();

        for options in [&[][..], &[OpenOption::Read][..]] {
            let mut channel = provider.new_byte_channel(&fs_path, options).unwrap();
            let mut buf = [0u8; 5];
            channel.read_exact(&mut buf).unwrap();
            assert_eq!(&buf, b"Hello");
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn check_access_accepts_read_on_existing_resources() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/known.txt"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let url = file_url(&server, "known.txt");
    spawn_blocking(move || {
        let provider = HttpFileSystemProvider::new(Scheme::Http);
        provider.set_settings(quick_settings());
        let fs_path = provider.get_path(&url).unwrap();

        provider.check_access(&fs_path, &[]).unwrap();
        provider.check_access(&fs_path, &[AccessMode::Read]).unwrap();

        let err = provider
            .check_access(&fs_path, &[AccessMode::Read, AccessMode::Write])
            .unwrap_err();
        assert!(matches!(err, HttpFsError::UnsupportedOperation(_)));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn check_access_reports_missing_files() {
    let server = MockServer::start().await;

    let url = file_url(&server, "missing.txt");
    spawn_blocking(move || {
        let provider = HttpFileSystemProvider::new(Scheme::Http);
        provider.set_settings(quick_settings());
        let fs_path = provider.get_path(&url).unwrap();

        let err = provider.check_access(&fs_path, &[AccessMode::Read]).unwrap_err();
        assert!(matches!(err, HttpFsError::FileNotFound(_)));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn check_access_surfaces_authentication_failures() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/secret.txt"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let url = file_url(&server, "secret.txt");
    spawn_blocking(move || {
        let provider = HttpFileSystemProvider::new(Scheme::Http);
        provider.set_settings(quick_settings());
        let fs_path = provider.get_path(&url).unwrap();

        let err = provider.check_access(&fs_path, &[AccessMode::Read]).unwrap_err();
        assert!(matches!(err, HttpFsError::AccessDenied { code: 403, .. }));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn exists_follows_the_status_table() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/known.txt"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/partial.txt"))
        .respond_with(ResponseTemplate::new(206))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/guarded.txt"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let known = file_url(&server, "known.txt");
    let partial = file_url(&server, "partial.txt");
    let missing = file_url(&server, "missing.txt");
    let guarded = file_url(&server, "guarded.txt");
    spawn_blocking(move || {
        let settings = quick_settings();
        assert!(client::exists(&known, &settings).unwrap());
        assert!(client::exists(&partial, &settings).unwrap());
        assert!(!client::exists(&missing, &settings).unwrap());

        let err = client::exists(&guarded, &settings).unwrap_err();
        assert!(matches!(err, HttpFsError::AccessDenied { code: 401, .. }));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn exists_treats_unresolvable_hosts_as_absent() {
    spawn_blocking(move || {
        let url = Url::parse("http://unresolvable.invalid/").unwrap();
        assert!(!client::exists(&url, &quick_settings()).unwrap());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn exists_retries_unexpected_statuses_until_the_budget_ends() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/erratic.txt"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let url = file_url(&server, "erratic.txt");
    spawn_blocking(move || {
        let err = client::exists(&url, &quick_settings()).unwrap_err();
        match err {
            HttpFsError::OutOfRetries { retries, cause, .. } => {
                assert_eq!(retries, 1);
                assert_eq!(cause.response_code(), Some(503));
            }
            other => panic!("expected OutOfRetries, got {other:?}"),
        }
    })
    .await
    .unwrap();

    server.verify().await;
}
