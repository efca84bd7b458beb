use std::io::{Read, Seek, SeekFrom};

use tokio::task::spawn_blocking;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use httpfs_core::error::HttpFsError;
use httpfs_core::settings::{HttpSettings, RetrySettings};
use httpfs_http::channel::HttpSeekableByteChannel;

fn test_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn settings(max_retries: u32) -> HttpSettings {
    HttpSettings {
        retry: RetrySettings {
            max_retries,
            ..RetrySettings::default()
        },
        ..HttpSettings::default()
    }
}

fn file_url(server: &MockServer, name: &str) -> Url {
    Url::parse(&format!("{}/{name}", server.uri())).unwrap()
}

#[tokio::test]
async fn happy_full_read() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("Hello"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/hello.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("Hello"))
        .mount(&server)
        .await;

    let url = file_url(&server, "hello.txt");
    spawn_blocking(move || {
        let mut channel = HttpSeekableByteChannel::new(url).unwrap();
        assert_eq!(channel.position().unwrap(), 0);
        assert_eq!(channel.size().unwrap(), 5);

        let mut buf = [0u8; 5];
        channel.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"Hello");
        assert_eq!(channel.position().unwrap(), 5);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn read_at_end_of_stream_returns_zero_and_keeps_position() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("Hello"))
        .mount(&server)
        .await;

    let url = file_url(&server, "hello.txt");
    spawn_blocking(move || {
        let mut channel = HttpSeekableByteChannel::new(url).unwrap();
        let mut buf = [0u8; 5];
        channel.read_exact(&mut buf).unwrap();

        let mut more = [0u8; 16];
        assert_eq!(HttpSeekableByteChannel::read(&mut channel, &mut more).unwrap(), 0);
        assert_eq!(channel.position().unwrap(), 5);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn seek_within_skip_window_issues_no_new_request() {
    let server = MockServer::start().await;
    let body = test_body(100_000);
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let url = file_url(&server, "data.bin");
    let expected = body[150..160].to_vec();
    spawn_blocking(move || {
        let mut channel = HttpSeekableByteChannel::new(url).unwrap();
        let mut first = [0u8; 100];
        channel.read_exact(&mut first).unwrap();

        channel.set_position(150).unwrap();
        assert_eq!(channel.position().unwrap(), 150);

        let mut buf = [0u8; 10];
        channel.read_exact(&mut buf).unwrap();
        assert_eq!(buf.as_slice(), expected.as_slice());
        assert_eq!(channel.position().unwrap(), 160);
    })
    .await
    .unwrap();

    server.verify().await;
}

#[tokio::test]
async fn backward_seek_reopens_with_a_range_request() {
    let server = MockServer::start().await;
    let body = test_body(100_000);
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .and(header("Range", "bytes=50-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(body[50..].to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let url = file_url(&server, "data.bin");
    let expected = body[50..250].to_vec();
    spawn_blocking(move || {
        let mut channel = HttpSeekableByteChannel::new(url).unwrap();
        let mut first = [0u8; 200];
        channel.read_exact(&mut first).unwrap();

        channel.set_position(50).unwrap();
        let mut buf = vec![0u8; 200];
        channel.read_exact(&mut buf).unwrap();
        assert_eq!(buf.as_slice(), expected.as_slice());
        assert_eq!(channel.position().unwrap(), 250);
    })
    .await
    .unwrap();

    server.verify().await;
}

#[tokio::test]
async fn long_forward_seek_reopens_instead_of_skipping() {
    let server = MockServer::start().await;
    let body = test_body(100_000);
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .and(header("Range", "bytes=50000-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(body[50_000..].to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let url = file_url(&server, "data.bin");
    let expected = body[50_000..50_010].to_vec();
    spawn_blocking(move || {
        let mut channel = HttpSeekableByteChannel::new(url).unwrap();
        channel.set_position(50_000).unwrap();

        let mut buf = [0u8; 10];
        channel.read_exact(&mut buf).unwrap();
        assert_eq!(buf.as_slice(), expected.as_slice());
    })
    .await
    .unwrap();

    server.verify().await;
}

#[tokio::test]
async fn opening_at_an_offset_sends_a_range_request() {
    let server = MockServer::start().await;
    let body = test_body(1_000);
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .and(header("Range", "bytes=100-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(body[100..].to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let url = file_url(&server, "data.bin");
    let expected = body[100..110].to_vec();
    spawn_blocking(move || {
        let mut channel =
            HttpSeekableByteChannel::with_settings(url, &settings(0), 100).unwrap();
        assert_eq!(channel.position().unwrap(), 100);

        let mut buf = [0u8; 10];
        channel.read_exact(&mut buf).unwrap();
        assert_eq!(buf.as_slice(), expected.as_slice());
    })
    .await
    .unwrap();

    server.verify().await;
}

#[tokio::test]
async fn transient_fault_on_open_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.txt"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("Hello"))
        .mount(&server)
        .await;

    let url = file_url(&server, "flaky.txt");
    spawn_blocking(move || {
        let mut channel = HttpSeekableByteChannel::with_settings(url, &settings(2), 0).unwrap();
        let mut buf = [0u8; 5];
        channel.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"Hello");
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn exhausted_retries_report_attempts_and_cause() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken.txt"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let url = file_url(&server, "broken.txt");
    spawn_blocking(move || {
        let err = HttpSeekableByteChannel::with_settings(url, &settings(2), 0).unwrap_err();
        match err {
            HttpFsError::OutOfRetries {
                retries,
                total_wait,
                cause,
            } => {
                assert_eq!(retries, 2);
                assert!(total_wait > std::time::Duration::ZERO);
                assert_eq!(cause.response_code(), Some(500));
            }
            other => panic!("expected OutOfRetries, got {other:?}"),
        }
    })
    .await
    .unwrap();

    server.verify().await;
}

#[tokio::test]
async fn range_mismatch_fails_without_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/norange.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(test_body(1_000)))
        .expect(1)
        .mount(&server)
        .await;

    let url = file_url(&server, "norange.txt");
    spawn_blocking(move || {
        let err = HttpSeekableByteChannel::with_settings(url, &settings(3), 100).unwrap_err();
        assert!(matches!(
            err,
            HttpFsError::IncompatibleRangeResponse { code: 200, .. }
        ));
    })
    .await
    .unwrap();

    server.verify().await;
}

#[tokio::test]
async fn missing_resource_is_file_not_found() {
    let server = MockServer::start().await;

    let url = file_url(&server, "absent.txt");
    spawn_blocking(move || {
        let err = HttpSeekableByteChannel::with_settings(url, &settings(1), 0).unwrap_err();
        assert!(matches!(err, HttpFsError::FileNotFound(_)));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn closed_channel_rejects_every_operation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("Hello"))
        .mount(&server)
        .await;

    let url = file_url(&server, "hello.txt");
    spawn_blocking(move || {
        let mut channel = HttpSeekableByteChannel::new(url).unwrap();
        assert!(channel.is_open());

        channel.close();
        assert!(!channel.is_open());

        let mut buf = [0u8; 1];
        assert!(matches!(
            HttpSeekableByteChannel::read(&mut channel, &mut buf),
            Err(HttpFsError::ClosedChannel)
        ));
        assert!(matches!(channel.position(), Err(HttpFsError::ClosedChannel)));
        assert!(matches!(
            channel.set_position(10),
            Err(HttpFsError::ClosedChannel)
        ));
        assert!(matches!(channel.size(), Err(HttpFsError::ClosedChannel)));

        // closing again is a no-op
        channel.close();
        assert!(!channel.is_open());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn write_and_truncate_are_non_writable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hello.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes("Hello"))
        .mount(&server)
        .await;

    let url = file_url(&server, "hello.txt");
    spawn_blocking(move || {
        let mut channel = HttpSeekableByteChannel::new(url).unwrap();
        assert!(matches!(
            channel.write(b"data"),
            Err(HttpFsError::NonWritableChannel)
        ));
        assert!(matches!(
            channel.truncate(1),
            Err(HttpFsError::NonWritableChannel)
        ));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn size_is_cached_after_the_first_head() {
    let server = MockServer::start().await;
    let body = test_body(1_000);
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(1)
        .mount(&server)
        .await;

    let url = file_url(&server, "data.bin");
    spawn_blocking(move || {
        let mut channel = HttpSeekableByteChannel::new(url).unwrap();
        assert_eq!(channel.size().unwrap(), 1_000);

        let mut buf = [0u8; 100];
        channel.read_exact(&mut buf).unwrap();
        assert_eq!(channel.size().unwrap(), 1_000);
    })
    .await
    .unwrap();

    server.verify().await;
}

#[tokio::test]
async fn seek_trait_resolves_end_offsets_through_size() {
    let server = MockServer::start().await;
    let body = test_body(10_000);
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .and(header("Range", "bytes=9900-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(body[9_900..].to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/data.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let url = file_url(&server, "data.bin");
    let expected = body[9_900..9_910].to_vec();
    spawn_blocking(move || {
        let mut channel = HttpSeekableByteChannel::new(url).unwrap();
        assert_eq!(channel.seek(SeekFrom::End(-100)).unwrap(), 9_900);

        let mut buf = [0u8; 10];
        channel.read_exact(&mut buf).unwrap();
        assert_eq!(buf.as_slice(), expected.as_slice());

        // seeking before the start of the resource is rejected
        assert!(channel.seek(SeekFrom::Current(-20_000)).is_err());
    })
    .await
    .unwrap();
}
