use super::*;
use crate::error::DownloadError;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn payload_lands_byte_identical() {
    let server = MockServer::start().await;
    let payload: Vec<u8> = (0..256 * 1024).map(|i| (i % 251) as u8).collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("id", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let factory = JobFactory::new(dir.path(), "DL-");
    // downloadable URLs have no path at all
    let job = factory.next_job(format!("{}?id=5", server.uri()));

    let downloader = HttpDownloader::new(&DownloadConfig::default()).unwrap();
    let written = downloader.run(&job).await.unwrap();

    assert_eq!(written, payload.len() as u64);
    assert_eq!(std::fs::read(&job.target_path).unwrap(), payload);
}

#[tokio::test]
async fn server_error_is_a_transfer_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let job = JobFactory::new(dir.path(), "DL-").next_job(server.uri());

    let downloader = HttpDownloader::new(&DownloadConfig::default()).unwrap();
    let err = downloader.run(&job).await.unwrap_err();

    match err {
        DownloadError::Transfer {
            reason,
            bytes_written,
            ..
        } => {
            assert!(reason.contains("500"), "reason was {reason}");
            assert_eq!(bytes_written, 0);
        }
        other => panic!("expected transfer error, got {other:?}"),
    }
    // the destination was created before the request; it stays empty
    assert_eq!(std::fs::metadata(&job.target_path).unwrap().len(), 0);
}

#[tokio::test]
async fn occupied_destination_is_a_file_create_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("new"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let job = JobFactory::new(dir.path(), "DL-").next_job(server.uri());
    std::fs::write(&job.target_path, b"existing").unwrap();

    let downloader = HttpDownloader::new(&DownloadConfig::default()).unwrap();
    let err = downloader.run(&job).await.unwrap_err();

    assert!(matches!(err, DownloadError::FileCreate { .. }));
    assert_eq!(std::fs::read(&job.target_path).unwrap(), b"existing");
}

#[tokio::test]
async fn missing_directory_is_a_file_create_error() {
    let dir = tempfile::tempdir().unwrap();
    let job = JobFactory::new(dir.path().join("missing"), "DL-").next_job("http://127.0.0.1:1");

    let downloader = HttpDownloader::new(&DownloadConfig::default()).unwrap();
    let err = downloader.run(&job).await.unwrap_err();
    assert!(matches!(err, DownloadError::FileCreate { .. }));
}

#[tokio::test]
async fn unreachable_source_is_a_transfer_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let source = format!("http://{}?id=1", listener.local_addr().unwrap());
    drop(listener);

    let dir = tempfile::tempdir().unwrap();
    let job = JobFactory::new(dir.path(), "DL-").next_job(source);

    let downloader = HttpDownloader::new(&DownloadConfig::default()).unwrap();
    let err = downloader.run(&job).await.unwrap_err();
    assert!(matches!(err, DownloadError::Transfer { .. }));
}
