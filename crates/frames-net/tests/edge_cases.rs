//! Edge case tests for frames-net
//!
//! Scheme dispatch, request building and local file loading.

use frames_net::*;

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("frames-net-{}-{}", std::process::id(), name))
}

// ============================================================================
// REQUEST BUILDER TESTS
// ============================================================================

#[test]
fn test_request_get() {
    let req = Request::get("https://example.com/frame.png");
    assert_eq!(req.url, "https://example.com/frame.png");
    assert!(req.headers.is_empty());
}

#[test]
fn test_request_header_overwrite() {
    let req = Request::get("https://example.com")
        .with_header("Accept", "image/png")
        .with_header("Accept", "image/gif");

    assert_eq!(req.headers.len(), 1);
    assert_eq!(req.headers.get("Accept").unwrap(), "image/gif");
}

// ============================================================================
// LOADER TESTS
// ============================================================================

#[test]
fn test_invalid_url() {
    let loader = ResourceLoader::new().unwrap();
    let err = loader.request(Request::get("::::")).unwrap_err();
    assert!(matches!(err, NetError::InvalidUrl(_)));
}

#[test]
fn test_unsupported_scheme() {
    let loader = ResourceLoader::new().unwrap();
    let err = loader.request(Request::get("ftp://example.com/image.gif")).unwrap_err();
    match err {
        NetError::UnsupportedScheme(scheme) => assert_eq!(scheme, "ftp"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_file_url() {
    let path = temp_path("file-url.bin");
    std::fs::write(&path, [1u8, 2, 3, 4]).unwrap();

    let url = Url::from_file_path(&path).unwrap();
    let response = ResourceLoader::new().unwrap().request(Request::get(url.as_str())).unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, vec![1, 2, 3, 4]);
    assert!(response.content_type().is_none());

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_missing_file() {
    let path = temp_path("does-not-exist.gif");
    let url = Url::from_file_path(&path).unwrap();

    let err = ResourceLoader::new().unwrap().request(Request::get(url.as_str())).unwrap_err();
    assert!(matches!(err, NetError::Io(_)));
}

#[test]
fn test_file_url_ignores_headers() {
    let path = temp_path("with-headers.bin");
    std::fs::write(&path, b"GIF89a").unwrap();

    let url = Url::from_file_path(&path).unwrap();
    let request = Request::get(url.as_str()).with_header("Accept", "image/*");
    let response = ResourceLoader::new().unwrap().request(request).unwrap();
    assert_eq!(response.body, b"GIF89a");

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_response_header_lookup() {
    let response = Response {
        status: 200,
        headers: vec![("Content-Type".into(), "image/gif".into())],
        body: Vec::new(),
    };

    assert_eq!(response.content_type(), Some("image/gif"));
    assert_eq!(response.header("CONTENT-TYPE"), Some("image/gif"));
    assert_eq!(response.header("etag"), None);
}

#[test]
fn test_error_display() {
    let err = NetError::HttpError { status: 404 };
    assert_eq!(err.to_string(), "HTTP error: 404");
}
