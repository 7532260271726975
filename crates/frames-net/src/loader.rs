//! Resource Loader
//!
//! Blocking loader for `http`, `https` and `file` URLs. Meant to run on
//! background threads, never on the render thread.

use crate::{NetError, Response};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// GET request with extra headers
#[derive(Debug, Default)]
pub struct Request {
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl Request {
    pub fn get(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }
}

/// Loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// User agent string
    pub user_agent: String,
    /// Whole-request timeout (`None` waits indefinitely)
    pub timeout: Option<Duration>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("frames-net/{}", env!("CARGO_PKG_VERSION")),
            timeout: None,
        }
    }
}

/// Load resources from network or disk
#[derive(Debug, Clone)]
pub struct ResourceLoader {
    client: reqwest::blocking::Client,
}

impl ResourceLoader {
    pub fn new() -> Result<Self, NetError> {
        Self::with_config(LoaderConfig::default())
    }

    pub fn with_config(config: LoaderConfig) -> Result<Self, NetError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| NetError::Network(e.to_string()))?;

        Ok(Self { client })
    }

    /// Perform a request, dispatching on the URL scheme
    pub fn request(&self, req: Request) -> Result<Response, NetError> {
        let url = parse_url(&req.url)?;

        match url.scheme() {
            "http" | "https" => self.request_http(url, req.headers),
            "file" => read_file(&url),
            other => Err(NetError::UnsupportedScheme(other.to_string())),
        }
    }

    fn request_http(&self, url: Url, headers: HashMap<String, String>) -> Result<Response, NetError> {
        tracing::info!("HTTP GET {}", url);

        let mut builder = self.client.get(url);
        for (key, value) in headers {
            builder = builder.header(key, value);
        }

        let response = builder
            .send()
            .map_err(|e| NetError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetError::HttpError { status: status.as_u16() });
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value.to_str().ok().map(|v| (key.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .map_err(|e| NetError::Network(e.to_string()))?
            .to_vec();

        tracing::debug!("Fetched {} bytes", body.len());

        Ok(Response {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

fn parse_url(raw: &str) -> Result<Url, NetError> {
    Url::parse(raw).map_err(|e| NetError::InvalidUrl(format!("{}: {}", raw, e)))
}

fn read_file(url: &Url) -> Result<Response, NetError> {
    let path = url
        .to_file_path()
        .map_err(|_| NetError::InvalidUrl(url.to_string()))?;

    tracing::info!("FILE {}", path.display());
    let body = std::fs::read(&path)?;

    Ok(Response {
        status: 200,
        headers: Vec::new(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let req = Request::get("https://example.com/a.gif").with_header("Accept", "image/*");

        assert_eq!(req.url, "https://example.com/a.gif");
        assert_eq!(req.headers.get("Accept").unwrap(), "image/*");
    }

    #[test]
    fn test_parse_url_rejects_garbage() {
        assert!(matches!(parse_url("not a url"), Err(NetError::InvalidUrl(_))));
    }

    #[test]
    fn test_read_file_url() {
        let path = std::env::temp_dir().join(format!("frames-net-loader-{}.bin", std::process::id()));
        std::fs::write(&path, b"GIF89a").unwrap();

        let url = Url::from_file_path(&path).unwrap();
        let response = read_file(&url).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"GIF89a");

        std::fs::remove_file(&path).unwrap();
    }
}
