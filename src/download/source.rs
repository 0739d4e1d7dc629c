use crate::download::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use log::{debug, warn};
use reqwest::header::{HeaderMap, LAST_MODIFIED};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// An open remote file.
pub struct RemoteFile {
    /// Length announced by the server, if any.
    pub content_length: Option<u64>,
    /// Modification time announced by the server, if any.
    pub last_modified: Option<DateTime<Utc>>,
    pub body: ByteStream,
}

/// Where archive files come from.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Full address of `remote_path`, used in logs and errors.
    fn url(&self, remote_path: &str) -> String;

    /// Opens `remote_path` for streaming. A missing file is reported as
    /// [`TransportError::NotFound`].
    async fn fetch(&self, remote_path: &str) -> Result<RemoteFile, TransportError>;

    /// Whether `remote_path` exists, without transferring it.
    async fn exists(&self, remote_path: &str) -> Result<bool, TransportError>;

    /// When `remote_path` was last modified on the server, without transferring it.
    ///
    /// `None` if the server does not say. A missing file is reported as
    /// [`TransportError::NotFound`].
    async fn last_modified(&self, remote_path: &str)
        -> Result<Option<DateTime<Utc>>, TransportError>;
}

/// [`RemoteSource`] over HTTP(S).
pub struct HttpSource {
    client: Client,
    server: String,
}

impl HttpSource {
    pub fn new(server: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
        })
    }
}

fn is_missing(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

fn status_error(url: String, e: reqwest::Error) -> TransportError {
    match e.status() {
        Some(status) => TransportError::HttpStatus {
            url,
            status,
            source: e,
        },
        None => TransportError::NetworkRequest(url, e),
    }
}

/// Reads an RFC 2822 `Last-Modified` header, e.g. `Sat, 15 Apr 2023 09:12:00 GMT`.
fn parse_last_modified(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let value = headers.get(LAST_MODIFIED)?.to_str().ok()?;
    DateTime::parse_from_rfc2822(value)
        .map(|time| time.with_timezone(&Utc))
        .ok()
}

impl HttpSource {
    /// HEAD request; `Ok(None)` if the file does not exist.
    async fn head(&self, remote_path: &str) -> Result<Option<Response>, TransportError> {
        let url = self.url(remote_path);
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| TransportError::NetworkRequest(url.clone(), e))?;
        if is_missing(response.status()) {
            return Ok(None);
        }
        response
            .error_for_status()
            .map(Some)
            .map_err(|e| status_error(url, e))
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    fn url(&self, remote_path: &str) -> String {
        format!("{}/{}", self.server, remote_path.trim_start_matches('/'))
    }

    async fn fetch(&self, remote_path: &str) -> Result<RemoteFile, TransportError> {
        let url = self.url(remote_path);
        debug!("Requesting {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::NetworkRequest(url.clone(), e))?;

        if is_missing(response.status()) {
            return Err(TransportError::NotFound(url));
        }
        let response = response.error_for_status().map_err(|e| {
            warn!("HTTP error for {}: {:?}", url, e);
            status_error(url.clone(), e)
        })?;

        let content_length = response.content_length();
        let last_modified = parse_last_modified(response.headers());
        let body = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .boxed();
        Ok(RemoteFile {
            content_length,
            last_modified,
            body,
        })
    }

    async fn exists(&self, remote_path: &str) -> Result<bool, TransportError> {
        Ok(self.head(remote_path).await?.is_some())
    }

    async fn last_modified(
        &self,
        remote_path: &str,
    ) -> Result<Option<DateTime<Utc>>, TransportError> {
        match self.head(remote_path).await? {
            Some(response) => Ok(parse_last_modified(response.headers())),
            None => Err(TransportError::NotFound(self.url(remote_path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_parse_last_modified() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_last_modified(&headers), None);

        headers.insert(LAST_MODIFIED, HeaderValue::from_static("Sat, 15 Apr 2023 09:12:00 GMT"));
        assert_eq!(
            parse_last_modified(&headers),
            Some(Utc.with_ymd_and_hms(2023, 4, 15, 9, 12, 0).unwrap())
        );

        headers.insert(LAST_MODIFIED, HeaderValue::from_static("yesterday"));
        assert_eq!(parse_last_modified(&headers), None);
    }

    #[test]
    fn test_url_joining() -> Result<(), reqwest::Error> {
        let source = HttpSource::new("http://ftp.cptec.inpe.br/", Duration::from_secs(5))?;
        assert_eq!(
            source.url("/modelos/tempo/MERGE/GPM/DAILY/2023/04/MERGE_CPTEC_20230415.grib2"),
            "http://ftp.cptec.inpe.br/modelos/tempo/MERGE/GPM/DAILY/2023/04/MERGE_CPTEC_20230415.grib2"
        );
        Ok(())
    }
}
