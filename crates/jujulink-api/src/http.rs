// HTTP side channel for charm archives and charm files.
//
// The RPC socket cannot carry binary payloads, so local charm uploads and
// charm file downloads go through the controller's HTTPS API with basic
// auth. `FileTransfer` is object-safe so sessions can hold a stub in tests.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Upload chunk size for streamed request bodies.
const UPLOAD_CHUNK: usize = 64 * 1024;

/// Progress callback: bytes transferred so far, total when known.
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// `/model/<uuid>/charms?<query>`, with the query form-encoded.
pub fn charm_api_path(model_uuid: &str, query: &[(&str, &str)]) -> String {
    let mut path = format!("/model/{model_uuid}/charms");
    if !query.is_empty() {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(query)
            .finish();
        path.push('?');
        path.push_str(&encoded);
    }
    path
}

// ── Request / reply ─────────────────────────────────────────────────

/// Addressing and credentials shared by every side-channel request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Path plus query, relative to the controller root.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub user: String,
    pub password: SecretString,
}

impl HttpRequest {
    pub fn new(path: impl Into<String>, user: impl Into<String>, password: SecretString) -> Self {
        Self {
            path: path.into(),
            headers: Vec::new(),
            user: user.into(),
            password,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successful (2xx) response body.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Bytes,
}

impl HttpReply {
    pub fn json(&self) -> Result<serde_json::Value, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

// ── FileTransfer ────────────────────────────────────────────────────

pub trait FileTransfer: Send + Sync {
    /// POST `body` to `request.path`, reporting upload progress.
    fn send_post_request(
        &self,
        request: HttpRequest,
        body: Bytes,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'_, Result<HttpReply, Error>>;

    /// GET `request.path`, reporting download progress.
    fn send_get_request(
        &self,
        request: HttpRequest,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'_, Result<HttpReply, Error>>;

    /// Absolute URL for `path` with the credentials embedded.
    fn get_url(&self, path: &str, user: &str, password: &SecretString) -> Result<Url, Error>;
}

// ── reqwest implementation ──────────────────────────────────────────

/// `FileTransfer` over the controller's HTTPS API.
pub struct HttpFileTransfer {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpFileTransfer {
    pub fn new(base_url: Url, config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: config.build_client()?,
            base_url,
        })
    }

    /// Use an existing client (tests, shared connection pools).
    pub fn with_client(base_url: Url, http: reqwest::Client) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    fn request(
        &self,
        method: reqwest::Method,
        request: &HttpRequest,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let url = self.url(&request.path)?;
        debug!(%method, %url, "file transfer request");
        Ok(self
            .http
            .request(method, url)
            .headers(header_map(&request.headers)?)
            .basic_auth(&request.user, Some(request.password.expose_secret())))
    }

    async fn finish(
        response: reqwest::Response,
        progress: Option<ProgressFn>,
    ) -> Result<HttpReply, Error> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }

        let total = response.content_length();
        let mut received: u64 = 0;
        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            received += chunk.len() as u64;
            body.extend_from_slice(&chunk);
            if let Some(report) = &progress {
                report(received, total);
            }
        }

        Ok(HttpReply {
            status: status.as_u16(),
            body: Bytes::from(body),
        })
    }
}

impl FileTransfer for HttpFileTransfer {
    fn send_post_request(
        &self,
        request: HttpRequest,
        body: Bytes,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'_, Result<HttpReply, Error>> {
        Box::pin(async move {
            let total = body.len() as u64;
            let report = progress;
            let stream = async_stream::stream! {
                let mut sent: u64 = 0;
                let mut offset = 0;
                while offset < body.len() {
                    let end = (offset + UPLOAD_CHUNK).min(body.len());
                    let chunk = body.slice(offset..end);
                    offset = end;
                    sent += chunk.len() as u64;
                    if let Some(report) = &report {
                        report(sent, Some(total));
                    }
                    yield Ok::<Bytes, std::io::Error>(chunk);
                }
            };

            let response = self
                .request(reqwest::Method::POST, &request)?
                .header(reqwest::header::CONTENT_LENGTH, total)
                .body(reqwest::Body::wrap_stream(stream))
                .send()
                .await?;
            Self::finish(response, None).await
        })
    }

    fn send_get_request(
        &self,
        request: HttpRequest,
        progress: Option<ProgressFn>,
    ) -> BoxFuture<'_, Result<HttpReply, Error>> {
        Box::pin(async move {
            let response = self
                .request(reqwest::Method::GET, &request)?
                .send()
                .await?;
            Self::finish(response, progress).await
        })
    }

    fn get_url(&self, path: &str, user: &str, password: &SecretString) -> Result<Url, Error> {
        let mut url = self.url(path)?;
        if url.set_username(user).is_err()
            || url.set_password(Some(password.expose_secret())).is_err()
        {
            return Err(Error::malformed(format!("cannot embed credentials in {url}")));
        }
        Ok(url)
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, Error> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::malformed(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::malformed(format!("invalid header value: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charm_path_encodes_query() {
        assert_eq!(charm_api_path("uuid", &[]), "/model/uuid/charms");
        assert_eq!(
            charm_api_path("uuid", &[("series", "trusty")]),
            "/model/uuid/charms?series=trusty"
        );
        assert_eq!(
            charm_api_path("uuid", &[("url", "local:trusty/django-42"), ("file", "hooks/install")]),
            "/model/uuid/charms?url=local%3Atrusty%2Fdjango-42&file=hooks%2Finstall"
        );
    }

    #[test]
    fn url_embeds_credentials() {
        let transfer = HttpFileTransfer::with_client(
            Url::parse("https://10.0.0.2:17070").unwrap(),
            reqwest::Client::new(),
        );
        let url = transfer
            .get_url(
                "/model/uuid/charms?url=local:trusty/django-42&file=icon.svg",
                "user-admin",
                &SecretString::from("s3cret"),
            )
            .unwrap();
        assert_eq!(url.username(), "user-admin");
        assert_eq!(url.password(), Some("s3cret"));
        assert_eq!(url.path(), "/model/uuid/charms");
        assert_eq!(url.query(), Some("url=local:trusty/django-42&file=icon.svg"));
    }

    #[test]
    fn bad_header_name_is_rejected() {
        let err = header_map(&[("bad header".into(), "x".into())]).unwrap_err();
        assert!(matches!(err, Error::MalformedPayload { .. }));
    }
}
