// Local charm archives over the HTTP side channel.

use std::sync::Arc;

use bytes::Bytes;
use jujulink_api::http::{FileTransfer, HttpRequest, ProgressFn, charm_api_path};
use jujulink_api::params::user_tag;
use secrecy::SecretString;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::Credentials;
use crate::error::CoreError;
use crate::event::SessionEvent;
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedCharm {
    /// Charm URL assigned by the controller, e.g. `local:trusty/django-0`.
    pub charm_url: String,
}

impl UploadedCharm {
    fn from_json(body: &Value) -> Result<Self, CoreError> {
        body.get("charm-url")
            .or_else(|| body.get("CharmURL"))
            .and_then(Value::as_str)
            .map(|url| Self {
                charm_url: url.to_owned(),
            })
            .ok_or_else(|| CoreError::OperationFailed {
                message: format!("unexpected upload response: {body}"),
            })
    }
}

impl Session {
    fn file_transfer(&self) -> Result<&Arc<dyn FileTransfer>, CoreError> {
        self.inner.files.as_ref().ok_or(CoreError::NoFileTransfer)
    }

    /// Basic-auth credentials for the side channel.
    fn http_credentials(&self) -> Result<(String, SecretString), CoreError> {
        match self.credentials() {
            Some(Credentials::Password { user, password }) => Ok((user_tag(&user), password)),
            _ => Err(CoreError::NotAuthenticated),
        }
    }

    fn model_uuid(&self) -> Result<String, CoreError> {
        self.model_info()
            .and_then(|m| m.uuid)
            .ok_or_else(|| CoreError::ValidationFailed {
                message: "model uuid not known yet".into(),
            })
    }

    /// Upload a zipped local charm for `series`.
    ///
    /// Refused unless the session is authenticated with a password; the
    /// refusal also publishes a failed `LoginCompleted` event.
    pub async fn upload_local_charm(
        &self,
        archive: Bytes,
        series: &str,
        progress: Option<ProgressFn>,
    ) -> Result<UploadedCharm, CoreError> {
        let credentials = if self.is_authenticated() {
            self.http_credentials().ok()
        } else {
            None
        };
        let Some((user, password)) = credentials else {
            warn!("attempted upload without providing credentials");
            self.emit(SessionEvent::LoginCompleted {
                result: false,
                error: None,
            });
            return Err(CoreError::NotAuthenticated);
        };

        let files = self.file_transfer()?;
        let path = charm_api_path(&self.model_uuid()?, &[("series", series)]);
        debug!(%path, size = archive.len(), "uploading local charm");
        let request =
            HttpRequest::new(path, user, password).with_header("Content-Type", "application/zip");
        let reply = files.send_post_request(request, archive, progress).await?;
        UploadedCharm::from_json(&reply.json()?)
    }

    /// Direct URL to one file inside a local charm, credentials included.
    pub fn local_charm_file_url(&self, charm_url: &str, filename: &str) -> Result<Url, CoreError> {
        let (user, password) = self.http_credentials()?;
        let path = charm_api_path(
            &self.model_uuid()?,
            &[("url", charm_url), ("file", filename)],
        );
        Ok(self.file_transfer()?.get_url(&path, &user, &password)?)
    }

    /// Paths of every file in a local charm.
    pub async fn list_local_charm_files(
        &self,
        charm_url: &str,
        progress: Option<ProgressFn>,
    ) -> Result<Vec<String>, CoreError> {
        let path = charm_api_path(&self.model_uuid()?, &[("url", charm_url)]);
        let body = self.http_get(path, progress).await?.json()?;
        Ok(body
            .get("files")
            .or_else(|| body.get("Files"))
            .and_then(Value::as_array)
            .map(|files| {
                files
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Raw contents of one file in a local charm.
    pub async fn get_local_charm_file_contents(
        &self,
        charm_url: &str,
        filename: &str,
        progress: Option<ProgressFn>,
    ) -> Result<Bytes, CoreError> {
        let path = charm_api_path(
            &self.model_uuid()?,
            &[("url", charm_url), ("file", filename)],
        );
        Ok(self.http_get(path, progress).await?.body)
    }

    async fn http_get(
        &self,
        path: String,
        progress: Option<ProgressFn>,
    ) -> Result<jujulink_api::http::HttpReply, CoreError> {
        let (user, password) = self.http_credentials()?;
        let files = self.file_transfer()?;
        Ok(files
            .send_get_request(HttpRequest::new(path, user, password), progress)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn upload_response_accepts_both_casings() {
        let modern = UploadedCharm::from_json(&json!({ "charm-url": "local:trusty/django-0" }));
        let legacy = UploadedCharm::from_json(&json!({ "CharmURL": "local:trusty/django-1" }));
        assert_eq!(modern.unwrap().charm_url, "local:trusty/django-0");
        assert_eq!(legacy.unwrap().charm_url, "local:trusty/django-1");
    }

    #[test]
    fn upload_response_without_url_is_an_error() {
        let err = UploadedCharm::from_json(&json!({})).unwrap_err();
        assert!(matches!(err, CoreError::OperationFailed { .. }));
    }
}
