// `RemoteFiles` over the Folio HTTP API.

use std::time::Duration;

use anyhow::{Context, Result};
use folio_common::path::DocPath;
use folio_common::protocol::http::{
    AssetUploadQuery, AssetUploadResponse, CollectionReport, ContentResponse, CreateRequest,
    EntryKind, ErrorEnvelope, PatchRequest, PathQuery, RenameRequest, SuccessResponse,
    TreeResponse, WriteRequest, WriteResponse,
};
use folio_common::protocol::routes;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::{RemoteError, RemoteFiles};

#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base: Url,
}

impl HttpRemote {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base =
            Url::parse(base_url).with_context(|| format!("invalid server url `{base_url}`"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub async fn tree(&self) -> Result<TreeResponse, RemoteError> {
        self.send(self.client.get(self.url(routes::TREE)?)).await
    }

    pub async fn health(&self) -> Result<(), RemoteError> {
        let response = self
            .client
            .get(self.url(routes::HEALTHZ)?)
            .send()
            .await
            .map_err(transport_error)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(RemoteError::Server {
                status: response.status().as_u16(),
                message: "health check failed".into(),
            })
        }
    }

    pub async fn upload_asset(
        &self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<AssetUploadResponse, RemoteError> {
        let query = AssetUploadQuery { name: name.to_string() };
        self.send(self.client.post(self.url(routes::ASSETS)?).query(&query).body(bytes)).await
    }

    pub async fn run_collector(&self) -> Result<CollectionReport, RemoteError> {
        self.send(self.client.post(self.url(routes::GC_RUN)?)).await
    }

    fn url(&self, route: &str) -> Result<Url, RemoteError> {
        self.base
            .join(route.trim_start_matches('/'))
            .map_err(|e| RemoteError::InvalidPath(e.to_string()))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| RemoteError::Server {
                status: status.as_u16(),
                message: format!("unexpected response body: {e}"),
            });
        }

        let body = response.bytes().await.map_err(transport_error)?;
        Err(error_from_response(status, &body))
    }

    async fn send_success(&self, request: RequestBuilder) -> Result<(), RemoteError> {
        let _: SuccessResponse = self.send(request).await?;
        Ok(())
    }
}

impl RemoteFiles for HttpRemote {
    async fn read(&self, path: &DocPath) -> Result<ContentResponse, RemoteError> {
        let query = PathQuery { path: path.to_string() };
        self.send(self.client.get(self.url(routes::CONTENT)?).query(&query)).await
    }

    async fn full_update(&self, path: &DocPath, content: &str) -> Result<WriteResponse, RemoteError> {
        let body = WriteRequest { path: path.to_string(), content: content.to_string() };
        self.send(self.client.put(self.url(routes::CONTENT)?).json(&body)).await
    }

    async fn patch(
        &self,
        path: &DocPath,
        patch: &str,
        base_fingerprint: &str,
    ) -> Result<WriteResponse, RemoteError> {
        let body = PatchRequest {
            path: path.to_string(),
            patch: patch.to_string(),
            base_fingerprint: base_fingerprint.to_string(),
        };
        self.send(self.client.patch(self.url(routes::CONTENT)?).json(&body)).await
    }

    async fn create(&self, path: &DocPath, kind: EntryKind) -> Result<(), RemoteError> {
        let body = CreateRequest { path: path.to_string(), kind };
        self.send_success(self.client.post(self.url(routes::FILES)?).json(&body)).await
    }

    async fn delete(&self, path: &DocPath) -> Result<(), RemoteError> {
        let query = PathQuery { path: path.to_string() };
        self.send_success(self.client.delete(self.url(routes::CONTENT)?).query(&query)).await
    }

    async fn rename(&self, old: &DocPath, new: &DocPath) -> Result<(), RemoteError> {
        let body = RenameRequest { old_path: old.to_string(), new_path: new.to_string() };
        self.send_success(self.client.post(self.url(routes::RENAME)?).json(&body)).await
    }

    async fn move_to(&self, old: &DocPath, new: &DocPath) -> Result<(), RemoteError> {
        let body = RenameRequest { old_path: old.to_string(), new_path: new.to_string() };
        self.send_success(self.client.post(self.url(routes::MOVE)?).json(&body)).await
    }
}

fn transport_error(error: reqwest::Error) -> RemoteError {
    RemoteError::Unreachable(error.to_string())
}

/// Map an error response onto the client taxonomy using the envelope's
/// `code`, falling back to the bare status when the body is not an envelope.
fn error_from_response(status: StatusCode, body: &[u8]) -> RemoteError {
    let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) else {
        return match status {
            StatusCode::NOT_FOUND => RemoteError::NotFound,
            _ => RemoteError::Server {
                status: status.as_u16(),
                message: String::from_utf8_lossy(body).into_owned(),
            },
        };
    };

    let current_content = envelope.current_content;
    match envelope.error.code.as_str() {
        routes::ERR_NOT_FOUND => RemoteError::NotFound,
        routes::ERR_VERSION_CONFLICT => RemoteError::VersionConflict { current_content },
        routes::ERR_PATCH_APPLY_FAILED => RemoteError::PatchApplyFailed { current_content },
        routes::ERR_DESTINATION_EXISTS => RemoteError::DestinationExists,
        routes::ERR_INVALID_PATH | routes::ERR_PATH_OUTSIDE_ROOT => {
            RemoteError::InvalidPath(envelope.error.message)
        }
        _ => RemoteError::Server { status: status.as_u16(), message: envelope.error.message },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(code: &str, current: Option<&str>) -> Vec<u8> {
        let mut body = json!({
            "error": {
                "code": code,
                "message": "boom",
                "retryable": false,
                "request_id": "req-1",
                "details": {}
            }
        });
        if let Some(current) = current {
            body["currentContent"] = json!(current);
        }
        serde_json::to_vec(&body).expect("envelope should serialize")
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let remote = HttpRemote::new("http://localhost:8080/folio", Duration::from_secs(1))
            .expect("remote should build");
        assert_eq!(
            remote.url(routes::CONTENT).expect("url should join").as_str(),
            "http://localhost:8080/folio/api/content"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HttpRemote::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn version_conflict_carries_current_content() {
        let err = error_from_response(
            StatusCode::CONFLICT,
            &envelope(routes::ERR_VERSION_CONFLICT, Some("A2")),
        );
        assert_eq!(err, RemoteError::VersionConflict { current_content: Some("A2".into()) });
        assert!(err.falls_back_to_overwrite());
    }

    #[test]
    fn patch_apply_failure_is_mapped() {
        let err = error_from_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            &envelope(routes::ERR_PATCH_APPLY_FAILED, None),
        );
        assert_eq!(err, RemoteError::PatchApplyFailed { current_content: None });
    }

    #[test]
    fn path_errors_map_to_invalid_path() {
        for code in [routes::ERR_INVALID_PATH, routes::ERR_PATH_OUTSIDE_ROOT] {
            let err = error_from_response(StatusCode::BAD_REQUEST, &envelope(code, None));
            assert_eq!(err, RemoteError::InvalidPath("boom".into()));
            assert!(!err.falls_back_to_overwrite());
        }
    }

    #[test]
    fn destination_exists_is_mapped() {
        let err =
            error_from_response(StatusCode::BAD_REQUEST, &envelope(routes::ERR_DESTINATION_EXISTS, None));
        assert_eq!(err, RemoteError::DestinationExists);
    }

    #[test]
    fn unknown_code_keeps_status_and_message() {
        let err = error_from_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &envelope(routes::ERR_INTERNAL, None),
        );
        assert_eq!(err, RemoteError::Server { status: 500, message: "boom".into() });
    }

    #[test]
    fn non_envelope_404_is_not_found() {
        assert_eq!(error_from_response(StatusCode::NOT_FOUND, b"nope"), RemoteError::NotFound);
        assert_eq!(
            error_from_response(StatusCode::BAD_GATEWAY, b"upstream down"),
            RemoteError::Server { status: 502, message: "upstream down".into() }
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_reported_as_unreachable() {
        let remote = HttpRemote::new("http://127.0.0.1:9", Duration::from_secs(2))
            .expect("remote should build");
        let path = DocPath::parse("a.md").expect("valid path");
        let err = remote.read(&path).await.expect_err("nothing listens on port 9");
        assert!(matches!(err, RemoteError::Unreachable(_)), "got {err:?}");
    }
}
