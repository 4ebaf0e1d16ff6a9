//! Google Drive v3 client
//!
//! Talks to the Drive REST API directly with `reqwest`:
//! - access tokens come from the OAuth2 refresh-token grant and are cached
//!   until shortly before they expire
//! - folders are looked up by exact name and created on demand
//! - files are sent as a single `multipart/related` upload (metadata + media)

use super::remote::{RemoteError, RemoteResult, RemoteStore, RemoteUpload};
use crate::config::DriveConfig;
use crate::models::{RemoteFile, RemoteFolder};
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
/// Refresh this long before the reported expiry
const TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFolder>,
}

pub struct DriveClient {
    http: reqwest::Client,
    config: DriveConfig,
    token: RwLock<Option<CachedToken>>,
}

impl DriveClient {
    pub fn new(config: DriveConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    pub fn with_http_client(config: DriveConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            config,
            token: RwLock::new(None),
        }
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.config.api_url.trim_end_matches('/'))
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.config.api_url.trim_end_matches('/'))
    }

    async fn access_token(&self) -> RemoteResult<String> {
        if let Some(token) = self.token.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let mut guard = self.token.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        debug!("Refreshing Drive access token");
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Drive token refresh rejected");
            return Err(RemoteError::Auth(format!("token endpoint returned {}: {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS));
        let cached = CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_SKEW),
        };
        let access_token = cached.access_token.clone();
        *guard = Some(cached);

        Ok(access_token)
    }
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn find_folder(&self, name: &str) -> RemoteResult<Option<RemoteFolder>> {
        let token = self.access_token().await?;
        let query = folder_query(name);

        let response = self
            .http
            .get(self.files_url())
            .bearer_auth(token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id, name)"),
                ("spaces", "drive"),
            ])
            .send()
            .await?;

        let list: FileList = check_status(response).await?.json().await?;
        if list.files.len() > 1 {
            warn!(folder = %name, matches = list.files.len(), "Multiple remote folders share this name, using the first");
        }
        Ok(list.files.into_iter().next())
    }

    async fn create_folder(&self, name: &str) -> RemoteResult<RemoteFolder> {
        let token = self.access_token().await?;

        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
        });
        if let Some(parent) = &self.config.parent_folder_id {
            metadata["parents"] = serde_json::json!([parent]);
        }

        let response = self
            .http
            .post(self.files_url())
            .bearer_auth(token)
            .query(&[("fields", "id, name")])
            .json(&metadata)
            .send()
            .await?;

        let folder: RemoteFolder = check_status(response).await?.json().await?;
        info!(folder = %folder.name, id = %folder.id, "Created remote folder");
        Ok(folder)
    }

    async fn upload_file(&self, folder_id: &str, upload: RemoteUpload) -> RemoteResult<RemoteFile> {
        let token = self.access_token().await?;

        let metadata = serde_json::json!({
            "name": upload.name,
            "parents": [folder_id],
        });
        let boundary = format!("intake-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related_body(&boundary, &metadata, &upload.content_type, &upload.data);

        let response = self
            .http
            .post(self.upload_url())
            .bearer_auth(token)
            .query(&[("uploadType", "multipart"), ("fields", "id, name")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let file: RemoteFile = check_status(response).await?.json().await?;
        debug!(file = %file.name, id = %file.id, folder = %folder_id, "Uploaded file to remote folder");
        Ok(file)
    }
}

/// Drive search expression matching a live folder with exactly this name.
fn folder_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "name = '{}' and mimeType = '{}' and trashed = false",
        escaped, FOLDER_MIME_TYPE
    )
}

fn multipart_related_body(
    boundary: &str,
    metadata: &serde_json::Value,
    content_type: &str,
    data: &[u8],
) -> bytes::Bytes {
    let metadata = metadata.to_string();
    let mut body = BytesMut::with_capacity(data.len() + metadata.len() + 256);

    body.put_slice(format!("--{}\r\n", boundary).as_bytes());
    body.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.put_slice(metadata.as_bytes());
    body.put_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.put_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.put_slice(data);
    body.put_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    body.freeze()
}

/// Turn a non-2xx response into `RemoteError::Api`, preferring Google's
/// `error.message` over the raw body.
async fn check_status(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or(body);

    Err(RemoteError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config_for(server: &mockito::Server) -> DriveConfig {
        DriveConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: "http://localhost:3000/oauth2callback".to_string(),
            refresh_token: "refresh-token".to_string(),
            token_url: format!("{}/token", server.url()),
            api_url: server.url(),
            parent_folder_id: None,
        }
    }

    async fn mock_token(server: &mut mockito::Server) -> mockito::Mock {
        server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "refresh-token".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.test","expires_in":3599,"token_type":"Bearer"}"#)
            .create_async()
            .await
    }

    #[test]
    fn test_folder_query_escapes_quotes() {
        assert_eq!(
            folder_query("O'Brien"),
            "name = 'O\\'Brien' and mimeType = 'application/vnd.google-apps.folder' and trashed = false"
        );
    }

    #[test]
    fn test_multipart_related_layout() {
        let body = multipart_related_body("b0", &serde_json::json!({"name": "x"}), "application/pdf", b"%PDF");
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("--b0\r\nContent-Type: application/json"));
        assert!(text.contains("Content-Type: application/pdf\r\n\r\n%PDF\r\n"));
        assert!(text.ends_with("--b0--\r\n"));
    }

    #[tokio::test]
    async fn test_find_folder_returns_first_match() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let list = server
            .mock("GET", "/drive/v3/files")
            .match_header("authorization", "Bearer ya29.test")
            .match_query(Matcher::UrlEncoded("q".into(), folder_query("ABC123")))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"files":[{"id":"f-1","name":"ABC123"},{"id":"f-2","name":"ABC123"}]}"#)
            .create_async()
            .await;

        let client = DriveClient::new(config_for(&server));
        let folder = client.find_folder("ABC123").await.unwrap();

        assert_eq!(folder.map(|f| f.id), Some("f-1".to_string()));
        list.assert_async().await;
    }

    #[tokio::test]
    async fn test_find_folder_none() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _list = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"files":[]}"#)
            .create_async()
            .await;

        let client = DriveClient::new(config_for(&server));
        assert!(client.find_folder("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_token_is_cached_between_calls() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.test","expires_in":3599}"#)
            .expect(1)
            .create_async()
            .await;
        let _list = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"files":[]}"#)
            .expect(2)
            .create_async()
            .await;

        let client = DriveClient::new(config_for(&server));
        client.find_folder("a").await.unwrap();
        client.find_folder("b").await.unwrap();

        token.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_folder_sends_folder_mime_type() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let create = server
            .mock("POST", "/drive/v3/files")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "name": "ABC123",
                "mimeType": FOLDER_MIME_TYPE,
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"new-folder","name":"ABC123"}"#)
            .create_async()
            .await;

        let client = DriveClient::new(config_for(&server));
        let folder = client.create_folder("ABC123").await.unwrap();

        assert_eq!(folder.id, "new-folder");
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_related() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let upload = server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "multipart".into()))
            .match_header("content-type", Matcher::Regex("^multipart/related; boundary=".into()))
            .match_body(Matcher::Regex("DOC_ABC123_07032024.pdf".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"file-1","name":"DOC_ABC123_07032024.pdf"}"#)
            .create_async()
            .await;

        let client = DriveClient::new(config_for(&server));
        let file = client
            .upload_file(
                "folder-1",
                RemoteUpload {
                    name: "DOC_ABC123_07032024.pdf".to_string(),
                    content_type: "application/pdf".to_string(),
                    data: bytes::Bytes::from_static(b"%PDF-1.4 test"),
                },
            )
            .await
            .unwrap();

        assert_eq!(file.id, "file-1");
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_carries_google_message() {
        let mut server = mockito::Server::new_async().await;
        let _token = mock_token(&mut server).await;
        let _upload = server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"code":403,"message":"The user's Drive storage quota has been exceeded."}}"#)
            .create_async()
            .await;

        let client = DriveClient::new(config_for(&server));
        let err = client
            .upload_file(
                "folder-1",
                RemoteUpload {
                    name: "x.pdf".to_string(),
                    content_type: "application/pdf".to_string(),
                    data: bytes::Bytes::from_static(b"x"),
                },
            )
            .await
            .unwrap_err();

        match err {
            RemoteError::Api { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("quota has been exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_token_rejection_is_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let client = DriveClient::new(config_for(&server));
        let err = client.find_folder("x").await.unwrap_err();
        assert!(matches!(err, RemoteError::Auth(ref m) if m.contains("invalid_grant")));
    }
}
