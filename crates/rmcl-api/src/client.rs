//! HTTP client for the remote document store.
//!
//! One `reqwest::Client` per adapter (mirroring `GraphClient`), with a
//! `tokio::sync::Mutex<Config>` guarding the token set so renewal and
//! persistence stay atomic across concurrent callers.

use std::path::PathBuf;

use reqwest::Method;
use rmcl_core::config::Config;
use rmcl_core::domain::{FileType, RemoteMetadata};
use rmcl_zip::CentralDirectoryEntry;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::constants::{
    DEVICE_DESC, DEVICE_TOKEN_URL, NBYTES, STORAGE_BASE_URL, USER_AGENT, USER_TOKEN_URL,
};
use crate::error::ApiError;

#[derive(Serialize)]
struct RegisterDeviceBody<'a> {
    code: &'a str,
    #[serde(rename = "deviceDesc")]
    device_desc: &'a str,
    #[serde(rename = "deviceID")]
    device_id: String,
}

#[derive(Serialize)]
struct IdVersion<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    #[serde(rename = "Version")]
    version: i64,
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    #[serde(rename = "Version")]
    version: i64,
    #[serde(rename = "Type")]
    item_type: &'a str,
}

/// Typed HTTP client for the remote document store's JSON API.
///
/// Grounded in `GraphClient`'s one-`Client`-per-adapter shape; the exact
/// endpoints, bodies, and response-validation rules follow `rmapy/api.py`.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    config_path: PathBuf,
    tokens: Mutex<Config>,
}

impl ApiClient {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: STORAGE_BASE_URL.to_string(),
            config_path,
            tokens: Mutex::new(config),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(config: Config, config_path: PathBuf, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            config_path,
            tokens: Mutex::new(config),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `rmapy/api.py::Client.request`'s header assembly, minus the
    /// body/stream plumbing `reqwest`'s builder already gives us.
    async fn authed_request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let tokens = self.tokens.lock().await;
        let mut builder = self
            .http
            .request(method, url)
            .header("user-agent", USER_AGENT);
        if let Some(user_token) = tokens.usertoken.as_deref() {
            builder = builder.bearer_auth(user_token);
        }
        builder
    }

    /// Ensures a usable session exists before the caller's first request:
    /// renews the user token if it is absent, failing fatally if there is
    /// no device token to renew from either.
    #[instrument(skip(self))]
    pub async fn ensure_session(&self) -> Result<(), ApiError> {
        let has_user_token = self.tokens.lock().await.usertoken.is_some();
        if has_user_token {
            return Ok(());
        }
        self.renew_token().await
    }

    /// Registers a new device against a one-time code, storing the
    /// resulting device token.
    #[instrument(skip(self, code))]
    pub async fn register_device(&self, code: &str) -> Result<(), ApiError> {
        let body = RegisterDeviceBody {
            code,
            device_desc: DEVICE_DESC,
            device_id: Uuid::new_v4().to_string(),
        };
        let response = self
            .http
            .post(DEVICE_TOKEN_URL)
            .header("user-agent", USER_AGENT)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ApiError::Auth("can't register device".to_string()));
        }
        let device_token = response.text().await?;

        let mut tokens = self.tokens.lock().await;
        tokens.devicetoken = Some(device_token);
        tokens
            .save(&self.config_path)
            .map_err(|e| ApiError::Auth(e.to_string()))?;
        Ok(())
    }

    /// Exchanges the device token for a fresh, short-lived user token.
    #[instrument(skip(self))]
    pub async fn renew_token(&self) -> Result<(), ApiError> {
        let device_token = {
            let tokens = self.tokens.lock().await;
            tokens
                .devicetoken
                .clone()
                .ok_or_else(|| ApiError::Auth("please register a device first".to_string()))?
        };

        let response = self
            .http
            .post(USER_TOKEN_URL)
            .header("user-agent", USER_AGENT)
            .bearer_auth(device_token)
            .send()
            .await?;
        if response.status().as_u16() >= 400 {
            return Err(ApiError::Auth(format!(
                "can't renew token: {}",
                response.status()
            )));
        }
        let user_token = response.text().await?;

        let mut tokens = self.tokens.lock().await;
        tokens.usertoken = Some(user_token);
        tokens
            .save(&self.config_path)
            .map_err(|e| ApiError::Auth(e.to_string()))?;
        Ok(())
    }

    /// Fetches and parses the full remote document list.
    #[instrument(skip(self))]
    pub async fn update_items(&self) -> Result<Vec<RemoteMetadata>, ApiError> {
        let url = self.url("/document-storage/json/2/docs");
        let response = self.authed_request(Method::GET, &url).await.send().await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!(error = %e, "failed to decode document list");
            ApiError::from(e)
        })
    }

    /// Fetches the metadata for a single document by id.
    #[instrument(skip(self))]
    pub async fn get_metadata(
        &self,
        id: &str,
        with_blob: bool,
    ) -> Result<RemoteMetadata, ApiError> {
        let url = self.url("/document-storage/json/2/docs");
        let response = self
            .authed_request(Method::GET, &url)
            .await
            .query(&[("doc", id), ("withBlob", if with_blob { "true" } else { "false" })])
            .send()
            .await?;
        let entries: Vec<RemoteMetadata> = response.json().await?;
        entries
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| ApiError::DocumentNotFound(id.to_string()))
    }

    /// Fetches the full blob body at `url`.
    pub async fn get_blob(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.authed_request(Method::GET, url).await.send().await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// HEADs `url` and returns its declared `Content-Length`.
    pub async fn get_blob_size(&self, url: &str) -> Result<u64, ApiError> {
        let response = self.authed_request(Method::HEAD, url).await.send().await?;
        Ok(response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    /// Ranged GET of the blob's tail, scanned for a central-directory entry
    /// to sniff the inner document's type and uncompressed size without
    /// downloading the whole archive.
    #[instrument(skip(self))]
    pub async fn get_file_details(&self, url: &str) -> Result<(FileType, Option<u64>), ApiError> {
        let response = self
            .authed_request(Method::GET, url)
            .await
            .header("Range", format!("bytes=-{NBYTES}"))
            .send()
            .await?;
        let bytes = response.bytes().await?;

        // Align on a known filename suffix, stepping back by the fixed
        // filename length and central-directory header size.
        let content_pos = bytes
            .windows(b".content".len())
            .rposition(|w| w == b".content");
        let Some(content_pos) = content_pos else {
            return Ok((FileType::Unknown, None));
        };
        let key_index = content_pos as i64 - 36 - 46;
        if key_index < 0 {
            return Ok((FileType::Unknown, None));
        }

        let entries = CentralDirectoryEntry::scan(&bytes, key_index as usize);
        for entry in &entries {
            if entry.filename.ends_with(".pdf") {
                return Ok((FileType::Pdf, Some(entry.uncompressed_size as u64)));
            }
            if entry.filename.ends_with(".epub") {
                return Ok((FileType::Epub, Some(entry.uncompressed_size as u64)));
            }
        }
        Ok((FileType::Notes, None))
    }

    /// Deletes an item remotely, invalidating the next refresh deadline.
    #[instrument(skip(self, item_id))]
    pub async fn delete(&self, item_id: &str, version: i64) -> Result<(), ApiError> {
        let url = self.url("/document-storage/json/2/delete");
        let response = self
            .authed_request(Method::PUT, &url)
            .await
            .json(&[IdVersion {
                id: item_id,
                version,
            }])
            .send()
            .await?;
        Self::check_response(response).await.map(|_| ())
    }

    /// Bumps an item's version and timestamp and pushes its metadata.
    #[instrument(skip(self, metadata))]
    pub async fn update_metadata(
        &self,
        metadata: &serde_json::Map<String, Value>,
    ) -> Result<(), ApiError> {
        let mut metadata = metadata.clone();
        let version = metadata
            .get("Version")
            .and_then(Value::as_i64)
            .unwrap_or(0)
            + 1;
        metadata.insert("Version".to_string(), Value::from(version));
        metadata.insert(
            "ModifiedClient".to_string(),
            Value::from(rmcl_core::time::format_rfc3339(&rmcl_core::time::now())),
        );

        let url = self.url("/document-storage/json/2/upload/update-status");
        let response = self
            .authed_request(Method::PUT, &url)
            .await
            .json(&[metadata])
            .send()
            .await?;
        Self::check_response(response).await.map(|_| ())
    }

    /// Two-phase upload: request a `BlobURLPut`, PUT the raw bytes there,
    /// then push the bumped metadata.
    #[instrument(skip(self, item_id, item_type, contents, metadata))]
    pub async fn upload(
        &self,
        item_id: &str,
        version: i64,
        item_type: &str,
        contents: Vec<u8>,
        metadata: &serde_json::Map<String, Value>,
    ) -> Result<(), ApiError> {
        let request_url = self.url("/document-storage/json/2/upload/request");
        let response = self
            .authed_request(Method::PUT, &request_url)
            .await
            .json(&[UploadRequest {
                id: item_id,
                version: version + 1,
                item_type,
            }])
            .send()
            .await?;
        let body = Self::check_response(response).await?;
        let blob_url = body
            .first()
            .and_then(|v| v.get("BlobURLPut"))
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Protocol("failed to get upload URL".to_string()))?
            .to_string();

        let upload_response = self
            .authed_request(Method::PUT, &blob_url)
            .await
            .header("Content-Type", "")
            .body(contents)
            .send()
            .await?;
        if upload_response.status().as_u16() >= 400 {
            return Err(ApiError::Protocol(format!(
                "upload failed with status {}",
                upload_response.status()
            )));
        }

        self.update_metadata(metadata).await
    }

    /// Sanity-checks a mutating-endpoint response: non-2xx, an empty JSON
    /// array, or a `Success: false` first element are all `ApiError`s.
    async fn check_response(response: reqwest::Response) -> Result<Vec<Value>, ApiError> {
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(ApiError::Protocol(format!("invalid HTTP response: {status}")));
        }
        let body: Vec<Value> = response.json().await?;
        let Some(first) = body.first() else {
            return Err(ApiError::Protocol("got an empty response".to_string()));
        };
        let success = first.get("Success").and_then(Value::as_bool).unwrap_or(true);
        if !success {
            let message = first
                .get("Message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ApiError::Protocol(message));
        }
        debug!("response passed validation");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_with_tokens() -> Config {
        let mut config = Config::default();
        config.devicetoken = Some("device-tok".to_string());
        config.usertoken = Some("user-tok".to_string());
        config
    }

    fn client_against(server: &MockServer, config_path: PathBuf) -> ApiClient {
        ApiClient::with_base_url(config_with_tokens(), config_path, server.uri())
    }

    #[tokio::test]
    async fn update_items_parses_document_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/document-storage/json/2/docs"))
            .and(header("authorization", "Bearer user-tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "ID": "doc-1",
                    "Version": 1,
                    "Type": "DocumentType",
                    "VissibleName": "Notes",
                    "Parent": "",
                    "ModifiedClient": "2024-01-01T00:00:00Z",
                }
            ])))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client_against(&server, dir.path().join("config.json"));
        let items = client.update_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "doc-1");
    }

    #[tokio::test]
    async fn get_metadata_returns_document_not_found_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/document-storage/json/2/docs"))
            .and(query_param("doc", "missing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client_against(&server, dir.path().join("config.json"));
        let result = client.get_metadata("missing", false).await;
        assert!(matches!(result, Err(ApiError::DocumentNotFound(_))));
    }

    #[tokio::test]
    async fn get_blob_size_reads_content_length() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/blob"))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Length", "42"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client_against(&server, dir.path().join("config.json"));
        let size = client
            .get_blob_size(&format!("{}/blob", server.uri()))
            .await
            .unwrap();
        assert_eq!(size, 42);
    }

    fn central_directory_entry(filename: &str, uncompressed: u32) -> Vec<u8> {
        let mut central = Vec::new();
        central.extend_from_slice(&[0x50, 0x4B, 0x01, 0x02]);
        central.extend_from_slice(&20u16.to_le_bytes()); // version made by
        central.extend_from_slice(&20u16.to_le_bytes()); // version needed
        central.extend_from_slice(&0u16.to_le_bytes()); // flags
        central.extend_from_slice(&0u16.to_le_bytes()); // compression (stored)
        central.extend_from_slice(&0u32.to_le_bytes()); // datetime
        central.extend_from_slice(&0u32.to_le_bytes()); // crc32
        central.extend_from_slice(&0u32.to_le_bytes()); // compressed size
        central.extend_from_slice(&uncompressed.to_le_bytes());
        central.extend_from_slice(&(filename.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes()); // extra length
        central.extend_from_slice(&0u16.to_le_bytes()); // comment length
        central.extend_from_slice(&0u16.to_le_bytes()); // disk number
        central.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        central.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        central.extend_from_slice(&0u32.to_le_bytes()); // header offset
        central.extend_from_slice(filename.as_bytes());
        central
    }

    #[tokio::test]
    async fn get_file_details_sniffs_pdf_from_tail_range() {
        // Chosen so that `rfind(".content") - 36 - 46` lands exactly on the
        // start of the pdf entry's own central directory record.
        let pdf_filename = "a".repeat(31) + ".pdf";
        let pdf_entry = central_directory_entry(&pdf_filename, 999);
        let content_entry = central_directory_entry("x.content", 0);
        let mut body = pdf_entry;
        body.extend_from_slice(&content_entry);

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blob"))
            .and(header("range", "bytes=-102400"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(body))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client_against(&server, dir.path().join("config.json"));
        let (kind, size) = client
            .get_file_details(&format!("{}/blob", server.uri()))
            .await
            .unwrap();
        assert_eq!(kind, FileType::Pdf);
        assert_eq!(size, Some(999));
    }

    #[tokio::test]
    async fn upload_puts_bytes_then_pushes_bumped_metadata() {
        let server = MockServer::start().await;
        let blob_url = format!("{}/blob-put", server.uri());

        Mock::given(method("PUT"))
            .and(path("/document-storage/json/2/upload/request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"Success": true, "BlobURLPut": blob_url, "ID": "doc-1", "Version": 2}
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/blob-put"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/document-storage/json/2/upload/update-status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"Success": true}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client_against(&server, dir.path().join("config.json"));

        let mut metadata = serde_json::Map::new();
        metadata.insert("ID".to_string(), json!("doc-1"));
        metadata.insert("Version".to_string(), json!(1));

        client
            .upload("doc-1", 1, "DocumentType", b"pdf bytes".to_vec(), &metadata)
            .await
            .unwrap();
        server.verify().await;
    }

    #[tokio::test]
    async fn delete_fails_on_success_false() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/document-storage/json/2/delete"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"Success": false, "Message": "nope"}
            ])))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client_against(&server, dir.path().join("config.json"));
        let result = client.delete("doc-1", 3).await;
        assert!(matches!(result, Err(ApiError::Protocol(msg)) if msg == "nope"));
    }
}
