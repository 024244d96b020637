use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::{CredentialSource, FolderPolicy};

const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3";
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

/// What a successful upload produced.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub remote_id: String,
    pub name: String,
    pub size_bytes: u64,
    pub web_link: String,
    pub created_at: DateTime<Utc>,
}

/// Upload failures, split so a caller-supplied policy can tell a dead
/// credential from a transient network fault.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("storage credential rejected: {0}")]
    Auth(String),

    #[error("destination not writable: {0}")]
    Permission(String),

    #[error("network error talking to storage: {0}")]
    Network(String),

    #[error("upload failed: {0}")]
    Unknown(String),
}

/// Read-only destination diagnostics, served by `GET /diag/drive`.
#[derive(Debug, Clone, Serialize)]
pub struct DriveDiagnostics {
    pub folder_id: String,
    pub folder_name: String,
    pub reachable: bool,
    pub visible_items: Vec<DriveItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

/// The cloud storage seam. Trait object so tests can substitute a fake.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Upload a staged file under `display_name` to the pre-resolved
    /// destination folder.
    async fn upload(
        &self,
        local_path: &Path,
        display_name: &str,
    ) -> Result<UploadResult, UploadError>;

    /// Destination reachability and a first page of visible items.
    async fn diagnostics(&self) -> DriveDiagnostics;
}

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Wire shape of a Drive file resource. Drive serializes `size` as a
/// decimal string, not a number.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    web_view_link: Option<String>,
    #[serde(default)]
    created_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveItem>,
}

/// Google Drive client backed by a service account.
///
/// The access token is the only mutable state and is refreshed lazily;
/// the destination folder is resolved exactly once, in `connect`.
pub struct DriveClient {
    http: reqwest::Client,
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    token: RwLock<Option<CachedToken>>,
    folder_id: String,
    folder_name: String,
}

impl DriveClient {
    /// Build the client, fetch an initial token, and resolve the
    /// destination folder according to the configured policy.
    pub async fn connect(
        credentials: &CredentialSource,
        folder: &FolderPolicy,
    ) -> anyhow::Result<Self> {
        let key_json = credentials.read()?;
        let key: ServiceAccountKey = serde_json::from_str(&key_json)
            .map_err(|e| anyhow::anyhow!("invalid service account key: {e}"))?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid service account private key: {e}"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let client = Self {
            http,
            key,
            signing_key,
            token: RwLock::new(None),
            folder_id: String::new(),
            folder_name: String::new(),
        };

        // Fail fast on a dead credential before the server starts taking
        // webhook traffic.
        client.access_token().await.map_err(|e| anyhow::anyhow!(e))?;
        tracing::info!(client_email = %client.key.client_email, "✅ Drive credential verified");

        let (folder_id, folder_name) = client.resolve_folder(folder).await?;
        tracing::info!(folder_id = %folder_id, folder_name = %folder_name, "📂 upload destination resolved");

        Ok(Self {
            folder_id,
            folder_name,
            ..client
        })
    }

    async fn resolve_folder(&self, policy: &FolderPolicy) -> anyhow::Result<(String, String)> {
        match policy {
            FolderPolicy::Explicit(id) => {
                let token = self.access_token().await.map_err(|e| anyhow::anyhow!(e))?;
                let file: DriveFile = self
                    .http
                    .get(format!("{DRIVE_API}/files/{id}"))
                    .bearer_auth(&token)
                    .query(&[("fields", "id,name"), ("supportsAllDrives", "true")])
                    .send()
                    .await?
                    .error_for_status()
                    .map_err(|e| anyhow::anyhow!("configured folder id is not reachable: {e}"))?
                    .json()
                    .await?;
                Ok((file.id, file.name.unwrap_or_default()))
            }
            FolderPolicy::ByName {
                name,
                shared_drive_id,
            } => {
                if let Some(id) = self.find_folder(name, shared_drive_id.as_deref()).await? {
                    tracing::info!(folder = %name, id = %id, "found existing upload folder");
                    return Ok((id, name.clone()));
                }
                let id = self.create_folder(name, shared_drive_id.as_deref()).await?;
                tracing::info!(folder = %name, id = %id, "created upload folder");
                Ok((id, name.clone()))
            }
        }
    }

    async fn find_folder(
        &self,
        name: &str,
        shared_drive_id: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        let token = self.access_token().await.map_err(|e| anyhow::anyhow!(e))?;
        // Single quotes in the name would break the query string.
        let escaped = name.replace('\'', "\\'");
        let query =
            format!("name='{escaped}' and mimeType='{FOLDER_MIME}' and trashed=false");

        let mut request = self
            .http
            .get(format!("{DRIVE_API}/files"))
            .bearer_auth(&token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name,mimeType)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ]);
        if let Some(drive_id) = shared_drive_id {
            request = request.query(&[("corpora", "drive"), ("driveId", drive_id)]);
        }

        let list: DriveFileList = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    async fn create_folder(
        &self,
        name: &str,
        shared_drive_id: Option<&str>,
    ) -> anyhow::Result<String> {
        let token = self.access_token().await.map_err(|e| anyhow::anyhow!(e))?;
        let mut metadata = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME,
        });
        if let Some(drive_id) = shared_drive_id {
            metadata["parents"] = serde_json::json!([drive_id]);
        }

        let file: DriveFile = self
            .http
            .post(format!("{DRIVE_API}/files"))
            .bearer_auth(&token)
            .query(&[("fields", "id"), ("supportsAllDrives", "true")])
            .json(&metadata)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| anyhow::anyhow!("failed to create upload folder: {e}"))?
            .json()
            .await?;
        Ok(file.id)
    }

    /// Return a valid access token, minting a fresh one through the
    /// service-account JWT grant when the cached token is near expiry.
    async fn access_token(&self) -> Result<String, UploadError> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at - chrono::Duration::seconds(60) > Utc::now() {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let now = Utc::now();
        let claims = TokenClaims {
            iss: &self.key.client_email,
            scope: DRIVE_SCOPE,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + 3600,
        };
        let assertion = jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.signing_key,
        )
        .map_err(|e| UploadError::Auth(format!("failed to sign token assertion: {e}")))?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Auth(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Auth(format!("invalid token response: {e}")))?;

        let access_token = token.access_token.clone();
        *self.token.write().await = Some(CachedToken {
            access_token: token.access_token,
            expires_at: now + chrono::Duration::seconds(token.expires_in),
        });
        Ok(access_token)
    }
}

#[async_trait]
impl StorageClient for DriveClient {
    async fn upload(
        &self,
        local_path: &Path,
        display_name: &str,
    ) -> Result<UploadResult, UploadError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| UploadError::Unknown(format!("failed to read staged file: {e}")))?;
        let size = bytes.len() as u64;
        let mime = resolve_mime(display_name);
        let token = self.access_token().await?;

        let metadata = serde_json::json!({
            "name": display_name,
            "parents": [self.folder_id],
        });
        let boundary = format!("relay_{}", Uuid::new_v4().simple());
        let body = build_multipart_related(&boundary, &metadata.to_string(), &mime, &bytes);

        tracing::info!(name = %display_name, size, mime = %mime, "🚀 uploading to Drive");

        let response = self
            .http
            .post(format!("{DRIVE_UPLOAD_API}/files"))
            .bearer_auth(&token)
            .query(&[
                ("uploadType", "multipart"),
                ("fields", "id,name,size,webViewLink,createdTime"),
                ("supportsAllDrives", "true"),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), body));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| UploadError::Unknown(format!("invalid upload response: {e}")))?;

        Ok(UploadResult {
            web_link: file.web_view_link.unwrap_or_else(|| {
                format!("https://drive.google.com/file/d/{}/view", file.id)
            }),
            remote_id: file.id,
            name: file.name.unwrap_or_else(|| display_name.to_string()),
            size_bytes: file.size.and_then(|s| s.parse().ok()).unwrap_or(size),
            created_at: file.created_time.unwrap_or_else(Utc::now),
        })
    }

    async fn diagnostics(&self) -> DriveDiagnostics {
        let result: anyhow::Result<Vec<DriveItem>> = async {
            let token = self.access_token().await.map_err(|e| anyhow::anyhow!(e))?;
            let query = format!("'{}' in parents and trashed=false", self.folder_id);
            let list: DriveFileList = self
                .http
                .get(format!("{DRIVE_API}/files"))
                .bearer_auth(&token)
                .query(&[
                    ("q", query.as_str()),
                    ("pageSize", "10"),
                    ("fields", "files(id,name,mimeType)"),
                    ("supportsAllDrives", "true"),
                    ("includeItemsFromAllDrives", "true"),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(list.files)
        }
        .await;

        match result {
            Ok(items) => DriveDiagnostics {
                folder_id: self.folder_id.clone(),
                folder_name: self.folder_name.clone(),
                reachable: true,
                visible_items: items,
                error: None,
            },
            Err(e) => DriveDiagnostics {
                folder_id: self.folder_id.clone(),
                folder_name: self.folder_name.clone(),
                reachable: false,
                visible_items: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

/// MIME type from the display name, octet-stream when unknown.
pub fn resolve_mime(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Map an upload HTTP status to the error taxonomy: 401 is a dead
/// credential, 403 is quota or permissions, the rest is unknown.
fn map_status(status: u16, body: String) -> UploadError {
    let summary: String = body.chars().take(200).collect();
    match status {
        401 => UploadError::Auth(format!("status 401: {summary}")),
        403 => UploadError::Permission(format!("status 403: {summary}")),
        _ => UploadError::Unknown(format!("status {status}: {summary}")),
    }
}

/// Build a `multipart/related` body: metadata part, then the media part.
fn build_multipart_related(
    boundary: &str,
    metadata_json: &str,
    mime: &str,
    payload: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 512);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata_json}\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("--{boundary}\r\nContent-Type: {mime}\r\n\r\n").as_bytes());
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
