use std::env;
use std::path::{Path, PathBuf};

/// Where the Google service-account key comes from.
///
/// The `GOOGLE_CREDENTIALS` variable historically held either a path to a
/// key file or the key JSON itself; the ambiguity is resolved once at
/// startup instead of being re-probed on every use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Path to a service-account JSON key file.
    File(PathBuf),
    /// The service-account key JSON inline.
    Inline(String),
}

impl CredentialSource {
    /// Probe `value`: if it names an existing file it is a path, otherwise
    /// it is treated as inline JSON.
    pub fn detect(value: &str) -> Self {
        if Path::new(value).is_file() {
            CredentialSource::File(PathBuf::from(value))
        } else {
            CredentialSource::Inline(value.to_string())
        }
    }

    /// Read the key JSON, whichever form it was supplied in.
    pub fn read(&self) -> std::io::Result<String> {
        match self {
            CredentialSource::File(path) => std::fs::read_to_string(path),
            CredentialSource::Inline(json) => Ok(json.clone()),
        }
    }
}

/// How the upload destination in Drive is chosen.
///
/// Exactly one policy: an explicit folder id wins; otherwise a folder is
/// looked up by name (and created when absent), optionally inside a shared
/// drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderPolicy {
    /// Use this folder id as-is; verified reachable at startup.
    Explicit(String),
    /// Find (or create) a folder with this name.
    ByName {
        name: String,
        shared_drive_id: Option<String>,
    },
}

/// Process-wide configuration, loaded once at startup and read-only after.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// LINE channel secret, used to verify webhook signatures.
    pub channel_secret: String,

    /// LINE channel access token, used for content download and replies.
    pub channel_access_token: String,

    /// Google service-account credentials.
    pub credentials: CredentialSource,

    /// Destination folder policy in Drive.
    pub folder: FolderPolicy,

    /// Directory for staged payloads (default: "temp_files").
    pub temp_dir: PathBuf,

    /// Maximum accepted payload size in bytes (default: 50 MiB).
    pub max_file_size: u64,

    /// Allowed file extensions, lowercase, without the dot.
    pub allowed_extensions: Vec<String>,

    /// Bind host (default: "0.0.0.0").
    pub host: String,

    /// Bind port (default: 8000).
    pub port: u16,
}

const DEFAULT_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "mp4", "avi", "mov", "doc", "docx", "xls", "xlsx",
];

/// Name of the folder created in Drive when no explicit folder id is set.
pub const DEFAULT_FOLDER_NAME: &str = "LINE Auto Upload";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            channel_secret: String::new(),
            channel_access_token: String::new(),
            credentials: CredentialSource::Inline(String::new()),
            folder: FolderPolicy::ByName {
                name: DEFAULT_FOLDER_NAME.to_string(),
                shared_drive_id: None,
            },
            temp_dir: PathBuf::from("temp_files"),
            max_file_size: 50 * 1024 * 1024, // 50 MiB
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// `LINE_CHANNEL_SECRET`, `LINE_CHANNEL_ACCESS_TOKEN` and
    /// `GOOGLE_CREDENTIALS` are required; everything else has a default.
    pub fn from_env() -> anyhow::Result<Self> {
        let default = Self::default();

        let channel_secret = env::var("LINE_CHANNEL_SECRET")
            .map_err(|_| anyhow::anyhow!("LINE_CHANNEL_SECRET must be set"))?;
        let channel_access_token = env::var("LINE_CHANNEL_ACCESS_TOKEN")
            .map_err(|_| anyhow::anyhow!("LINE_CHANNEL_ACCESS_TOKEN must be set"))?;
        let credentials = env::var("GOOGLE_CREDENTIALS")
            .map(|v| CredentialSource::detect(&v))
            .map_err(|_| anyhow::anyhow!("GOOGLE_CREDENTIALS must be set"))?;

        let folder = match env::var("DRIVE_FOLDER_ID").ok().filter(|v| !v.is_empty()) {
            Some(id) => FolderPolicy::Explicit(id),
            None => FolderPolicy::ByName {
                name: env::var("DRIVE_FOLDER_NAME")
                    .unwrap_or_else(|_| DEFAULT_FOLDER_NAME.to_string()),
                shared_drive_id: env::var("SHARED_DRIVE_ID").ok().filter(|v| !v.is_empty()),
            },
        };

        Ok(Self {
            channel_secret,
            channel_access_token,
            credentials,
            folder,

            temp_dir: env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.temp_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            allowed_extensions: env::var("ALLOWED_EXTENSIONS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_extensions),

            host: env::var("HOST").unwrap_or(default.host),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),
        })
    }
}
