use chrono::Local;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// File metadata pulled out of a webhook event. Built once, consumed once.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Platform message id, the handle for content download.
    pub message_id: String,
    /// Display name; empty names are synthesized during staging.
    pub name: String,
    /// Size declared by the platform, in bytes.
    pub declared_size: u64,
    /// MIME hint from the event, when the platform provides one.
    pub mime_hint: Option<String>,
}

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("file size {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("file extension '{extension}' is not allowed")]
    UnsupportedType { extension: String },

    #[error("failed to write staged file: {0}")]
    Io(#[from] std::io::Error),
}

/// A payload written to the staging directory for the duration of one
/// pipeline run. The file is removed on drop, so every exit path of the
/// pipeline releases it.
#[derive(Debug)]
pub struct StagedFile {
    pub path: PathBuf,
    /// Original display name, not the uniquified on-disk name.
    pub name: String,
    pub size: u64,
    cleaned: bool,
}

impl StagedFile {
    /// Delete the staged file now instead of waiting for drop.
    pub fn cleanup(&mut self) {
        if !self.cleaned {
            StagingManager::cleanup(&self.path);
            self.cleaned = true;
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Validates inbound file metadata and persists payload bytes to a
/// uniquely named path under the staging directory. Disk I/O only.
pub struct StagingManager {
    temp_dir: PathBuf,
    max_file_size: u64,
    allowed_extensions: Vec<String>,
}

impl StagingManager {
    pub fn new(
        temp_dir: PathBuf,
        max_file_size: u64,
        allowed_extensions: Vec<String>,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(&temp_dir)?;
        Ok(Self {
            temp_dir,
            max_file_size,
            allowed_extensions,
        })
    }

    /// Validate `incoming` and write `bytes` to a collision-resistant path.
    ///
    /// Rejections happen before anything touches the disk; on success the
    /// returned guard owns the file until it is dropped or cleaned up.
    pub fn stage(
        &self,
        incoming: &IncomingFile,
        bytes: &[u8],
    ) -> Result<StagedFile, StagingError> {
        let name = if incoming.name.is_empty() {
            format!("file_{}", short_suffix())
        } else {
            incoming.name.clone()
        };

        if incoming.declared_size > self.max_file_size {
            return Err(StagingError::TooLarge {
                size: incoming.declared_size,
                limit: self.max_file_size,
            });
        }

        let extension = Path::new(&name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if !self.allowed_extensions.contains(&extension) {
            return Err(StagingError::UnsupportedType { extension });
        }

        // Timestamp plus random suffix so concurrent runs never collide,
        // even when the original names do.
        let local_name = format!(
            "{}_{}_{}",
            Local::now().format("%Y%m%d_%H%M%S"),
            short_suffix(),
            name
        );
        let path = self.temp_dir.join(local_name);

        std::fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "staged payload");

        Ok(StagedFile {
            path,
            name,
            size: bytes.len() as u64,
            cleaned: false,
        })
    }

    /// Best-effort delete of a staged path. Idempotent: a second call or a
    /// path that never existed is a no-op. Failures are logged and never
    /// propagated, so cleanup cannot mask the pipeline's primary result.
    pub fn cleanup(path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "🧹 removed staged file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove staged file");
            }
        }
    }
}

fn short_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manager(dir: &Path) -> StagingManager {
        StagingManager::new(
            dir.to_path_buf(),
            50 * 1024 * 1024,
            vec!["pdf".to_string(), "jpg".to_string()],
        )
        .unwrap()
    }

    fn incoming(name: &str, declared_size: u64) -> IncomingFile {
        IncomingFile {
            message_id: "m1".to_string(),
            name: name.to_string(),
            declared_size,
            mime_hint: None,
        }
    }

    #[test]
    fn test_stage_writes_all_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());
        let payload = vec![0xABu8; 4096];

        let staged = manager.stage(&incoming("report.pdf", 4096), &payload).unwrap();
        assert_eq!(staged.name, "report.pdf");
        assert_eq!(staged.size, 4096);
        assert_eq!(std::fs::read(&staged.path).unwrap(), payload);
        // On-disk name carries the original name but is uniquified.
        let on_disk = staged.path.file_name().unwrap().to_str().unwrap();
        assert!(on_disk.ends_with("_report.pdf"));
        assert_ne!(on_disk, "report.pdf");
    }

    #[test]
    fn test_concurrent_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());
        let a = manager.stage(&incoming("same.pdf", 1), b"a").unwrap();
        let b = manager.stage(&incoming("same.pdf", 1), b"b").unwrap();
        assert_ne!(a.path, b.path);
    }

    #[test]
    fn test_too_large_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());
        let result = manager.stage(&incoming("report.pdf", 51 * 1024 * 1024), b"data");
        assert!(matches!(result, Err(StagingError::TooLarge { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unsupported_extension_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());

        let result = manager.stage(&incoming("MOVIE.MKV", 10), b"data");
        assert!(matches!(
            result,
            Err(StagingError::UnsupportedType { ref extension }) if extension == "mkv"
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // Allow-listed extension in upper case still passes.
        assert!(manager.stage(&incoming("Report.PDF", 10), b"data").is_ok());
    }

    #[test]
    fn test_empty_name_is_synthesized_but_has_no_extension() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());
        let result = manager.stage(&incoming("", 10), b"data");
        assert!(matches!(
            result,
            Err(StagingError::UnsupportedType { ref extension }) if extension.is_empty()
        ));
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());
        let mut staged = manager.stage(&incoming("report.pdf", 10), b"data").unwrap();
        let path = staged.path.clone();

        staged.cleanup();
        assert!(!path.exists());
        staged.cleanup();
        StagingManager::cleanup(&path);
        StagingManager::cleanup(Path::new("/nonexistent/never-there.pdf"));
    }

    #[test]
    fn test_drop_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path());
        let staged = manager.stage(&incoming("report.pdf", 10), b"data").unwrap();
        let path = staged.path.clone();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }
}
