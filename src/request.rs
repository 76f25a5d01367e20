//! The purchase-request entity as the pipelines see it.
//!
//! The request's lifecycle (status transitions, persistence, permissions)
//! belongs to the surrounding application. The pipelines only *read* the
//! summary fields and the proforma attachment, and *write* one generated
//! document through [`AttachmentStore`]. Attachments carry their bytes
//! in memory so the pipelines stay testable without a real filesystem and
//! portable to object-storage-backed uploads.

use crate::error::PipelineError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle state of a purchase request. Owned by the caller; the
/// pipelines never transition it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// An uploaded file: original name plus raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Original file name as uploaded; its extension drives extraction
    /// dispatch.
    pub file_name: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }

    /// Read an attachment from disk, keeping only the final path component
    /// as the file name.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| PipelineError::AttachmentRead {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { file_name, data })
    }

    /// Lowercased extension, if the file name has one.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// The fields of a purchase request the pipelines read.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Manager-approved amount, in the workflow's single currency.
    pub amount: Decimal,
    pub status: RequestStatus,
    /// Proforma invoice uploaded at submission time, if any.
    pub proforma: Option<Attachment>,
}

/// Where generated purchase-order documents get persisted.
///
/// The surrounding application implements this against its storage layer
/// (Django-style file fields, S3, …). [`DirStore`] is the plain-directory
/// implementation used by the CLI and tests.
pub trait AttachmentStore: Send + Sync {
    /// Persist `bytes` under `file_name`, returning the stored
    /// name/path/key. At most one save happens per pipeline run.
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<String, PipelineError>;
}

/// Filesystem store: writes into a fixed directory.
///
/// Writes go through a temp file followed by a rename so a crashed run
/// never leaves a half-written PDF in the attachment slot.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AttachmentStore for DirStore {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<String, PipelineError> {
        let store_err = |source| PipelineError::Store {
            file_name: file_name.to_string(),
            source,
        };

        std::fs::create_dir_all(&self.root).map_err(store_err)?;
        let final_path = self.root.join(file_name);
        let tmp_path = final_path.with_extension("pdf.tmp");
        std::fs::write(&tmp_path, bytes).map_err(store_err)?;
        std::fs::rename(&tmp_path, &final_path).map_err(store_err)?;
        Ok(final_path.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        let a = Attachment::new("Invoice.PDF", vec![]);
        assert_eq!(a.extension().as_deref(), Some("pdf"));
    }

    #[test]
    fn extension_absent_when_no_dot() {
        let a = Attachment::new("receipt", vec![]);
        assert_eq!(a.extension(), None);
    }

    #[test]
    fn from_path_missing_file_reports_path() {
        let err = Attachment::from_path("/no/such/file.pdf").unwrap_err();
        assert!(err.to_string().contains("/no/such/file.pdf"));
    }

    #[test]
    fn dir_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path());
        let stored = store.save("PO_1_test.pdf", b"%PDF-stub").unwrap();
        assert!(stored.ends_with("PO_1_test.pdf"));
        assert_eq!(std::fs::read(&stored).unwrap(), b"%PDF-stub");
        // No leftover temp file
        assert!(!dir.path().join("PO_1_test.pdf.tmp").exists());
    }

    #[test]
    fn status_display_matches_wire_form() {
        assert_eq!(RequestStatus::Approved.to_string(), "approved");
        assert_eq!(
            serde_json::to_value(RequestStatus::Approved).unwrap(),
            "approved"
        );
    }
}
