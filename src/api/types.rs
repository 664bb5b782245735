//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::db::entities::repository_metadata;

// ============================================================================
// Request Types
// ============================================================================

/// POST /api/push/repository request body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub repository_id: String,
    pub repository_name: String,
    pub commit_hash: String,
    pub files: Vec<FileEntry>,
}

/// One file of a push. Size and hash are caller-declared and trusted as-is;
/// nothing recomputes them from the content.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub hash: String,
    pub size: i64,
    #[serde(rename = "type", default)]
    pub kind: FileKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileKind {
    #[default]
    Blob,
    Tree,
    Commit,
}

impl PushRequest {
    /// Check required fields and path safety. Runs after authorization and
    /// before any ledger write.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.repository_id.trim().is_empty() {
            return Err("repository id is required".to_string());
        }
        if self.repository_name.trim().is_empty() {
            return Err("repository name is required".to_string());
        }
        if self.commit_hash.trim().is_empty() {
            return Err("commit hash is required".to_string());
        }
        for file in &self.files {
            if !is_safe_relative_path(&file.path) {
                return Err(format!("invalid file path: {:?}", file.path));
            }
            if file.size < 0 {
                return Err(format!("negative size for file: {}", file.path));
            }
        }
        Ok(())
    }
}

/// A path is accepted only if it stays inside the repository root: relative,
/// and with no empty, `.`, or `..` components.
pub fn is_safe_relative_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && path
            .split('/')
            .all(|component| !component.is_empty() && component != "." && component != "..")
}

// ============================================================================
// Response Types
// ============================================================================

/// Outcome of one push operation, also the shape of history/status rows
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub push_id: i64,
    pub repository_id: String,
    pub repository_name: String,
    pub storage_path: String,
    pub status: String,
    pub file_count: i32,
    pub total_size: i64,
    pub created_at: i64,
    pub message: String,
}

/// Current state of one repository, as returned by the listing endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    pub repository_id: String,
    pub repository_name: String,
    pub storage_path: String,
    pub last_commit_hash: String,
    pub file_count: i32,
    pub total_size: i64,
    pub updated_at: i64,
}

impl From<repository_metadata::Model> for RepositoryInfo {
    fn from(row: repository_metadata::Model) -> Self {
        Self {
            repository_id: row.repository_id,
            repository_name: row.repository_name,
            storage_path: row.storage_path,
            last_commit_hash: row.last_commit_hash,
            file_count: row.file_count,
            total_size: row.total_size,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PushRequest {
        PushRequest {
            repository_id: "repo-1".to_string(),
            repository_name: "Demo".to_string(),
            commit_hash: "abc123".to_string(),
            files: vec![FileEntry {
                path: "a.txt".to_string(),
                content: "hi".to_string(),
                hash: "h".to_string(),
                size: 2,
                kind: FileKind::Blob,
            }],
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_fields() {
        let mut req = request();
        req.repository_id = "  ".to_string();
        assert!(req.validate().is_err());

        let mut req = request();
        req.repository_name = String::new();
        assert!(req.validate().is_err());

        let mut req = request();
        req.commit_hash = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_path_safety() {
        assert!(is_safe_relative_path("a.txt"));
        assert!(is_safe_relative_path("src/deep/lib.rs"));
        assert!(!is_safe_relative_path(""));
        assert!(!is_safe_relative_path("/etc/passwd"));
        assert!(!is_safe_relative_path("../outside"));
        assert!(!is_safe_relative_path("src/../../outside"));
        assert!(!is_safe_relative_path("src//x"));
        assert!(!is_safe_relative_path("./x"));
    }

    #[test]
    fn test_request_json_shape() {
        let json = r#"{
            "repositoryId": "repo-1",
            "repositoryName": "Demo",
            "commitHash": "abc123",
            "files": [
                {"path": "a.txt", "content": "hi", "hash": "deadbeef", "size": 2, "type": "BLOB"}
            ]
        }"#;
        let req: PushRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.repository_id, "repo-1");
        assert_eq!(req.files[0].kind, FileKind::Blob);
        assert_eq!(req.files[0].size, 2);
    }
}
