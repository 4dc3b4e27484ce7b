use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inputs::ValidationError;

pub const ARCHIVE_EXTENSION: &str = ".tar.gz";
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const SEGMENT_SEPARATOR: char = '_';

/// Which stored archives share a retention window with the current run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionScope {
    /// Every archive written with the same backup prefix.
    #[default]
    Prefix,
    /// Only archives of the same repository under the backup prefix.
    Repository,
}

impl RetentionScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Repository => "repository",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prefix" => Ok(Self::Prefix),
            "repository" => Ok(Self::Repository),
            other => Err(ValidationError::new(format!(
                "retention-scope must be 'prefix' or 'repository', got '{other}'"
            ))),
        }
    }
}

/// `<prefix>_<repository>_<YYYYMMDDHHMMSS>.tar.gz`
pub fn archive_file_name(
    backup_prefix: &str,
    repository_name: &str,
    created_at: DateTime<Utc>,
) -> String {
    format!(
        "{backup_prefix}{SEGMENT_SEPARATOR}{repository_name}{SEGMENT_SEPARATOR}{}{ARCHIVE_EXTENSION}",
        created_at.format(ARCHIVE_TIMESTAMP_FORMAT),
    )
}

/// Key prefix that selects the archives competing for retention with
/// `archive_file_name`.
///
/// The repository segment is located from the right, so a backup prefix that
/// itself contains `_` is kept whole. Returns `None` when the file name does
/// not follow the archive naming convention.
pub fn retention_prefix(
    archive_file_name: &str,
    repository_name: &str,
    scope: RetentionScope,
) -> Option<String> {
    if !archive_file_name.ends_with(ARCHIVE_EXTENSION) || repository_name.is_empty() {
        return None;
    }

    let repository_segment =
        format!("{SEGMENT_SEPARATOR}{repository_name}{SEGMENT_SEPARATOR}");
    let segment_start = archive_file_name.rfind(&repository_segment)?;
    if segment_start == 0 {
        return None;
    }

    let prefix_end = match scope {
        RetentionScope::Prefix => segment_start + 1,
        RetentionScope::Repository => segment_start + repository_segment.len(),
    };
    Some(archive_file_name[..prefix_end].to_string())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 5)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn builds_archive_name_with_timestamp() {
        assert_eq!(
            archive_file_name("backup", "test-repo", sample_time()),
            "backup_test-repo_20240301120005.tar.gz"
        );
    }

    #[test]
    fn prefix_scope_keeps_separator() {
        let name = archive_file_name("backup", "test-repo", sample_time());
        assert_eq!(
            retention_prefix(&name, "test-repo", RetentionScope::Prefix).as_deref(),
            Some("backup_")
        );
    }

    #[test]
    fn prefix_with_underscore_is_not_truncated() {
        let name = archive_file_name("nightly_backup", "test-repo", sample_time());
        assert_eq!(
            retention_prefix(&name, "test-repo", RetentionScope::Prefix).as_deref(),
            Some("nightly_backup_")
        );
    }

    #[test]
    fn repository_names_with_underscores_resolve_from_the_right() {
        let name = archive_file_name("ops_my_repo", "my_repo", sample_time());
        assert_eq!(
            retention_prefix(&name, "my_repo", RetentionScope::Prefix).as_deref(),
            Some("ops_my_repo_")
        );
        assert_eq!(
            retention_prefix(&name, "my_repo", RetentionScope::Repository).as_deref(),
            Some("ops_my_repo_my_repo_")
        );
    }

    #[test]
    fn repository_scope_includes_repository_segment() {
        let name = archive_file_name("backup", "test-repo", sample_time());
        assert_eq!(
            retention_prefix(&name, "test-repo", RetentionScope::Repository).as_deref(),
            Some("backup_test-repo_")
        );
    }

    #[test]
    fn default_prefix_excludes_sibling_prefixes() {
        let name = archive_file_name("backup", "repo", sample_time());
        let prefix =
            retention_prefix(&name, "repo", RetentionScope::Prefix).expect("prefix should resolve");

        assert_eq!(prefix, "backup_");
        assert!("backup_other_20240101000000.tar.gz".starts_with(&prefix));
        assert!(!"backups_repo_20240101000000.tar.gz".starts_with(&prefix));
        assert!(!"backup2_repo_20240101000000.tar.gz".starts_with(&prefix));
    }

    #[test]
    fn rejects_names_outside_convention() {
        assert_eq!(
            retention_prefix("backup_test-repo_1.zip", "test-repo", RetentionScope::Prefix),
            None
        );
        assert_eq!(
            retention_prefix("_test-repo_1.tar.gz", "test-repo", RetentionScope::Prefix),
            None
        );
        assert_eq!(
            retention_prefix("backup_other_1.tar.gz", "test-repo", RetentionScope::Prefix),
            None
        );
    }

    #[test]
    fn parses_scope_case_insensitively() {
        assert_eq!(
            RetentionScope::parse(" Repository "),
            Ok(RetentionScope::Repository)
        );
        assert!(RetentionScope::parse("all").is_err());
    }
}
