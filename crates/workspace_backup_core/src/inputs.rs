use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::archive_naming::RetentionScope;

pub const DEFAULT_BACKUP_PREFIX: &str = "backup";
pub const DEFAULT_KEEP_VERSIONS: usize = 5;

/// Action inputs exactly as the host environment exported them.
///
/// Every field is an optional string; parsing happens in [`normalize_inputs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBackupInput {
    pub target_bucket: Option<String>,
    pub bucket_region: Option<String>,
    pub role_arn: Option<String>,
    pub oidc_audience: Option<String>,
    pub backup_prefix: Option<String>,
    pub keep_versions: Option<String>,
    pub retention_scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInput {
    pub target_bucket: String,
    pub bucket_region: String,
    pub role_arn: String,
    pub oidc_audience: Option<String>,
    pub backup_prefix: String,
    pub keep_versions: usize,
    pub retention_scope: RetentionScope,
}

/// Values the CI platform provides about the current job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPlatformContext {
    pub identity_token_file: Option<String>,
    pub repository: Option<String>,
    pub workspace_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformContext {
    pub identity_token_file: PathBuf,
    pub repository_name: String,
    pub workspace_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn normalize_inputs(raw: RawBackupInput) -> Result<BackupInput, ValidationError> {
    let target_bucket = required(raw.target_bucket, "target bucket")?;
    let bucket_region = required(raw.bucket_region, "bucket region")?;
    let role_arn = required(raw.role_arn, "role ARN")?;

    let keep_versions = match non_blank(raw.keep_versions) {
        None => DEFAULT_KEEP_VERSIONS,
        Some(value) => {
            let parsed: i64 = value.parse().map_err(|_| {
                ValidationError::new(format!("keep-versions must be an integer, got '{value}'"))
            })?;
            if parsed < 1 {
                return Err(ValidationError::new("keep-versions must be greater than 0"));
            }
            usize::try_from(parsed)
                .map_err(|_| ValidationError::new("keep-versions is out of range"))?
        }
    };

    let retention_scope = match non_blank(raw.retention_scope) {
        None => RetentionScope::default(),
        Some(value) => RetentionScope::parse(&value)?,
    };

    Ok(BackupInput {
        target_bucket,
        bucket_region,
        role_arn,
        oidc_audience: non_blank(raw.oidc_audience),
        backup_prefix: non_blank(raw.backup_prefix)
            .unwrap_or_else(|| DEFAULT_BACKUP_PREFIX.to_string()),
        keep_versions,
        retention_scope,
    })
}

pub fn normalize_platform(raw: RawPlatformContext) -> Result<PlatformContext, ValidationError> {
    let identity_token_file = required(raw.identity_token_file, "identity token file")?;
    let repository = required(raw.repository, "repository")?;
    let workspace_dir = required(raw.workspace_dir, "workspace directory")?;

    let repository_name = repository
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            ValidationError::new(format!("repository '{repository}' has no name segment"))
        })?
        .to_string();

    Ok(PlatformContext {
        identity_token_file: PathBuf::from(identity_token_file),
        repository_name,
        workspace_dir: PathBuf::from(workspace_dir),
    })
}

fn required(value: Option<String>, name: &str) -> Result<String, ValidationError> {
    non_blank(value).ok_or_else(|| ValidationError::new(format!("Missing required input: {name}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
