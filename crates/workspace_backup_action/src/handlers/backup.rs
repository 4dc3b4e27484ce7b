use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::adapters::archive::ArchiveProducer;
use crate::adapters::identity::IdentityExchange;
use crate::adapters::object_store::{BackupStore, StoreConnector};
use crate::adapters::scratch::ScratchSpace;
use crate::domain::archive_naming::{archive_file_name, retention_prefix};
use crate::domain::inputs::{
    normalize_inputs, normalize_platform, RawBackupInput, RawPlatformContext,
};
use crate::error::BackupError;
use crate::handlers::credentials::exchange_credentials;
use crate::handlers::retention::prune;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRequest {
    pub input: RawBackupInput,
    pub platform: RawPlatformContext,
    /// Stamped into the archive name.
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub bucket: String,
    pub object_key: String,
    pub archive_bytes: u64,
    pub retention_prefix: String,
    pub deleted_count: usize,
}

/// Runs one backup-then-prune cycle.
///
/// Steps run in order and stop at the first failure; nothing is retried and a
/// failed prune does not undo the upload. The scratch directory is cleaned up
/// exactly once on every exit path, before the result is returned.
pub fn run_backup(
    request: BackupRequest,
    identity: &impl IdentityExchange,
    connector: &impl StoreConnector,
    archiver: &impl ArchiveProducer,
    scratch: &impl ScratchSpace,
) -> Result<BackupReport, BackupError> {
    let scratch = scopeguard::guard(scratch, |scratch| cleanup_scratch(scratch));
    run_steps(request, identity, connector, archiver, *scratch)
}

fn run_steps(
    request: BackupRequest,
    identity: &impl IdentityExchange,
    connector: &impl StoreConnector,
    archiver: &impl ArchiveProducer,
    scratch: &impl ScratchSpace,
) -> Result<BackupReport, BackupError> {
    let input = normalize_inputs(request.input)?;
    let platform = normalize_platform(request.platform)?;
    tracing::info!(
        component = "backup",
        event = "inputs_validated",
        bucket = %input.target_bucket,
        region = %input.bucket_region,
        backup_prefix = %input.backup_prefix,
        keep_versions = input.keep_versions,
        retention_scope = input.retention_scope.as_str(),
        repository = %platform.repository_name,
    );

    let archive_name = archive_file_name(
        &input.backup_prefix,
        &platform.repository_name,
        request.started_at,
    );
    let retention_prefix = retention_prefix(
        &archive_name,
        &platform.repository_name,
        input.retention_scope,
    )
    .ok_or_else(|| {
        BackupError::Archive(format!(
            "archive name {archive_name} does not follow the naming convention"
        ))
    })?;

    let credentials = exchange_credentials(
        &input.role_arn,
        &input.bucket_region,
        input.oidc_audience.as_deref(),
        &platform.identity_token_file,
        identity,
    )?;
    let store = connector
        .connect(&input.target_bucket, &input.bucket_region, &credentials)
        .map_err(BackupError::Storage)?;

    let archive_path = scratch.path().join(&archive_name);
    let archive_bytes = archiver
        .produce(&platform.workspace_dir, &archive_path)
        .map_err(BackupError::Archive)?;
    tracing::info!(
        component = "backup",
        event = "archive_created",
        archive = %archive_path.display(),
        bytes = archive_bytes,
    );

    store
        .upload_file(&archive_name, &archive_path)
        .map_err(BackupError::Storage)?;
    tracing::info!(
        component = "backup",
        event = "archive_uploaded",
        bucket = store.bucket(),
        key = %archive_name,
    );

    let deleted_count = prune(&store, &retention_prefix, input.keep_versions)?;

    Ok(BackupReport {
        bucket: input.target_bucket,
        object_key: archive_name,
        archive_bytes,
        retention_prefix,
        deleted_count,
    })
}

/// Removes the scratch directory, logging instead of failing.
pub fn cleanup_scratch(scratch: &impl ScratchSpace) {
    match scratch.cleanup() {
        Ok(()) => tracing::info!(
            component = "backup",
            event = "scratch_cleaned",
            path = %scratch.path().display(),
        ),
        Err(error) => tracing::warn!(
            component = "backup",
            event = "scratch_cleanup_failed",
            path = %scratch.path().display(),
            error = %error,
        ),
    }
}
