use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use workspace_backup_action::adapters::archive::TarGzArchiveProducer;
use workspace_backup_action::adapters::aws::{
    S3StoreConnector, SdkRuntime, StsIdentityExchange, DEFAULT_OPERATION_TIMEOUT,
};
use workspace_backup_action::adapters::scratch::{LocalScratchDir, ScratchSpace};
use workspace_backup_action::domain::inputs::{
    RawBackupInput, RawPlatformContext, ValidationError,
};
use workspace_backup_action::error::BackupError;
use workspace_backup_action::handlers::backup::{
    cleanup_scratch, run_backup, BackupReport, BackupRequest,
};

const DEFAULT_LOG_FILTER: &str = "info,aws_config=warn,aws_smithy_runtime=warn";

/// Archive the CI workspace to S3 and prune archives beyond the retention count.
///
/// Every option can also be supplied through the environment variable the CI
/// host exports for the corresponding action input.
#[derive(Debug, Parser)]
#[command(name = "backup_action")]
struct Cli {
    /// Destination bucket
    #[arg(long, env = "INPUT_TARGETBUCKET")]
    target_bucket: Option<String>,
    /// Region of the bucket and of the identity exchange
    #[arg(long, env = "INPUT_BUCKET-REGION")]
    bucket_region: Option<String>,
    /// Role assumed with the workload identity token
    #[arg(long, env = "INPUT_ROLE-ARN")]
    role_arn: Option<String>,
    /// Expected audience of the identity token; a mismatch is logged as a warning
    #[arg(long, env = "INPUT_OIDC-AUDIENCE")]
    oidc_audience: Option<String>,
    /// Object key prefix [default: backup]
    #[arg(long, env = "INPUT_BACKUP-PREFIX")]
    backup_prefix: Option<String>,
    /// Number of archives to keep [default: 5]
    #[arg(long, env = "INPUT_KEEP-VERSIONS")]
    keep_versions: Option<String>,
    /// `prefix` or `repository` [default: prefix]
    #[arg(long, env = "INPUT_RETENTION-SCOPE")]
    retention_scope: Option<String>,
    /// File holding the workload identity token
    #[arg(long, env = "ACTIONS_ID_TOKEN_REQUEST_TOKEN")]
    identity_token_file: Option<String>,
    /// `owner/name` slug of the repository being backed up
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: Option<String>,
    /// Directory to archive
    #[arg(long, env = "GITHUB_WORKSPACE")]
    workspace: Option<String>,
    /// Directory under which the per-run scratch directory is created
    #[arg(long, env = "RUNNER_TEMP")]
    scratch_root: Option<PathBuf>,
    /// Upper bound in seconds for each network operation [default: 900]
    #[arg(long, env = "INPUT_NETWORK-TIMEOUT-SECS")]
    network_timeout_secs: Option<String>,
}

impl Cli {
    fn backup_request(&self, started_at: DateTime<Utc>) -> BackupRequest {
        BackupRequest {
            input: RawBackupInput {
                target_bucket: self.target_bucket.clone(),
                bucket_region: self.bucket_region.clone(),
                role_arn: self.role_arn.clone(),
                oidc_audience: self.oidc_audience.clone(),
                backup_prefix: self.backup_prefix.clone(),
                keep_versions: self.keep_versions.clone(),
                retention_scope: self.retention_scope.clone(),
            },
            platform: RawPlatformContext {
                identity_token_file: self.identity_token_file.clone(),
                repository: self.repository.clone(),
                workspace_dir: self.workspace.clone(),
            },
            started_at,
        }
    }

    fn operation_timeout(&self) -> Result<Duration, ValidationError> {
        match self.network_timeout_secs.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_OPERATION_TIMEOUT),
            Some(value) => value
                .parse::<u64>()
                .ok()
                .filter(|seconds| *seconds > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    ValidationError::new(format!(
                        "network-timeout-secs must be a positive integer, got '{value}'"
                    ))
                }),
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let scratch_root = cli.scratch_root.clone().unwrap_or_else(std::env::temp_dir);
    let scratch = LocalScratchDir::under(&scratch_root);

    let outcome = execute(&cli, &scratch);

    match outcome {
        Ok(report) => {
            log_completed(&report);
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(
                component = "backup",
                event = "backup_failed",
                kind = error.kind(),
                error = %error,
            );
            println!("::error::Action failed: {}", escape_annotation(&error.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Runs the backup with the real adapters. The scratch directory is cleaned
/// up on every path, including when the SDK runtime cannot be set up.
fn execute(cli: &Cli, scratch: &impl ScratchSpace) -> Result<BackupReport, BackupError> {
    let runtime = match start_runtime(cli) {
        Ok(runtime) => runtime,
        Err(error) => {
            cleanup_scratch(scratch);
            return Err(error);
        }
    };

    run_backup(
        cli.backup_request(Utc::now()),
        &StsIdentityExchange::new(runtime.clone()),
        &S3StoreConnector::new(runtime),
        &TarGzArchiveProducer,
        scratch,
    )
}

fn start_runtime(cli: &Cli) -> Result<SdkRuntime, BackupError> {
    let operation_timeout = cli.operation_timeout()?;
    SdkRuntime::new(operation_timeout).map_err(BackupError::Storage)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn log_completed(report: &BackupReport) {
    match serde_json::to_string(report) {
        Ok(summary) => tracing::info!(
            component = "backup",
            event = "backup_completed",
            report = %summary,
        ),
        Err(error) => tracing::warn!(
            component = "backup",
            event = "report_serialization_failed",
            error = %error,
        ),
    }
}

/// Encodes the characters that would otherwise end a workflow command early.
fn escape_annotation(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
