//! AWS SDK implementations of the identity and object-store adapters.
//!
//! Every client is built from an explicit configuration: region, timeouts,
//! and retry policy come from [`SdkRuntime`], and S3 clients receive the
//! session credentials of the run directly instead of reading them from the
//! process environment. Archives past the multipart threshold are uploaded in
//! parts, so each part gets its own operation timeout.

use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, DateTime as SdkDateTime, Length};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};
use chrono::{DateTime, Utc};

use crate::adapters::identity::{IdentityExchange, WebIdentityRequest};
use crate::adapters::object_store::{BackupStore, ObjectPage, StoreConnector};
use crate::domain::credentials::SessionCredentials;
use crate::domain::retention::RemoteObject;
use crate::domain::upload_parts::{plan_parts, uses_multipart, PartRange};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(900);
const CREDENTIALS_PROVIDER_NAME: &str = "web-identity-exchange";

/// Single-threaded async runtime that blocking adapter methods drive SDK
/// futures on.
#[derive(Clone)]
pub struct SdkRuntime {
    runtime: Arc<tokio::runtime::Runtime>,
    operation_timeout: Duration,
}

impl SdkRuntime {
    pub fn new(operation_timeout: Duration) -> Result<Self, String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| format!("failed to start async runtime: {error}"))?;

        Ok(Self {
            runtime: Arc::new(runtime),
            operation_timeout,
        })
    }

    pub fn timeout_config(&self) -> TimeoutConfig {
        TimeoutConfig::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .operation_timeout(self.operation_timeout)
            .build()
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Shared client settings for `region`. Retries are disabled: each network
    /// call is a single attempt.
    fn load_sdk_config(&self, region: &str) -> SdkConfig {
        let loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .timeout_config(self.timeout_config())
            .retry_config(RetryConfig::disabled())
            .no_credentials();
        self.block_on(loader.load())
    }
}

pub struct StsIdentityExchange {
    runtime: SdkRuntime,
}

impl StsIdentityExchange {
    pub fn new(runtime: SdkRuntime) -> Self {
        Self { runtime }
    }
}

impl IdentityExchange for StsIdentityExchange {
    fn assume_role_with_web_identity(
        &self,
        request: &WebIdentityRequest<'_>,
    ) -> Result<SessionCredentials, String> {
        let sdk_config = self.runtime.load_sdk_config(request.region);
        let client = aws_sdk_sts::Client::new(&sdk_config);

        let output = self
            .runtime
            .block_on(
                client
                    .assume_role_with_web_identity()
                    .role_arn(request.role_arn)
                    .role_session_name(request.role_session_name)
                    .web_identity_token(request.web_identity_token)
                    .duration_seconds(request.duration_seconds)
                    .send(),
            )
            .map_err(|error| {
                format!(
                    "assume role with web identity failed: {}",
                    DisplayErrorContext(&error)
                )
            })?;

        let credentials = output
            .credentials()
            .ok_or_else(|| "identity exchange returned no credentials".to_string())?;

        Ok(SessionCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiry: to_utc(credentials.expiration())?,
        })
    }
}

pub struct S3StoreConnector {
    runtime: SdkRuntime,
}

impl S3StoreConnector {
    pub fn new(runtime: SdkRuntime) -> Self {
        Self { runtime }
    }
}

impl StoreConnector for S3StoreConnector {
    type Store = S3BackupStore;

    fn connect(
        &self,
        bucket: &str,
        region: &str,
        credentials: &SessionCredentials,
    ) -> Result<Self::Store, String> {
        let sdk_config = self.runtime.load_sdk_config(region);
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .credentials_provider(sdk_credentials(credentials))
            .build();

        Ok(S3BackupStore {
            bucket: bucket.to_string(),
            client: aws_sdk_s3::Client::from_conf(s3_config),
            runtime: self.runtime.clone(),
        })
    }
}

pub struct S3BackupStore {
    bucket: String,
    client: aws_sdk_s3::Client,
    runtime: SdkRuntime,
}

impl S3BackupStore {
    async fn upload_whole(&self, key: &str, path: &Path) -> Result<(), String> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|error| format!("failed to read {}: {error}", path.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| {
                format!(
                    "failed to upload s3://{}/{key}: {}",
                    self.bucket,
                    DisplayErrorContext(&error)
                )
            })
    }

    /// Uploads `path` as one multipart upload. Parts already stored are
    /// discarded when any later step fails.
    async fn upload_in_parts(&self, key: &str, path: &Path, size: u64) -> Result<(), String> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|error| {
                format!(
                    "failed to start multipart upload of s3://{}/{key}: {}",
                    self.bucket,
                    DisplayErrorContext(&error)
                )
            })?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| format!("multipart upload of {key} returned no upload id"))?;

        let parts = plan_parts(size);
        tracing::info!(
            component = "object_store",
            event = "multipart_upload_started",
            key,
            bytes = size,
            parts = parts.len(),
        );

        let outcome = match self.send_parts(key, upload_id, path, &parts).await {
            Ok(completed) => self.complete_upload(key, upload_id, completed).await,
            Err(error) => Err(error),
        };

        if outcome.is_err() {
            self.abort_upload(key, upload_id).await;
        }
        outcome
    }

    async fn send_parts(
        &self,
        key: &str,
        upload_id: &str,
        path: &Path,
        parts: &[PartRange],
    ) -> Result<Vec<CompletedPart>, String> {
        let mut completed = Vec::with_capacity(parts.len());

        for part in parts {
            let body = ByteStream::read_from()
                .path(path)
                .offset(part.offset)
                .length(Length::Exact(part.length))
                .build()
                .await
                .map_err(|error| {
                    format!(
                        "failed to read part {} of {}: {error}",
                        part.part_number,
                        path.display()
                    )
                })?;

            let output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part.part_number)
                .body(body)
                .send()
                .await
                .map_err(|error| {
                    format!(
                        "failed to upload part {} of s3://{}/{key}: {}",
                        part.part_number,
                        self.bucket,
                        DisplayErrorContext(&error)
                    )
                })?;

            completed.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(str::to_string))
                    .part_number(part.part_number)
                    .build(),
            );
        }

        Ok(completed)
    }

    async fn complete_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), String> {
        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map(|_| ())
            .map_err(|error| {
                format!(
                    "failed to complete multipart upload of s3://{}/{key}: {}",
                    self.bucket,
                    DisplayErrorContext(&error)
                )
            })
    }

    async fn abort_upload(&self, key: &str, upload_id: &str) {
        let result = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await;

        if let Err(error) = result {
            tracing::warn!(
                component = "object_store",
                event = "multipart_abort_failed",
                key,
                error = %DisplayErrorContext(&error),
            );
        }
    }
}

impl BackupStore for S3BackupStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn upload_file(&self, key: &str, path: &Path) -> Result<(), String> {
        let size = fs::metadata(path)
            .map_err(|error| format!("failed to stat {}: {error}", path.display()))?
            .len();

        if uses_multipart(size) {
            self.runtime.block_on(self.upload_in_parts(key, path, size))
        } else {
            self.runtime.block_on(self.upload_whole(key, path))
        }
    }

    fn list_objects_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage, String> {
        let output = self
            .runtime
            .block_on(
                self.client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .prefix(prefix)
                    .set_continuation_token(continuation_token.map(str::to_string))
                    .send(),
            )
            .map_err(|error| {
                format!(
                    "failed to list s3://{}/{prefix}: {}",
                    self.bucket,
                    DisplayErrorContext(&error)
                )
            })?;

        let mut objects = Vec::with_capacity(output.contents().len());
        for object in output.contents() {
            let Some(key) = object.key() else {
                continue;
            };
            let last_modified = object
                .last_modified()
                .ok_or_else(|| format!("object {key} has no last-modified time"))?;
            objects.push(RemoteObject {
                key: key.to_string(),
                last_modified: to_utc(last_modified)?,
            });
        }

        let next_continuation_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectPage {
            objects,
            next_continuation_token,
        })
    }

    fn delete_objects(&self, keys: &[String]) -> Result<(), String> {
        let identifiers = keys
            .iter()
            .map(|key| {
                ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|error| format!("invalid object key {key}: {error}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .map_err(|error| format!("invalid delete request: {error}"))?;

        let output = self
            .runtime
            .block_on(
                self.client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(delete)
                    .send(),
            )
            .map_err(|error| {
                format!(
                    "failed to delete objects from s3://{}: {}",
                    self.bucket,
                    DisplayErrorContext(&error)
                )
            })?;

        let failures = output.errors();
        if failures.is_empty() {
            return Ok(());
        }

        let details = failures
            .iter()
            .map(|failure| {
                format!(
                    "{}: {}",
                    failure.key().unwrap_or("<unknown key>"),
                    failure.message().unwrap_or("unknown error")
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        Err(format!(
            "failed to delete {} of {} objects: {details}",
            failures.len(),
            keys.len()
        ))
    }
}

fn sdk_credentials(credentials: &SessionCredentials) -> Credentials {
    Credentials::new(
        credentials.access_key_id.clone(),
        credentials.secret_access_key.clone(),
        Some(credentials.session_token.clone()),
        Some(SystemTime::from(credentials.expiry)),
        CREDENTIALS_PROVIDER_NAME,
    )
}

fn to_utc(value: &SdkDateTime) -> Result<DateTime<Utc>, String> {
    DateTime::<Utc>::from_timestamp(value.secs(), value.subsec_nanos())
        .ok_or_else(|| format!("timestamp {value} is out of range"))
}
