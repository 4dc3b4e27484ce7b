//! Recording fakes for the adapter traits.
//!
//! Every fake appends to one shared [`CallLog`], so tests can assert on the
//! relative order of calls across adapters.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::adapters::archive::ArchiveProducer;
use crate::adapters::identity::{IdentityExchange, WebIdentityRequest};
use crate::adapters::object_store::{BackupStore, ObjectPage, StoreConnector};
use crate::adapters::scratch::ScratchSpace;
use crate::domain::credentials::SessionCredentials;
use crate::domain::retention::RemoteObject;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Exchange { role_arn: String },
    Connect { bucket: String, region: String },
    Archive { destination: PathBuf },
    Upload { key: String, bytes: u64 },
    List { prefix: String, continuation_token: Option<String> },
    Delete { keys: Vec<String> },
    Cleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Exchange,
    Connect,
    Archive,
    Upload,
    List,
    Delete,
}

#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn record(&self, call: Call) {
        self.calls.lock().expect("poisoned mutex").push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("poisoned mutex").clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    /// Position of the first call matching `matches`.
    pub fn position(&self, matches: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls().iter().position(matches)
    }
}

pub fn at_hour(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub fn object(key: &str, last_modified: DateTime<Utc>) -> RemoteObject {
    RemoteObject {
        key: key.to_string(),
        last_modified,
    }
}

pub fn sample_credentials() -> SessionCredentials {
    SessionCredentials {
        access_key_id: "ASIAEXAMPLE".to_string(),
        secret_access_key: "secret".to_string(),
        session_token: "session".to_string(),
        expiry: at_hour(23),
    }
}

/// In-memory bucket that pages its listing and applies uploads and deletes.
#[derive(Debug, Clone)]
pub struct FakeStore {
    bucket: String,
    log: CallLog,
    objects: Arc<Mutex<Vec<RemoteObject>>>,
    page_size: usize,
    upload_time: DateTime<Utc>,
    fail_at: Option<FailAt>,
}

impl FakeStore {
    pub fn new(log: &CallLog, objects: Vec<RemoteObject>) -> Self {
        Self {
            bucket: "test-bucket".to_string(),
            log: log.clone(),
            objects: Arc::new(Mutex::new(objects)),
            page_size: 1_000,
            upload_time: at_hour(23),
            fail_at: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn failing_at(mut self, fail_at: Option<FailAt>) -> Self {
        self.fail_at = fail_at;
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .expect("poisoned mutex")
            .iter()
            .map(|object| object.key.clone())
            .collect()
    }

    fn fails_at(&self, step: FailAt) -> bool {
        self.fail_at == Some(step)
    }
}

impl BackupStore for FakeStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn upload_file(&self, key: &str, path: &Path) -> Result<(), String> {
        let bytes = fs::metadata(path)
            .map(|metadata| metadata.len())
            .map_err(|error| format!("archive missing at upload time: {error}"))?;
        self.log.record(Call::Upload {
            key: key.to_string(),
            bytes,
        });
        if self.fails_at(FailAt::Upload) {
            return Err("simulated upload failure".to_string());
        }

        let mut objects = self.objects.lock().expect("poisoned mutex");
        objects.retain(|object| object.key != key);
        objects.push(object(key, self.upload_time));
        Ok(())
    }

    fn list_objects_page(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
    ) -> Result<ObjectPage, String> {
        self.log.record(Call::List {
            prefix: prefix.to_string(),
            continuation_token: continuation_token.map(str::to_string),
        });
        if self.fails_at(FailAt::List) {
            return Err("simulated listing failure".to_string());
        }

        let start = match continuation_token {
            None => 0,
            Some(token) => token
                .strip_prefix("offset-")
                .and_then(|offset| offset.parse::<usize>().ok())
                .ok_or_else(|| format!("unknown continuation token {token}"))?,
        };

        let matching = self
            .objects
            .lock()
            .expect("poisoned mutex")
            .iter()
            .filter(|object| object.key.starts_with(prefix))
            .cloned()
            .collect::<Vec<_>>();
        let end = (start + self.page_size).min(matching.len());

        Ok(ObjectPage {
            objects: matching[start.min(end)..end].to_vec(),
            next_continuation_token: (end < matching.len()).then(|| format!("offset-{end}")),
        })
    }

    fn delete_objects(&self, keys: &[String]) -> Result<(), String> {
        self.log.record(Call::Delete {
            keys: keys.to_vec(),
        });
        if self.fails_at(FailAt::Delete) {
            return Err("simulated delete failure".to_string());
        }

        self.objects
            .lock()
            .expect("poisoned mutex")
            .retain(|object| !keys.contains(&object.key));
        Ok(())
    }
}

pub struct FakeConnector {
    pub store: FakeStore,
}

impl StoreConnector for FakeConnector {
    type Store = FakeStore;

    fn connect(
        &self,
        bucket: &str,
        region: &str,
        _credentials: &SessionCredentials,
    ) -> Result<Self::Store, String> {
        self.store.log.record(Call::Connect {
            bucket: bucket.to_string(),
            region: region.to_string(),
        });
        if self.store.fails_at(FailAt::Connect) {
            return Err("simulated client construction failure".to_string());
        }
        let mut store = self.store.clone();
        store.bucket = bucket.to_string();
        Ok(store)
    }
}

pub struct FakeExchange {
    pub log: CallLog,
    pub fail: bool,
}

impl IdentityExchange for FakeExchange {
    fn assume_role_with_web_identity(
        &self,
        request: &WebIdentityRequest<'_>,
    ) -> Result<SessionCredentials, String> {
        self.log.record(Call::Exchange {
            role_arn: request.role_arn.to_string(),
        });
        if self.fail {
            return Err("simulated exchange failure".to_string());
        }
        Ok(sample_credentials())
    }
}

/// Writes a small placeholder file instead of a real tarball.
pub struct FakeArchiver {
    pub log: CallLog,
    pub fail: bool,
}

impl ArchiveProducer for FakeArchiver {
    fn produce(&self, _source_dir: &Path, destination: &Path) -> Result<u64, String> {
        self.log.record(Call::Archive {
            destination: destination.to_path_buf(),
        });
        if self.fail {
            return Err("simulated archive failure".to_string());
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|error| error.to_string())?;
        }
        fs::write(destination, b"archive").map_err(|error| error.to_string())?;
        Ok(7)
    }
}

/// Scratch directory that records each cleanup before removing itself.
pub struct RecordingScratch {
    pub log: CallLog,
    pub path: PathBuf,
}

impl ScratchSpace for RecordingScratch {
    fn path(&self) -> &Path {
        &self.path
    }

    fn cleanup(&self) -> Result<(), String> {
        self.log.record(Call::Cleanup);
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.to_string()),
        }
    }
}
